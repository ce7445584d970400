use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::events::{Loggable, Severity};

/// Toggle one page grant for one role.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TogglePageRequest {
    #[schema(example = "scheduling/rooms")]
    pub page_id: String,
    pub allowed: bool,
}

/// Toggle one action grant for one role.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ToggleActionRequest {
    #[schema(example = "schedule.edit")]
    pub action: String,
    pub allowed: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PageCheckQuery {
    /// Page id, canonical or legacy spelling
    pub page: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ActionCheckQuery {
    /// Action key to evaluate (asking also registers the key)
    pub action: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckResponse {
    pub allowed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActionListResponse {
    pub actions: Vec<String>,
}

/// Activity-log wrapper for role-permission table edits. The table is a
/// singleton document, so the subject id is fixed.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyChange {
    pub document: Value,
}

impl Loggable for PolicyChange {
    fn entity_type() -> &'static str {
        "access_policy"
    }
    fn subject_id(&self) -> Uuid {
        Uuid::nil()
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
}
