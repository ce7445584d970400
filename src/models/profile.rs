use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::{
    normalize_role_list, ProfileOverrides, Role, UserProfile, UserStatus,
};
use crate::errors::AppError;
use crate::events::{Loggable, Severity};

/// API-facing account record. `status` is always the resolved lifecycle
/// state, never the raw stored flag.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub roles: Vec<Role>,
    pub status: UserStatus,
    #[schema(value_type = Object)]
    pub overrides: ProfileOverrides,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Account {
    fn entity_type() -> &'static str {
        "account"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
}

/// Raw row shape. Role lists and override maps are JSON text columns; the
/// document store owns their exact contents and normalization happens on
/// read, so stale shapes keep loading.
#[derive(Debug, Clone, FromRow)]
pub struct DbAccount {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub roles: String,
    pub status: Option<String>,
    pub disabled: Option<i64>,
    pub overrides: String,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbAccount {
    fn parsed_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.id)
            .map_err(|err| AppError::internal(format!("malformed account id {:?}: {err}", self.id)))
    }

    fn roles_document(&self) -> Value {
        serde_json::from_str(&self.roles).unwrap_or(Value::Null)
    }

    fn overrides_document(&self) -> Value {
        serde_json::from_str(&self.overrides).unwrap_or(Value::Null)
    }

    /// Build the evaluator's snapshot view of this account.
    pub fn to_profile(&self) -> Result<UserProfile, AppError> {
        Ok(UserProfile {
            uid: self.parsed_id()?,
            roles: normalize_role_list(&self.roles_document()),
            status: self.status.as_deref().and_then(UserStatus::parse),
            disabled: self.disabled.map(|flag| flag != 0),
            overrides: ProfileOverrides::from_document(&self.overrides_document()),
        })
    }
}

impl TryFrom<DbAccount> for Account {
    type Error = AppError;

    fn try_from(db: DbAccount) -> Result<Self, Self::Error> {
        let profile = db.to_profile()?;
        let status = profile.resolved_status();
        Ok(Account {
            id: profile.uid,
            name: db.name,
            email: db.email,
            roles: profile.roles,
            status,
            overrides: profile.overrides,
            approved_by: db.approved_by.as_deref().and_then(|s| Uuid::parse_str(s).ok()),
            approved_at: db.approved_at,
            created_at: db.created_at,
            updated_at: db.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "Grace Hopper")]
    pub name: String,
    #[schema(example = "grace@dept.example.edu")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "grace@dept.example.edu")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub account: Account,
}

/// Approve a pending account: assigns exactly one role and activates it in
/// a single write.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ApproveRequest {
    #[schema(example = "staff")]
    pub role: Role,
}

/// Replace an account's role set. Unknown names are dropped silently, like
/// everywhere else roles are ingested.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetRolesRequest {
    #[schema(example = json!(["staff", "faculty"]))]
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OverridesUpdateRequest {
    #[serde(default)]
    #[schema(value_type = Object)]
    pub pages: std::collections::BTreeMap<String, bool>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub actions: std::collections::BTreeMap<String, bool>,
}
