use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity levels for activity logs. Controls retention policies and log
/// filtering; access-control changes are always long-retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Long-term retention, never auto-delete
    Critical,
    /// Medium-term retention (default)
    Important,
    /// Aggressively trimmed
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Important
    }
}

/// Entities that can be recorded in the activity log. The entity type
/// becomes the event-name prefix, e.g. "account.approved".
pub trait Loggable: Serialize + Send + Sync {
    fn entity_type() -> &'static str;

    fn subject_id(&self) -> Uuid;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    /// Lifecycle and permission mutations are always Critical regardless of
    /// the entity's base severity.
    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "approved" | "disabled" | "enabled" | "roles_changed" | "overrides_changed"
            | "updated_policy" | "deleted" => Severity::Critical,
            "created" | "updated" | "registered" => self.severity(),
            _ => Severity::Important,
        }
    }
}
