//! Shared vocabulary types for the `SupabaseInstance` resource: phases,
//! condition shape, and name validation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Coarse lifecycle label. A closed set, modeled as a sum type rather than
/// a free-form string even though the wire format is a string.
///
/// An unrecognized wire value deserializes to `Pending` (the only safe
/// recovery for an unknown phase) rather than failing deserialization,
/// since a hard parse error here would brick the informer cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum Phase {
    #[default]
    Pending,
    Provisioning,
    Running,
    Deleting,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Pending => "Pending",
            Phase::Provisioning => "Provisioning",
            Phase::Running => "Running",
            Phase::Deleting => "Deleting",
            Phase::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Provisioning" => Phase::Provisioning,
            "Running" => Phase::Running,
            "Deleting" => Phase::Deleting,
            "Failed" => Phase::Failed,
            _ => Phase::Pending,
        })
    }
}

impl Serialize for Phase {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Phase {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "" | "Pending" => Phase::Pending,
            "Provisioning" => Phase::Provisioning,
            "Running" => Phase::Running,
            "Deleting" => Phase::Deleting,
            "Failed" => Phase::Failed,
            other => {
                tracing::warn!(phase = other, "unrecognized phase on wire, defaulting to Pending");
                Phase::Pending
            }
        })
    }
}

/// The vocabulary of condition types a `SupabaseInstance` reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionType {
    Ready,
    NamespaceReady,
    RBACReady,
    SecretsReady,
    HelmReleaseReady,
    IngressReady,
}

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::Ready => "Ready",
            ConditionType::NamespaceReady => "NamespaceReady",
            ConditionType::RBACReady => "RBACReady",
            ConditionType::SecretsReady => "SecretsReady",
            ConditionType::HelmReleaseReady => "HelmReleaseReady",
            ConditionType::IngressReady => "IngressReady",
        }
    }

    /// All condition types a `Running` instance must report `True` for.
    pub const ALL: [ConditionType; 6] = [
        ConditionType::Ready,
        ConditionType::NamespaceReady,
        ConditionType::RBACReady,
        ConditionType::SecretsReady,
        ConditionType::HelmReleaseReady,
        ConditionType::IngressReady,
    ];
}

/// `True | False | Unknown`, per the Kubernetes condition convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        }
    }
}

/// A single structured status entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: ConditionType,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    pub last_transition_time: String,
}

impl Condition {
    pub fn new(type_: ConditionType, status: ConditionStatus, reason: &str, message: &str) -> Self {
        Self {
            type_,
            status,
            reason: reason.to_string(),
            message: message.to_string(),
            last_transition_time: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Merge `desired` into `conditions`, preserving `lastTransitionTime` unless
/// `status`, `reason`, or `message` actually changed.
///
/// This is the heart of the "update a condition only when it changed"
/// status policy: callers always pass a freshly-stamped `desired` condition,
/// and this function is responsible for deciding whether that stamp survives.
pub fn merge_condition(conditions: &mut Vec<Condition>, desired: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == desired.type_) {
        Some(existing) => {
            let changed = existing.status != desired.status
                || existing.reason != desired.reason
                || existing.message != desired.message;
            if changed {
                *existing = desired;
            }
        }
        None => conditions.push(desired),
    }
}

/// DNS-label validation for `projectName`: lowercase alphanumeric and
/// hyphens, <= 63 chars, no leading/trailing hyphen.
pub fn validate_project_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("projectName must not be empty".to_string());
    }
    if name.len() > 63 {
        return Err(format!(
            "projectName must be <= 63 characters, got {}",
            name.len()
        ));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err("projectName must not start or end with a hyphen".to_string());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(
            "projectName must consist of lowercase alphanumeric characters or '-'".to_string(),
        );
    }
    Ok(())
}

/// The namespace a `SupabaseInstance` named `project_name` manages.
pub fn managed_namespace(project_name: &str) -> String {
    format!("supa-{project_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_name_63_chars_accepted() {
        let name = "a".repeat(63);
        assert!(validate_project_name(&name).is_ok());
    }

    #[test]
    fn project_name_64_chars_rejected() {
        let name = "a".repeat(64);
        assert!(validate_project_name(&name).is_err());
    }

    #[test]
    fn project_name_trailing_hyphen_rejected() {
        assert!(validate_project_name("demo-").is_err());
    }

    #[test]
    fn project_name_leading_hyphen_rejected() {
        assert!(validate_project_name("-demo").is_err());
    }

    #[test]
    fn project_name_uppercase_rejected() {
        assert!(validate_project_name("Demo").is_err());
    }

    #[test]
    fn project_name_valid() {
        assert!(validate_project_name("demo").is_ok());
        assert!(validate_project_name("demo-1").is_ok());
    }

    #[test]
    fn namespace_is_pure_function_of_name() {
        assert_eq!(managed_namespace("demo"), "supa-demo");
    }

    #[test]
    fn unrecognized_phase_defaults_to_pending() {
        let phase: Phase = serde_json::from_str("\"SomeFutureThing\"").unwrap();
        assert_eq!(phase, Phase::Pending);
    }

    #[test]
    fn empty_phase_is_pending() {
        let phase: Phase = serde_json::from_str("\"\"").unwrap();
        assert_eq!(phase, Phase::Pending);
    }

    #[test]
    fn merge_condition_preserves_transition_time_when_unchanged() {
        let mut conditions = vec![Condition::new(
            ConditionType::Ready,
            ConditionStatus::True,
            "AllReady",
            "all good",
        )];
        let original_time = conditions[0].last_transition_time.clone();

        let mut desired = Condition::new(ConditionType::Ready, ConditionStatus::True, "AllReady", "all good");
        desired.last_transition_time = "2099-01-01T00:00:00+00:00".to_string();

        merge_condition(&mut conditions, desired);
        assert_eq!(conditions[0].last_transition_time, original_time);
        assert_eq!(conditions.len(), 1);
    }

    #[test]
    fn merge_condition_updates_on_status_change() {
        let mut conditions = vec![Condition::new(
            ConditionType::Ready,
            ConditionStatus::False,
            "Provisioning",
            "in progress",
        )];

        let desired = Condition::new(ConditionType::Ready, ConditionStatus::True, "AllReady", "done");
        merge_condition(&mut conditions, desired.clone());

        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].status, ConditionStatus::True);
        assert_eq!(conditions[0].last_transition_time, desired.last_transition_time);
    }

    #[test]
    fn merge_condition_appends_new_type() {
        let mut conditions = vec![Condition::new(
            ConditionType::Ready,
            ConditionStatus::True,
            "AllReady",
            "done",
        )];
        merge_condition(
            &mut conditions,
            Condition::new(ConditionType::NamespaceReady, ConditionStatus::True, "Created", "ok"),
        );
        assert_eq!(conditions.len(), 2);
    }
}
