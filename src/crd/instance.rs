//! The `SupabaseInstance` custom resource: desired/observed state for one
//! tenant Supabase deployment.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{managed_namespace, validate_project_name, Condition, Phase};

/// Desired state of a `SupabaseInstance`.
///
/// Cluster-scoped: the resource name is the project identifier and the sole
/// input the managed namespace and generated resources derive from.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "supacontrol.io",
    version = "v1alpha1",
    kind = "SupabaseInstance",
    plural = "supabaseinstances",
    status = "SupabaseInstanceStatus",
    shortname = "supa",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Namespace", "type":"string", "jsonPath":".status.namespace"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SupabaseInstanceSpec {
    /// Equals the resource name; kept explicit for clarity in manifests.
    pub project_name: String,

    /// Overrides `defaultIngressClass` from process configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_class: Option<String>,

    /// Overrides `defaultIngressDomain` from process configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_domain: Option<String>,

    /// Pins a specific Helm chart version for this instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_version: Option<String>,

    /// When true, the reconciler scales managed workloads to zero without
    /// destroying data.
    #[serde(default)]
    pub paused: bool,
}

impl SupabaseInstanceSpec {
    pub fn validate(&self) -> Result<(), String> {
        validate_project_name(&self.project_name)?;
        Ok(())
    }

    pub fn namespace(&self) -> String {
        managed_namespace(&self.project_name)
    }
}

/// Observed state of a `SupabaseInstance`, written only by the reconciler
/// through the status subresource.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SupabaseInstanceStatus {
    #[serde(default)]
    pub phase: Phase,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub studio_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helm_release_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// External-facing status vocabulary: the HTTP layer never sees `Phase`
/// directly, only this coarser mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalStatus {
    Provisioning,
    Running,
    Deleting,
    Failed,
}

impl From<Phase> for ExternalStatus {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Pending | Phase::Provisioning => ExternalStatus::Provisioning,
            Phase::Running => ExternalStatus::Running,
            Phase::Deleting => ExternalStatus::Deleting,
            Phase::Failed => ExternalStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_derives_from_spec() {
        let spec = SupabaseInstanceSpec {
            project_name: "demo".to_string(),
            ingress_class: None,
            ingress_domain: None,
            chart_version: None,
            paused: false,
        };
        assert_eq!(spec.namespace(), "supa-demo");
    }

    #[test]
    fn external_status_mapping() {
        assert_eq!(ExternalStatus::from(Phase::Pending), ExternalStatus::Provisioning);
        assert_eq!(ExternalStatus::from(Phase::Provisioning), ExternalStatus::Provisioning);
        assert_eq!(ExternalStatus::from(Phase::Running), ExternalStatus::Running);
        assert_eq!(ExternalStatus::from(Phase::Deleting), ExternalStatus::Deleting);
        assert_eq!(ExternalStatus::from(Phase::Failed), ExternalStatus::Failed);
    }
}
