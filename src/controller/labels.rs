//! Common label set shared by every child resource an instance owns.

use std::collections::BTreeMap;

/// Label carried by every resource SupaControl creates for an instance:
/// the Namespace, RBAC triple, Secret, Jobs, and Ingresses.
pub const INSTANCE_LABEL: &str = "supacontrol.io/instance";

/// Label distinguishing provisioning from cleanup Jobs.
pub const JOB_TYPE_LABEL: &str = "supacontrol.io/job-type";

pub fn instance_labels(project_name: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(INSTANCE_LABEL.to_string(), project_name.to_string());
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        "supacontrol".to_string(),
    );
    labels
}

/// Whether `labels` carries the instance label with the expected value.
/// Used to tell "already exists, ours" apart from "exists, foreign" when
/// an ensure-step finds a pre-existing resource.
pub fn has_instance_label(labels: &BTreeMap<String, String>, project_name: &str) -> bool {
    labels.get(INSTANCE_LABEL).map(String::as_str) == Some(project_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_labels_carry_instance_key() {
        let labels = instance_labels("demo");
        assert_eq!(labels.get(INSTANCE_LABEL), Some(&"demo".to_string()));
    }

    #[test]
    fn has_instance_label_matches_only_same_project() {
        let labels = instance_labels("demo");
        assert!(has_instance_label(&labels, "demo"));
        assert!(!has_instance_label(&labels, "other"));
    }

    #[test]
    fn has_instance_label_false_when_missing() {
        let labels = BTreeMap::new();
        assert!(!has_instance_label(&labels, "demo"));
    }
}
