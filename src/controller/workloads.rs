//! Pause/resume for `spec.paused`. A paused instance completes provisioning
//! first, then scales down — it never interrupts a Job in flight.
//!
//! Scales every Deployment/StatefulSet the Helm chart created in the
//! instance namespace to zero replicas without deleting anything, so tenant
//! data survives a pause. Resuming restores the replica count the workload
//! had before being paused and bumps a restart annotation so pods actually
//! roll rather than silently staying at the old image/config.
//!
//! These workloads belong to the Helm release rather than to SupaControl
//! itself, so the replica count being restored is read back from an
//! annotation this module stamped on the way down, not from anything
//! SupaControl's own spec declares.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::{Client, ResourceExt};
use tracing::info;

use crate::error::Result;

const ORIGINAL_REPLICAS_ANNOTATION: &str = "supacontrol.io/original-replicas";
const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";
const FIELD_MANAGER: &str = "supacontrol-operator";

fn helm_instance_selector(project_name: &str) -> String {
    format!("app.kubernetes.io/instance={project_name}")
}

/// What to do to one workload, derived from its current replica count, the
/// remembered pre-pause count (if any), and the desired `paused` state.
#[derive(Debug, PartialEq, Eq)]
enum Action {
    /// Already in the desired state; no patch needed.
    NoOp,
    /// Scale to zero and remember `replicas` so resuming can restore it.
    ScaleDown { remember: i32 },
    /// Restore to `replicas` and clear the remembered-count annotation.
    Resume { replicas: i32 },
}

fn plan(current: i32, paused: bool, remembered: Option<i32>) -> Action {
    match (paused, remembered) {
        (true, _) if current == 0 => Action::NoOp,
        (true, _) => Action::ScaleDown { remember: current },
        (false, Some(replicas)) => Action::Resume { replicas: replicas.max(1) },
        (false, None) => Action::NoOp,
    }
}

/// Scale every Helm-managed Deployment/StatefulSet for `project_name` in
/// `namespace` to zero (`paused = true`) or back to its remembered replica
/// count (`paused = false`). Idempotent: once a workload reaches the
/// desired state and its bookkeeping annotation is cleared, later calls with
/// the same `paused` value are no-ops rather than repeatedly patching.
pub async fn ensure_paused(
    client: &Client,
    namespace: &str,
    project_name: &str,
    paused: bool,
) -> Result<()> {
    let list_params = ListParams::default().labels(&helm_instance_selector(project_name));

    let deployments: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    for d in deployments.list(&list_params).await?.items {
        let current = d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
        let remembered = remembered_replicas(d.annotations());
        if let Some(patch) = patch_for(plan(current, paused, remembered)) {
            info!(deployment = %d.name_any(), paused, "adjusting deployment for pause/resume");
            deployments
                .patch(&d.name_any(), &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
                .await?;
        }
    }

    let statefulsets: Api<StatefulSet> = Api::namespaced(client.clone(), namespace);
    for s in statefulsets.list(&list_params).await?.items {
        let current = s.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
        let remembered = remembered_replicas(s.annotations());
        if let Some(patch) = patch_for(plan(current, paused, remembered)) {
            info!(statefulset = %s.name_any(), paused, "adjusting statefulset for pause/resume");
            statefulsets
                .patch(&s.name_any(), &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
                .await?;
        }
    }

    Ok(())
}

fn remembered_replicas(annotations: &BTreeMap<String, String>) -> Option<i32> {
    annotations.get(ORIGINAL_REPLICAS_ANNOTATION)?.parse().ok()
}

fn patch_for(action: Action) -> Option<serde_json::Value> {
    match action {
        Action::NoOp => None,
        Action::ScaleDown { remember } => Some(serde_json::json!({
            "metadata": { "annotations": { ORIGINAL_REPLICAS_ANNOTATION: remember.to_string() } },
            "spec": { "replicas": 0 },
        })),
        Action::Resume { replicas } => Some(serde_json::json!({
            "metadata": {
                "annotations": {
                    ORIGINAL_REPLICAS_ANNOTATION: serde_json::Value::Null,
                    RESTARTED_AT_ANNOTATION: chrono::Utc::now().to_rfc3339(),
                },
            },
            "spec": { "replicas": replicas },
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pausing_a_running_workload_remembers_its_replica_count() {
        assert_eq!(plan(3, true, None), Action::ScaleDown { remember: 3 });
    }

    #[test]
    fn pausing_an_already_scaled_down_workload_is_a_noop() {
        assert_eq!(plan(0, true, Some(3)), Action::NoOp);
    }

    #[test]
    fn resuming_restores_remembered_replica_count() {
        assert_eq!(plan(0, false, Some(3)), Action::Resume { replicas: 3 });
    }

    #[test]
    fn resuming_a_workload_with_no_memory_is_a_noop() {
        assert_eq!(plan(1, false, None), Action::NoOp);
    }

    #[test]
    fn resume_is_idempotent_once_memory_is_cleared() {
        // After the first Resume patch clears the annotation, the next
        // reconcile sees `remembered = None` and does nothing further.
        assert_eq!(plan(3, false, None), Action::NoOp);
    }
}
