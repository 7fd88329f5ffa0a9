//! `ensureNamespace`: the one cluster-scoped ensure-step.

use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, PostParams};
use kube::{Client, ResourceExt};
use tracing::info;

use crate::controller::labels::{has_instance_label, instance_labels};
use crate::crd::managed_namespace;
use crate::error::{Error, Result};

/// Create `supa-{project_name}` with the instance label set. Treats
/// "already exists with matching label" as success, "exists without the
/// label" as a fatal invariant violation (someone else owns that
/// namespace).
pub async fn ensure_namespace(client: &Client, project_name: &str) -> Result<()> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let name = managed_namespace(project_name);

    match namespaces.get(&name).await {
        Ok(existing) => {
            let existing_labels = existing.labels();
            if has_instance_label(existing_labels, project_name) {
                Ok(())
            } else {
                Err(Error::InvariantViolation(format!(
                    "namespace {name} exists but is not labeled for instance {project_name}"
                )))
            }
        }
        Err(kube::Error::Api(e)) if e.code == 404 => {
            info!(namespace = %name, "creating namespace");
            let ns = build_namespace(project_name);
            namespaces.create(&PostParams::default(), &ns).await?;
            Ok(())
        }
        Err(e) => Err(Error::KubeError(e)),
    }
}

/// Delete `supa-{project_name}`, cascading to every child resource it
/// contains (RBAC triple, secrets, ingresses, the Helm release's own
/// workloads). Treats an already-absent namespace as success so cleanup
/// stays idempotent across reconciler restarts.
pub async fn delete_namespace(client: &Client, project_name: &str) -> Result<()> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let name = managed_namespace(project_name);

    match namespaces.delete(&name, &Default::default()).await {
        Ok(_) => {
            info!(namespace = %name, "deleting namespace");
            Ok(())
        }
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Err(e) => Err(Error::KubeError(e)),
    }
}

fn build_namespace(project_name: &str) -> Namespace {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    Namespace {
        metadata: ObjectMeta {
            name: Some(managed_namespace(project_name)),
            labels: Some(instance_labels(project_name)),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_namespace_carries_instance_label() {
        let ns = build_namespace("demo");
        assert_eq!(ns.metadata.name.as_deref(), Some("supa-demo"));
        assert_eq!(
            ns.metadata.labels.unwrap().get("supacontrol.io/instance"),
            Some(&"demo".to_string())
        );
    }
}
