//! `ensureRBAC`: the per-instance, namespace-scoped RBAC triple
//! (ServiceAccount, Role, RoleBinding) the provisioning Job runs as.
//!
//! This is the security-critical half of the two-tier least-privilege
//! model: the provisioning Job never receives a cluster-scoped
//! grant, only what this module creates inside `supa-{name}`.

use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;

use crate::controller::labels::instance_labels;
use crate::error::Result;

pub const SERVICE_ACCOUNT_NAME: &str = "supacontrol-provisioner";
pub const ROLE_NAME: &str = "supacontrol-provisioner";
pub const ROLE_BINDING_NAME: &str = "supacontrol-provisioner";
const FIELD_MANAGER: &str = "supacontrol-operator";

/// Create, in `namespace`, the ServiceAccount/Role/RoleBinding triple the
/// provisioning and cleanup Jobs run as. Idempotent: re-applying the same
/// manifests is a server-side-apply no-op.
pub async fn ensure_rbac(client: &Client, namespace: &str, project_name: &str) -> Result<()> {
    let labels = instance_labels(project_name);

    let sa_api: Api<ServiceAccount> = Api::namespaced(client.clone(), namespace);
    let sa = build_service_account(namespace, &labels);
    sa_api
        .patch(
            SERVICE_ACCOUNT_NAME,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&sa),
        )
        .await?;

    let role_api: Api<Role> = Api::namespaced(client.clone(), namespace);
    let role = build_role(namespace, &labels);
    role_api
        .patch(ROLE_NAME, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&role))
        .await?;

    let binding_api: Api<RoleBinding> = Api::namespaced(client.clone(), namespace);
    let binding = build_role_binding(namespace, &labels);
    binding_api
        .patch(
            ROLE_BINDING_NAME,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&binding),
        )
        .await?;

    Ok(())
}

fn build_service_account(
    namespace: &str,
    labels: &std::collections::BTreeMap<String, String>,
) -> ServiceAccount {
    ServiceAccount {
        metadata: ObjectMeta {
            name: Some(SERVICE_ACCOUNT_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Verbs and resources granted to the provisioning Job. Namespace-scoped
/// only — no `ClusterRole`/`ClusterRoleBinding` is ever created for this
/// principal.
fn build_role(namespace: &str, labels: &std::collections::BTreeMap<String, String>) -> Role {
    let verbs = vec![
        "create".to_string(),
        "get".to_string(),
        "list".to_string(),
        "update".to_string(),
        "delete".to_string(),
        "watch".to_string(),
    ];

    let rules = vec![
        PolicyRule {
            api_groups: Some(vec!["".to_string()]),
            resources: Some(vec![
                "secrets".to_string(),
                "services".to_string(),
                "configmaps".to_string(),
                "persistentvolumeclaims".to_string(),
                "pods".to_string(),
            ]),
            verbs: verbs.clone(),
            ..Default::default()
        },
        PolicyRule {
            api_groups: Some(vec!["apps".to_string()]),
            resources: Some(vec!["deployments".to_string(), "statefulsets".to_string()]),
            verbs: verbs.clone(),
            ..Default::default()
        },
        PolicyRule {
            api_groups: Some(vec!["networking.k8s.io".to_string()]),
            resources: Some(vec!["ingresses".to_string()]),
            verbs: verbs.clone(),
            ..Default::default()
        },
        PolicyRule {
            api_groups: Some(vec!["batch".to_string()]),
            resources: Some(vec!["jobs".to_string()]),
            verbs,
            ..Default::default()
        },
    ];

    Role {
        metadata: ObjectMeta {
            name: Some(ROLE_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        rules: Some(rules),
    }
}

fn build_role_binding(
    namespace: &str,
    labels: &std::collections::BTreeMap<String, String>,
) -> RoleBinding {
    RoleBinding {
        metadata: ObjectMeta {
            name: Some(ROLE_BINDING_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "Role".to_string(),
            name: ROLE_NAME.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: SERVICE_ACCOUNT_NAME.to_string(),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_grants_no_cluster_scoped_permissions() {
        // A Role (not ClusterRole) is namespace-scoped by construction;
        // this test pins that the builder never silently starts emitting
        // a ClusterRole-shaped object by checking the resource carries a
        // namespace.
        let labels = instance_labels("demo");
        let role = build_role("supa-demo", &labels);
        assert_eq!(role.metadata.namespace.as_deref(), Some("supa-demo"));
    }

    #[test]
    fn role_binding_subject_is_scoped_to_namespace() {
        let labels = instance_labels("demo");
        let binding = build_role_binding("supa-demo", &labels);
        let subject = &binding.subjects.unwrap()[0];
        assert_eq!(subject.namespace.as_deref(), Some("supa-demo"));
        assert_eq!(binding.role_ref.kind, "Role");
    }

    #[test]
    fn role_covers_expected_resource_groups() {
        let labels = instance_labels("demo");
        let role = build_role("supa-demo", &labels);
        let rules = role.rules.unwrap();
        let all_resources: Vec<String> = rules
            .iter()
            .flat_map(|r| r.resources.clone().unwrap_or_default())
            .collect();
        for expected in [
            "secrets",
            "services",
            "deployments",
            "statefulsets",
            "ingresses",
            "configmaps",
            "persistentvolumeclaims",
            "jobs",
            "pods",
        ] {
            assert!(
                all_resources.iter().any(|r| r == expected),
                "missing resource grant: {expected}"
            );
        }
    }
}
