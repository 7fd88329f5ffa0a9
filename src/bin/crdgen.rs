//! Prints the `SupabaseInstance` CustomResourceDefinition, plus the
//! controller's own `ServiceAccount`/`ClusterRole`/`ClusterRoleBinding`, as a
//! multi-document YAML stream on stdout, for
//! `cargo run --bin crdgen > crds/supacontrol.yaml`.
//!
//! Grounded in the same `T::crd()` + `serde_yaml::to_string` pattern used by
//! `thavlik-vpn-operator`'s own `build.rs`, run here as a standalone binary
//! instead of a build script so installing the CRD is a deliberate,
//! reviewable step rather than a side effect of compilation. The Controller
//! SA's grants (cluster row of the two-tier RBAC model) ship alongside the
//! CRD here rather than only being asserted in prose.

use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::CustomResourceExt;
use supacontrol::crd::SupabaseInstance;

const NAMESPACE: &str = "supacontrol-system";
const SERVICE_ACCOUNT_NAME: &str = "supacontrol-operator";
const CLUSTER_ROLE_NAME: &str = "supacontrol-operator";
const CLUSTER_ROLE_BINDING_NAME: &str = "supacontrol-operator";

fn controller_service_account() -> ServiceAccount {
    ServiceAccount {
        metadata: ObjectMeta {
            name: Some(SERVICE_ACCOUNT_NAME.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// The Controller SA row of the two-tier RBAC model: manage its
/// own CR, create namespaces and the per-instance RBAC triple, and
/// create/observe Jobs. Never touches Secrets, workloads, or Ingresses
/// directly — those belong to the per-instance provisioner role this
/// principal creates but does not hold itself.
fn controller_cluster_role() -> ClusterRole {
    let rules = vec![
        PolicyRule {
            api_groups: Some(vec!["supacontrol.io".to_string()]),
            resources: Some(vec![
                "supabaseinstances".to_string(),
                "supabaseinstances/status".to_string(),
                "supabaseinstances/finalizers".to_string(),
            ]),
            verbs: vec![
                "get".to_string(),
                "list".to_string(),
                "watch".to_string(),
                "create".to_string(),
                "update".to_string(),
                "patch".to_string(),
                "delete".to_string(),
            ],
            ..Default::default()
        },
        PolicyRule {
            api_groups: Some(vec!["".to_string()]),
            resources: Some(vec!["namespaces".to_string()]),
            verbs: vec![
                "create".to_string(),
                "get".to_string(),
                "list".to_string(),
                "watch".to_string(),
                "delete".to_string(),
            ],
            ..Default::default()
        },
        PolicyRule {
            api_groups: Some(vec!["".to_string()]),
            resources: Some(vec!["serviceaccounts".to_string()]),
            verbs: vec![
                "create".to_string(),
                "get".to_string(),
                "list".to_string(),
                "watch".to_string(),
            ],
            ..Default::default()
        },
        PolicyRule {
            api_groups: Some(vec!["rbac.authorization.k8s.io".to_string()]),
            resources: Some(vec!["roles".to_string(), "rolebindings".to_string()]),
            verbs: vec![
                "create".to_string(),
                "get".to_string(),
                "list".to_string(),
                "watch".to_string(),
            ],
            ..Default::default()
        },
        PolicyRule {
            api_groups: Some(vec!["batch".to_string()]),
            resources: Some(vec!["jobs".to_string()]),
            verbs: vec![
                "create".to_string(),
                "get".to_string(),
                "list".to_string(),
                "watch".to_string(),
                "delete".to_string(),
            ],
            ..Default::default()
        },
        PolicyRule {
            api_groups: Some(vec!["networking.k8s.io".to_string()]),
            resources: Some(vec!["ingresses".to_string()]),
            verbs: vec![
                "create".to_string(),
                "get".to_string(),
                "list".to_string(),
                "watch".to_string(),
            ],
            ..Default::default()
        },
        PolicyRule {
            api_groups: Some(vec!["coordination.k8s.io".to_string()]),
            resources: Some(vec!["leases".to_string()]),
            verbs: vec![
                "create".to_string(),
                "get".to_string(),
                "update".to_string(),
            ],
            ..Default::default()
        },
    ];

    ClusterRole {
        metadata: ObjectMeta {
            name: Some(CLUSTER_ROLE_NAME.to_string()),
            ..Default::default()
        },
        rules: Some(rules),
        ..Default::default()
    }
}

fn controller_cluster_role_binding() -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: ObjectMeta {
            name: Some(CLUSTER_ROLE_BINDING_NAME.to_string()),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: CLUSTER_ROLE_NAME.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: SERVICE_ACCOUNT_NAME.to_string(),
            namespace: Some(NAMESPACE.to_string()),
            ..Default::default()
        }]),
    }
}

fn main() {
    let crd = SupabaseInstance::crd();
    print!("{}", serde_yaml::to_string(&crd).expect("CRD schema must serialize to YAML"));

    for doc in [
        serde_yaml::to_string(&controller_service_account()),
        serde_yaml::to_string(&controller_cluster_role()),
        serde_yaml::to_string(&controller_cluster_role_binding()),
    ] {
        print!("---\n{}", doc.expect("RBAC manifest must serialize to YAML"));
    }
}
