//! `ensureIngress`: the two public entrypoints (studio, api) into a
//! tenant's Helm-installed services.

use std::collections::BTreeMap;

use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;

use crate::controller::labels::instance_labels;
use crate::error::Result;

const FIELD_MANAGER: &str = "supacontrol-operator";

/// One of the two services a `SupabaseInstance` exposes externally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngressRoute {
    Studio,
    Api,
}

impl IngressRoute {
    fn subdomain(&self) -> &'static str {
        match self {
            IngressRoute::Studio => "studio",
            IngressRoute::Api => "api",
        }
    }

    fn service_name(&self, project_name: &str) -> String {
        match self {
            IngressRoute::Studio => format!("{project_name}-studio"),
            IngressRoute::Api => format!("{project_name}-kong"),
        }
    }

    fn service_port(&self) -> i32 {
        match self {
            IngressRoute::Studio => 3000,
            IngressRoute::Api => 8000,
        }
    }
}

const ROUTES: [IngressRoute; 2] = [IngressRoute::Studio, IngressRoute::Api];

/// Create (or reapply) the studio and api Ingresses for `project_name` in
/// `namespace`. Server-side apply makes this safe to call on every
/// reconcile regardless of whether the Ingresses already exist.
pub async fn ensure_ingress(
    client: &Client,
    namespace: &str,
    project_name: &str,
    ingress_class: &str,
    ingress_domain: &str,
    cert_manager_issuer: Option<&str>,
) -> Result<()> {
    let ingresses: Api<Ingress> = Api::namespaced(client.clone(), namespace);

    for route in ROUTES {
        let ingress = build_ingress(
            namespace,
            project_name,
            route,
            ingress_class,
            ingress_domain,
            cert_manager_issuer,
        );
        let name = ingress.metadata.name.clone().unwrap();
        ingresses
            .patch(&name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&ingress))
            .await?;
    }

    Ok(())
}

/// The hostname a route is served on: `{subdomain}.{project_name}.{domain}`.
pub fn hostname(project_name: &str, domain: &str, route: IngressRoute) -> String {
    format!("{}.{project_name}.{domain}", route.subdomain())
}

fn build_ingress(
    namespace: &str,
    project_name: &str,
    route: IngressRoute,
    ingress_class: &str,
    ingress_domain: &str,
    cert_manager_issuer: Option<&str>,
) -> Ingress {
    let host = hostname(project_name, ingress_domain, route);
    let name = format!("{project_name}-{}", route.subdomain());

    let mut annotations = BTreeMap::new();
    if let Some(issuer) = cert_manager_issuer {
        annotations.insert("cert-manager.io/cluster-issuer".to_string(), issuer.to_string());
    }

    let path = HTTPIngressPath {
        path: Some("/".to_string()),
        path_type: "Prefix".to_string(),
        backend: IngressBackend {
            service: Some(IngressServiceBackend {
                name: route.service_name(project_name),
                port: Some(ServiceBackendPort {
                    number: Some(route.service_port()),
                    ..Default::default()
                }),
            }),
            ..Default::default()
        },
    };

    Ingress {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(namespace.to_string()),
            labels: Some(instance_labels(project_name)),
            annotations: if annotations.is_empty() { None } else { Some(annotations) },
            ..Default::default()
        },
        spec: Some(IngressSpec {
            ingress_class_name: Some(ingress_class.to_string()),
            rules: Some(vec![IngressRule {
                host: Some(host),
                http: Some(HTTPIngressRuleValue { paths: vec![path] }),
            }]),
            ..Default::default()
        }),
        status: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_follows_subdomain_project_domain_pattern() {
        assert_eq!(
            hostname("demo", "supacontrol.example.com", IngressRoute::Studio),
            "studio.demo.supacontrol.example.com"
        );
        assert_eq!(
            hostname("demo", "supacontrol.example.com", IngressRoute::Api),
            "api.demo.supacontrol.example.com"
        );
    }

    #[test]
    fn build_ingress_sets_cert_manager_annotation_when_configured() {
        let ingress = build_ingress(
            "supa-demo",
            "demo",
            IngressRoute::Api,
            "nginx",
            "example.com",
            Some("letsencrypt-prod"),
        );
        assert_eq!(
            ingress
                .metadata
                .annotations
                .unwrap()
                .get("cert-manager.io/cluster-issuer"),
            Some(&"letsencrypt-prod".to_string())
        );
    }

    #[test]
    fn build_ingress_omits_annotation_when_no_issuer_configured() {
        let ingress = build_ingress("supa-demo", "demo", IngressRoute::Studio, "nginx", "example.com", None);
        assert!(ingress.metadata.annotations.is_none());
    }

    #[test]
    fn build_ingress_carries_instance_label() {
        let ingress = build_ingress("supa-demo", "demo", IngressRoute::Studio, "nginx", "example.com", None);
        assert_eq!(
            ingress
                .metadata
                .labels
                .unwrap()
                .get("supacontrol.io/instance"),
            Some(&"demo".to_string())
        );
    }
}
