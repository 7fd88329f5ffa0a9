//! `ensureSecrets`: generate-once tenant credentials.
//!
//! Secret material (postgres password, JWT signing secret, anon key,
//! service-role key) is generated exactly once per instance and never
//! rotated: if `{name}-secrets` already exists in the namespace, this
//! step is a no-op. Values are produced from `OsRng`, not the faster but
//! non-cryptographic `thread_rng`, since these live for the lifetime of
//! the tenant.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, PostParams};
use kube::Client;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::info;

use crate::controller::labels::instance_labels;
use crate::error::{Error, Result};

const POSTGRES_PASSWORD_KEY: &str = "postgresPassword";
const JWT_SECRET_KEY: &str = "jwtSecret";
const ANON_KEY: &str = "anonKey";
const SERVICE_ROLE_KEY: &str = "serviceRoleKey";

/// The name of the Secret holding every generated credential for `project_name`.
pub fn secret_name(project_name: &str) -> String {
    format!("{project_name}-secrets")
}

/// Generated credential material. `Debug` is hand-rolled to redact values
/// so a stray `{:?}` in a log line never leaks a secret.
#[derive(Clone)]
pub struct TenantSecrets {
    pub postgres_password: String,
    pub jwt_secret: String,
    pub anon_key: String,
    pub service_role_key: String,
}

impl fmt::Debug for TenantSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantSecrets")
            .field("postgres_password", &"<redacted>")
            .field("jwt_secret", &"<redacted>")
            .field("anon_key", &"<redacted>")
            .field("service_role_key", &"<redacted>")
            .finish()
    }
}

impl TenantSecrets {
    fn generate() -> Self {
        Self {
            postgres_password: random_token(32),
            jwt_secret: random_token(48),
            anon_key: random_token(40),
            service_role_key: random_token(40),
        }
    }

    fn into_string_data(self) -> BTreeMap<String, String> {
        let mut data = BTreeMap::new();
        data.insert(POSTGRES_PASSWORD_KEY.to_string(), self.postgres_password);
        data.insert(JWT_SECRET_KEY.to_string(), self.jwt_secret);
        data.insert(ANON_KEY.to_string(), self.anon_key);
        data.insert(SERVICE_ROLE_KEY.to_string(), self.service_role_key);
        data
    }
}

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Ensure `{project_name}-secrets` exists in `namespace`. If it already
/// exists, it is left untouched regardless of whether individual keys are
/// present — this step never rewrites or rotates existing credentials.
pub async fn ensure_secrets(client: &Client, namespace: &str, project_name: &str) -> Result<()> {
    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let name = secret_name(project_name);

    match secrets.get(&name).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 => {
            info!(secret = %name, "generating tenant credentials");
            let generated = TenantSecrets::generate();
            let secret = build_secret(namespace, &name, project_name, generated);
            secrets.create(&PostParams::default(), &secret).await?;
            Ok(())
        }
        Err(e) => Err(Error::KubeError(e)),
    }
}

fn build_secret(
    namespace: &str,
    name: &str,
    project_name: &str,
    generated: TenantSecrets,
) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(instance_labels(project_name)),
            ..Default::default()
        },
        string_data: Some(generated.into_string_data()),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_name_is_derived_from_project_name() {
        assert_eq!(secret_name("demo"), "demo-secrets");
    }

    #[test]
    fn generated_secrets_are_nonempty_and_distinct() {
        let generated = TenantSecrets::generate();
        assert!(!generated.postgres_password.is_empty());
        assert_ne!(generated.postgres_password, generated.jwt_secret);
        assert_ne!(generated.anon_key, generated.service_role_key);
    }

    #[test]
    fn debug_impl_redacts_values() {
        let generated = TenantSecrets::generate();
        let rendered = format!("{generated:?}");
        assert!(!rendered.contains(&generated.postgres_password));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn build_secret_carries_all_four_keys() {
        let secret = build_secret("supa-demo", "demo-secrets", "demo", TenantSecrets::generate());
        let data = secret.string_data.unwrap();
        assert!(data.contains_key(POSTGRES_PASSWORD_KEY));
        assert!(data.contains_key(JWT_SECRET_KEY));
        assert!(data.contains_key(ANON_KEY));
        assert!(data.contains_key(SERVICE_ROLE_KEY));
    }
}
