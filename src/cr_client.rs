//! The CR Client: a thin, typed façade over the cluster API for CRUD on
//! `SupabaseInstance`.
//!
//! This is the abstraction the HTTP layer is built against — it performs no
//! business logic of its own and never writes `.status` (that is the
//! reconciler's exclusive responsibility via the status subresource). Every
//! method translates `kube::Error` into the crate's own `Error` so callers
//! never match on `kube::Error` directly, the same translation the
//! reconciler's ensure-steps apply at their own call sites.

use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};

use crate::crd::SupabaseInstance;
use crate::error::{Error, Result};

const FIELD_MANAGER: &str = "supacontrol-cr-client";

/// Cluster-wide façade over `SupabaseInstance` CRUD. `SupabaseInstance` is
/// cluster-scoped, so every operation uses `Api::all`.
#[derive(Clone)]
pub struct CrClient {
    api: Api<SupabaseInstance>,
}

impl CrClient {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }

    /// Persists a new resource. Fails with `Error::AlreadyExists` if the
    /// name is taken — the cluster API itself enforces this atomically, so
    /// two concurrent creates of the same name can never both succeed.
    pub async fn create(&self, instance: &SupabaseInstance) -> Result<SupabaseInstance> {
        self.api
            .create(&PostParams::default(), instance)
            .await
            .map_err(translate)
    }

    /// Fails with `Error::NotFound`, distinguishable from other errors, when
    /// no resource of this name exists.
    pub async fn get(&self, name: &str) -> Result<SupabaseInstance> {
        self.api.get(name).await.map_err(translate)
    }

    /// Cluster-wide enumeration of every `SupabaseInstance`.
    pub async fn list(&self) -> Result<Vec<SupabaseInstance>> {
        let list = self.api.list(&Default::default()).await.map_err(translate)?;
        Ok(list.items)
    }

    /// Updates the spec of an existing resource via server-side apply.
    /// Status updates are made by the reconciler through the status
    /// subresource, never through this method.
    pub async fn update(&self, instance: &SupabaseInstance) -> Result<SupabaseInstance> {
        let name = instance.name_any();
        let patch = serde_json::json!({
            "apiVersion": SupabaseInstance::api_version(&()),
            "kind": SupabaseInstance::kind(&()),
            "spec": instance.spec,
        });
        self.api
            .patch(&name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&patch))
            .await
            .map_err(translate)
    }

    /// Initiates deletion. The finalizer delays actual removal from
    /// storage until the reconciler's cleanup ensure-steps succeed.
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.api
            .delete(name, &Default::default())
            .await
            .map_err(translate)?;
        Ok(())
    }
}

fn translate(err: kube::Error) -> Error {
    match &err {
        kube::Error::Api(resp) if resp.reason == "AlreadyExists" => {
            Error::AlreadyExists(resp.message.clone())
        }
        kube::Error::Api(resp) if resp.code == 404 => Error::NotFound(resp.message.clone()),
        kube::Error::Api(resp) if resp.code == 409 => Error::Conflict(resp.message.clone()),
        _ => Error::KubeError(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_maps_404_to_not_found() {
        let err = kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "supabaseinstances.supacontrol.io \"demo\" not found".to_string(),
            reason: "NotFound".to_string(),
            code: 404,
        });
        assert!(matches!(translate(err), Error::NotFound(_)));
    }

    #[test]
    fn translate_maps_409_to_conflict() {
        let err = kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "the object has been modified".to_string(),
            reason: "Conflict".to_string(),
            code: 409,
        });
        assert!(matches!(translate(err), Error::Conflict(_)));
    }

    #[test]
    fn translate_maps_already_exists_reason_even_at_409() {
        let err = kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "supabaseinstances.supacontrol.io \"demo\" already exists".to_string(),
            reason: "AlreadyExists".to_string(),
            code: 409,
        });
        assert!(matches!(translate(err), Error::AlreadyExists(_)));
    }
}
