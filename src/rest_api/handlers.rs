//! HTTP handlers backing the REST API: thin pass-throughs onto
//! the CR Client, unauthenticated, for exercising the control plane without
//! touching the Kubernetes API directly.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::warn;

use crate::controller::ControllerState;
use crate::cr_client::CrClient;
use crate::crd::{SupabaseInstance, SupabaseInstanceSpec};
use crate::error::Error;

use super::dto::{
    CreateInstanceRequest, ErrorResponse, HealthResponse, InstanceDetailResponse, InstanceListResponse,
    InstanceSummary, PatchInstanceRequest,
};

/// Wraps `Error` so handlers can `?`-propagate it straight into an HTTP
/// response instead of hand-mapping a `StatusCode` at every call site.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self.0 {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::AlreadyExists(_) => (StatusCode::CONFLICT, "already_exists"),
            Error::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            Error::ValidationError(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            warn!(error = %self.0, "internal error serving request");
        }
        (status, Json(ErrorResponse::new(kind, &self.0.to_string()))).into_response()
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(feature = "metrics")]
pub async fn metrics(State(state): State<Arc<ControllerState>>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => {
            warn!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn list_instances(
    State(state): State<Arc<ControllerState>>,
) -> Result<Json<InstanceListResponse>, ApiError> {
    let client = CrClient::new(state.client.clone());
    let items = client.list().await?;
    let items: Vec<InstanceSummary> = items.iter().map(InstanceSummary::from).collect();
    Ok(Json(InstanceListResponse {
        total: items.len(),
        items,
    }))
}

pub async fn get_instance(
    State(state): State<Arc<ControllerState>>,
    Path(name): Path<String>,
) -> Result<Json<InstanceDetailResponse>, ApiError> {
    let client = CrClient::new(state.client.clone());
    let instance = client.get(&name).await?;
    Ok(Json(InstanceDetailResponse::from(&instance)))
}

pub async fn create_instance(
    State(state): State<Arc<ControllerState>>,
    Json(request): Json<CreateInstanceRequest>,
) -> Result<(StatusCode, Json<InstanceDetailResponse>), ApiError> {
    let spec = SupabaseInstanceSpec {
        project_name: request.project_name.clone(),
        ingress_class: request.ingress_class,
        ingress_domain: request.ingress_domain,
        chart_version: request.chart_version,
        paused: request.paused,
    };
    spec.validate().map_err(Error::ValidationError)?;

    let instance = SupabaseInstance::new(&request.project_name, spec);
    let client = CrClient::new(state.client.clone());
    let created = client.create(&instance).await?;
    Ok((StatusCode::CREATED, Json(InstanceDetailResponse::from(&created))))
}

pub async fn patch_instance(
    State(state): State<Arc<ControllerState>>,
    Path(name): Path<String>,
    Json(request): Json<PatchInstanceRequest>,
) -> Result<Json<InstanceDetailResponse>, ApiError> {
    let client = CrClient::new(state.client.clone());
    let mut instance = client.get(&name).await?;

    if let Some(ingress_class) = request.ingress_class {
        instance.spec.ingress_class = Some(ingress_class);
    }
    if let Some(ingress_domain) = request.ingress_domain {
        instance.spec.ingress_domain = Some(ingress_domain);
    }
    if let Some(chart_version) = request.chart_version {
        instance.spec.chart_version = Some(chart_version);
    }
    if let Some(paused) = request.paused {
        instance.spec.paused = paused;
    }

    let updated = client.update(&instance).await?;
    Ok(Json(InstanceDetailResponse::from(&updated)))
}

pub async fn delete_instance(
    State(state): State<Arc<ControllerState>>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let client = CrClient::new(state.client.clone());
    client.delete(&name).await?;
    Ok(StatusCode::ACCEPTED)
}
