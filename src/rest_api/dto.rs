//! Data Transfer Objects for the REST API.
//!
//! These types are used for API requests and responses.

use serde::{Deserialize, Serialize};

use crate::crd::{ExternalStatus, SupabaseInstance};

/// Response for listing instances.
#[derive(Debug, Serialize)]
pub struct InstanceListResponse {
    pub items: Vec<InstanceSummary>,
    pub total: usize,
}

/// Summary of a `SupabaseInstance` for list views.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSummary {
    pub name: String,
    pub namespace: Option<String>,
    pub status: ExternalStatus,
    pub paused: bool,
}

/// Full detail of a single instance.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDetailResponse {
    pub name: String,
    pub namespace: Option<String>,
    pub status: ExternalStatus,
    pub paused: bool,
    pub ingress_class: Option<String>,
    pub ingress_domain: Option<String>,
    pub chart_version: Option<String>,
    pub studio_url: Option<String>,
    pub api_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Option<String>,
}

impl From<&SupabaseInstance> for InstanceSummary {
    fn from(instance: &SupabaseInstance) -> Self {
        let status = instance.status.clone().unwrap_or_default();
        Self {
            name: instance.spec.project_name.clone(),
            namespace: status.namespace,
            status: ExternalStatus::from(status.phase),
            paused: instance.spec.paused,
        }
    }
}

impl From<&SupabaseInstance> for InstanceDetailResponse {
    fn from(instance: &SupabaseInstance) -> Self {
        let status = instance.status.clone().unwrap_or_default();
        Self {
            name: instance.spec.project_name.clone(),
            namespace: status.namespace,
            status: ExternalStatus::from(status.phase),
            paused: instance.spec.paused,
            ingress_class: instance.spec.ingress_class.clone(),
            ingress_domain: instance.spec.ingress_domain.clone(),
            chart_version: instance.spec.chart_version.clone(),
            studio_url: status.studio_url,
            api_url: status.api_url,
            error_message: status.error_message,
            created_at: instance.metadata.creation_timestamp.as_ref().map(|t| t.0.to_rfc3339()),
        }
    }
}

/// Request to create an instance.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceRequest {
    pub project_name: String,
    #[serde(default)]
    pub ingress_class: Option<String>,
    #[serde(default)]
    pub ingress_domain: Option<String>,
    #[serde(default)]
    pub chart_version: Option<String>,
    #[serde(default)]
    pub paused: bool,
}

/// Request to patch an instance's spec. Every field is optional; only
/// `paused` is expected to be used routinely, but the others are exposed
/// for parity with the CR's spec.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchInstanceRequest {
    #[serde(default)]
    pub ingress_class: Option<String>,
    #[serde(default)]
    pub ingress_domain: Option<String>,
    #[serde(default)]
    pub chart_version: Option<String>,
    #[serde(default)]
    pub paused: Option<bool>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}
