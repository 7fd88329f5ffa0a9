//! Crate-wide error type.
//!
//! Every fallible path in the operator funnels into this enum so the
//! reconciler's error policy (see `controller::reconciler::error_policy`) can
//! classify failures without inspecting error strings.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("invalid configuration: {0}")]
    ConfigError(String),

    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("resource conflict: {0}")]
    Conflict(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("provisioning job failed: {0}")]
    JobFailed(String),

    #[error("finalizer error: {0}")]
    FinalizerError(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl Error {
    /// Whether the reconciler should back off and retry without changing
    /// `status.phase`, as opposed to transitioning the instance to `Failed`.
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::KubeError(kube::Error::Api(resp)) => {
                matches!(resp.code, 409 | 429 | 500 | 502 | 503 | 504)
            }
            Error::KubeError(_) => true,
            Error::Conflict(_) => true,
            Error::NotFound(_) => true,
            Error::ValidationError(_)
            | Error::InvariantViolation(_)
            | Error::JobFailed(_)
            | Error::AlreadyExists(_) => false,
            Error::ConfigError(_) | Error::FinalizerError(_) | Error::SerdeError(_) => false,
        }
    }
}

impl From<kube::runtime::finalizer::Error<Error>> for Error {
    fn from(e: kube::runtime::finalizer::Error<Error>) -> Self {
        use kube::runtime::finalizer::Error as FErr;
        match e {
            FErr::ApplyFailed(inner) | FErr::CleanupFailed(inner) => inner,
            other => Error::FinalizerError(Box::new(other)),
        }
    }
}
