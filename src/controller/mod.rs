//! The reconciliation engine: phase state machine, ensure-steps, finalizer
//! cleanup, and Job delegation.

pub mod finalizers;
pub mod ingress;
pub mod jobs;
pub mod labels;
pub mod leader;
pub mod namespace;
pub mod rbac;
pub mod reconciler;
pub mod secrets;
pub mod status;
pub mod workloads;

pub use reconciler::{run_controller, run_controller_until};

use std::sync::Arc;

use kube::Client;

use crate::config::Config;
#[cfg(feature = "metrics")]
use crate::metrics::Metrics;

/// Shared state handed to every reconcile call and to the REST API.
pub struct ControllerState {
    pub client: Client,
    pub config: Config,
    #[cfg(feature = "metrics")]
    pub metrics: Arc<Metrics>,
}

impl ControllerState {
    pub fn new(client: Client, config: Config) -> Arc<Self> {
        Arc::new(Self {
            client,
            config,
            #[cfg(feature = "metrics")]
            metrics: Arc::new(Metrics::default()),
        })
    }
}
