//! SupaControl Operator Entry Point
//!
//! Starts the Kubernetes controller (optionally gated on leader election)
//! and the optional REST API server.

use std::sync::Arc;

use clap::Parser;
use supacontrol::config::Config;
use supacontrol::{controller, telemetry, Error};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::parse();

    let env_filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .parse_lossy(&config.log_filter);

    let fmt_layer = match config.log_format {
        telemetry::LogFormat::Json => fmt::layer().json().boxed(),
        telemetry::LogFormat::Text => fmt::layer().with_target(true).boxed(),
    };

    let registry = tracing_subscriber::registry().with(env_filter).with(fmt_layer);

    match &config.otel_endpoint {
        Some(endpoint) => {
            let otel_layer = telemetry::init_telemetry(endpoint);
            registry.with(otel_layer).init();
            info!("OpenTelemetry tracing initialized");
        }
        None => {
            registry.init();
            info!("OpenTelemetry tracing disabled (no otel endpoint configured)");
        }
    }

    info!("Starting SupaControl Operator v{}", env!("CARGO_PKG_VERSION"));

    let client = kube::Client::try_default().await.map_err(Error::KubeError)?;
    info!("Connected to Kubernetes cluster");

    let lease_namespace = config.lease_namespace.clone();
    let leader_election_enabled = config.leader_election_enabled;
    let state = controller::ControllerState::new(client, config);

    #[cfg(feature = "rest-api")]
    {
        let api_state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = supacontrol::rest_api::run_server(api_state).await {
                tracing::error!("REST API server error: {:?}", e);
            }
        });
    }

    let result = if leader_election_enabled {
        let holder_id = std::env::var("HOSTNAME").unwrap_or_else(|_| {
            hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown-host".to_string())
        });
        info!(holder_id = %holder_id, "leader election enabled");
        controller::leader::run_leader_elected(state, &lease_namespace, holder_id).await
    } else {
        info!("leader election disabled, running controller unconditionally");
        controller::run_controller(state).await
    };

    telemetry::shutdown_telemetry();

    result
}
