//! Tracing/logging initialization and the optional OpenTelemetry OTLP export.
//!
//! A `tracing_subscriber::Registry` with an env-filter and an fmt layer is
//! always installed; an OTLP tracing layer is added on top only when
//! `OTEL_EXPORTER_OTLP_ENDPOINT` (`Config::otel_endpoint`) is set.

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{self, RandomIdGenerator, Sampler};
use opentelemetry_sdk::Resource;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::Layer;

/// Structured (json) vs. human-readable log output.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

/// Builds the OTLP tracing layer for `endpoint`, to be added on top of the
/// base `fmt`+`EnvFilter` registry already constructed in `main`.
///
/// Returns `None` (and logs nothing itself) on a pipeline construction
/// error; the caller falls back to stdout-only logging rather than failing
/// startup over a telemetry backend being unreachable.
pub fn init_telemetry<S>(endpoint: &str) -> Option<OpenTelemetryLayer<S, opentelemetry_sdk::trace::Tracer>>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    let provider = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .with_timeout(std::time::Duration::from_secs(3)),
        )
        .with_trace_config(
            trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![KeyValue::new(
                    "service.name",
                    "supacontrol-operator",
                )])),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)
        .ok()?;

    let tracer = provider
        .tracer_builder("supacontrol")
        .with_version(env!("CARGO_PKG_VERSION"))
        .build();

    Some(tracing_opentelemetry::layer().with_tracer(tracer))
}

/// Flushes any buffered spans before process exit. Best-effort: called once
/// from `main` after the controller loop returns.
pub fn shutdown_telemetry() {
    opentelemetry::global::shutdown_tracer_provider();
}
