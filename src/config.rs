//! Process-wide configuration, read once at startup via `clap`
//! and handed to the controller and REST API as an already-parsed value —
//! nothing downstream reads the environment directly.

use clap::Parser;

use crate::telemetry::LogFormat;

#[derive(Parser, Clone, Debug)]
#[command(name = "supacontrol-operator", version, about)]
pub struct Config {
    /// Used when a `SupabaseInstance` omits `spec.ingressClass`.
    #[arg(long, env = "SUPACONTROL_DEFAULT_INGRESS_CLASS", default_value = "nginx")]
    pub default_ingress_class: String,

    /// Base domain for generated `studio.{name}.{domain}` / `api.{name}.{domain}` hostnames.
    #[arg(long, env = "SUPACONTROL_DEFAULT_INGRESS_DOMAIN", default_value = "supacontrol.example.com")]
    pub default_ingress_domain: String,

    /// Helm repository URL the provisioning Job installs the chart from.
    #[arg(long, env = "SUPACONTROL_CHART_REPO")]
    pub chart_repo: String,

    /// Helm chart name within `chart_repo`.
    #[arg(long, env = "SUPACONTROL_CHART_NAME", default_value = "supabase")]
    pub chart_name: String,

    /// Default chart version; overridable per-instance via `spec.chartVersion`.
    #[arg(long, env = "SUPACONTROL_CHART_VERSION")]
    pub chart_version: String,

    /// cert-manager `ClusterIssuer` annotated on generated Ingresses, if any.
    #[arg(long, env = "SUPACONTROL_CERT_MANAGER_ISSUER")]
    pub cert_manager_issuer: Option<String>,

    /// Must be true when more than one operator replica is deployed.
    #[arg(long, env = "SUPACONTROL_LEADER_ELECTION_ENABLED", default_value_t = false)]
    pub leader_election_enabled: bool,

    /// Namespace the leader-election `Lease` is created in.
    #[arg(long, env = "SUPACONTROL_LEASE_NAMESPACE", default_value = "default")]
    pub lease_namespace: String,

    /// Bind address for the REST API / health / metrics server.
    #[arg(long, env = "SUPACONTROL_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: std::net::SocketAddr,

    /// `tracing_subscriber::EnvFilter` directive, e.g. `info` or `supacontrol=debug`.
    #[arg(long, env = "SUPACONTROL_LOG_FILTER", default_value = "info")]
    pub log_filter: String,

    /// Structured (json) vs. human-readable log output.
    #[arg(long, env = "SUPACONTROL_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP gRPC endpoint for distributed tracing; unset disables OpenTelemetry export.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otel_endpoint: Option<String>,
}

impl Config {
    pub fn helm_release(&self, project_name: &str, chart_version_override: Option<&str>) -> crate::controller::jobs::HelmRelease {
        crate::controller::jobs::HelmRelease {
            chart_repo: self.chart_repo.clone(),
            chart_name: self.chart_name.clone(),
            chart_version: chart_version_override
                .map(str::to_string)
                .unwrap_or_else(|| self.chart_version.clone()),
            release_name: project_name.to_string(),
            secret_name: crate::controller::secrets::secret_name(project_name),
        }
    }

    pub fn ingress_class_for<'a>(&'a self, override_: Option<&'a str>) -> &'a str {
        override_.unwrap_or(&self.default_ingress_class)
    }

    pub fn ingress_domain_for<'a>(&'a self, override_: Option<&'a str>) -> &'a str {
        override_.unwrap_or(&self.default_ingress_domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            default_ingress_class: "nginx".to_string(),
            default_ingress_domain: "example.com".to_string(),
            chart_repo: "https://charts.example.com".to_string(),
            chart_name: "supabase".to_string(),
            chart_version: "1.0.0".to_string(),
            cert_manager_issuer: None,
            leader_election_enabled: false,
            lease_namespace: "default".to_string(),
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            log_filter: "info".to_string(),
            log_format: LogFormat::Text,
            otel_endpoint: None,
        }
    }

    #[test]
    fn instance_chart_version_overrides_default() {
        let config = base_config();
        let release = config.helm_release("demo", Some("2.0.0"));
        assert_eq!(release.chart_version, "2.0.0");
    }

    #[test]
    fn missing_override_falls_back_to_default_chart_version() {
        let config = base_config();
        let release = config.helm_release("demo", None);
        assert_eq!(release.chart_version, "1.0.0");
    }

    #[test]
    fn ingress_class_override_wins_over_default() {
        let config = base_config();
        assert_eq!(config.ingress_class_for(Some("traefik")), "traefik");
        assert_eq!(config.ingress_class_for(None), "nginx");
    }
}
