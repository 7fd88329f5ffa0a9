//! `ensureProvisioningJob` / `ensureCleanupJob`: the Job Delegator.
//!
//! Helm installs are minutes-long and must survive reconciler restarts, so
//! the actual `helm upgrade --install` / `helm uninstall` invocation runs
//! inside a Kubernetes Job rather than being driven directly from the
//! reconciler. The reconciler only creates the Job once (idempotent on a
//! deterministic name) and then observes its status on each pass.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::info;

use crate::controller::labels::{instance_labels, INSTANCE_LABEL, JOB_TYPE_LABEL};
use crate::controller::rbac::SERVICE_ACCOUNT_NAME;
use crate::error::{Error, Result};

const BACKOFF_LIMIT: i32 = 3;
const ACTIVE_DEADLINE_SECONDS: i64 = 900;
const TTL_SECONDS_AFTER_FINISHED: i32 = 300;
const HELM_IMAGE: &str = "alpine/helm:3.15.3";

/// The two kinds of Job this module ever creates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobKind {
    Provision,
    Cleanup,
}

impl JobKind {
    fn as_str(&self) -> &'static str {
        match self {
            JobKind::Provision => "provision",
            JobKind::Cleanup => "cleanup",
        }
    }
}

/// What the reconciler should do next, derived from a Job's `.status`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    /// Doesn't exist yet, or hasn't reached a terminal state.
    Active,
    Succeeded,
    /// `backoffLimit` exceeded or `activeDeadlineSeconds` passed. Carries a
    /// short message for `status.errorMessage`.
    Failed(String),
}

/// Parameters describing the Helm chart/release to provision. Supplied by
/// the process-wide configuration and the instance's own overrides.
#[derive(Clone, Debug)]
pub struct HelmRelease {
    pub chart_repo: String,
    pub chart_name: String,
    pub chart_version: String,
    pub release_name: String,
    pub secret_name: String,
}

/// A Job's name is a pure function of `(project_name, kind, generation)`:
/// bumping `spec.chartVersion`/editing the spec to clear a `Failed`
/// instance advances `metadata.generation`, which gives the retry a fresh
/// Job name instead of re-observing the superseded, terminally-failed one.
fn job_name(project_name: &str, kind: JobKind, generation: i64) -> String {
    format!("{project_name}-{}-{generation}", kind.as_str())
}

/// Create the provisioning Job for `project_name` in `namespace` if one
/// doesn't already exist for the current `generation`, then report its
/// outcome. Idempotent: repeated calls while a Job is still running just
/// re-observe its status.
pub async fn ensure_provisioning_job(
    client: &Client,
    namespace: &str,
    project_name: &str,
    generation: i64,
    release: &HelmRelease,
) -> Result<JobOutcome> {
    ensure_job(client, namespace, project_name, JobKind::Provision, generation, release).await
}

/// Create the cleanup Job (`helm uninstall`) for `project_name` if one
/// doesn't already exist for the current `generation`, then report its
/// outcome. Succeeds even when the release is already absent, since `helm
/// uninstall` on a missing release is itself idempotent.
pub async fn ensure_cleanup_job(
    client: &Client,
    namespace: &str,
    project_name: &str,
    generation: i64,
    release: &HelmRelease,
) -> Result<JobOutcome> {
    ensure_job(client, namespace, project_name, JobKind::Cleanup, generation, release).await
}

async fn ensure_job(
    client: &Client,
    namespace: &str,
    project_name: &str,
    kind: JobKind,
    generation: i64,
    release: &HelmRelease,
) -> Result<JobOutcome> {
    let jobs: Api<Job> = Api::namespaced(client.clone(), namespace);
    let name = job_name(project_name, kind, generation);

    match jobs.get(&name).await {
        Ok(existing) => Ok(observe(&existing)),
        Err(kube::Error::Api(e)) if e.code == 404 => {
            delete_superseded(&jobs, project_name, kind, &name).await?;
            info!(job = %name, kind = ?kind, "creating job");
            let job = build_job(namespace, project_name, kind, generation, release);
            jobs.create(&PostParams::default(), &job).await?;
            Ok(JobOutcome::Active)
        }
        Err(e) => Err(Error::KubeError(e)),
    }
}

/// Delete any Job of `kind` for `project_name` left over from an earlier
/// generation before creating `current_name`'s replacement. Reaching this
/// point already means no Job named `current_name` exists, so anything
/// this selector turns up is a stale, superseded attempt (most often a
/// terminally `Failed` one that a spec edit is retrying).
async fn delete_superseded(jobs: &Api<Job>, project_name: &str, kind: JobKind, current_name: &str) -> Result<()> {
    let selector = format!("{INSTANCE_LABEL}={project_name},{JOB_TYPE_LABEL}={}", kind.as_str());
    let stale = jobs.list(&ListParams::default().labels(&selector)).await?;

    for job in stale.items.into_iter().filter(|j| j.name_any() != current_name) {
        let name = job.name_any();
        info!(job = %name, kind = ?kind, "deleting superseded job");
        let delete_params = DeleteParams::background();
        match jobs.delete(&name, &delete_params).await {
            Ok(_) => {}
            Err(kube::Error::Api(e)) if e.code == 404 => {}
            Err(e) => return Err(Error::KubeError(e)),
        }
    }

    Ok(())
}

/// Map a Job's `.status` counters to a `JobOutcome`, per the contract:
/// `succeeded >= 1` wins, then `failed > backoffLimit` (accounting for the
/// initial attempt) is terminal, otherwise it's still active.
fn observe(job: &Job) -> JobOutcome {
    let status = match &job.status {
        Some(s) => s,
        None => return JobOutcome::Active,
    };

    if status.succeeded.unwrap_or(0) >= 1 {
        return JobOutcome::Succeeded;
    }

    let failed = status.failed.unwrap_or(0);
    if failed > BACKOFF_LIMIT {
        let message = status
            .conditions
            .as_ref()
            .and_then(|conditions| conditions.iter().find(|c| c.type_ == "Failed"))
            .map(|c| c.message.clone().unwrap_or_default())
            .unwrap_or_else(|| "job exceeded backoff limit".to_string());
        return JobOutcome::Failed(message);
    }

    JobOutcome::Active
}

fn build_job(namespace: &str, project_name: &str, kind: JobKind, generation: i64, release: &HelmRelease) -> Job {
    let mut labels = instance_labels(project_name);
    labels.insert(JOB_TYPE_LABEL.to_string(), kind.as_str().to_string());

    let helm_args = match kind {
        JobKind::Provision => vec![
            "upgrade".to_string(),
            "--install".to_string(),
            release.release_name.clone(),
            format!("{}/{}", release.chart_repo, release.chart_name),
            "--version".to_string(),
            release.chart_version.clone(),
            "--namespace".to_string(),
            namespace.to_string(),
        ],
        JobKind::Cleanup => vec![
            "uninstall".to_string(),
            release.release_name.clone(),
            "--namespace".to_string(),
            namespace.to_string(),
            "--ignore-not-found".to_string(),
        ],
    };

    let env = env_from_secret(&release.secret_name);

    let container = Container {
        name: "helm".to_string(),
        image: Some(HELM_IMAGE.to_string()),
        command: Some(vec!["helm".to_string()]),
        args: Some(helm_args),
        env: Some(env),
        ..Default::default()
    };

    let pod_spec = PodSpec {
        service_account_name: Some(SERVICE_ACCOUNT_NAME.to_string()),
        restart_policy: Some("Never".to_string()),
        containers: vec![container],
        ..Default::default()
    };

    Job {
        metadata: ObjectMeta {
            name: Some(job_name(project_name, kind, generation)),
            namespace: Some(namespace.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(BACKOFF_LIMIT),
            active_deadline_seconds: Some(ACTIVE_DEADLINE_SECONDS),
            ttl_seconds_after_finished: Some(TTL_SECONDS_AFTER_FINISHED),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(pod_spec),
            },
            ..Default::default()
        }),
        status: None,
    }
}

fn env_from_secret(secret_name: &str) -> Vec<EnvVar> {
    let keys: BTreeMap<&str, &str> = BTreeMap::from([
        ("POSTGRES_PASSWORD", "postgresPassword"),
        ("JWT_SECRET", "jwtSecret"),
        ("ANON_KEY", "anonKey"),
        ("SERVICE_ROLE_KEY", "serviceRoleKey"),
    ]);

    keys.into_iter()
        .map(|(env_name, secret_key)| EnvVar {
            name: env_name.to_string(),
            value_from: Some(k8s_openapi::api::core::v1::EnvVarSource {
                secret_key_ref: Some(k8s_openapi::api::core::v1::SecretKeySelector {
                    name: secret_name.to_string(),
                    key: secret_key.to_string(),
                    optional: Some(false),
                }),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::batch::v1::JobStatus;

    fn release() -> HelmRelease {
        HelmRelease {
            chart_repo: "https://charts.example.com".to_string(),
            chart_name: "supabase".to_string(),
            chart_version: "1.2.3".to_string(),
            release_name: "demo".to_string(),
            secret_name: "demo-secrets".to_string(),
        }
    }

    #[test]
    fn job_names_are_deterministic_and_distinct_per_kind() {
        assert_eq!(job_name("demo", JobKind::Provision, 1), "demo-provision-1");
        assert_eq!(job_name("demo", JobKind::Cleanup, 1), "demo-cleanup-1");
    }

    #[test]
    fn job_names_are_distinct_per_generation() {
        assert_ne!(
            job_name("demo", JobKind::Provision, 1),
            job_name("demo", JobKind::Provision, 2)
        );
    }

    #[test]
    fn observe_with_no_status_is_active() {
        let job = build_job("supa-demo", "demo", JobKind::Provision, 1, &release());
        assert_eq!(observe(&job), JobOutcome::Active);
    }

    #[test]
    fn observe_succeeded_counter_wins() {
        let mut job = build_job("supa-demo", "demo", JobKind::Provision, 1, &release());
        job.status = Some(JobStatus {
            succeeded: Some(1),
            ..Default::default()
        });
        assert_eq!(observe(&job), JobOutcome::Succeeded);
    }

    #[test]
    fn observe_failed_past_backoff_limit_is_terminal() {
        let mut job = build_job("supa-demo", "demo", JobKind::Provision, 1, &release());
        job.status = Some(JobStatus {
            failed: Some(BACKOFF_LIMIT + 1),
            ..Default::default()
        });
        assert!(matches!(observe(&job), JobOutcome::Failed(_)));
    }

    #[test]
    fn observe_failed_within_backoff_limit_is_still_active() {
        let mut job = build_job("supa-demo", "demo", JobKind::Provision, 1, &release());
        job.status = Some(JobStatus {
            failed: Some(1),
            ..Default::default()
        });
        assert_eq!(observe(&job), JobOutcome::Active);
    }

    #[test]
    fn provisioning_job_uses_service_account_and_carries_job_type_label() {
        let job = build_job("supa-demo", "demo", JobKind::Provision, 1, &release());
        let pod_spec = job.spec.unwrap().template.spec.unwrap();
        assert_eq!(
            pod_spec.service_account_name.as_deref(),
            Some(SERVICE_ACCOUNT_NAME)
        );
        assert_eq!(
            job.metadata.labels.unwrap().get(JOB_TYPE_LABEL),
            Some(&"provision".to_string())
        );
    }

    #[test]
    fn cleanup_job_uses_helm_uninstall_with_ignore_not_found() {
        let job = build_job("supa-demo", "demo", JobKind::Cleanup, 1, &release());
        let container = &job.spec.unwrap().template.spec.unwrap().containers[0];
        let args = container.args.clone().unwrap();
        assert!(args.contains(&"uninstall".to_string()));
        assert!(args.contains(&"--ignore-not-found".to_string()));
    }

    #[test]
    fn job_name_for_new_generation_differs_from_stale_failed_attempt() {
        let stale = job_name("demo", JobKind::Provision, 1);
        let retry = job_name("demo", JobKind::Provision, 2);
        assert_ne!(stale, retry, "a generation bump must not reuse a terminally failed job's name");
    }
}
