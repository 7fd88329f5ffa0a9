//! Main reconciler for `SupabaseInstance` resources.
//!
//! Implements the controller pattern using kube-rs runtime: a finalizer-gated
//! state machine that drives each instance through
//! `Pending -> Provisioning -> Running`, with `Deleting` and `Failed` as the
//! two exits.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::{
    api::Api,
    client::Client,
    runtime::{
        controller::{Action, Controller},
        finalizer::{finalizer, Event},
        watcher::Config as WatcherConfig,
    },
    ResourceExt,
};
use tracing::{error, info, instrument, warn};

use crate::crd::{ConditionType, Phase, SupabaseInstance, SupabaseInstanceStatus};
use crate::error::{Error, Result};

use super::finalizers::SUPABASE_INSTANCE_FINALIZER;
use super::status::ConditionUpdate;
use super::{ingress, jobs, namespace, rbac, secrets, status, workloads, ControllerState};

/// How soon to requeue while a provisioning Job is still running.
const PROVISIONING_REQUEUE: Duration = Duration::from_secs(15);
/// How soon to requeue a settled `Running` instance, mainly to notice
/// `spec.paused` flips and drifted workload replica counts.
const RUNNING_REQUEUE: Duration = Duration::from_secs(300);
/// How soon to re-check a `Failed` instance for a new generation.
const FAILED_RECHECK_INTERVAL: Duration = Duration::from_secs(60);
/// Backoff before retrying a transient ensure-step failure.
const RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Main entry point to start the controller. Runs until the process
/// receives a shutdown signal.
pub async fn run_controller(state: Arc<ControllerState>) -> Result<()> {
    run_controller_until(state, None).await
}

/// Like `run_controller`, but also stops (without waiting for an OS signal)
/// as soon as `extra_shutdown` resolves. `controller::leader` uses this to
/// stop reconciling the moment the process loses its leader lease, instead
/// of carrying on under the assumption it still holds it.
pub async fn run_controller_until(
    state: Arc<ControllerState>,
    extra_shutdown: Option<tokio::sync::watch::Receiver<bool>>,
) -> Result<()> {
    let client = state.client.clone();
    let instances: Api<SupabaseInstance> = Api::all(client.clone());

    info!("Starting SupabaseInstance controller");

    match instances.list(&Default::default()).await {
        Ok(_) => info!("SupabaseInstance CRD is available"),
        Err(e) => {
            error!("SupabaseInstance CRD not found. Please install the CRD first: {:?}", e);
            return Err(Error::ConfigError(
                "SupabaseInstance CRD not installed".to_string(),
            ));
        }
    }

    let shutdown = async move {
        match extra_shutdown {
            Some(mut rx) => {
                let _ = rx.wait_for(|lost| *lost).await;
            }
            None => std::future::pending().await,
        }
    };

    Controller::new(instances, WatcherConfig::default())
        .graceful_shutdown_on(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = shutdown => { warn!("leader lease lost, shutting down controller loop"); }
            }
        })
        .run(reconcile, error_policy, state)
        .for_each(|res| async move {
            match res {
                Ok(obj) => info!("Reconciled: {:?}", obj),
                Err(e) => error!("Reconcile error: {:?}", e),
            }
        })
        .await;

    Ok(())
}

/// The main reconciliation function, called on every create/update/delete of
/// a `SupabaseInstance` and on every requeue.
#[instrument(skip(obj, ctx), fields(name = %obj.name_any()))]
async fn reconcile(obj: Arc<SupabaseInstance>, ctx: Arc<ControllerState>) -> Result<Action> {
    let client = ctx.client.clone();
    let api: Api<SupabaseInstance> = Api::all(client.clone());

    #[cfg(feature = "metrics")]
    let _timer = ctx.metrics.start_reconcile();

    finalizer(&api, SUPABASE_INSTANCE_FINALIZER, obj, |event| async {
        match event {
            Event::Apply(instance) => apply_instance(&client, &ctx, &instance).await,
            Event::Cleanup(instance) => cleanup_instance(&client, &ctx, &instance).await,
        }
    })
    .await
    .map_err(Error::from)
}

/// Drive one instance a step further toward `Running`.
///
/// Each ensure-step runs in order (namespace, RBAC, secrets, Helm release,
/// ingress); the first one to fail short-circuits the rest and reports
/// through `handle_ensure_failure` rather than leaving later steps to paper
/// over a child the instance doesn't actually have yet.
async fn apply_instance(
    client: &Client,
    ctx: &Arc<ControllerState>,
    obj: &SupabaseInstance,
) -> Result<Action> {
    let name = obj.name_any();
    obj.spec.validate().map_err(Error::ValidationError)?;

    let namespace_name = obj.spec.namespace();
    let current_status = obj.status.clone().unwrap_or_default();

    if current_status.phase == Phase::Failed && current_status.observed_generation == obj.metadata.generation {
        info!(name = %name, "instance is Failed and generation is unchanged, waiting for a spec edit");
        return Ok(Action::requeue(FAILED_RECHECK_INTERVAL));
    }

    if let Err(e) = namespace::ensure_namespace(client, &name).await {
        return handle_ensure_failure(client, ctx, obj, current_status, ConditionType::NamespaceReady, e).await;
    }

    if let Err(e) = rbac::ensure_rbac(client, &namespace_name, &name).await {
        return handle_ensure_failure(client, ctx, obj, current_status, ConditionType::RBACReady, e).await;
    }

    if let Err(e) = secrets::ensure_secrets(client, &namespace_name, &name).await {
        return handle_ensure_failure(client, ctx, obj, current_status, ConditionType::SecretsReady, e).await;
    }

    let generation = obj.metadata.generation.unwrap_or(0);
    let release = ctx.config.helm_release(&name, obj.spec.chart_version.as_deref());
    let outcome = match jobs::ensure_provisioning_job(client, &namespace_name, &name, generation, &release).await {
        Ok(outcome) => outcome,
        Err(e) => {
            return handle_ensure_failure(client, ctx, obj, current_status, ConditionType::HelmReleaseReady, e).await
        }
    };

    match outcome {
        jobs::JobOutcome::Active => {
            info!(name = %name, "provisioning job still running");
            let updates = vec![
                ConditionUpdate::ready(ConditionType::NamespaceReady, "Created", "namespace ready"),
                ConditionUpdate::ready(ConditionType::RBACReady, "Created", "provisioner rbac ready"),
                ConditionUpdate::ready(ConditionType::SecretsReady, "Created", "tenant secrets ready"),
                ConditionUpdate::not_ready(ConditionType::HelmReleaseReady, "Provisioning", "helm install job running"),
                ConditionUpdate::not_ready(ConditionType::Ready, "Provisioning", "waiting for helm release"),
            ];
            status::patch_status(client, obj, current_status, Phase::Provisioning, updates).await?;
            #[cfg(feature = "metrics")]
            ctx.metrics.record_phase_transition("Provisioning");
            Ok(Action::requeue(PROVISIONING_REQUEUE))
        }
        jobs::JobOutcome::Failed(message) => {
            warn!(name = %name, error = %message, "provisioning job failed");
            let mut final_status = current_status;
            final_status.error_message = Some(message.clone());
            let updates = vec![
                ConditionUpdate::not_ready(ConditionType::HelmReleaseReady, "ProvisioningFailed", message.clone()),
                ConditionUpdate::not_ready(ConditionType::Ready, "ProvisioningFailed", message),
            ];
            status::patch_status(client, obj, final_status, Phase::Failed, updates).await?;
            #[cfg(feature = "metrics")]
            {
                ctx.metrics.record_phase_transition("Failed");
                ctx.metrics.record_failure("job_failed");
            }
            Ok(Action::requeue(FAILED_RECHECK_INTERVAL))
        }
        jobs::JobOutcome::Succeeded => {
            finish_provisioning(client, ctx, obj, &namespace_name, &name, current_status).await
        }
    }
}

/// The Helm release is installed; wire up ingress, apply `spec.paused`, and
/// settle the instance into `Running`.
async fn finish_provisioning(
    client: &Client,
    ctx: &Arc<ControllerState>,
    obj: &SupabaseInstance,
    namespace_name: &str,
    name: &str,
    current_status: SupabaseInstanceStatus,
) -> Result<Action> {
    let ingress_class = ctx.config.ingress_class_for(obj.spec.ingress_class.as_deref());
    let ingress_domain = ctx.config.ingress_domain_for(obj.spec.ingress_domain.as_deref());

    if let Err(e) = ingress::ensure_ingress(
        client,
        namespace_name,
        name,
        ingress_class,
        ingress_domain,
        ctx.config.cert_manager_issuer.as_deref(),
    )
    .await
    {
        return handle_ensure_failure(client, ctx, obj, current_status, ConditionType::IngressReady, e).await;
    }

    if let Err(e) = workloads::ensure_paused(client, namespace_name, name, obj.spec.paused).await {
        return handle_ensure_failure(client, ctx, obj, current_status, ConditionType::Ready, e).await;
    }

    let mut final_status = current_status;
    final_status.namespace = Some(namespace_name.to_string());
    final_status.helm_release_name = Some(name.to_string());
    final_status.studio_url = Some(format!(
        "https://{}",
        ingress::hostname(name, ingress_domain, ingress::IngressRoute::Studio)
    ));
    final_status.api_url = Some(format!(
        "https://{}",
        ingress::hostname(name, ingress_domain, ingress::IngressRoute::Api)
    ));
    final_status.error_message = None;

    let updates = vec![
        ConditionUpdate::ready(ConditionType::NamespaceReady, "Created", "namespace ready"),
        ConditionUpdate::ready(ConditionType::RBACReady, "Created", "provisioner rbac ready"),
        ConditionUpdate::ready(ConditionType::SecretsReady, "Created", "tenant secrets ready"),
        ConditionUpdate::ready(ConditionType::HelmReleaseReady, "Installed", "helm release installed"),
        ConditionUpdate::ready(ConditionType::IngressReady, "Created", "ingress ready"),
        ConditionUpdate::ready(ConditionType::Ready, "AllReady", "instance is running"),
    ];
    status::patch_status(client, obj, final_status, Phase::Running, updates).await?;
    #[cfg(feature = "metrics")]
    ctx.metrics.record_phase_transition("Running");

    info!(name = %name, "instance is running");
    Ok(Action::requeue(RUNNING_REQUEUE))
}

/// Classify an ensure-step failure: back off and retry without touching
/// `status.phase` for transient errors, otherwise move the instance to
/// `Failed` so it stops being retried until the spec changes.
async fn handle_ensure_failure(
    client: &Client,
    ctx: &Arc<ControllerState>,
    obj: &SupabaseInstance,
    current_status: SupabaseInstanceStatus,
    condition: ConditionType,
    error: Error,
) -> Result<Action> {
    let name = obj.name_any();

    if error.is_retriable() {
        warn!(name = %name, condition = %condition.as_str(), error = %error, "transient ensure-step failure, retrying");
        #[cfg(feature = "metrics")]
        ctx.metrics.record_failure("transient");
        return Ok(Action::requeue(RETRY_BACKOFF));
    }

    error!(name = %name, condition = %condition.as_str(), error = %error, "terminal ensure-step failure");
    #[cfg(feature = "metrics")]
    {
        ctx.metrics.record_failure("terminal");
        ctx.metrics.record_phase_transition("Failed");
    }

    let message = error.to_string();
    let mut final_status = current_status;
    final_status.error_message = Some(message.clone());
    let updates = vec![
        ConditionUpdate::not_ready(condition, "Failed", message.clone()),
        ConditionUpdate::not_ready(ConditionType::Ready, "Failed", message),
    ];
    status::patch_status(client, obj, final_status, Phase::Failed, updates).await?;
    Ok(Action::requeue(FAILED_RECHECK_INTERVAL))
}

/// Tear an instance down: run the cleanup Job, then delete its namespace
/// (which cascades to the RBAC triple, secrets, ingresses, and everything
/// the Helm release created) before the finalizer helper removes the
/// finalizer and lets the delete through.
async fn cleanup_instance(
    client: &Client,
    ctx: &Arc<ControllerState>,
    obj: &SupabaseInstance,
) -> Result<Action> {
    let name = obj.name_any();
    let namespace_name = obj.spec.namespace();
    let current_status = obj.status.clone().unwrap_or_default();

    if current_status.phase != Phase::Deleting {
        info!(name = %name, "instance marked for deletion, starting cleanup");
        let updates = vec![ConditionUpdate::not_ready(ConditionType::Ready, "Deleting", "cleanup in progress")];
        status::patch_status(client, obj, current_status, Phase::Deleting, updates).await?;
        #[cfg(feature = "metrics")]
        ctx.metrics.record_phase_transition("Deleting");
    }

    let generation = obj.metadata.generation.unwrap_or(0);
    let release = ctx.config.helm_release(&name, obj.spec.chart_version.as_deref());
    match jobs::ensure_cleanup_job(client, &namespace_name, &name, generation, &release).await? {
        jobs::JobOutcome::Succeeded => {
            namespace::delete_namespace(client, &name).await?;
            info!(name = %name, "cleanup job succeeded, namespace deleted, removing finalizer");
            Ok(Action::await_change())
        }
        jobs::JobOutcome::Active => {
            info!(name = %name, "cleanup job still running");
            Ok(Action::requeue(PROVISIONING_REQUEUE))
        }
        jobs::JobOutcome::Failed(message) => {
            warn!(name = %name, error = %message, "cleanup job failed, will retry");
            #[cfg(feature = "metrics")]
            ctx.metrics.record_failure("cleanup_job_failed");
            Ok(Action::requeue(FAILED_RECHECK_INTERVAL))
        }
    }
}

/// The controller-wide error policy: classify via `Error::is_retriable` and
/// requeue accordingly. Finalizer-wrapped errors from `apply_instance` and
/// `cleanup_instance` already write their own status before returning, so
/// this only decides the backoff, not `status.phase`.
fn error_policy(obj: Arc<SupabaseInstance>, error: &Error, _ctx: Arc<ControllerState>) -> Action {
    error!(name = %obj.name_any(), error = %error, "reconcile failed");
    if error.is_retriable() {
        Action::requeue(RETRY_BACKOFF)
    } else {
        Action::requeue(FAILED_RECHECK_INTERVAL)
    }
}
