//! Leader-election gating around `run_controller`.
//!
//! Only the replica holding the cluster `Lease` reconciles; every other
//! replica blocks waiting to acquire it, so reconciliation never runs twice
//! for the same object.
//!
//! When `leaderElectionEnabled` is false (single-replica / local dev) the
//! controller runs unconditionally, skipping the lease dance entirely.

use std::sync::Arc;
use std::time::Duration;

use kube_leader_election::{LeaseLock, LeaseLockParams};
use tracing::{info, warn};

use crate::controller::{reconciler, ControllerState};
use crate::error::Result;

const RENEW_INTERVAL: Duration = Duration::from_secs(10);
const LEASE_TTL: Duration = Duration::from_secs(15);
const LEASE_NAME: &str = "supacontrol-operator-leader";
/// Renewal failures tolerated before treating the lease as lost. At one
/// failure per `RENEW_INTERVAL`, this is roughly `LEASE_TTL` of grace.
const MAX_CONSECUTIVE_RENEWAL_FAILURES: u32 = 2;

/// Runs the controller only while `holder_id` holds the named `Lease` in
/// `lease_namespace`. Blocks until the process becomes leader, then runs the
/// controller loop for as long as the lease keeps renewing; if renewal fails
/// `MAX_CONSECUTIVE_RENEWAL_FAILURES` times in a row, the lease is presumed
/// lost and the controller loop is signaled to shut down rather than
/// carrying on as if it were still the leader.
pub async fn run_leader_elected(
    state: Arc<ControllerState>,
    lease_namespace: &str,
    holder_id: String,
) -> Result<()> {
    let lock = LeaseLock::new(
        state.client.clone(),
        lease_namespace,
        LeaseLockParams {
            lease_name: LEASE_NAME.into(),
            holder_id: holder_id.clone(),
            lease_ttl: LEASE_TTL,
        },
    );

    info!(holder_id = %holder_id, "waiting to acquire leader lease");

    loop {
        match lock.try_acquire_or_renew().await {
            Ok(result) if result.acquired_lease => break,
            Ok(_) => {
                tokio::time::sleep(RENEW_INTERVAL).await;
            }
            Err(e) => {
                warn!(error = ?e, "lease acquisition attempt failed, retrying");
                tokio::time::sleep(RENEW_INTERVAL).await;
            }
        }
    }

    info!(holder_id = %holder_id, "acquired leader lease, starting controller");

    let (lost_tx, lost_rx) = tokio::sync::watch::channel(false);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RENEW_INTERVAL);
        let mut consecutive_failures = 0u32;
        loop {
            interval.tick().await;
            match lock.try_acquire_or_renew().await {
                Ok(result) if result.acquired_lease => consecutive_failures = 0,
                Ok(_) | Err(_) => {
                    consecutive_failures += 1;
                    warn!(consecutive_failures, "failed to renew leader lease");
                    if consecutive_failures >= MAX_CONSECUTIVE_RENEWAL_FAILURES {
                        warn!("leader lease presumed lost, signaling controller to stop");
                        let _ = lost_tx.send(true);
                        break;
                    }
                }
            }
        }
    });

    reconciler::run_controller_until(state, Some(lost_rx)).await
}
