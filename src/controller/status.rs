//! Status subresource bookkeeping shared by every reconcile pass: phase
//! transitions, condition merges, and `observedGeneration` tracking all
//! funnel through here so the reconciler itself stays about sequencing,
//! not about serde shapes.

use kube::api::{Api, Patch, PatchParams};
use kube::{Client, ResourceExt};
use tracing::debug;

use crate::crd::{Condition, ConditionStatus, ConditionType, Phase, SupabaseInstance, SupabaseInstanceStatus};
use crate::error::Result;

const FIELD_MANAGER: &str = "supacontrol-operator";

/// One condition update to apply on top of the current status.
pub struct ConditionUpdate {
    pub type_: ConditionType,
    pub status: ConditionStatus,
    pub reason: &'static str,
    pub message: String,
}

impl ConditionUpdate {
    pub fn ready(type_: ConditionType, reason: &'static str, message: impl Into<String>) -> Self {
        Self { type_, status: ConditionStatus::True, reason, message: message.into() }
    }

    pub fn not_ready(type_: ConditionType, reason: &'static str, message: impl Into<String>) -> Self {
        Self { type_, status: ConditionStatus::False, reason, message: message.into() }
    }
}

/// Apply `updates` and a new `phase` on top of `current`, following the
/// status-update policy exactly: conditions only rewrite
/// `lastTransitionTime` when they actually changed
/// (`crate::crd::merge_condition`), and the top-level
/// `status.lastTransitionTime` follows the same rule for `phase` itself —
/// it only advances when `phase` actually changes. Pure so it can be
/// unit-tested without a cluster; `patch_status` is the thin I/O wrapper
/// around it.
fn merge_status(
    mut current: SupabaseInstanceStatus,
    phase: Phase,
    updates: Vec<ConditionUpdate>,
    now: String,
) -> SupabaseInstanceStatus {
    for update in updates {
        let condition = Condition::new(update.type_, update.status, update.reason, &update.message);
        crate::crd::merge_condition(&mut current.conditions, condition);
    }

    if current.phase != phase {
        current.last_transition_time = Some(now);
    }
    current.phase = phase;
    current
}

/// Merge `updates` and `phase` into `current`, stamp `observedGeneration`
/// from `obj.metadata.generation`, and patch the status subresource.
pub async fn patch_status(
    client: &Client,
    obj: &SupabaseInstance,
    current: SupabaseInstanceStatus,
    phase: Phase,
    updates: Vec<ConditionUpdate>,
) -> Result<()> {
    let mut current = merge_status(current, phase, updates, chrono::Utc::now().to_rfc3339());
    current.observed_generation = obj.metadata.generation;

    let api: Api<SupabaseInstance> = Api::all(client.clone());
    let patch = serde_json::json!({ "status": current });

    debug!(name = %obj.name_any(), phase = %phase, "patching status");
    api.patch_status(&obj.name_any(), &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Merge(&patch))
        .await?;

    Ok(())
}

/// Whether every condition in `ConditionType::ALL` is currently `True`.
/// Includes `Ready` itself, so this answers "is the instance fully
/// settled", not "are the instance's children ready" — use
/// `child_conditions_ready` to decide whether to set `Ready` in the first
/// place.
pub fn all_conditions_ready(status: &SupabaseInstanceStatus) -> bool {
    ConditionType::ALL.iter().all(|wanted| {
        status
            .conditions
            .iter()
            .any(|c| c.type_ == *wanted && c.status == ConditionStatus::True)
    })
}

/// Whether every condition except `Ready` is currently `True`. This is
/// what gates setting `Ready=True` itself.
pub fn child_conditions_ready(status: &SupabaseInstanceStatus) -> bool {
    ConditionType::ALL
        .iter()
        .filter(|t| **t != ConditionType::Ready)
        .all(|wanted| {
            status
                .conditions
                .iter()
                .any(|c| c.type_ == *wanted && c.status == ConditionStatus::True)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_transition_time_is_none_before_any_phase_is_recorded() {
        let status = SupabaseInstanceStatus::default();
        assert!(status.last_transition_time.is_none());
    }

    #[test]
    fn merge_status_stamps_last_transition_time_on_phase_change() {
        let status = SupabaseInstanceStatus::default();
        let merged = merge_status(status, Phase::Provisioning, vec![], "2024-01-01T00:00:00+00:00".to_string());
        assert_eq!(merged.phase, Phase::Provisioning);
        assert_eq!(merged.last_transition_time.as_deref(), Some("2024-01-01T00:00:00+00:00"));
    }

    #[test]
    fn merge_status_leaves_last_transition_time_untouched_when_phase_is_unchanged() {
        let mut status = SupabaseInstanceStatus::default();
        status.phase = Phase::Running;
        status.last_transition_time = Some("2024-01-01T00:00:00+00:00".to_string());

        let merged = merge_status(status, Phase::Running, vec![], "2099-01-01T00:00:00+00:00".to_string());
        assert_eq!(merged.last_transition_time.as_deref(), Some("2024-01-01T00:00:00+00:00"));
    }

    #[test]
    fn all_conditions_ready_false_when_one_missing() {
        let mut status = SupabaseInstanceStatus::default();
        for t in ConditionType::ALL.iter().take(5) {
            status.conditions.push(Condition::new(*t, ConditionStatus::True, "Ready", "ok"));
        }
        assert!(!all_conditions_ready(&status));
    }

    #[test]
    fn all_conditions_ready_true_when_all_true() {
        let mut status = SupabaseInstanceStatus::default();
        for t in ConditionType::ALL.iter() {
            status.conditions.push(Condition::new(*t, ConditionStatus::True, "Ready", "ok"));
        }
        assert!(all_conditions_ready(&status));
    }

    #[test]
    fn all_conditions_ready_false_when_one_is_false() {
        let mut status = SupabaseInstanceStatus::default();
        for t in ConditionType::ALL.iter() {
            let s = if *t == ConditionType::IngressReady { ConditionStatus::False } else { ConditionStatus::True };
            status.conditions.push(Condition::new(*t, s, "Pending", "not yet"));
        }
        assert!(!all_conditions_ready(&status));
    }

    #[test]
    fn child_conditions_ready_ignores_ready_itself() {
        let mut status = SupabaseInstanceStatus::default();
        for t in ConditionType::ALL.iter().filter(|t| **t != ConditionType::Ready) {
            status.conditions.push(Condition::new(*t, ConditionStatus::True, "Ready", "ok"));
        }
        assert!(child_conditions_ready(&status));
        assert!(!all_conditions_ready(&status));
    }
}
