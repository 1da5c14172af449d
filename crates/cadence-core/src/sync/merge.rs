//! Merge policy between local and remote copies

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::RemoteLedger;
use crate::models::EntityId;
use crate::store::Entity;

/// One reconciliation step
#[derive(Debug, Clone, PartialEq)]
pub enum MergeAction<E: Entity> {
    /// No local copy: store the remote entity verbatim
    Adopt(E),
    /// Local copy wins: push its authoritative fields, keep it untouched
    Push { id: EntityId, patch: E::Patch },
    /// Remote copy is newer and the local one is not active
    Overwrite(E),
    /// Known remotely before, gone now: deleted on another device
    DeleteLocal(EntityId),
    /// Never reached the remote store: upload it
    Upload(E),
}

/// Counts of what a merge did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub adopted: usize,
    pub pushed: usize,
    pub overwritten: usize,
    pub deleted: usize,
    pub uploaded: usize,
    /// Local copy won but the remote already holds the same fields
    pub in_sync: usize,
    /// Remote writes that failed and were skipped
    pub failed: usize,
    /// Remote entities that failed validation and were ignored
    pub rejected: usize,
}

/// Plan the reconciliation of `local` with the remote result set.
///
/// Per remote entity `r` matched by id against local `l`:
/// - no `l`: adopt `r`
/// - `l` active (RUNNING/PAUSED) or `l.updated_at > r.updated_at`: push
///   `l`'s authoritative fields, unless `r` already carries them
/// - otherwise overwrite `l` with `r`
///
/// Remote entities failing [`Entity::validated`] are skipped and their local
/// copies left alone. Local entities absent from `remote` are deleted when
/// the ledger knows them and uploaded when it does not; an active one is
/// always uploaded.
pub fn plan_merge<E: Entity>(
    local: &[E],
    remote: Vec<E>,
    ledger: &RemoteLedger,
    now: DateTime<Utc>,
    report: &mut MergeReport,
) -> Vec<MergeAction<E>> {
    let remote_ids = remote
        .iter()
        .map(|entity| entity.id().clone())
        .collect::<HashSet<_>>();
    let mut actions = Vec::with_capacity(remote.len());

    for theirs in remote {
        let id = theirs.id().clone();
        let theirs = match theirs.validated(now) {
            Ok(theirs) => theirs,
            Err(error) => {
                tracing::warn!("Ignoring invalid remote {} {}: {}", E::KIND, id, error);
                report.rejected += 1;
                continue;
            }
        };
        let Some(ours) = local.iter().find(|entity| entity.id() == theirs.id()) else {
            actions.push(MergeAction::Adopt(theirs));
            continue;
        };

        let is_local_active = ours.is_active();
        let is_local_newer = ours.updated_at() > theirs.updated_at();
        if is_local_active || is_local_newer {
            let patch = ours.authoritative_patch();
            if same_fields(&patch, &theirs.authoritative_patch()) {
                report.in_sync += 1;
            } else {
                actions.push(MergeAction::Push {
                    id: ours.id().clone(),
                    patch,
                });
            }
        } else {
            actions.push(MergeAction::Overwrite(theirs));
        }
    }

    for ours in local.iter().filter(|entity| !remote_ids.contains(entity.id())) {
        if ledger.contains(ours.id()) && !ours.is_active() {
            actions.push(MergeAction::DeleteLocal(ours.id().clone()));
        } else {
            actions.push(MergeAction::Upload(ours.clone()));
        }
    }

    actions
}

fn same_fields<P: serde::Serialize>(ours: &P, theirs: &P) -> bool {
    match (serde_json::to_value(ours), serde_json::to_value(theirs)) {
        (Ok(ours), Ok(theirs)) => ours == theirs,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Note, NoteDraft, Segment, SegmentKind, Timer, TimerDraft, TimerStatus};
    use crate::store::MemorySlot;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn t(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    fn timer(id: &str, status: TimerStatus, updated: i64) -> Timer {
        let mut draft = TimerDraft::new(
            "Focus",
            vec![Segment::new(SegmentKind::Focus, 1500, "Focus")],
            1,
        );
        draft.id = Some(EntityId::from_remote(id));
        let mut timer = Timer::build(draft, t(0)).unwrap();
        timer.status = status;
        if status == TimerStatus::Paused {
            timer.paused_at = Some(t(0));
        }
        timer.updated_at = t(updated);
        timer
    }

    fn note(id: &str, title: &str, updated: i64) -> Note {
        let mut draft = NoteDraft::new(title, "");
        draft.id = Some(EntityId::from_remote(id));
        let mut note = Note::build(draft, t(0)).unwrap();
        note.updated_at = t(updated);
        note
    }

    fn empty_ledger() -> RemoteLedger {
        RemoteLedger::load(MemorySlot::new().as_ref(), "test")
    }

    #[test]
    fn adopts_unknown_remote_entity() {
        let remote = timer("a", TimerStatus::Idle, 5);
        let mut report = MergeReport::default();
        let actions = plan_merge(&[], vec![remote.clone()], &empty_ledger(), t(30), &mut report);
        assert_eq!(actions, vec![MergeAction::Adopt(remote)]);
    }

    #[test]
    fn local_active_wins_over_newer_remote() {
        let mut local = timer("a", TimerStatus::Running, 10);
        local.remaining_time = 1200;
        let remote = timer("a", TimerStatus::Idle, 20);

        let mut report = MergeReport::default();
        let actions = plan_merge(
            std::slice::from_ref(&local),
            vec![remote],
            &empty_ledger(),
            t(30),
            &mut report,
        );
        assert_eq!(
            actions,
            vec![MergeAction::Push {
                id: local.id.clone(),
                patch: local.authoritative_patch(),
            }]
        );
    }

    #[test]
    fn paused_local_counts_as_active() {
        let local = timer("a", TimerStatus::Paused, 10);
        let remote = timer("a", TimerStatus::Idle, 20);
        let mut report = MergeReport::default();
        let actions = plan_merge(&[local], vec![remote], &empty_ledger(), t(30), &mut report);
        assert!(matches!(actions[0], MergeAction::Push { .. }));
    }

    #[test]
    fn remote_newer_overwrites_idle_local() {
        let local = timer("a", TimerStatus::Idle, 10);
        let mut remote = timer("a", TimerStatus::Completed, 20);
        remote.name = "Renamed".into();

        let mut report = MergeReport::default();
        let actions = plan_merge(&[local], vec![remote.clone()], &empty_ledger(), t(30), &mut report);
        assert_eq!(actions, vec![MergeAction::Overwrite(remote)]);
    }

    #[test]
    fn local_newer_note_pushes_fields() {
        let local = note("n", "Local", 30);
        let remote = note("n", "Remote", 20);
        let mut report = MergeReport::default();
        let actions = plan_merge(
            std::slice::from_ref(&local),
            vec![remote],
            &empty_ledger(),
            t(30),
            &mut report,
        );
        assert_eq!(
            actions,
            vec![MergeAction::Push {
                id: local.id.clone(),
                patch: local.authoritative_patch(),
            }]
        );
    }

    #[test]
    fn identical_fields_are_not_pushed_again() {
        let local = note("n", "Same", 30);
        let remote = note("n", "Same", 20);
        let mut report = MergeReport::default();
        let actions = plan_merge(&[local], vec![remote], &empty_ledger(), t(30), &mut report);
        assert!(actions.is_empty());
        assert_eq!(report.in_sync, 1);
    }

    #[test]
    fn absent_entities_follow_the_ledger() {
        let slot = MemorySlot::new();
        let mut ledger = RemoteLedger::load(slot.as_ref(), "notes");
        ledger.insert(slot.as_ref(), EntityId::from_remote("gone"));

        let gone = note("gone", "Deleted elsewhere", 1);
        let offline = note("offline", "Written offline", 1);
        let mut report = MergeReport::default();
        let actions = plan_merge(&[gone, offline.clone()], Vec::new(), &ledger, t(30), &mut report);

        assert_eq!(
            actions,
            vec![
                MergeAction::DeleteLocal(EntityId::from_remote("gone")),
                MergeAction::Upload(offline),
            ]
        );
    }

    #[test]
    fn active_entity_missing_remotely_is_uploaded_not_deleted() {
        let slot = MemorySlot::new();
        let mut ledger = RemoteLedger::load(slot.as_ref(), "timers");
        ledger.insert(slot.as_ref(), EntityId::from_remote("live"));

        let running = timer("live", TimerStatus::Running, 5);
        let mut report = MergeReport::default();
        let actions = plan_merge(
            std::slice::from_ref(&running),
            Vec::new(),
            &ledger,
            t(30),
            &mut report,
        );
        assert_eq!(actions, vec![MergeAction::Upload(running)]);
    }

    #[test]
    fn invalid_remote_timer_is_ignored() {
        let local = timer("a", TimerStatus::Idle, 5);
        let mut broken = timer("a", TimerStatus::Running, 20);
        broken.segments.clear();
        broken.repeat_count = 3;
        let mut unknown = broken.clone();
        unknown.id = EntityId::from_remote("b");

        let slot = MemorySlot::new();
        let mut ledger = RemoteLedger::load(slot.as_ref(), "timers");
        ledger.insert(slot.as_ref(), EntityId::from_remote("a"));

        let mut report = MergeReport::default();
        let actions = plan_merge(&[local], vec![broken, unknown], &ledger, t(30), &mut report);
        assert!(actions.is_empty());
        assert_eq!(report.rejected, 2);
    }

    #[test]
    fn adopted_remote_timer_is_clamped() {
        let mut remote = timer("a", TimerStatus::Paused, 20);
        remote.paused_at = None;
        remote.remaining_time = 9000;

        let mut report = MergeReport::default();
        let actions = plan_merge(&[], vec![remote], &empty_ledger(), t(30), &mut report);
        let [MergeAction::Adopt(adopted)] = actions.as_slice() else {
            panic!("expected one adoption, got {actions:?}");
        };
        assert_eq!(adopted.remaining_time, 1500);
        assert_eq!(adopted.paused_at, Some(t(30)));
    }
}
