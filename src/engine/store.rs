//! The single shared vote store.
//!
//! Every view of a subject (list card, map popup, detail modal) reads from and
//! subscribes to one entry here. Mutations publish to all subscribers before the
//! lock is released, so views never observe diverging copies.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio::sync::watch;

use super::toggle::{apply_delta, plan_toggle};
use crate::errors::CastRejected;
use crate::models::{VoteAction, VoteDirection, VoteResult};

/// What a view renders for one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteView {
    pub tally: u64,
    pub direction: VoteDirection,
    /// A vote on this subject is awaiting the authority's answer.
    pub pending: bool,
}

impl VoteView {
    pub fn new(tally: u64, direction: VoteDirection) -> Self {
        Self {
            tally,
            direction,
            pending: false,
        }
    }
}

/// Snapshot taken right before an optimistic mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReconciliation {
    pub subject_id: String,
    pub requested: VoteAction,
    pub previous_direction: VoteDirection,
    pub previous_tally: u64,
    pub dispatched_at: Instant,
}

struct SubjectEntry {
    tally: u64,
    direction: VoteDirection,
    pending: Option<PendingReconciliation>,
    /// Bumped on every write, so a slow read can tell it was overtaken.
    version: u64,
    updates: watch::Sender<VoteView>,
}

impl SubjectEntry {
    fn new(tally: u64, direction: VoteDirection) -> Self {
        let (updates, _) = watch::channel(VoteView::new(tally, direction));
        Self {
            tally,
            direction,
            pending: None,
            version: 0,
            updates,
        }
    }

    fn view(&self) -> VoteView {
        VoteView {
            tally: self.tally,
            direction: self.direction,
            pending: self.pending.is_some(),
        }
    }

    fn publish(&mut self) -> VoteView {
        self.version += 1;
        let view = self.view();
        self.updates.send_replace(view);
        view
    }

    fn restore(&mut self) {
        if let Some(snapshot) = self.pending.take() {
            self.tally = snapshot.previous_tally;
            self.direction = snapshot.previous_direction;
        }
    }

    /// Drop the answer of a closed engine. A store nobody else holds is left
    /// as it was; a store that outlives the engine goes back to the snapshot
    /// so other engines are not locked out of the subject.
    fn abandon(&mut self, shared: bool) {
        if shared && self.pending.is_some() {
            self.restore();
            self.publish();
        }
    }
}

/// Session-scoped vote state keyed by subject id. Cloning shares the store.
#[derive(Clone, Default)]
pub struct VoteStore {
    subjects: Arc<Mutex<HashMap<String, SubjectEntry>>>,
}

impl VoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SubjectEntry>> {
        // A panic while holding the lock cannot leave an entry half-written:
        // every mutation is a plain field assignment.
        self.subjects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register or refresh a subject from loaded data.
    ///
    /// Returns `false` and leaves the entry untouched while a vote on it is
    /// pending, so a refresh cannot move the rollback baseline.
    pub fn materialize(&self, subject_id: &str, tally: u64, direction: VoteDirection) -> bool {
        let mut subjects = self.lock();
        match subjects.get_mut(subject_id) {
            Some(entry) if entry.pending.is_some() => false,
            Some(entry) => {
                entry.tally = tally;
                entry.direction = direction;
                entry.publish();
                true
            }
            None => {
                subjects.insert(subject_id.to_string(), SubjectEntry::new(tally, direction));
                true
            }
        }
    }

    /// Current state of a subject, if it has been materialized.
    pub fn view(&self, subject_id: &str) -> Option<VoteView> {
        self.lock().get(subject_id).map(SubjectEntry::view)
    }

    /// Follow a subject's state. The receiver starts at the current value.
    pub fn subscribe(&self, subject_id: &str) -> Option<watch::Receiver<VoteView>> {
        self.lock()
            .get(subject_id)
            .map(|entry| entry.updates.subscribe())
    }

    /// The in-flight reconciliation for a subject, if any.
    pub fn pending(&self, subject_id: &str) -> Option<PendingReconciliation> {
        self.lock()
            .get(subject_id)
            .and_then(|entry| entry.pending.clone())
    }

    pub fn contains(&self, subject_id: &str) -> bool {
        self.lock().contains_key(subject_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Write position of a subject, to hand back to [`VoteStore::refresh`].
    pub(crate) fn version(&self, subject_id: &str) -> Option<u64> {
        self.lock().get(subject_id).map(|entry| entry.version)
    }

    /// Materialize a read that started at `seen`.
    ///
    /// Refused if the subject was written since then, is pending, or the
    /// reading engine is closed.
    pub(crate) fn refresh(
        &self,
        subject_id: &str,
        tally: u64,
        direction: VoteDirection,
        seen: Option<u64>,
        live: &AtomicBool,
    ) -> bool {
        let mut subjects = self.lock();
        if !live.load(Ordering::SeqCst) {
            return false;
        }
        match subjects.get_mut(subject_id) {
            Some(entry) if entry.pending.is_none() && seen == Some(entry.version) => {
                entry.tally = tally;
                entry.direction = direction;
                entry.publish();
                true
            }
            Some(_) => false,
            None if seen.is_none() => {
                subjects.insert(subject_id.to_string(), SubjectEntry::new(tally, direction));
                true
            }
            None => false,
        }
    }

    /// Wait out any write in progress.
    pub(crate) fn barrier(&self) {
        drop(self.lock());
    }

    /// Snapshot the subject, apply the optimistic toggle and mark it pending.
    pub(crate) fn begin(
        &self,
        subject_id: &str,
        requested: VoteAction,
    ) -> Result<VoteView, CastRejected> {
        let mut subjects = self.lock();
        let entry = subjects
            .get_mut(subject_id)
            .ok_or_else(|| CastRejected::UnknownSubject(subject_id.to_string()))?;

        if entry.pending.is_some() {
            return Err(CastRejected::Busy(subject_id.to_string()));
        }

        let plan = plan_toggle(entry.direction, requested);
        entry.pending = Some(PendingReconciliation {
            subject_id: subject_id.to_string(),
            requested,
            previous_direction: entry.direction,
            previous_tally: entry.tally,
            dispatched_at: Instant::now(),
        });
        entry.direction = plan.direction;
        entry.tally = apply_delta(entry.tally, plan.tally_delta);

        Ok(entry.publish())
    }

    /// Overwrite the subject with the authority's canonical answer.
    ///
    /// Returns `None` without applying the answer if the subject is gone or
    /// the engine that cast the vote is closed.
    pub(crate) fn confirm(
        &self,
        subject_id: &str,
        canonical: VoteResult,
        live: &AtomicBool,
    ) -> Option<VoteView> {
        let mut subjects = self.lock();
        let shared = self.is_shared();
        let entry = subjects.get_mut(subject_id)?;
        if !live.load(Ordering::SeqCst) {
            entry.abandon(shared);
            return None;
        }
        entry.pending = None;
        entry.tally = canonical.tally();
        entry.direction = canonical.user_vote;
        Some(entry.publish())
    }

    /// Restore the pre-action snapshot exactly.
    ///
    /// Returns `None` under the same conditions as [`VoteStore::confirm`].
    pub(crate) fn roll_back(&self, subject_id: &str, live: &AtomicBool) -> Option<VoteView> {
        let mut subjects = self.lock();
        let shared = self.is_shared();
        let entry = subjects.get_mut(subject_id)?;
        if !live.load(Ordering::SeqCst) {
            entry.abandon(shared);
            return None;
        }
        entry.restore();
        Some(entry.publish())
    }

    /// Another engine or view still holds this store.
    fn is_shared(&self) -> bool {
        Arc::strong_count(&self.subjects) > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> AtomicBool {
        AtomicBool::new(true)
    }

    #[test]
    fn test_begin_requires_materialized_subject() {
        let store = VoteStore::new();
        assert_eq!(
            store.begin("missing", VoteAction::Up),
            Err(CastRejected::UnknownSubject("missing".into()))
        );
    }

    #[test]
    fn test_begin_snapshots_and_applies() {
        let store = VoteStore::new();
        store.materialize("pothole-1", 5, VoteDirection::None);

        let view = store.begin("pothole-1", VoteAction::Up).unwrap();
        assert_eq!(view.tally, 6);
        assert_eq!(view.direction, VoteDirection::Up);
        assert!(view.pending);

        let pending = store.pending("pothole-1").unwrap();
        assert_eq!(pending.previous_tally, 5);
        assert_eq!(pending.previous_direction, VoteDirection::None);
        assert_eq!(pending.requested, VoteAction::Up);
    }

    #[test]
    fn test_begin_while_pending_is_busy() {
        let store = VoteStore::new();
        store.materialize("pothole-1", 5, VoteDirection::None);
        store.begin("pothole-1", VoteAction::Up).unwrap();

        assert_eq!(
            store.begin("pothole-1", VoteAction::Down),
            Err(CastRejected::Busy("pothole-1".into()))
        );
        assert_eq!(store.view("pothole-1").unwrap().tally, 6);
    }

    #[test]
    fn test_roll_back_restores_snapshot() {
        let store = VoteStore::new();
        store.materialize("pothole-1", 5, VoteDirection::Up);
        store.begin("pothole-1", VoteAction::Down).unwrap();
        assert_eq!(
            store.view("pothole-1").unwrap(),
            VoteView {
                tally: 4,
                direction: VoteDirection::Down,
                pending: true
            }
        );

        let view = store.roll_back("pothole-1", &open()).unwrap();
        assert_eq!(view, VoteView::new(5, VoteDirection::Up));
        assert!(store.pending("pothole-1").is_none());
    }

    #[test]
    fn test_confirm_overwrites_with_canonical() {
        let store = VoteStore::new();
        store.materialize("streetlight-7", 2, VoteDirection::None);
        store.begin("streetlight-7", VoteAction::Up).unwrap();

        let view = store
            .confirm(
                "streetlight-7",
                VoteResult {
                    upvotes: 9,
                    user_vote: VoteDirection::Up,
                },
                &open(),
            )
            .unwrap();
        assert_eq!(view, VoteView::new(9, VoteDirection::Up));
    }

    #[test]
    fn test_materialize_ignored_while_pending() {
        let store = VoteStore::new();
        store.materialize("pothole-1", 5, VoteDirection::None);
        store.begin("pothole-1", VoteAction::Up).unwrap();

        assert!(!store.materialize("pothole-1", 40, VoteDirection::Down));
        let view = store.roll_back("pothole-1", &open()).unwrap();
        assert_eq!(view, VoteView::new(5, VoteDirection::None));
    }

    #[test]
    fn test_all_subscribers_see_the_same_update() {
        let store = VoteStore::new();
        store.materialize("graffiti-3", 1, VoteDirection::None);
        let list_card = store.subscribe("graffiti-3").unwrap();
        let map_popup = store.subscribe("graffiti-3").unwrap();
        let modal = store.clone().subscribe("graffiti-3").unwrap();

        store.begin("graffiti-3", VoteAction::Up).unwrap();

        for receiver in [&list_card, &map_popup, &modal] {
            assert!(receiver.has_changed().unwrap());
            assert_eq!(receiver.borrow().tally, 2);
            assert_eq!(receiver.borrow().direction, VoteDirection::Up);
        }
    }

    #[test]
    fn test_toggle_off_upvote_at_zero_stays_at_zero() {
        let store = VoteStore::new();
        store.materialize("drain-9", 0, VoteDirection::Up);
        let view = store.begin("drain-9", VoteAction::Up).unwrap();
        assert_eq!(view.tally, 0);
        assert_eq!(view.direction, VoteDirection::None);
    }

    #[test]
    fn test_refresh_refused_after_a_newer_write() {
        let store = VoteStore::new();
        store.materialize("pothole-1", 0, VoteDirection::None);
        let seen = store.version("pothole-1");

        store.begin("pothole-1", VoteAction::Up).unwrap();
        store.confirm(
            "pothole-1",
            VoteResult {
                upvotes: 1,
                user_vote: VoteDirection::Up,
            },
            &open(),
        );

        assert!(!store.refresh("pothole-1", 0, VoteDirection::None, seen, &open()));
        assert_eq!(
            store.view("pothole-1"),
            Some(VoteView::new(1, VoteDirection::Up))
        );

        let seen = store.version("pothole-1");
        assert!(store.refresh("pothole-1", 4, VoteDirection::Up, seen, &open()));
        assert_eq!(store.view("pothole-1").unwrap().tally, 4);
    }

    #[test]
    fn test_refresh_inserts_only_if_still_absent() {
        let store = VoteStore::new();
        assert!(store.refresh("a", 2, VoteDirection::None, None, &open()));
        assert!(!store.refresh("a", 9, VoteDirection::None, None, &open()));
        assert_eq!(store.view("a").unwrap().tally, 2);
        assert_eq!(store.len(), 1);

        let closed = AtomicBool::new(false);
        assert!(!store.refresh("b", 1, VoteDirection::None, None, &closed));
        assert!(!store.contains("b"));
    }

    #[test]
    fn test_closed_answer_leaves_private_store_untouched() {
        let store = VoteStore::new();
        store.materialize("pothole-1", 5, VoteDirection::None);
        store.begin("pothole-1", VoteAction::Up).unwrap();

        let closed = AtomicBool::new(false);
        assert!(store.roll_back("pothole-1", &closed).is_none());
        assert_eq!(
            store.view("pothole-1"),
            Some(VoteView {
                tally: 6,
                direction: VoteDirection::Up,
                pending: true,
            })
        );
    }

    #[test]
    fn test_closed_answer_releases_shared_store() {
        let store = VoteStore::new();
        let other_view = store.clone();
        store.materialize("pothole-1", 5, VoteDirection::None);
        store.begin("pothole-1", VoteAction::Up).unwrap();

        let closed = AtomicBool::new(false);
        let canonical = VoteResult {
            upvotes: 6,
            user_vote: VoteDirection::Up,
        };
        assert!(store.confirm("pothole-1", canonical, &closed).is_none());
        assert_eq!(
            other_view.view("pothole-1"),
            Some(VoteView::new(5, VoteDirection::None))
        );
        assert!(other_view.begin("pothole-1", VoteAction::Up).is_ok());
    }
}
