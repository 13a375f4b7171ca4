//! In-memory vote authority for tests and local development.
//!
//! Applies the same toggle rules as the reference server for a single user,
//! and can be told to fail, to hold responses until released, or to report a
//! different canonical tally (other users voting in the meantime).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::VoteAuthority;
use crate::errors::VoteError;
use crate::models::{Session, VoteAction, VoteDirection, VoteResult};

#[derive(Default)]
struct MockState {
    /// subject id -> (upvotes from other users, this user's vote)
    subjects: HashMap<String, (i64, VoteDirection)>,
    failures: VecDeque<VoteError>,
    gate: Option<Arc<Semaphore>>,
}

/// Mock vote authority that answers from memory.
#[derive(Default)]
pub struct MockAuthority {
    state: Mutex<MockState>,
    casts: AtomicUsize,
}

impl MockAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed a subject with its canonical state for the acting user.
    pub fn seed(&self, subject_id: &str, upvotes: i64, user_vote: VoteDirection) {
        let others = upvotes - i64::from(user_vote == VoteDirection::Up);
        self.lock()
            .subjects
            .insert(subject_id.to_string(), (others, user_vote));
    }

    /// Simulate other users changing the tally by `delta` upvotes.
    pub fn others_vote(&self, subject_id: &str, delta: i64) {
        if let Some((others, _)) = self.lock().subjects.get_mut(subject_id) {
            *others += delta;
        }
    }

    /// Drop a subject, as if it had been deleted on the server.
    pub fn remove(&self, subject_id: &str) {
        self.lock().subjects.remove(subject_id);
    }

    /// Make the next cast fail with `error`. Failures queue up in order.
    pub fn fail_next(&self, error: VoteError) {
        self.lock().failures.push_back(error);
    }

    /// Hold every subsequent cast until [`MockAuthority::release`] is called.
    pub fn pause(&self) {
        self.lock().gate = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `count` held casts through.
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.lock().gate {
            gate.add_permits(count);
        }
    }

    /// Stop holding casts, releasing any that are waiting.
    pub fn resume(&self) {
        if let Some(gate) = self.lock().gate.take() {
            gate.close();
        }
    }

    /// Number of cast requests received.
    pub fn cast_count(&self) -> usize {
        self.casts.load(Ordering::SeqCst)
    }

    fn snapshot(&self, subject_id: &str) -> Result<VoteResult, VoteError> {
        let state = self.lock();
        let (others, user_vote) = state
            .subjects
            .get(subject_id)
            .ok_or_else(|| not_found(subject_id))?;
        Ok(VoteResult {
            upvotes: others + i64::from(*user_vote == VoteDirection::Up),
            user_vote: *user_vote,
        })
    }
}

fn not_found(subject_id: &str) -> VoteError {
    VoteError::Rejected {
        status: 404,
        message: format!("Issue {} not found", subject_id),
    }
}

#[async_trait]
impl VoteAuthority for MockAuthority {
    async fn cast(
        &self,
        _session: &Session,
        subject_id: &str,
        action: VoteAction,
    ) -> Result<VoteResult, VoteError> {
        self.casts.fetch_add(1, Ordering::SeqCst);

        let gate = self.lock().gate.clone();
        if let Some(gate) = gate {
            // A closed gate means the mock was resumed; carry on.
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let mut state = self.lock();
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }

        let (_, user_vote) = state
            .subjects
            .get_mut(subject_id)
            .ok_or_else(|| not_found(subject_id))?;
        *user_vote = if *user_vote == action.direction() {
            VoteDirection::None
        } else {
            action.direction()
        };
        drop(state);

        self.snapshot(subject_id)
    }

    async fn fetch(&self, _session: &Session, subject_id: &str) -> Result<VoteResult, VoteError> {
        self.snapshot(subject_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_toggles_like_the_server() {
        let mock = MockAuthority::new();
        let session = Session::user("citizen-1");
        mock.seed("issue-1", 3, VoteDirection::None);

        let up = mock.cast(&session, "issue-1", VoteAction::Up).await.unwrap();
        assert_eq!((up.upvotes, up.user_vote), (4, VoteDirection::Up));

        let down = mock
            .cast(&session, "issue-1", VoteAction::Down)
            .await
            .unwrap();
        assert_eq!((down.upvotes, down.user_vote), (3, VoteDirection::Down));

        let off = mock
            .cast(&session, "issue-1", VoteAction::Down)
            .await
            .unwrap();
        assert_eq!((off.upvotes, off.user_vote), (3, VoteDirection::None));
        assert_eq!(mock.cast_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_unknown_subject_is_rejected() {
        let mock = MockAuthority::new();
        let err = mock
            .cast(&Session::user("citizen-1"), "ghost", VoteAction::Up)
            .await
            .unwrap_err();
        assert!(matches!(err, VoteError::Rejected { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_mock_injected_failure_is_consumed_once() {
        let mock = MockAuthority::new();
        let session = Session::user("citizen-1");
        mock.seed("issue-1", 0, VoteDirection::None);
        mock.fail_next(VoteError::Network("connection reset".into()));

        assert!(mock.cast(&session, "issue-1", VoteAction::Up).await.is_err());
        assert!(mock.cast(&session, "issue-1", VoteAction::Up).await.is_ok());
    }
}
