//! Optimistic vote reconciliation.
//!
//! A vote is applied to the shared [`VoteStore`] immediately, then sent to the
//! [`VoteAuthority`]. The authority's answer overwrites the optimistic state;
//! a failure or timeout restores the snapshot taken before the vote. At most one
//! reconciliation per subject is in flight: further votes on that subject are
//! refused until it settles.

mod store;
mod toggle;

pub use store::{PendingReconciliation, VoteStore, VoteView};
pub use toggle::{apply_delta, plan_toggle, OptimisticPlan};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::authority::VoteAuthority;
use crate::config::{Config, DEFAULT_VOTE_TIMEOUT};
use crate::errors::{CastRejected, FailureKind, VoteError};
use crate::models::{Session, VoteAction, VoteDirection};

/// Text shown to the user when a vote could not be recorded.
pub const VOTE_FAILED_MESSAGE: &str = "Failed to vote, try again";

const NOTICE_CAPACITY: usize = 32;

/// Transient, non-blocking notification for a vote that was rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteNotice {
    pub subject_id: String,
    pub kind: FailureKind,
    pub message: String,
}

/// How a dispatched vote ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The authority accepted the vote; the store holds its canonical answer.
    Confirmed(VoteView),
    /// The vote failed and the store was restored to the pre-vote snapshot.
    RolledBack { view: VoteView, error: VoteError },
    /// The view was closed before the answer arrived; nothing was applied.
    Discarded,
}

/// Handle to a dispatched vote. Dropping it does not cancel the vote.
#[derive(Debug)]
pub struct VoteTicket {
    pub subject_id: String,
    /// State applied optimistically when the vote was cast.
    pub optimistic: VoteView,
    handle: JoinHandle<Resolution>,
}

impl VoteTicket {
    /// Wait for the authority's answer to be applied.
    pub async fn settled(self) -> Resolution {
        self.handle.await.unwrap_or(Resolution::Discarded)
    }
}

struct EngineInner {
    store: VoteStore,
    authority: Arc<dyn VoteAuthority>,
    session: Session,
    timeout: Duration,
    open: AtomicBool,
    notices: broadcast::Sender<VoteNotice>,
}

/// Vote reconciliation engine for one user session.
///
/// Cheap to clone; clones share the store, the session and the liveness flag.
#[derive(Clone)]
pub struct VoteEngine {
    inner: Arc<EngineInner>,
}

impl VoteEngine {
    pub fn new(authority: Arc<dyn VoteAuthority>, session: Session) -> Self {
        Self::with_store(VoteStore::new(), authority, session, DEFAULT_VOTE_TIMEOUT)
    }

    pub fn from_config(
        config: &Config,
        authority: Arc<dyn VoteAuthority>,
        session: Session,
    ) -> Self {
        Self::with_store(VoteStore::new(), authority, session, config.vote_timeout)
    }

    /// Build an engine over an existing store, e.g. one the views already hold.
    ///
    /// Closing this engine does not strand the shared store: a vote still in
    /// flight at that point is returned to its snapshot when it settles.
    pub fn with_store(
        store: VoteStore,
        authority: Arc<dyn VoteAuthority>,
        session: Session,
        timeout: Duration,
    ) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            inner: Arc::new(EngineInner {
                store,
                authority,
                session,
                timeout,
                open: AtomicBool::new(true),
                notices,
            }),
        }
    }

    pub fn store(&self) -> &VoteStore {
        &self.inner.store
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Register a subject the view has loaded. See [`VoteStore::materialize`].
    pub fn materialize(
        &self,
        subject_id: &str,
        tally: u64,
        direction: VoteDirection,
    ) -> bool {
        self.inner.store.materialize(subject_id, tally, direction)
    }

    pub fn view(&self, subject_id: &str) -> Option<VoteView> {
        self.inner.store.view(subject_id)
    }

    pub fn subscribe(&self, subject_id: &str) -> Option<watch::Receiver<VoteView>> {
        self.inner.store.subscribe(subject_id)
    }

    /// Failure notices to surface to the user.
    pub fn notices(&self) -> broadcast::Receiver<VoteNotice> {
        self.inner.notices.subscribe()
    }

    /// Mark the owning view as gone. Answers arriving later are dropped.
    ///
    /// Once this returns, no answer from this engine touches the store.
    pub fn close(&self) {
        if self.inner.open.swap(false, Ordering::SeqCst) {
            self.inner.store.barrier();
            tracing::debug!("Vote engine closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// Fetch a subject's canonical state from the authority and materialize it.
    ///
    /// Returns the state now held by the store. A read overtaken by a vote or
    /// a newer refresh is not applied, and a pending vote keeps its optimistic
    /// state.
    pub async fn load(&self, subject_id: &str) -> Result<VoteView, VoteError> {
        let seen = self.inner.store.version(subject_id);
        let canonical = tokio::time::timeout(
            self.inner.timeout,
            self.inner.authority.fetch(&self.inner.session, subject_id),
        )
        .await
        .unwrap_or(Err(VoteError::Timeout(self.inner.timeout)))?;

        let fetched = VoteView::new(canonical.tally(), canonical.user_vote);
        let applied = self.inner.store.refresh(
            subject_id,
            fetched.tally,
            fetched.direction,
            seen,
            &self.inner.open,
        );
        if !applied {
            tracing::debug!("Stale read of {} not applied", subject_id);
        }
        Ok(self.inner.store.view(subject_id).unwrap_or(fetched))
    }

    /// Cast a toggle vote.
    ///
    /// The optimistic state is visible to every subscriber before this returns.
    /// The round-trip runs on a spawned task; await the ticket to observe it.
    pub fn cast_vote(
        &self,
        subject_id: &str,
        action: VoteAction,
    ) -> Result<VoteTicket, CastRejected> {
        if !self.is_open() {
            return Err(CastRejected::Closed);
        }
        if !self.inner.session.can_vote() {
            tracing::debug!("Guest vote on {} refused", subject_id);
            return Err(CastRejected::Guest);
        }

        let optimistic = self.inner.store.begin(subject_id, action)?;
        tracing::debug!(
            "Vote {} on {} dispatched, optimistic tally {} ({:?})",
            action.as_str(),
            subject_id,
            optimistic.tally,
            optimistic.direction
        );

        let engine = self.clone();
        let id = subject_id.to_string();
        let handle = tokio::spawn(async move { engine.reconcile(&id, action).await });

        Ok(VoteTicket {
            subject_id: subject_id.to_string(),
            optimistic,
            handle,
        })
    }

    async fn reconcile(&self, subject_id: &str, action: VoteAction) -> Resolution {
        let outcome = tokio::time::timeout(
            self.inner.timeout,
            self.inner
                .authority
                .cast(&self.inner.session, subject_id, action),
        )
        .await
        .unwrap_or(Err(VoteError::Timeout(self.inner.timeout)));

        let live = &self.inner.open;
        match outcome {
            Ok(canonical) => match self.inner.store.confirm(subject_id, canonical, live) {
                Some(view) => {
                    tracing::debug!(
                        "Vote on {} confirmed: tally {} ({:?})",
                        subject_id,
                        view.tally,
                        view.direction
                    );
                    Resolution::Confirmed(view)
                }
                None => {
                    tracing::debug!("Dropping vote answer for {}", subject_id);
                    Resolution::Discarded
                }
            },
            Err(error) => {
                let Some(view) = self.inner.store.roll_back(subject_id, live) else {
                    tracing::debug!("Dropping failed vote on {}: {}", subject_id, error);
                    return Resolution::Discarded;
                };
                tracing::warn!("Vote on {} rolled back: {}", subject_id, error);
                // No receivers just means no view is listening for notices.
                let _ = self.inner.notices.send(VoteNotice {
                    subject_id: subject_id.to_string(),
                    kind: error.kind(),
                    message: VOTE_FAILED_MESSAGE.to_string(),
                });
                Resolution::RolledBack { view, error }
            }
        }
    }
}
