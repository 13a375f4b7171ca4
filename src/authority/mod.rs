//! Clients for the remote vote authority.
//!
//! This module provides:
//! - [`VoteAuthority`] trait abstracting the authority so the engine can be tested
//! - [`HttpAuthority`] production client speaking the `/issues/{id}/upvote` API
//! - [`MockAuthority`] in-memory authority with failure injection for tests and demos

mod http;
mod mock;

pub use http::HttpAuthority;
pub use mock::MockAuthority;

use async_trait::async_trait;

use crate::errors::VoteError;
use crate::models::{Session, VoteAction, VoteResult};

/// The source of truth for vote state.
///
/// Implementations report transport problems as [`VoteError::Network`] and
/// refusals as [`VoteError::Rejected`]; the engine treats both as a rollback.
#[async_trait]
pub trait VoteAuthority: Send + Sync {
    /// Apply a toggle vote and return the canonical result for the session's user.
    async fn cast(
        &self,
        session: &Session,
        subject_id: &str,
        action: VoteAction,
    ) -> Result<VoteResult, VoteError>;

    /// Read the canonical tally and the session user's vote without changing it.
    async fn fetch(&self, session: &Session, subject_id: &str) -> Result<VoteResult, VoteError>;
}
