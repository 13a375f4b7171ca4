//! In-memory vote ledger backing the reference authority.
//!
//! Holds issues and per-user votes for the lifetime of the process. The
//! displayed tally counts upvotes only; downvotes are kept for reporting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::{CreateIssueRequest, IssueSummary, VoteAction, VoteDirection, VoteResult};

/// What a toggle vote did to the caller's vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChange {
    Added,
    Removed,
    Switched,
}

impl VoteChange {
    /// Human-readable summary returned alongside the vote result.
    pub fn message(&self, action: VoteAction) -> &'static str {
        match (self, action) {
            (VoteChange::Added, VoteAction::Up) => "Issue upvoted",
            (VoteChange::Removed, VoteAction::Up) => "Upvote removed",
            (VoteChange::Switched, VoteAction::Up) => "Changed to upvote",
            (VoteChange::Added, VoteAction::Down) => "Issue downvoted",
            (VoteChange::Removed, VoteAction::Down) => "Downvote removed",
            (VoteChange::Switched, VoteAction::Down) => "Changed to downvote",
        }
    }
}

/// Outcome of a vote: the canonical result plus what changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteReceipt {
    pub result: VoteResult,
    pub change: VoteChange,
}

struct IssueRecord {
    title: String,
    created_at: String,
    seq: u64,
    /// user id -> vote; users without a vote are absent
    votes: HashMap<String, VoteAction>,
}

impl IssueRecord {
    fn upvotes(&self) -> i64 {
        self.count(VoteAction::Up)
    }

    fn downvotes(&self) -> i64 {
        self.count(VoteAction::Down)
    }

    fn count(&self, action: VoteAction) -> i64 {
        self.votes.values().filter(|vote| **vote == action).count() as i64
    }

    fn user_vote(&self, user_id: Option<&str>) -> VoteDirection {
        user_id
            .and_then(|id| self.votes.get(id))
            .map(VoteAction::direction)
            .unwrap_or_default()
    }

    fn summary(&self, issue_id: &str, user_id: Option<&str>) -> IssueSummary {
        IssueSummary {
            issue_id: issue_id.to_string(),
            title: self.title.clone(),
            upvotes: self.upvotes(),
            downvotes: self.downvotes(),
            user_vote: self.user_vote(user_id),
            created_at: self.created_at.clone(),
        }
    }
}

/// Issue and vote storage for the reference authority.
#[derive(Default)]
pub struct VoteLedger {
    issues: RwLock<HashMap<String, IssueRecord>>,
    next_seq: AtomicU64,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an issue. Generates an id when none is given.
    pub async fn create_issue(
        &self,
        request: &CreateIssueRequest,
    ) -> Result<IssueSummary, AppError> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }

        let issue_id = match request.issue_id.as_deref().map(str::trim) {
            Some("") => {
                return Err(AppError::Validation(
                    "Issue id must not be blank".to_string(),
                ))
            }
            Some(id) => id.to_string(),
            None => uuid::Uuid::new_v4().to_string(),
        };

        let mut issues = self.issues.write().await;
        if issues.contains_key(&issue_id) {
            return Err(AppError::Conflict(format!(
                "Issue {} already exists",
                issue_id
            )));
        }

        let record = IssueRecord {
            title: title.to_string(),
            created_at: Utc::now().to_rfc3339(),
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            votes: HashMap::new(),
        };
        let summary = record.summary(&issue_id, None);
        issues.insert(issue_id.clone(), record);

        tracing::info!("Issue registered: {}", issue_id);
        Ok(summary)
    }

    /// List all issues in registration order, with the caller's votes.
    pub async fn list_issues(&self, user_id: Option<&str>) -> Vec<IssueSummary> {
        let issues = self.issues.read().await;
        let mut records: Vec<(&String, &IssueRecord)> = issues.iter().collect();
        records.sort_by_key(|(_, record)| record.seq);
        records
            .into_iter()
            .map(|(id, record)| record.summary(id, user_id))
            .collect()
    }

    /// Get an issue with the caller's vote.
    pub async fn get_issue(&self, issue_id: &str, user_id: Option<&str>) -> Option<IssueSummary> {
        self.issues
            .read()
            .await
            .get(issue_id)
            .map(|record| record.summary(issue_id, user_id))
    }

    /// Delete an issue together with every vote cast on it.
    pub async fn delete_issue(&self, issue_id: &str) -> Result<(), AppError> {
        match self.issues.write().await.remove(issue_id) {
            Some(record) => {
                tracing::info!(
                    "Issue {} deleted with {} votes",
                    issue_id,
                    record.votes.len()
                );
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Issue {} not found", issue_id))),
        }
    }

    /// Apply a toggle vote: repeating a vote removes it, the opposite vote
    /// replaces it, otherwise the vote is added.
    pub async fn vote(
        &self,
        issue_id: &str,
        user_id: &str,
        action: VoteAction,
    ) -> Result<VoteReceipt, AppError> {
        let mut issues = self.issues.write().await;
        let record = issues
            .get_mut(issue_id)
            .ok_or_else(|| AppError::NotFound(format!("Issue {} not found", issue_id)))?;

        let change = match record.votes.get(user_id).copied() {
            Some(current) if current == action => {
                record.votes.remove(user_id);
                VoteChange::Removed
            }
            Some(_) => {
                record.votes.insert(user_id.to_string(), action);
                VoteChange::Switched
            }
            None => {
                record.votes.insert(user_id.to_string(), action);
                VoteChange::Added
            }
        };

        let result = VoteResult {
            upvotes: record.upvotes(),
            user_vote: record.user_vote(Some(user_id)),
        };
        tracing::info!(
            "Vote count updated for issue {}: +{}, -{} ({:?} by {})",
            issue_id,
            result.upvotes,
            record.downvotes(),
            change,
            user_id
        );

        Ok(VoteReceipt { result, change })
    }
}
