//! Issue report models exposed by the reference vote authority.

use serde::{Deserialize, Serialize};

use super::VoteDirection;

/// Vote-relevant view of an issue report, as seen by one caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IssueSummary {
    pub issue_id: String,
    pub title: String,
    /// Displayed tally. Counts upvotes only.
    pub upvotes: i64,
    /// Tracked separately for reporting; never subtracted from `upvotes`.
    pub downvotes: i64,
    #[serde(default)]
    pub user_vote: VoteDirection,
    pub created_at: String,
}

/// Request body for registering an issue with the authority.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIssueRequest {
    #[serde(default)]
    pub issue_id: Option<String>,
    pub title: String,
}
