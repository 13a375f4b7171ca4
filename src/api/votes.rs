//! Vote API endpoints. Both are toggles.

use axum::extract::{Path, State};

use super::{ApiResponse, ApiResult};
use crate::auth::Caller;
use crate::models::{VoteAction, VoteResult};
use crate::AppState;

/// POST /api/issues/:id/upvote - Toggle the caller's upvote.
pub async fn upvote_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    caller: Caller,
) -> ApiResult<VoteResult> {
    cast(&state, &id, &caller, VoteAction::Up).await
}

/// POST /api/issues/:id/downvote - Toggle the caller's downvote.
pub async fn downvote_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    caller: Caller,
) -> ApiResult<VoteResult> {
    cast(&state, &id, &caller, VoteAction::Down).await
}

async fn cast(
    state: &AppState,
    issue_id: &str,
    caller: &Caller,
    action: VoteAction,
) -> ApiResult<VoteResult> {
    let user_id = caller.require()?;
    let receipt = state.ledger.vote(issue_id, user_id, action).await?;
    Ok(ApiResponse::new(receipt.result).with_message(receipt.change.message(action)))
}
