//! Issue API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::auth::Caller;
use crate::errors::AppError;
use crate::models::{CreateIssueRequest, IssueSummary};
use crate::AppState;

/// GET /api/issues - List all issues.
pub async fn list_issues(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Vec<IssueSummary>> {
    success(state.ledger.list_issues(caller.user_id()).await)
}

/// GET /api/issues/:id - Get a single issue with the caller's vote.
pub async fn get_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    caller: Caller,
) -> ApiResult<IssueSummary> {
    match state.ledger.get_issue(&id, caller.user_id()).await {
        Some(issue) => success(issue),
        None => Err(AppError::NotFound(format!("Issue {} not found", id))),
    }
}

/// POST /api/issues - Register an issue.
pub async fn create_issue(
    State(state): State<AppState>,
    Json(request): Json<CreateIssueRequest>,
) -> ApiResult<IssueSummary> {
    let issue = state.ledger.create_issue(&request).await?;
    success(issue)
}

/// DELETE /api/issues/:id - Delete an issue and its votes.
pub async fn delete_issue(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.ledger.delete_issue(&id).await?;
    success(())
}
