//! HTTP client for the vote authority.

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde_json::Value;

use super::VoteAuthority;
use crate::auth::{API_KEY_HEADER, USER_ID_HEADER};
use crate::config::Config;
use crate::errors::VoteError;
use crate::models::{Session, VoteAction, VoteResult};

/// Vote authority reached over HTTP.
///
/// ```ignore
/// let authority = HttpAuthority::new("https://civic.example/api")?;
/// let result = authority.cast(&session, "issue-42", VoteAction::Up).await?;
/// ```
#[derive(Debug, Clone)]
pub struct HttpAuthority {
    base_url: Url,
    client: Client,
}

impl HttpAuthority {
    pub fn new(base_url: &str) -> Result<Self, VoteError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| VoteError::Network(format!("invalid authority url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(VoteError::Network(format!(
                "invalid authority url {base_url}"
            )));
        }
        Ok(Self {
            base_url,
            client: Client::new(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, VoteError> {
        Self::new(&config.authority_url)
    }

    /// `{base}/issues/{id}[/{tail}]`, with the subject id percent-encoded as one segment.
    fn issue_url(&self, subject_id: &str, tail: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("issues").push(subject_id);
            if let Some(tail) = tail {
                segments.push(tail);
            }
        }
        url
    }

    fn with_identity(
        &self,
        request: reqwest::RequestBuilder,
        session: &Session,
    ) -> reqwest::RequestBuilder {
        let mut request = request;
        if let Some(user_id) = &session.user_id {
            request = request.header(USER_ID_HEADER, user_id);
        }
        if let Some(api_key) = &session.api_key {
            request = request.header(API_KEY_HEADER, api_key);
        }
        request
    }
}

#[async_trait]
impl VoteAuthority for HttpAuthority {
    async fn cast(
        &self,
        session: &Session,
        subject_id: &str,
        action: VoteAction,
    ) -> Result<VoteResult, VoteError> {
        let url = self.issue_url(subject_id, Some(action.route_segment()));
        tracing::debug!("POST {}", url);
        let response = self
            .with_identity(self.client.post(url), session)
            .send()
            .await?;
        read_vote_response(response).await
    }

    async fn fetch(&self, session: &Session, subject_id: &str) -> Result<VoteResult, VoteError> {
        let url = self.issue_url(subject_id, None);
        tracing::debug!("GET {}", url);
        let response = self
            .with_identity(self.client.get(url), session)
            .send()
            .await?;
        read_vote_response(response).await
    }
}

async fn read_vote_response(response: Response) -> Result<VoteResult, VoteError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(VoteError::Rejected {
            status: status.as_u16(),
            message: error_message(&body).unwrap_or_else(|| status.to_string()),
        });
    }

    parse_vote_body(status.as_u16(), &body)
}

/// Accepts the `{ success, data, message }` envelope or a bare vote object.
fn parse_vote_body(status: u16, body: &str) -> Result<VoteResult, VoteError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| VoteError::Malformed(e.to_string()))?;

    let payload = match value.get("success").and_then(Value::as_bool) {
        Some(false) => {
            return Err(VoteError::Rejected {
                status,
                message: error_message(body).unwrap_or_else(|| "vote refused".to_string()),
            })
        }
        Some(true) => value.get("data").cloned().unwrap_or(Value::Null),
        None => value,
    };

    serde_json::from_value(payload).map_err(|e| VoteError::Malformed(e.to_string()))
}

fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .or_else(|| value.get("message"))
        .or_else(|| value.get("detail"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
