//! Failures seen by the voting engine.

use std::time::Duration;

/// How a failed vote is presented to the user. Both kinds roll back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The authority could not be reached, or did not answer in time.
    NetworkFailure,
    /// The authority answered but refused the vote.
    RejectedByAuthority,
}

/// A failed round-trip to the vote authority.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoteError {
    #[error("vote authority unreachable: {0}")]
    Network(String),
    #[error("vote authority did not answer within {0:?}")]
    Timeout(Duration),
    #[error("vote rejected by authority ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed authority response: {0}")]
    Malformed(String),
}

impl VoteError {
    pub fn kind(&self) -> FailureKind {
        match self {
            VoteError::Network(_) | VoteError::Timeout(_) => FailureKind::NetworkFailure,
            VoteError::Rejected { .. } | VoteError::Malformed(_) => {
                FailureKind::RejectedByAuthority
            }
        }
    }
}

impl From<reqwest::Error> for VoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            VoteError::Malformed(err.to_string())
        } else {
            VoteError::Network(err.to_string())
        }
    }
}

/// A vote action refused before any state changed or any request was sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CastRejected {
    #[error("guests cannot vote")]
    Guest,
    #[error("subject {0} is not loaded")]
    UnknownSubject(String),
    #[error("a vote on {0} is still being reconciled")]
    Busy(String),
    #[error("the voting view has been closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kinds() {
        assert_eq!(
            VoteError::Network("refused".into()).kind(),
            FailureKind::NetworkFailure
        );
        assert_eq!(
            VoteError::Timeout(Duration::from_secs(10)).kind(),
            FailureKind::NetworkFailure
        );
        assert_eq!(
            VoteError::Rejected {
                status: 404,
                message: "gone".into()
            }
            .kind(),
            FailureKind::RejectedByAuthority
        );
    }
}
