//! The acting user's identity, as handed to the voting engine by the auth layer.

/// Identity of the user driving a voting view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Option<String>,
    pub is_guest: bool,
    /// Pre-shared key for the vote authority, if it requires one.
    pub api_key: Option<String>,
}

impl Session {
    /// A signed-in user.
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            is_guest: false,
            api_key: None,
        }
    }

    /// An anonymous visitor. Guests can browse but never vote.
    pub fn guest() -> Self {
        Self {
            user_id: None,
            is_guest: true,
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Whether this session may cast votes.
    pub fn can_vote(&self) -> bool {
        !self.is_guest && self.user_id.is_some()
    }
}
