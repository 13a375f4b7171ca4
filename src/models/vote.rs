//! Vote direction, vote actions and the authority's vote result payload.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// A user's current vote on a subject.
///
/// Serialized the way the vote authority reports it: `"up"`, `"down"` or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VoteDirection {
    #[default]
    None,
    Up,
    Down,
}

impl VoteDirection {
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            VoteDirection::None => None,
            VoteDirection::Up => Some("up"),
            VoteDirection::Down => Some("down"),
        }
    }

    /// Parse a wire value. Accepts the legacy `upvote`/`downvote` spellings.
    pub fn from_wire(value: Option<&str>) -> Option<Self> {
        match value {
            None => Some(VoteDirection::None),
            Some("up") | Some("upvote") => Some(VoteDirection::Up),
            Some("down") | Some("downvote") => Some(VoteDirection::Down),
            Some(_) => None,
        }
    }
}

impl Serialize for VoteDirection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_str() {
            Some(s) => serializer.serialize_str(s),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for VoteDirection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        VoteDirection::from_wire(raw.as_deref()).ok_or_else(|| {
            de::Error::invalid_value(
                de::Unexpected::Str(raw.as_deref().unwrap_or_default()),
                &"\"up\", \"down\" or null",
            )
        })
    }
}

/// A vote a user can cast. Casting the same action twice toggles it off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
    Up,
    Down,
}

impl VoteAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteAction::Up => "up",
            VoteAction::Down => "down",
        }
    }

    /// Route segment on the vote authority (`/issues/{id}/upvote`).
    pub fn route_segment(&self) -> &'static str {
        match self {
            VoteAction::Up => "upvote",
            VoteAction::Down => "downvote",
        }
    }

    /// The direction a user holds after this action is applied from scratch.
    pub fn direction(&self) -> VoteDirection {
        match self {
            VoteAction::Up => VoteDirection::Up,
            VoteAction::Down => VoteDirection::Down,
        }
    }
}

/// Canonical vote state for one (user, subject) pair as reported by the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResult {
    pub upvotes: i64,
    #[serde(default)]
    pub user_vote: VoteDirection,
}

impl VoteResult {
    /// The displayed tally, floored at zero.
    pub fn tally(&self) -> u64 {
        self.upvotes.max(0) as u64
    }
}
