use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Upper bound on the number of answers a poll may carry.
pub const MAX_OPTIONS: usize = 10;

/// Zero never names a live poll, so decoding rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct PollId(pub u64);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("poll id must be non-zero")]
pub struct ZeroPollId;

impl TryFrom<u64> for PollId {
    type Error = ZeroPollId;

    fn try_from(id: u64) -> Result<Self, Self::Error> {
        if id == 0 { Err(ZeroPollId) } else { Ok(Self(id)) }
    }
}

impl From<PollId> for u64 {
    fn from(id: PollId) -> Self {
        id.0
    }
}

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The message hosting a poll; reload requests are addressed to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chat_id, self.message_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default = "default_loaded")]
    pub loaded: bool,
}

fn default_loaded() -> bool {
    true
}

/// Bit set over the poll's boolean properties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct PollFlags(u8);

impl PollFlags {
    pub const CLOSED: Self = Self(1 << 0);
    pub const PUBLIC_VOTES: Self = Self(1 << 1);
    pub const MULTI_CHOICE: Self = Self(1 << 2);
    pub const QUIZ: Self = Self(1 << 3);

    const ALL: u8 = 0b1111;

    pub const fn empty() -> Self {
        Self(0)
    }

    /// Unknown bits are dropped.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn set(&mut self, other: Self, value: bool) {
        if value {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }

    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl From<u8> for PollFlags {
    fn from(bits: u8) -> Self {
        Self::from_bits_truncate(bits)
    }
}

impl From<PollFlags> for u8 {
    fn from(flags: PollFlags) -> Self {
        flags.bits()
    }
}

impl std::ops::BitOr for PollFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.with(rhs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollAnswer {
    pub option: Vec<u8>,
    pub text: String,
    pub votes: u32,
    pub chosen: bool,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerDefinition {
    pub option: Vec<u8>,
    pub text: String,
}

/// Full poll shape as pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub id: PollId,
    pub question: String,
    #[serde(default)]
    pub flags: PollFlags,
    pub answers: Vec<AnswerDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerVoters {
    pub option: Vec<u8>,
    pub votes: u32,
    #[serde(default)]
    pub chosen: bool,
    #[serde(default)]
    pub correct: bool,
}

/// Incremental results push. `min` marks a partial view that cannot be
/// trusted for the viewer's own choice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Results {
    #[serde(default)]
    pub total_voters: Option<u32>,
    #[serde(default)]
    pub answers: Vec<AnswerVoters>,
    #[serde(default)]
    pub recent_voters: Option<Vec<UserId>>,
    #[serde(default)]
    pub min: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_toggle_independently() {
        let mut flags = PollFlags::QUIZ | PollFlags::PUBLIC_VOTES;
        assert!(flags.contains(PollFlags::QUIZ));
        assert!(!flags.contains(PollFlags::CLOSED));

        flags.set(PollFlags::CLOSED, true);
        flags.set(PollFlags::QUIZ, false);
        assert!(flags.contains(PollFlags::CLOSED));
        assert!(flags.contains(PollFlags::PUBLIC_VOTES));
        assert!(!flags.contains(PollFlags::QUIZ));
    }

    #[test]
    fn unknown_flag_bits_are_dropped() {
        let flags = PollFlags::from_bits_truncate(0xff);
        assert_eq!(flags.bits(), 0b1111);

        let decoded: PollFlags = serde_json::from_str("25").unwrap();
        assert_eq!(decoded, PollFlags::CLOSED | PollFlags::QUIZ);
    }

    #[test]
    fn zero_poll_id_is_not_decoded() {
        assert!(serde_json::from_str::<PollId>("0").is_err());
        assert_eq!(serde_json::from_str::<PollId>("17").unwrap(), PollId(17));
        assert_eq!(PollId::try_from(0), Err(ZeroPollId));
    }

    #[test]
    fn results_fields_default_when_missing() {
        let results: Results = serde_json::from_str(r#"{"answers":[{"option":[1],"votes":3}]}"#)
            .unwrap();
        assert_eq!(results.total_voters, None);
        assert_eq!(results.recent_voters, None);
        assert!(!results.min);
        assert!(!results.answers[0].chosen);
    }
}
