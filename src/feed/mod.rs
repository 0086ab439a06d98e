use crate::models::{Definition, MessageRef, PollId, Results, User};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("line {line}: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read feed: {0}")]
    Io(#[from] std::io::Error),
}

/// One decoded update from the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    Definition(Definition),
    Results {
        poll_id: PollId,
        #[serde(flatten)]
        results: Results,
    },
    User(User),
    /// The poll became visible in a message.
    Shown { poll_id: PollId, message: MessageRef },
    /// The local user closed the poll.
    Close { poll_id: PollId },
}

/// Parses one JSON line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line_number: usize, line: &str) -> Result<Option<FeedEvent>, FeedError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .map_err(|source| FeedError::Decode { line: line_number, source })
}
