use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::modes::Mode;

/// Unique identifier of a conversation entry, stable for the whole session.
pub type EntryKey = String;

/// A user submission recorded as its own history item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptEntry {
    pub key: EntryKey,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A model response. `text` only grows while the entry is in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub key: EntryKey,
    pub mode: Mode,
    pub question: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub info: GenerationInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConversationEntry {
    Prompt(PromptEntry),
    Chat(ChatEntry),
}

impl ConversationEntry {
    pub fn key(&self) -> &str {
        match self {
            ConversationEntry::Prompt(entry) => &entry.key,
            ConversationEntry::Chat(entry) => &entry.key,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            ConversationEntry::Prompt(entry) => &entry.text,
            ConversationEntry::Chat(entry) => &entry.text,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            ConversationEntry::Prompt(entry) => entry.created_at,
            ConversationEntry::Chat(entry) => entry.created_at,
        }
    }

    pub fn as_chat(&self) -> Option<&ChatEntry> {
        match self {
            ConversationEntry::Chat(entry) => Some(entry),
            ConversationEntry::Prompt(_) => None,
        }
    }
}

/// Server-reported statistics of a finished generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSuccess {
    /// Human readable note about how the generation ended; empty on a normal stop.
    pub description: String,
    pub completed_at: DateTime<Utc>,
    pub done_reason: String,
    /// Durations are nanoseconds, counts are tokens.
    pub total_duration: u64,
    pub load_duration: u64,
    pub prompt_eval_count: u64,
    pub prompt_eval_duration: u64,
    pub eval_count: u64,
    pub eval_duration: u64,
}

impl GenerationSuccess {
    /// Result used when the stream ends without a `done` record.
    pub fn unknown(completed_at: DateTime<Utc>) -> Self {
        Self {
            description: "Unknown generation information".to_string(),
            completed_at,
            done_reason: "unknown".to_string(),
            total_duration: 0,
            load_duration: 0,
            prompt_eval_count: 0,
            prompt_eval_duration: 0,
            eval_count: 0,
            eval_duration: 0,
        }
    }

    pub fn tokens_per_second(&self) -> Option<f64> {
        if self.eval_duration == 0 {
            return None;
        }
        Some(self.eval_count as f64 / (self.eval_duration as f64 / 1_000_000_000.0))
    }
}

/// Coarse origin of a failed generation, decided once at the client boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Connection refused, bad URL, dropped connection.
    Transport,
    /// Unexpected HTTP status, empty body, server-reported error record.
    Protocol,
    /// A stream record that is not a valid chunk.
    Decode,
    /// Cancelled by the user.
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub description: String,
    pub completed_at: DateTime<Utc>,
    pub kind: FailureKind,
}

impl GenerationFailure {
    pub fn new(kind: FailureKind, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            completed_at: Utc::now(),
            kind,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.kind == FailureKind::Aborted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum GenerationInfo {
    Generating,
    Success(GenerationSuccess),
    Failure(GenerationFailure),
}

impl GenerationInfo {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GenerationInfo::Generating)
    }

}
