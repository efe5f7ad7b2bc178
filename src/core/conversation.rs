//! The conversation state machine.
//!
//! [`ConversationState`] is the only mutator of conversation history. A
//! generation moves it from `Ready` to `Generating` by creating an in-flight
//! [`ChatEntry`]; tokens grow that entry's text; success or failure moves it
//! into history (or drops it) and returns the state to `Ready`.

use std::collections::HashSet;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::constants::{GENERATION_ALERT_TITLE, KEY_CHARS, KEY_LENGTH};
use crate::core::message::{
    ChatEntry, ConversationEntry, EntryKey, GenerationFailure, GenerationInfo, GenerationSuccess,
    PromptEntry,
};
use crate::core::modes::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Ready,
    Generating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Error,
    Info,
    Success,
    Warning,
}

/// Standalone notification shown when a failure leaves nothing in history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub open: bool,
    pub severity: AlertSeverity,
    pub title: String,
    pub description: String,
}

impl Default for Alert {
    fn default() -> Self {
        Self {
            open: false,
            severity: AlertSeverity::Success,
            title: String::new(),
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversationError {
    #[error("A generation is already in progress")]
    AlreadyGenerating,
}

/// What happened to the in-flight entry when a generation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finalized {
    /// The entry was appended to history under this key.
    Appended(EntryKey),
    /// The entry had no text and was dropped; an alert was raised instead.
    Discarded,
    /// There was no generation in flight.
    NotGenerating,
}

/// Issues entry keys that are unique for the lifetime of a conversation.
#[derive(Debug, Default)]
struct KeyGenerator {
    issued: HashSet<EntryKey>,
    fallback_counter: u64,
}

impl KeyGenerator {
    fn next_key(&mut self) -> EntryKey {
        loop {
            let candidate = self.random_key();
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    fn random_key(&mut self) -> EntryKey {
        let mut key = String::with_capacity(KEY_LENGTH);
        let mut bytes = [0u8; KEY_LENGTH];
        while key.len() < KEY_LENGTH {
            if let Err(err) = getrandom::fill(&mut bytes) {
                warn!(error = %err, "system randomness unavailable, using sequential keys");
                self.fallback_counter += 1;
                return format!("{:0width$}", self.fallback_counter, width = KEY_LENGTH);
            }
            let missing = KEY_LENGTH - key.len();
            key.extend(bytes.iter().filter_map(|byte| key_char(*byte)).take(missing));
        }
        key
    }
}

/// Bytes at or above this bound would favour the first characters of
/// `KEY_CHARS` and are drawn again.
const KEY_BYTE_LIMIT: usize = 256 - 256 % KEY_CHARS.len();

fn key_char(byte: u8) -> Option<char> {
    let index = usize::from(byte);
    (index < KEY_BYTE_LIMIT).then(|| KEY_CHARS[index % KEY_CHARS.len()] as char)
}

#[derive(Debug, Default)]
pub struct ConversationState {
    history: Vec<ConversationEntry>,
    in_flight: Option<ChatEntry>,
    alert: Alert,
    keys: KeyGenerator,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> GenerationStatus {
        if self.in_flight.is_some() {
            GenerationStatus::Generating
        } else {
            GenerationStatus::Ready
        }
    }

    pub fn is_generating(&self) -> bool {
        self.status() == GenerationStatus::Generating
    }

    pub fn history(&self) -> &[ConversationEntry] {
        &self.history
    }

    pub fn in_flight(&self) -> Option<&ChatEntry> {
        self.in_flight.as_ref()
    }

    pub fn alert(&self) -> &Alert {
        &self.alert
    }

    pub fn last_entry(&self) -> Option<&ConversationEntry> {
        self.history.last()
    }

    /// Begin a new in-flight chat entry. Rejected while another generation
    /// is active; history is untouched in that case.
    pub fn start_generation(
        &mut self,
        mode: Mode,
        question: &str,
    ) -> Result<&ChatEntry, ConversationError> {
        if self.in_flight.is_some() {
            warn!(%mode, "rejected generation start while another is in flight");
            return Err(ConversationError::AlreadyGenerating);
        }

        let entry = ChatEntry {
            key: self.keys.next_key(),
            mode,
            question: question.to_string(),
            text: String::new(),
            created_at: Utc::now(),
            info: GenerationInfo::Generating,
        };
        debug!(key = %entry.key, %mode, "generation started");
        Ok(self.in_flight.insert(entry))
    }

    /// Append streamed text to the in-flight entry. Ignored when idle.
    pub fn append_token(&mut self, text: &str) {
        match self.in_flight.as_mut() {
            Some(entry) => entry.text.push_str(text),
            None => debug!("dropping token with no generation in flight"),
        }
    }

    pub fn succeed(&mut self, success: GenerationSuccess) -> Finalized {
        let Some(mut entry) = self.in_flight.take() else {
            return Finalized::NotGenerating;
        };
        entry.info = GenerationInfo::Success(success);
        self.push_finalized(entry)
    }

    /// Finish with a failure. Partial output is kept with the failure
    /// attached; an entry without any text is dropped and an alert raised.
    pub fn fail(&mut self, failure: GenerationFailure) -> Finalized {
        let Some(mut entry) = self.in_flight.take() else {
            return Finalized::NotGenerating;
        };

        if entry.text.is_empty() {
            info!(
                key = %entry.key,
                description = %failure.description,
                "generation failed without output"
            );
            self.alert = Alert {
                open: true,
                severity: AlertSeverity::Error,
                title: GENERATION_ALERT_TITLE.to_string(),
                description: failure.description,
            };
            return Finalized::Discarded;
        }

        entry.info = GenerationInfo::Failure(failure);
        self.push_finalized(entry)
    }

    /// Record a user submission as its own history entry. Allowed at any time.
    pub fn push_prompt(&mut self, text: &str) -> EntryKey {
        let key = self.keys.next_key();
        self.history.push(ConversationEntry::Prompt(PromptEntry {
            key: key.clone(),
            text: text.to_string(),
            created_at: Utc::now(),
        }));
        key
    }

    pub fn close_alert(&mut self) {
        self.alert.open = false;
    }

    fn push_finalized(&mut self, entry: ChatEntry) -> Finalized {
        let key = entry.key.clone();
        debug!(%key, chars = entry.text.len(), "generation finalized");
        self.history.push(ConversationEntry::Chat(entry));
        Finalized::Appended(key)
    }
}
