use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::core::cancellation::CancellationCoordinator;
use crate::core::chat_stream::{
    build_http_client, GenerationEvent, GenerationParams, GenerationService,
};
use crate::core::config::data::ServerSettings;
use crate::core::conversation::{
    Alert, ConversationError, ConversationState, Finalized, GenerationStatus,
};
use crate::core::message::{ChatEntry, ConversationEntry, EntryKey};
use crate::core::modes::Mode;

/// One chat session: the conversation, the active generation's cancellation
/// token, and the background task feeding it.
///
/// The session is the only thing that mutates the conversation; front ends
/// read through the selectors and act through the commands.
pub struct ChatSession {
    settings: ServerSettings,
    client: reqwest::Client,
    conversation: ConversationState,
    cancellation: CancellationCoordinator,
    service: GenerationService,
    events: mpsc::UnboundedReceiver<(GenerationEvent, u64)>,
}

impl ChatSession {
    pub fn new(settings: ServerSettings) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(settings, build_http_client()?))
    }

    pub fn with_client(settings: ServerSettings, client: reqwest::Client) -> Self {
        let (service, events) = GenerationService::new();
        Self {
            settings,
            client,
            conversation: ConversationState::new(),
            cancellation: CancellationCoordinator::new(),
            service,
            events,
        }
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn status(&self) -> GenerationStatus {
        self.conversation.status()
    }

    pub fn history(&self) -> &[ConversationEntry] {
        self.conversation.history()
    }

    pub fn in_flight(&self) -> Option<&ChatEntry> {
        self.conversation.in_flight()
    }

    pub fn alert(&self) -> &Alert {
        self.conversation.alert()
    }

    pub fn close_alert(&mut self) {
        self.conversation.close_alert();
    }

    /// Start generating an answer to `text` in `mode`. Returns the stream id
    /// that tags this generation's events.
    pub fn start_generation(&mut self, mode: Mode, text: &str) -> Result<u64, ConversationError> {
        self.conversation.start_generation(mode, text)?;
        let ticket = self.cancellation.begin();

        info!(
            stream_id = ticket.stream_id,
            %mode,
            model = %self.settings.model,
            "starting generation"
        );

        self.service.spawn_generation(GenerationParams {
            client: self.client.clone(),
            settings: self.settings.clone(),
            props: mode.props(text),
            cancel_token: ticket.token,
            stream_id: ticket.stream_id,
        });
        Ok(ticket.stream_id)
    }

    /// Ask the active generation to stop. The conversation is finalised when
    /// the resulting abort event arrives.
    pub fn cancel_active_generation(&mut self) -> bool {
        self.cancellation.cancel_active()
    }

    /// Whether the active generation was asked to stop and has not finished
    /// yet.
    pub fn is_cancelling(&self) -> bool {
        self.cancellation.is_cancelling()
    }

    pub fn push_prompt(&mut self, text: &str) -> EntryKey {
        self.conversation.push_prompt(text)
    }

    pub fn is_current_stream(&self, stream_id: u64) -> bool {
        self.cancellation.is_current(stream_id)
    }

    /// Apply one event from the generation task. Events of a generation that
    /// is no longer active are dropped. Returns the outcome for terminal
    /// events.
    pub fn apply_event(&mut self, event: GenerationEvent, stream_id: u64) -> Option<Finalized> {
        if !self.is_current_stream(stream_id) {
            debug!(stream_id, "ignoring event from stale generation");
            return None;
        }

        let finalized = match event {
            GenerationEvent::Token(text) => {
                self.conversation.append_token(&text);
                return None;
            }
            GenerationEvent::Completed(success) => self.conversation.succeed(success),
            GenerationEvent::Failed(failure) => self.conversation.fail(failure),
        };
        self.cancellation.finish(stream_id);
        Some(finalized)
    }

    /// Wait for the next event from any generation.
    pub async fn next_event(&mut self) -> Option<(GenerationEvent, u64)> {
        self.events.recv().await
    }

    /// Take `first` plus every event already queued behind it, merging
    /// consecutive tokens of the same generation. Order and final text are
    /// unchanged.
    pub fn drain_pending(&mut self, first: (GenerationEvent, u64)) -> Vec<(GenerationEvent, u64)> {
        let mut drained = vec![first];
        while let Ok((event, stream_id)) = self.events.try_recv() {
            if let Some((GenerationEvent::Token(pending), last_id)) = drained.last_mut() {
                if let GenerationEvent::Token(text) = &event {
                    if *last_id == stream_id {
                        pending.push_str(text);
                        continue;
                    }
                }
            }
            drained.push((event, stream_id));
        }
        drained
    }

    /// Drive the active generation until it is finalised, handing every
    /// applied event to `on_event` first.
    pub async fn run_to_completion<F>(&mut self, mut on_event: F) -> Option<Finalized>
    where
        F: FnMut(&GenerationEvent),
    {
        while self.conversation.is_generating() {
            let (event, stream_id) = self.next_event().await?;
            if !self.is_current_stream(stream_id) {
                continue;
            }
            on_event(&event);
            if let Some(finalized) = self.apply_event(event, stream_id) {
                return Some(finalized);
            }
        }
        None
    }

    #[cfg(test)]
    pub(crate) fn inject_event(&self, event: GenerationEvent, stream_id: u64) {
        self.service.send_for_test(event, stream_id);
    }
}
