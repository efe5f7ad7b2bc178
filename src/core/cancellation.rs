use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle for the generation started by [`CancellationCoordinator::begin`].
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    pub stream_id: u64,
    pub token: CancellationToken,
}

/// Tracks the cancellation token of the one active generation.
///
/// Stream ids increase monotonically, so a ticket from a finished generation
/// never matches a newer one.
#[derive(Debug, Default)]
pub struct CancellationCoordinator {
    active: Option<GenerationTicket>,
    current_stream_id: u64,
}

impl CancellationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token for a new generation. Any previous token is cancelled
    /// first.
    pub fn begin(&mut self) -> GenerationTicket {
        self.cancel_active();

        self.current_stream_id += 1;
        let ticket = GenerationTicket {
            stream_id: self.current_stream_id,
            token: CancellationToken::new(),
        };
        self.active = Some(ticket.clone());
        ticket
    }

    /// Signal the generation identified by `stream_id`. Returns `false` when
    /// that generation is not the active one or was already cancelled.
    pub fn cancel(&mut self, stream_id: u64) -> bool {
        match &self.active {
            Some(ticket) if ticket.stream_id == stream_id && !ticket.token.is_cancelled() => {
                debug!(stream_id, "cancelling generation");
                ticket.token.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn cancel_active(&mut self) -> bool {
        match self.active_stream_id() {
            Some(stream_id) => self.cancel(stream_id),
            None => false,
        }
    }

    /// Release the token once the generation has reached a terminal event.
    pub fn finish(&mut self, stream_id: u64) {
        if self.is_current(stream_id) {
            self.active = None;
        }
    }

    pub fn is_current(&self, stream_id: u64) -> bool {
        self.active_stream_id() == Some(stream_id)
    }

    pub fn active_stream_id(&self) -> Option<u64> {
        self.active.as_ref().map(|ticket| ticket.stream_id)
    }

    pub fn is_cancelling(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|ticket| ticket.token.is_cancelled())
    }
}
