//! Ctrl+C delivery for the terminal front ends.

use std::io;

use tokio::sync::mpsc;
use tracing::debug;

/// Stream of Ctrl+C presses.
///
/// A single OS listener is registered when the stream is created and stays
/// registered for the rest of the run, so a press that lands while nobody is
/// polling is queued instead of lost.
pub struct Interrupts {
    presses: mpsc::UnboundedReceiver<()>,
}

impl Interrupts {
    /// Register the process-wide Ctrl+C listener. Must be called inside a
    /// Tokio runtime.
    pub fn listen() -> io::Result<Self> {
        #[cfg(unix)]
        let mut signal =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
        #[cfg(windows)]
        let mut signal = tokio::signal::windows::ctrl_c()?;

        let (sender, presses) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while signal.recv().await.is_some() {
                debug!("interrupt received");
                if sender.send(()).is_err() {
                    break;
                }
            }
        });
        Ok(Self { presses })
    }

    /// Interrupts fed by hand through the returned sender.
    #[cfg(test)]
    pub(crate) fn manual() -> (mpsc::UnboundedSender<()>, Self) {
        let (sender, presses) = mpsc::unbounded_channel();
        (sender, Self { presses })
    }

    /// Wait for the next press. Returns `None` once no more presses can
    /// arrive.
    pub async fn next(&mut self) -> Option<()> {
        self.presses.recv().await
    }
}
