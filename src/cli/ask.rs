//! One-shot "ask" command

use std::error::Error;
use std::io;

use crate::cli::interrupt::Interrupts;
use crate::cli::render::{report_outcome, stream_active_generation};
use crate::core::conversation::Finalized;
use crate::core::modes::Mode;
use crate::core::session::ChatSession;

/// Stream one answer to stdout. Returns `false` when the generation failed
/// without producing any text.
pub async fn run_ask(
    mut session: ChatSession,
    mode: Mode,
    prompt: &str,
) -> Result<bool, Box<dyn Error>> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        eprintln!("Usage: adricopilot ask <prompt>");
        return Ok(false);
    }

    let mut interrupts = Interrupts::listen()?;
    session.start_generation(mode, prompt)?;
    let finalized =
        stream_active_generation(&mut session, &mut interrupts, &mut io::stdout()).await?;
    let succeeded = !matches!(finalized, Some(Finalized::Discarded) | None);
    report_outcome(&mut session, finalized);
    Ok(succeeded)
}
