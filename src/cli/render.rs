//! Plain-text rendering of conversation entries and the streaming loop that
//! prints tokens as they arrive.

use std::io::{self, Write};

use tracing::debug;

use crate::cli::interrupt::Interrupts;
use crate::core::chat_stream::GenerationEvent;
use crate::core::conversation::{Alert, Finalized};
use crate::core::message::{ChatEntry, ConversationEntry, GenerationInfo};
use crate::core::modes::{parse_grader_score, score_to_stars, Mode};
use crate::core::session::ChatSession;

/// One-line summary shown under a finished answer.
pub fn entry_footer(entry: &ChatEntry) -> String {
    match &entry.info {
        GenerationInfo::Generating => "[generating]".to_string(),
        GenerationInfo::Success(success) => {
            let mut parts = Vec::new();
            if !success.description.is_empty() {
                parts.push(success.description.clone());
            }
            if success.eval_count > 0 {
                parts.push(format!("{} tokens", success.eval_count));
            }
            if let Some(rate) = success.tokens_per_second() {
                parts.push(format!("{rate:.1} tok/s"));
            }
            parts.push(success.completed_at.format("%H:%M:%S").to_string());
            format!("[{}]", parts.join(" · "))
        }
        GenerationInfo::Failure(failure) => format!("[⚠ {}]", failure.description),
    }
}

/// Star line for a grader answer, if the answer carries a score.
pub fn grader_rating(entry: &ChatEntry) -> Option<String> {
    if entry.mode != Mode::Grader {
        return None;
    }
    let score = parse_grader_score(&entry.text)?;
    Some(format!("{} ({score}/10)", star_bar(score_to_stars(score))))
}

/// Five-character bar with half-star precision.
pub fn star_bar(stars: f64) -> String {
    let halves = (stars * 2.0).round().clamp(0.0, 10.0) as usize;
    let full = halves / 2;
    let half = halves % 2;
    let mut bar = "★".repeat(full);
    if half == 1 {
        bar.push('⯪');
    }
    bar.push_str(&"☆".repeat(5 - full - half));
    bar
}

pub fn alert_line(alert: &Alert) -> String {
    format!("❌ {}: {}", alert.title, alert.description)
}

/// History view of one entry, headed by the time it was created.
pub fn format_entry(entry: &ConversationEntry) -> String {
    let time = entry.created_at().format("%H:%M:%S");
    match entry {
        ConversationEntry::Prompt(prompt) => format!("{time} 📝 {}", prompt.text),
        ConversationEntry::Chat(chat) => {
            let mut out = format!(
                "{time} [{}] > {}\n",
                chat.mode.display_name(),
                chat.question
            );
            if !chat.text.is_empty() {
                out.push_str(&chat.text);
                out.push('\n');
            }
            if let Some(rating) = grader_rating(chat) {
                out.push_str(&rating);
                out.push('\n');
            }
            out.push_str(&entry_footer(chat));
            out
        }
    }
}

/// Write the active generation's tokens to `out` until it is finalised.
/// Events already queued are written together with one flush. The first
/// interrupt cancels the generation; the abort is reported through the
/// normal terminal event.
pub async fn stream_active_generation<W: Write>(
    session: &mut ChatSession,
    interrupts: &mut Interrupts,
    out: &mut W,
) -> io::Result<Option<Finalized>> {
    while session.conversation().is_generating() {
        let next = tokio::select! {
            Some(()) = interrupts.next(), if !session.is_cancelling() => {
                if session.cancel_active_generation() {
                    debug!("generation cancelled from terminal");
                }
                continue;
            }
            next = session.next_event() => next,
        };

        let Some(first) = next else {
            return Ok(None);
        };
        for (event, stream_id) in session.drain_pending(first) {
            if let GenerationEvent::Token(text) = &event {
                if session.is_current_stream(stream_id) {
                    write!(out, "{text}")?;
                }
            }
            if let Some(finalized) = session.apply_event(event, stream_id) {
                out.flush()?;
                return Ok(Some(finalized));
            }
        }
        out.flush()?;
    }
    Ok(None)
}

/// Print what a finished generation left behind: the footer of the appended
/// entry, or the alert for a discarded one.
pub fn report_outcome(session: &mut ChatSession, finalized: Option<Finalized>) {
    match finalized {
        Some(Finalized::Appended(key)) => {
            let entry = session
                .history()
                .iter()
                .rev()
                .find(|entry| entry.key() == key)
                .and_then(ConversationEntry::as_chat);
            if let Some(entry) = entry {
                println!();
                if let Some(rating) = grader_rating(entry) {
                    println!("{rating}");
                }
                println!("{}", entry_footer(entry));
            }
        }
        Some(Finalized::Discarded) => {
            eprintln!("{}", alert_line(session.alert()));
            session.close_alert();
        }
        Some(Finalized::NotGenerating) | None => {}
    }
}
