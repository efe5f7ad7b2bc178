//! Interactive line-oriented chat.

use std::error::Error;
use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::cli::interrupt::Interrupts;
use crate::cli::render::{format_entry, report_outcome, stream_active_generation};
use crate::core::modes::Mode;
use crate::core::session::ChatSession;

/// A line typed at the chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput<'a> {
    Question(&'a str),
    Mode(Option<&'a str>),
    Note(&'a str),
    History,
    Help,
    Quit,
    Unknown(&'a str),
}

pub fn parse_chat_input(line: &str) -> Option<ChatInput<'_>> {
    let input = line.trim();
    if input.is_empty() {
        return None;
    }
    let Some(command) = input.strip_prefix('/') else {
        return Some(ChatInput::Question(input));
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };
    let argument = (!rest.is_empty()).then_some(rest);

    Some(match name {
        "mode" => ChatInput::Mode(argument),
        "note" => match argument {
            Some(text) => ChatInput::Note(text),
            None => ChatInput::Unknown(input),
        },
        "history" => ChatInput::History,
        "help" => ChatInput::Help,
        "quit" | "exit" => ChatInput::Quit,
        _ => ChatInput::Unknown(input),
    })
}

pub async fn run_chat(mut session: ChatSession, mut mode: Mode) -> Result<(), Box<dyn Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut interrupts = Interrupts::listen()?;
    let mut stdout = io::stdout();

    println!(
        "adricopilot · {} · {} mode. Type /help for commands.",
        session.settings().model,
        mode.display_name()
    );

    loop {
        print!("{mode}> ");
        stdout.flush()?;

        let line = tokio::select! {
            _ = interrupts.next() => {
                println!();
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match parse_chat_input(&line) {
            None => {}
            Some(ChatInput::Quit) => break,
            Some(ChatInput::Help) => print_help(),
            Some(ChatInput::History) => print_history(&session),
            Some(ChatInput::Note(text)) => {
                session.push_prompt(text);
            }
            Some(ChatInput::Mode(None)) => {
                let names: Vec<&str> = Mode::ALL.iter().map(|mode| mode.as_str()).collect();
                println!("Current mode: {mode}. Available: {}", names.join(", "));
            }
            Some(ChatInput::Mode(Some(name))) => match name.parse::<Mode>() {
                Ok(new_mode) => {
                    mode = new_mode;
                    println!("Switched to {} mode", mode.display_name());
                }
                Err(err) => eprintln!("❌ {err}"),
            },
            Some(ChatInput::Unknown(command)) => {
                eprintln!("❌ Unknown command: {command}. Type /help for commands.");
            }
            Some(ChatInput::Question(question)) => {
                if let Err(err) = session.start_generation(mode, question) {
                    warn!(error = %err, "could not start generation");
                    eprintln!("❌ {err}");
                    continue;
                }
                let finalized =
                    stream_active_generation(&mut session, &mut interrupts, &mut stdout).await?;
                report_outcome(&mut session, finalized);
            }
        }
    }

    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  /mode [name]   Show or switch the mode (general, physics, javascript, grader)");
    println!("  /history       Show the conversation so far");
    println!("  /note <text>   Add a note without generating");
    println!("  /quit          Exit");
    println!("Ctrl+C cancels a running generation.");
}

fn print_history(session: &ChatSession) {
    if session.history().is_empty() {
        println!("(no messages yet)");
        return;
    }
    for entry in session.history() {
        println!("{}\n", format_entry(entry));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_questions() {
        assert_eq!(
            parse_chat_input("  What is inertia? "),
            Some(ChatInput::Question("What is inertia?"))
        );
        assert_eq!(parse_chat_input("   "), None);
    }

    #[test]
    fn slash_commands_parse() {
        assert_eq!(parse_chat_input("/mode"), Some(ChatInput::Mode(None)));
        assert_eq!(
            parse_chat_input("/mode  physics "),
            Some(ChatInput::Mode(Some("physics")))
        );
        assert_eq!(
            parse_chat_input("/note call the vendor"),
            Some(ChatInput::Note("call the vendor"))
        );
        assert_eq!(parse_chat_input("/note"), Some(ChatInput::Unknown("/note")));
        assert_eq!(parse_chat_input("/history"), Some(ChatInput::History));
        assert_eq!(parse_chat_input("/exit"), Some(ChatInput::Quit));
        assert_eq!(parse_chat_input("/frobnicate"), Some(ChatInput::Unknown("/frobnicate")));
    }
}
