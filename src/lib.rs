//! adricopilot is a terminal client for local model servers that speak the
//! Ollama `/api/generate` streaming protocol.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation state machine, the streaming generation
//!   client, cancellation, answer modes and configuration.
//! - [`api`] defines the request body and the NDJSON records of the
//!   generate endpoint.
//! - [`cli`] parses arguments and runs the interactive chat, one-shot `ask`
//!   and settings commands.
//! - [`utils`] holds URL joining and tracing setup.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`], which builds a [`core::session::ChatSession`]
//! and drives it from the terminal.

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
