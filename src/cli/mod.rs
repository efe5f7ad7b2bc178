//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod ask;
pub mod chat;
pub mod interrupt;
pub mod render;
pub mod settings;

use std::error::Error;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::cli::ask::run_ask;
use crate::cli::chat::run_chat;
use crate::cli::settings::{run_set, run_show, run_unset};
use crate::core::config::data::{Config, ServerSettings};
use crate::core::config::validation::{
    parse_seed, parse_temperature, validate_base_url, validate_model, ValidationError,
};
use crate::core::config::SettingsStore;
use crate::core::modes::Mode;
use crate::core::session::ChatSession;
use crate::utils::logging::init_tracing;

#[derive(Parser)]
#[command(name = "adricopilot")]
#[command(version)]
#[command(about = "A terminal chat client for Ollama-compatible generation servers")]
#[command(
    long_about = "adricopilot streams answers from a local model server that speaks the \
Ollama /api/generate protocol. Each question is answered in one of four modes: \
general, physics, javascript or grader.\n\n\
Controls (chat):\n\
  Enter             Send the question in the current mode\n\
  Ctrl+C            Cancel the running generation (quit when idle)\n\n\
Commands (chat):\n\
  /mode <name>      Switch mode\n\
  /history          Show the conversation so far\n\
  /note <text>      Add a note to the conversation without generating\n\
  /help             Show this list\n\
  /quit             Exit\n\n\
Logging goes to stderr. Use -v (repeatable) or RUST_LOG to raise the level."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Server base URL for this run, e.g. http://localhost:11434/api/
    #[arg(long, global = true, value_name = "URL")]
    pub url: Option<String>,

    /// Model to use for this run
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Sampling seed for this run
    #[arg(long, global = true, value_name = "SEED")]
    pub seed: Option<String>,

    /// Sampling temperature for this run (0 to 2)
    #[arg(short = 't', long, global = true, value_name = "TEMPERATURE")]
    pub temperature: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive chat (default)
    Chat {
        /// Mode to start in (defaults to the configured mode)
        #[arg(long)]
        mode: Option<Mode>,
    },
    /// Ask a single question and stream the answer to stdout
    Ask {
        /// Mode to answer in (defaults to the configured mode)
        #[arg(long)]
        mode: Option<Mode>,
        /// The question
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        prompt: Vec<String>,
    },
    /// Set a configuration value (url, model, seed, temperature, mode)
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set for the key
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Reset a configuration value to its default
    Unset {
        /// Configuration key to unset
        key: String,
    },
    /// Show the current configuration
    Show,
}

/// Per-run overrides given on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub url: Option<String>,
    pub model: Option<String>,
    pub seed: Option<String>,
    pub temperature: Option<String>,
}

impl Overrides {
    fn from_args(args: &Args) -> Self {
        Self {
            url: args.url.clone(),
            model: args.model.clone(),
            seed: args.seed.clone(),
            temperature: args.temperature.clone(),
        }
    }

    /// Settings for this run: the stored config with every override applied.
    /// Overrides are validated with the same rules as `set`.
    pub fn apply(&self, config: &Config) -> Result<ServerSettings, ValidationError> {
        let mut settings = config.server_settings();
        if let Some(url) = &self.url {
            validate_base_url(url)?;
            settings.base_url = url.trim().to_string();
        }
        if let Some(model) = &self.model {
            validate_model(model)?;
            settings.model = model.trim().to_string();
        }
        if let Some(seed) = &self.seed {
            settings.seed = parse_seed(seed)?;
        }
        if let Some(temperature) = &self.temperature {
            settings.temperature = parse_temperature(temperature)?;
        }
        Ok(settings)
    }
}

/// Parse the command line and run the chosen command. The returned status
/// is the process exit code.
pub fn main() -> Result<ExitCode, Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<ExitCode, Box<dyn Error>> {
    let overrides = Overrides::from_args(&args);
    let store = SettingsStore::open_default()?;

    match args.command.unwrap_or(Commands::Chat { mode: None }) {
        Commands::Chat { mode } => {
            let (session, default_mode) = open_session(&store, &overrides)?;
            run_chat(session, mode.unwrap_or(default_mode)).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Ask { mode, prompt } => {
            let (session, default_mode) = open_session(&store, &overrides)?;
            let mode = mode.unwrap_or(default_mode);
            let succeeded = run_ask(session, mode, &prompt.join(" ")).await?;
            Ok(exit_status(succeeded))
        }
        Commands::Set { key, value } => run_set(&store, &key, &value.join(" ")),
        Commands::Unset { key } => run_unset(&store, &key),
        Commands::Show => {
            run_show(&store)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn exit_status(succeeded: bool) -> ExitCode {
    if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn open_session(
    store: &SettingsStore,
    overrides: &Overrides,
) -> Result<(ChatSession, Mode), Box<dyn Error>> {
    let config = store.load()?;
    let settings = overrides.apply(&config)?;
    Ok((ChatSession::new(settings)?, config.mode()))
}
