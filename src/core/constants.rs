//! Shared constants used across the application

/// Base URL of a stock local Ollama install. `generate` is appended to it.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434/api/";

pub const DEFAULT_MODEL: &str = "llama3:latest";

/// Endpoint path, relative to the configured base URL, for streamed completions.
pub const GENERATE_ENDPOINT: &str = "generate";

/// Alphabet used for conversation entry keys.
pub const KEY_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub const KEY_LENGTH: usize = 12;

/// Largest seed accepted by the settings validation (2^53 - 1, exclusive).
pub const MAX_SEED: u64 = (1 << 53) - 1;

pub const MIN_TEMPERATURE: f64 = 0.0;
pub const MAX_TEMPERATURE: f64 = 2.0;

/// Title of the standalone alert raised when a generation fails without output.
pub const GENERATION_ALERT_TITLE: &str = "Error generating message";

/// Upper bound on how much of a rejected stream line is kept in decode errors.
pub const MAX_ERROR_LINE_CHARS: usize = 120;
