//! Server settings: what the generation client talks to and how it samples.
//!
//! [`data::Config`] is the on-disk shape, [`store::SettingsStore`] loads and
//! saves it, and [`validation`] holds the field rules shared by the CLI and the
//! loader.

pub mod data;
pub mod io;
pub mod store;
pub mod validation;


pub use data::{Config, ServerSettings};
pub use io::ConfigError;
pub use store::SettingsStore;
pub use validation::{ConfigKey, ValidationError};
