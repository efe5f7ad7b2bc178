use tracing_subscriber::EnvFilter;

/// Default filter directive for a `-v` count.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "adricopilot=warn",
        1 => "adricopilot=info",
        2 => "adricopilot=debug",
        _ => "adricopilot=trace",
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// verbosity flag. Logs go to stderr; stdout carries generated text.
pub fn init_tracing(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
