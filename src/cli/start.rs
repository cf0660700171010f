use crate::cli::{actions::Action, commands, dispatch, telemetry};
use anyhow::Result;

/// Start the backend CLI
///
/// # Errors
/// Returns an error if telemetry setup or argument handling fails.
pub fn backend() -> Result<Action> {
    let matches = commands::new().get_matches();

    telemetry::init(verbosity_level(
        matches.get_one::<u8>("verbosity").map_or(0, |&v| v),
    ))?;

    dispatch::backend(&matches)
}

/// Start the gateway CLI
///
/// # Errors
/// Returns an error if telemetry setup or argument handling fails.
pub fn gateway() -> Result<Action> {
    let matches = commands::gateway::new().get_matches();

    telemetry::init(verbosity_level(
        matches.get_one::<u8>("verbosity").map_or(0, |&v| v),
    ))?;

    dispatch::gateway(&matches)
}

fn verbosity_level(verbosity: u8) -> tracing::Level {
    match verbosity {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}
