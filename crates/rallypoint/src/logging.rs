//! Tracing subscriber setup for the server binary.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::RallypointError;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_level` for the Rallypoint crates.
///
/// Fails if `default_level` is not a valid directive or a global subscriber
/// is already installed.
pub fn init_logging(default_level: &str) -> Result<(), RallypointError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(default_level))
            .map_err(|e| RallypointError::Config(format!("log level: {e}")))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| RallypointError::Config(format!("logging: {e}")))
}

fn default_directives(level: &str) -> String {
    [
        "rallypoint",
        "rallypoint_server",
        "rallypoint_transport",
        "rallypoint_protocol",
        "rallypoint_room",
        "rallypoint_timer",
    ]
    .iter()
    .map(|target| format!("{target}={level}"))
    .collect::<Vec<_>>()
    .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_cover_every_crate() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("rallypoint=debug,"));
        assert!(directives.contains("rallypoint_room=debug"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }
}
