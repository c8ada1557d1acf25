use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_level`. Records from the `log` facade are
/// forwarded to the subscriber. Returns `Ok(false)` when a subscriber was
/// already installed, which happens when several tests or embedders race to
/// set one up.
pub fn init_logging(default_level: &str) -> Result<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level)
            .with_context(|| format!("Invalid log level '{}'", default_level))?,
    };

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Logging initialised at '{}'", default_level);
    }
    Ok(installed)
}
