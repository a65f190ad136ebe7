//! Tracing subscriber bootstrap.

use tracing_subscriber::EnvFilter;

use crate::config::{BridgeConfig, LogFormat};

/// Build the env filter: `RUST_LOG` wins, the configured directive otherwise.
pub fn env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Install the global subscriber.
///
/// Safe to call more than once; later calls are ignored (tests call this from
/// several places).
pub fn init(config: &BridgeConfig) {
    let filter = env_filter(&config.log_directive);

    let result = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .compact()
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_does_not_panic() {
        let config = BridgeConfig::default();
        init(&config);
        init(&config);
    }
}
