//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Environment variable that overrides the configured filter
pub const LOG_ENV: &str = "RELSDK_LOG";

/// Build the filter: `RELSDK_LOG` when set and valid, else the configured
/// level, else `info`.
pub fn filter(config: &LoggingConfig) -> EnvFilter {
    std::env::var(LOG_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(&config.level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Install a global `fmt` subscriber. A no-op when one is already installed,
/// so applications that own their subscriber are left alone.
pub fn init(config: &LoggingConfig) {
    let base = || {
        tracing_subscriber::fmt()
            .with_env_filter(filter(config))
            .with_target(true)
    };

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> =
        if config.format.eq_ignore_ascii_case("json") {
            Box::new(base().json().finish())
        } else {
            Box::new(base().compact().finish())
        };

    let _ = tracing::subscriber::set_global_default(subscriber);
}
