//! Configuration for the tokio-backed dispatchers.

use std::time::Duration;

/// Environment variable read by [`DispatcherConfig::from_env`] for the concurrency level.
pub const ENV_CONCURRENCY: &str = "COURIER_DISPATCH_CONCURRENCY";
/// Environment variable read by [`DispatcherConfig::from_env`] for the shutdown timeout.
///
/// The value is in milliseconds; `0` waits without a timeout.
pub const ENV_SHUTDOWN_TIMEOUT_MS: &str = "COURIER_SHUTDOWN_TIMEOUT_MS";

/// Configuration shared by the dispatcher variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Maximum number of consumer callbacks a concurrent dispatcher runs at once.
    ///
    /// Always at least 1. The sequential dispatcher ignores this setting.
    ///
    /// Default: 1
    pub concurrency: usize,

    /// How long shutdown waits for consumer notifications and for queued and in-flight callbacks
    /// to finish. One deadline covers both.
    ///
    /// When the timeout elapses, consumers not yet notified are reported as failed, shutdown fails
    /// with
    /// [`DispatchError::ShutdownTimeout`](courier_core::DispatchError::ShutdownTimeout) and the
    /// worker is left to finish on its own. `None` waits indefinitely.
    ///
    /// Default: 30 seconds
    pub shutdown_timeout: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            shutdown_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl DispatcherConfig {
    /// Sets the concurrency level. Values below 1 are raised to 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Sets the shutdown timeout. `None` waits indefinitely.
    pub fn with_shutdown_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Builds a configuration from the process environment, starting from the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_CONCURRENCY) {
            let concurrency = parse::<usize>(ENV_CONCURRENCY, &value)?;
            if concurrency == 0 {
                return Err(ConfigError::Invalid {
                    variable: ENV_CONCURRENCY,
                    value,
                });
            }
            config.concurrency = concurrency;
        }

        if let Some(value) = lookup(ENV_SHUTDOWN_TIMEOUT_MS) {
            let millis = parse::<u64>(ENV_SHUTDOWN_TIMEOUT_MS, &value)?;
            config.shutdown_timeout = match millis {
                0 => None,
                millis => Some(Duration::from_millis(millis)),
            };
        }

        log::debug!("Loaded dispatcher configuration: {:?}", config);
        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(variable: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        variable,
        value: value.to_string(),
    })
}

/// Errors raised while loading a [`DispatcherConfig`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable holds a value that cannot be used.
    #[error("Invalid value '{value}' for {variable}")]
    Invalid {
        /// The offending variable
        variable: &'static str,
        /// The value it holds
        value: String,
    },
}
