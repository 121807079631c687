//! Site configuration.
//!
//! Environment variables with sensible defaults; `default()` is intended
//! for tests and embedded deployments that configure in code.

use sedge_core::constants::DEFAULT_CAS_RETRY_DELAY_MS;
use sedge_core::constants::DEFAULT_MAX_CAS_RETRIES;
use sedge_core::constants::DEFAULT_RECORD_GRACE_SECONDS;
use snafu::Snafu;

/// Largest permitted grace period. The grace only needs to cover
/// deregistration processing after the final binding expires.
const MAX_GRACE_SECONDS: i64 = 60;

/// Configuration errors raised while loading from the environment.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// An environment variable held an unusable value.
    #[snafu(display("invalid value for {key}: '{value}' ({reason})"))]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Configuration for one site's record manager.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Identifier of this site, used in logging.
    pub site_id: String,
    /// Slack added to a record's last expiry when deriving its stored TTL.
    pub grace_seconds: i64,
    /// Compare-and-swap attempts before a contended write loop gives up.
    pub max_cas_retries: u32,
    /// Base delay between contended write attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Callback URI handed to the timer broker; the broker POSTs timer
    /// pops back to it.
    pub timer_callback_uri: String,
    /// Base URL of the timer broker's REST interface.
    pub timer_broker_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_id: "local".to_string(),
            grace_seconds: DEFAULT_RECORD_GRACE_SECONDS,
            max_cas_retries: DEFAULT_MAX_CAS_RETRIES,
            retry_delay_ms: DEFAULT_CAS_RETRY_DELAY_MS,
            timer_callback_uri: "http://localhost:9888/timers/pop".to_string(),
            timer_broker_url: "http://localhost:7253".to_string(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from `SEDGE_*` environment variables, falling
    /// back to defaults for anything unset.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let grace_seconds = parse_var("SEDGE_GRACE_SECONDS", defaults.grace_seconds)?;
        if !(0..=MAX_GRACE_SECONDS).contains(&grace_seconds) {
            return Err(ConfigError::InvalidValue {
                key: "SEDGE_GRACE_SECONDS".to_string(),
                value: grace_seconds.to_string(),
                reason: format!("must be between 0 and {MAX_GRACE_SECONDS}"),
            });
        }

        Ok(Self {
            site_id: std::env::var("SEDGE_SITE_ID").unwrap_or(defaults.site_id),
            grace_seconds,
            max_cas_retries: parse_var("SEDGE_MAX_CAS_RETRIES", defaults.max_cas_retries)?,
            retry_delay_ms: parse_var("SEDGE_CAS_RETRY_DELAY_MS", defaults.retry_delay_ms)?,
            timer_callback_uri: std::env::var("SEDGE_TIMER_CALLBACK_URI").unwrap_or(defaults.timer_callback_uri),
            timer_broker_url: std::env::var("SEDGE_TIMER_BROKER_URL").unwrap_or(defaults.timer_broker_url),
        })
    }

    /// A config with the given site id and everything else defaulted.
    pub fn for_site(site_id: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            ..Self::default()
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where T::Err: std::fmt::Display {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
            reason: e.to_string(),
        }),
    }
}
