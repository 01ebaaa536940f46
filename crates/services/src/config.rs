use std::env;
use std::str::FromStr;
use std::time::Duration;

use assess_core::model::default_snapshot_ttl;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(45 * 60);

/// Where the assessment service lives and how long to wait for it.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl ApiConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::BaseUrl` if `base_url` is not an absolute URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let trimmed = base_url.trim();
        // A trailing slash keeps relative endpoint joins under any path prefix.
        let normalized = if trimmed.ends_with('/') {
            trimmed.to_owned()
        } else {
            format!("{trimmed}/")
        };
        Ok(Self {
            base_url: Url::parse(&normalized)?,
            timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads `ASSESS_API_BASE_URL` and `ASSESS_API_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unparsable URL or timeout.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`ApiConfig::from_env`] with an injectable variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unparsable URL or timeout.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("ASSESS_API_BASE_URL")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.into());
        let mut config = Self::new(&base_url)?;

        if let Some(raw) = lookup("ASSESS_API_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "ASSESS_API_TIMEOUT_SECS",
                value: raw.clone(),
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

/// How the countdown is sized when a session is resumed after a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerPolicy {
    /// Every start or resume gets the full time limit.
    #[default]
    ResetOnResume,
    /// A resumed session gets the time limit minus the time since it started.
    DeductElapsed,
}

impl FromStr for TimerPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reset" => Ok(TimerPolicy::ResetOnResume),
            "deduct" => Ok(TimerPolicy::DeductElapsed),
            _ => Err(ConfigError::InvalidValue {
                key: "ASSESS_TIMER_POLICY",
                value: s.to_owned(),
            }),
        }
    }
}

/// Session lifecycle knobs.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub time_limit: Duration,
    pub snapshot_ttl: chrono::Duration,
    pub timer_policy: TimerPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            time_limit: DEFAULT_TIME_LIMIT,
            snapshot_ttl: default_snapshot_ttl(),
            timer_policy: TimerPolicy::default(),
        }
    }
}

impl SessionSettings {
    /// Reads `ASSESS_TIMER_POLICY` (`reset` | `deduct`) and
    /// `ASSESS_TIME_LIMIT_MINUTES`, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unparsable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        if let Some(raw) = lookup("ASSESS_TIMER_POLICY") {
            settings.timer_policy = raw.parse()?;
        }
        if let Some(raw) = lookup("ASSESS_TIME_LIMIT_MINUTES") {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|m| *m > 0)
                .and_then(|m| m.checked_mul(60))
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: "ASSESS_TIME_LIMIT_MINUTES",
                    value: raw.clone(),
                })?;
            settings.time_limit = Duration::from_secs(secs);
        }
        Ok(settings)
    }
}
