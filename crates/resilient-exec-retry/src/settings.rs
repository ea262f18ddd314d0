//! Retry settings loaded from configuration files.
//!
//! ```
//! use resilient_exec_retry::{RetryOptions, RetrySettings};
//!
//! let settings: RetrySettings = serde_json::from_str(
//!     r#"{ "max_attempts": 5, "backoff": "linear", "base_delay_ms": 250 }"#,
//! )
//! .unwrap();
//!
//! let options = settings
//!     .apply(RetryOptions::<u16, String>::builder())
//!     .and_then(|builder| builder.build())
//!     .unwrap();
//! assert_eq!(options.max_attempts(), 5);
//! ```

use crate::backoff::{BackoffKind, FullJitter};
use crate::config::{RetryOptionsBuilder, MAX_ATTEMPTS_LIMIT};
use resilient_exec_core::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Loosely typed retry configuration, as found in a settings file.
///
/// Missing fields fall back to the builder defaults. Values are checked when
/// applied, so a bad file is reported as a [`ConfigError`] rather than
/// silently clamped.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries after the initial attempt.
    pub max_attempts: Option<i64>,
    /// Backoff curve.
    pub backoff: Option<BackoffKind>,
    /// Base delay in milliseconds.
    pub base_delay_ms: Option<u64>,
    /// Delay cap in milliseconds.
    pub max_delay_ms: Option<u64>,
    /// Enables full jitter.
    pub use_jitter: bool,
    /// Name used in telemetry.
    pub name: Option<String>,
}

impl RetrySettings {
    /// Applies every present setting to `builder`.
    pub fn apply<T, E>(
        &self,
        mut builder: RetryOptionsBuilder<T, E>,
    ) -> Result<RetryOptionsBuilder<T, E>, ConfigError> {
        if let Some(max_attempts) = self.max_attempts {
            builder = builder.max_attempts(checked_attempts(max_attempts)?);
        }
        if let Some(kind) = self.backoff {
            builder = builder.backoff(kind);
        }
        if let Some(ms) = self.base_delay_ms {
            builder = builder.base_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = self.max_delay_ms {
            builder = builder.max_delay(Duration::from_millis(ms));
        }
        if self.use_jitter {
            builder = builder.jitter(FullJitter::new());
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidSetting {
                    name: "name",
                    reason: "must not be blank".to_string(),
                });
            }
            builder = builder.name(name.clone());
        }
        Ok(builder)
    }
}

fn checked_attempts(value: i64) -> Result<u32, ConfigError> {
    if value < 0 {
        return Err(ConfigError::NegativeMaxAttempts(value));
    }
    match u32::try_from(value) {
        Ok(attempts) if attempts <= MAX_ATTEMPTS_LIMIT => Ok(attempts),
        _ => Err(ConfigError::TooManyAttempts {
            got: value.unsigned_abs(),
            max: MAX_ATTEMPTS_LIMIT,
        }),
    }
}
