/*!
 * Engine Configuration
 *
 * Tunables for snapshotting and seeking, with presets and environment overrides.
 */

use crate::core::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Events between two state snapshots of one trace
pub const DEFAULT_SAVE_INTERVAL: u64 = 50_000;

/// Growth factor of the backward seek window
pub const DEFAULT_BACKWARD_SEEK_MULTIPLIER: u32 = 2;

/// First backward seek window when the caller has no better estimate
pub const DEFAULT_SEEK_OFFSET: Duration = Duration::from_millis(1);

pub const ENV_SAVE_INTERVAL: &str = "TRACEMERGE_SAVE_INTERVAL";
pub const ENV_SEEK_MULTIPLIER: &str = "TRACEMERGE_SEEK_MULTIPLIER";
pub const ENV_SEEK_OFFSET_NS: &str = "TRACEMERGE_SEEK_OFFSET_NS";

/// Engine tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Events observed per trace between two saved states (default: 50 000)
    pub save_interval: u64,

    /// Backward seek window growth per retry (default: 2, must be > 1)
    pub backward_seek_multiplier: u32,

    /// Initial backward seek window (default: 1ms)
    pub default_seek_offset: Duration,
}

impl EngineConfig {
    pub const fn new() -> Self {
        Self {
            save_interval: DEFAULT_SAVE_INTERVAL,
            backward_seek_multiplier: DEFAULT_BACKWARD_SEEK_MULTIPLIER,
            default_seek_offset: DEFAULT_SEEK_OFFSET,
        }
    }

    /// Frequent snapshots, for short traces and tests
    pub const fn fine_grained() -> Self {
        Self {
            save_interval: 1_000,
            backward_seek_multiplier: 2,
            default_seek_offset: Duration::from_micros(100),
        }
    }

    /// Sparse snapshots, for very large traces where memory matters
    pub const fn sparse() -> Self {
        Self {
            save_interval: 500_000,
            backward_seek_multiplier: 4,
            default_seek_offset: Duration::from_millis(10),
        }
    }

    #[must_use]
    pub const fn with_save_interval(mut self, interval: u64) -> Self {
        self.save_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_seek_multiplier(mut self, multiplier: u32) -> Self {
        self.backward_seek_multiplier = multiplier;
        self
    }

    /// Defaults overridden by `TRACEMERGE_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(raw) = lookup(ENV_SAVE_INTERVAL) {
            config.save_interval = parse_positive(ENV_SAVE_INTERVAL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SEEK_MULTIPLIER) {
            let value = parse_positive(ENV_SEEK_MULTIPLIER, &raw)?;
            config.backward_seek_multiplier = u32::try_from(value)
                .ok()
                .filter(|m| *m > 1)
                .ok_or_else(|| invalid(ENV_SEEK_MULTIPLIER, &raw))?;
        }
        if let Some(raw) = lookup(ENV_SEEK_OFFSET_NS) {
            config.default_seek_offset =
                Duration::from_nanos(parse_positive(ENV_SEEK_OFFSET_NS, &raw)?);
        }

        Ok(config)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| invalid(key, raw))
}

fn invalid(key: &str, raw: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.into(),
        value: raw.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.save_interval, 50_000);
        assert_eq!(config.backward_seek_multiplier, 2);
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_SAVE_INTERVAL, "100"),
            (ENV_SEEK_MULTIPLIER, "3"),
            (ENV_SEEK_OFFSET_NS, "250"),
        ]))
        .unwrap();
        assert_eq!(config.save_interval, 100);
        assert_eq!(config.backward_seek_multiplier, 3);
        assert_eq!(config.default_seek_offset, Duration::from_nanos(250));
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(EngineConfig::from_lookup(lookup(&[(ENV_SAVE_INTERVAL, "0")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[(ENV_SAVE_INTERVAL, "many")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[(ENV_SEEK_MULTIPLIER, "1")])).is_err());
    }
}
