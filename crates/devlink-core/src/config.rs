//! Configuration types for devlink

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::PathBuf;

/// Default lifetime of an issued code (15 minutes)
pub const DEFAULT_CODE_TTL_SECS: u64 = 900;

/// Largest number of raw values a code range may hold
///
/// The generator keeps a shuffled copy of the whole range in memory.
pub const MAX_CODE_RANGE_LEN: u64 = 1_000_000;

/// Main configuration for devlink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Seconds an issued code stays redeemable
    pub code_ttl_secs: u64,
    /// Raw values drawn before the check digit is appended
    pub code_range: RangeInclusive<u32>,
    /// How often expired codes are evicted from the registry
    pub sweep_interval_secs: u64,
    /// Account link storage file (platform data dir if None)
    pub data_file: Option<PathBuf>,
    /// Directory served for static files instead of the embedded assets
    pub public_dir: Option<PathBuf>,
    /// Debug mode: exposes the registry listing at /browse
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            code_ttl_secs: DEFAULT_CODE_TTL_SECS,
            code_range: 1000..=9999,
            sweep_interval_secs: 60,
            data_file: None,
            public_dir: None,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder pattern: set code lifetime
    pub fn with_code_ttl(mut self, secs: u64) -> Self {
        self.code_ttl_secs = secs;
        self
    }

    /// Builder pattern: set the raw code range
    pub fn with_code_range(mut self, range: RangeInclusive<u32>) -> Self {
        self.code_range = range;
        self
    }

    /// Builder pattern: set sweep interval
    pub fn with_sweep_interval(mut self, secs: u64) -> Self {
        self.sweep_interval_secs = secs;
        self
    }

    /// Builder pattern: set link storage file
    pub fn with_data_file(mut self, path: Option<PathBuf>) -> Self {
        self.data_file = path;
        self
    }

    /// Builder pattern: set static file directory
    pub fn with_public_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.public_dir = dir;
        self
    }

    /// Builder pattern: set debug mode
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Check the values that would otherwise break code issuance
    pub fn validate(&self) -> Result<()> {
        if self.code_ttl_secs == 0 {
            return Err(Error::config("code TTL must be at least one second"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(Error::config("sweep interval must be at least one second"));
        }
        if self.code_range.is_empty() {
            return Err(Error::InvalidCodeRange {
                start: *self.code_range.start(),
                end: *self.code_range.end(),
            });
        }
        let len = u64::from(*self.code_range.end()) - u64::from(*self.code_range.start()) + 1;
        if len > MAX_CODE_RANGE_LEN {
            return Err(Error::CodeRangeTooLarge {
                len,
                max: MAX_CODE_RANGE_LEN,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.code_ttl_secs, 900);
        assert_eq!(config.code_range, 1000..=9999);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_ttl() {
        let config = Config::new().with_code_ttl(0);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_oversized_range() {
        let config = Config::new().with_code_range(0..=4_000_000_000);
        assert!(matches!(
            config.validate(),
            Err(Error::CodeRangeTooLarge {
                len: 4_000_000_001,
                max: MAX_CODE_RANGE_LEN,
            })
        ));

        let config = Config::new().with_code_range(0..=999_999);
        assert!(config.validate().is_ok());
        let config = Config::new().with_code_range(0..=1_000_000);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_range() {
        #[allow(clippy::reversed_empty_ranges)]
        let config = Config::new().with_code_range(10..=1);
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidCodeRange { start: 10, end: 1 })
        ));
    }
}
