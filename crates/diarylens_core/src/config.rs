//! Store configuration and fixed engine limits.
//!
//! # Responsibility
//! - Resolve the storage location and optional archive secret from the
//!   process environment.
//! - Hold the compile-time resource limits every store handle runs under.
//!
//! # Invariants
//! - Resource limits are constants; nothing at runtime can raise them.
//! - An empty `DB_ZIP_PASSWORD` is treated the same as an unset one.

use std::path::PathBuf;

/// Environment variable naming the store file or archive.
pub const DB_LOCATION_ENV: &str = "DB_LOCATION";
/// Environment variable holding the archive decryption secret.
pub const DB_ZIP_PASSWORD_ENV: &str = "DB_ZIP_PASSWORD";
/// Store location used when `DB_LOCATION` is not set.
pub const DEFAULT_DB_LOCATION: &str = "data/diaries_vec.db.zip";

/// Curated entries a fresh session may start on.
pub const STARTING_ENTRIES: [i64; 20] = [
    94325, 180144, 223688, 239369, 316742, 336627, 380619, 463102, 515346, 565701, 597109,
    646277, 697019, 703364, 706409, 719845, 725211, 739503, 764570, 786819,
];

/// Execution limits applied to every store handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Page cache ceiling in bytes.
    pub memory_limit_bytes: u64,
    /// Threads allowed to work on one statement, the caller's included.
    pub worker_threads: u32,
}

impl ResourceLimits {
    /// Page cache ceiling in KiB, the unit `PRAGMA cache_size` takes.
    pub fn memory_limit_kib(&self) -> i64 {
        i64::try_from(self.memory_limit_bytes / 1024).unwrap_or(i64::MAX)
    }

    /// Auxiliary threads SQLite may spawn on top of the caller's.
    pub fn auxiliary_threads(&self) -> u32 {
        self.worker_threads.saturating_sub(1)
    }
}

/// Limits every handle is opened with: 384 MiB of cache, one worker.
pub const STORE_LIMITS: ResourceLimits = ResourceLimits {
    memory_limit_bytes: 384 * 1024 * 1024,
    worker_threads: 1,
};

/// Where the store lives and how to unlock it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Plain store file or `.zip` archive holding one.
    pub location: PathBuf,
    /// Archive secret. `None` means the archive entry is not encrypted.
    pub zip_password: Option<String>,
}

impl StoreConfig {
    /// Creates a config for a plain store file or an unencrypted archive.
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            zip_password: None,
        }
    }

    /// Sets the archive secret.
    pub fn with_zip_password(mut self, password: impl Into<String>) -> Self {
        self.zip_password = normalize_secret(Some(password.into()));
        self
    }

    /// Reads `DB_LOCATION` and `DB_ZIP_PASSWORD` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let location = lookup(DB_LOCATION_ENV)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_DB_LOCATION.to_string());

        Self {
            location: PathBuf::from(location),
            zip_password: normalize_secret(lookup(DB_ZIP_PASSWORD_ENV)),
        }
    }
}

fn normalize_secret(secret: Option<String>) -> Option<String> {
    secret.filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{StoreConfig, DEFAULT_DB_LOCATION, STORE_LIMITS};
    use std::path::Path;

    #[test]
    fn from_lookup_falls_back_to_default_location() {
        let config = StoreConfig::from_lookup(|_| None);
        assert_eq!(config.location, Path::new(DEFAULT_DB_LOCATION));
        assert_eq!(config.zip_password, None);
    }

    #[test]
    fn from_lookup_reads_location_and_secret() {
        let config = StoreConfig::from_lookup(|key| match key {
            "DB_LOCATION" => Some(" /srv/diaries.db ".to_string()),
            "DB_ZIP_PASSWORD" => Some("hunter2".to_string()),
            _ => None,
        });
        assert_eq!(config.location, Path::new("/srv/diaries.db"));
        assert_eq!(config.zip_password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn empty_secret_means_no_secret() {
        let config = StoreConfig::from_lookup(|key| {
            (key == "DB_ZIP_PASSWORD").then(String::new)
        });
        assert_eq!(config.zip_password, None);
        assert_eq!(StoreConfig::new("x.zip").with_zip_password("").zip_password, None);
    }

    #[test]
    fn store_limits_translate_to_engine_units() {
        assert_eq!(STORE_LIMITS.memory_limit_kib(), 384 * 1024);
        assert_eq!(STORE_LIMITS.auxiliary_threads(), 0);
    }
}
