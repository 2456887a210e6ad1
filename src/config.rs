// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Configuration surface: a TOML file mapping directly onto the options
// table of the external-interfaces spec. Every field has a default so an
// empty file is a valid (if minimal) configuration.

use serde::Deserialize;

use crate::error::FatalError;
use crate::storage::slot::MIN_ITEM_HEADER;

/// Victim-selection policy used when every candidate slot is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplacementPolicy {
    /// Pick a victim uniformly at random among the candidates.
    Random,
    /// Prefer the candidate with the nearest expiry; ties broken by the
    /// lowest candidate-set index.
    ExpireFirst,
}

impl Default for DisplacementPolicy {
    fn default() -> Self {
        DisplacementPolicy::ExpireFirst
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub daemonize: bool,
    pub pid_filename: Option<String>,
    pub log_name: Option<String>,
    pub log_level: String,
    pub server_host: String,
    pub server_port: u16,
    pub tcp_backlog: u32,
    pub tcp_poolsize: usize,
    pub buf_init_size: usize,
    pub buf_sock_poolsize: usize,
    pub ring_array_cap: usize,
    pub cuckoo_item_size: usize,
    pub cuckoo_nitem: usize,
    pub cuckoo_policy: DisplacementPolicy,
    pub cuckoo_item_cas: bool,
    pub array_nelem_delta: usize,
    pub request_poolsize: usize,
    pub num_workers: usize,
    pub idle_timeout_secs: u64,
    pub displacement_max: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemonize: false,
            pid_filename: None,
            log_name: None,
            log_level: "info".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 11311,
            tcp_backlog: 1024,
            tcp_poolsize: 1024,
            buf_init_size: 16 * 1024,
            buf_sock_poolsize: 256,
            ring_array_cap: 1024,
            cuckoo_item_size: 512,
            cuckoo_nitem: 1 << 20,
            cuckoo_policy: DisplacementPolicy::default(),
            cuckoo_item_cas: true,
            array_nelem_delta: 16,
            request_poolsize: 1024,
            num_workers: default_num_workers(),
            idle_timeout_secs: 0,
            displacement_max: 6,
        }
    }
}

fn default_num_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Config {
    /// Load and validate a configuration file. An empty or all-default file
    /// is valid; a structurally invalid one or one with out-of-range values
    /// is a `FatalError`, never silently clamped or truncated.
    pub fn from_file(path: &str) -> Result<Self, FatalError> {
        let text = std::fs::read_to_string(path).map_err(|source| FatalError::ConfigRead {
            path: path.to_string(),
            source,
        })?;
        let cfg: Config = toml::from_str(&text).map_err(|source| FatalError::ConfigParse {
            path: path.to_string(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), FatalError> {
        if self.cuckoo_item_size < MIN_ITEM_HEADER {
            return Err(FatalError::ConfigInvalid(format!(
                "cuckoo_item_size ({}) cannot hold even a minimal header + max-length key + zero-length value (needs at least {})",
                self.cuckoo_item_size, MIN_ITEM_HEADER
            )));
        }
        if self.cuckoo_nitem == 0 || !self.cuckoo_nitem.is_power_of_two() {
            return Err(FatalError::ConfigInvalid(format!(
                "cuckoo_nitem ({}) must be a non-zero power of two",
                self.cuckoo_nitem
            )));
        }
        if self.displacement_max == 0 {
            return Err(FatalError::ConfigInvalid(
                "displacement_max must be at least 1".to_string(),
            ));
        }
        if self.num_workers == 0 {
            return Err(FatalError::ConfigInvalid(
                "num_workers must be at least 1".to_string(),
            ));
        }
        if self.server_port == 0 {
            return Err(FatalError::ConfigInvalid(
                "server_port must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn rejects_undersized_item() {
        let mut cfg = Config::default();
        cfg.cuckoo_item_size = 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_power_of_two_capacity() {
        let mut cfg = Config::default();
        cfg.cuckoo_nitem = 1000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg: Config = toml::from_str("server_port = 12000\n").unwrap();
        assert_eq!(cfg.server_port, 12000);
        assert_eq!(cfg.server_host, "127.0.0.1");
    }
}
