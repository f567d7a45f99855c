//! # Configuration File
//!
//! Optional TOML file with server, storage and NGSI namespace settings.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8529
//!
//! [storage]
//! database = "casegraph.redb"
//! backend = "redb"
//!
//! [ngsi]
//! case_id_prefix = "urn:covid-10:case:00"
//! entity_type = "InfectionCase"
//! disease_code = "COVID-19"
//! address_country = "KR"
//! ```
//!
//! Every key is optional. Command-line flags take precedence over the file.

use casegraph_core::{CasegraphError, NgsiNamespace};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default database path.
pub const DEFAULT_DATABASE: &str = "casegraph.redb";

/// Maximum accepted config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// SECTIONS
// =============================================================================

/// Storage backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Disk-backed redb database.
    #[default]
    Redb,
    /// Volatile in-memory store.
    Memory,
}

impl std::str::FromStr for BackendKind {
    type Err = CasegraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redb" => Ok(Self::Redb),
            "memory" => Ok(Self::Memory),
            other => Err(CasegraphError::InvalidConfig(format!(
                "unknown backend '{}', expected 'redb' or 'memory'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Redb => write!(f, "redb"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database: PathBuf,
    pub backend: BackendKind,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            backend: BackendKind::default(),
        }
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub ngsi: NgsiNamespace,
}

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, CasegraphError> {
        toml::from_str(text)
            .map_err(|e| CasegraphError::DeserializationError(format!("config: {}", e)))
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self, CasegraphError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            CasegraphError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(CasegraphError::IoError(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            CasegraphError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Load `path` if given, defaults otherwise.
    pub fn load_optional(path: Option<&Path>) -> Result<Self, CasegraphError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml("").expect("parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.ngsi.case_id_prefix, "urn:covid-10:case:00");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
[server]
port = 9000

[storage]
backend = "memory"

[ngsi]
address_country = "FR"
"#,
        )
        .expect("parse");

        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.backend, BackendKind::Memory);
        assert_eq!(config.storage.database, PathBuf::from(DEFAULT_DATABASE));
        assert_eq!(config.ngsi.address_country, "FR");
        assert_eq!(config.ngsi.entity_type, "InfectionCase");
    }

    #[test]
    fn unknown_section_is_rejected() {
        assert!(Config::from_toml("[sever]\nport = 1\n").is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("casegraph.toml");
        std::fs::write(&path, "[server]\nhost = \"0.0.0.0\"\n").expect("write");

        let config = Config::load_optional(Some(path.as_path())).expect("load");
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(Config::load(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn backend_kind_parses() {
        assert_eq!("redb".parse::<BackendKind>().expect("redb"), BackendKind::Redb);
        assert_eq!("memory".parse::<BackendKind>().expect("memory"), BackendKind::Memory);
        assert!("file".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::Memory.to_string(), "memory");
    }
}
