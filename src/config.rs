//! Configuration file management for certcheck.
//!
//! Settings can come from a TOML file and from command-line arguments.
//!
//! # Configuration Precedence
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file (certcheck.toml or specified with --config)
//! 3. Command-line arguments (highest priority)
//!
//! # Example Configuration File
//!
//! ```toml
//! endpoints = ["example.com:443", "self-signed.badssl.com:443"]
//! file = "hosts.txt"
//! timeout = 5
//! workers = 8
//! output = "table"
//! csv = "certificates.csv"
//! sort = true
//! exit_code = 2
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::connector::DEFAULT_TIMEOUT;
use crate::scan::{ScanOptions, DEFAULT_WORKERS};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "certcheck.toml";

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Raw configuration as read from a file or the command line.
///
/// All fields are optional to support partial configuration and merging.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Endpoints to check, as `host:port`
    pub endpoints: Option<Vec<String>>,
    /// File with one `host:port` per line
    pub file: Option<PathBuf>,
    /// Connect and handshake timeout in seconds
    pub timeout: Option<u64>,
    /// Number of concurrent connections
    pub workers: Option<usize>,
    /// Print connection transcripts
    pub debug: Option<bool>,
    /// Output format: table or json
    pub output: Option<String>,
    /// Path of a CSV export
    pub csv: Option<PathBuf>,
    /// Sort results by host and port instead of input order
    pub sort: Option<bool>,
    /// Exit code to use when any certificate is expired
    pub exit_code: Option<i32>,
}

/// Validated configuration used by a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub endpoints: Vec<String>,
    pub file: Option<PathBuf>,
    pub scan: ScanOptions,
    pub debug: bool,
    pub output: OutputFormat,
    pub csv: Option<PathBuf>,
    pub sort: bool,
    pub exit_code: i32,
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully parsed configuration
    /// * `Err(ConfigError::Io)` - File could not be read
    /// * `Err(ConfigError::Parse)` - File contains invalid TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Loads `path` if given, else [`DEFAULT_CONFIG_FILE`] when it exists.
    pub fn discover(path: Option<&Path>) -> Result<Option<Self>, ConfigError> {
        match path {
            Some(path) => Self::from_file(path).map(Some),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(DEFAULT_CONFIG_FILE).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Creates a configuration holding the defaults.
    ///
    /// # Default Values
    ///
    /// - `timeout`: 5 seconds
    /// - `workers`: 8
    /// - `debug`: false
    /// - `output`: "table"
    /// - `sort`: false (input order)
    /// - `exit_code`: 0 (don't fail on expired certificates)
    pub fn defaults() -> Self {
        Config {
            endpoints: None,
            file: None,
            timeout: Some(DEFAULT_TIMEOUT.as_secs()),
            workers: Some(DEFAULT_WORKERS),
            debug: Some(false),
            output: Some(OutputFormat::Table.to_string()),
            csv: None,
            sort: Some(false),
            exit_code: Some(0),
        }
    }

    /// Merges this configuration with another, prioritizing the other's values.
    ///
    /// For each field, if the `other` config has a value (Some), it overrides
    /// this config's value. If the `other` value is None, keeps the current value.
    pub fn merge_with(self, other: Config) -> Self {
        Config {
            endpoints: other.endpoints.or(self.endpoints),
            file: other.file.or(self.file),
            timeout: other.timeout.or(self.timeout),
            workers: other.workers.or(self.workers),
            debug: other.debug.or(self.debug),
            output: other.output.or(self.output),
            csv: other.csv.or(self.csv),
            sort: other.sort.or(self.sort),
            exit_code: other.exit_code.or(self.exit_code),
        }
    }

    /// Validates the merged configuration.
    ///
    /// Missing values fall back to [`Config::defaults`].
    pub fn resolve(self) -> Result<Settings, ConfigError> {
        let config = Config::defaults().merge_with(self);

        let timeout = config.timeout.unwrap_or(DEFAULT_TIMEOUT.as_secs());
        if timeout == 0 {
            return Err(ConfigError::Validation(
                "timeout must be at least 1 second".to_string(),
            ));
        }
        let workers = config.workers.unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            return Err(ConfigError::Validation(
                "workers must be at least 1".to_string(),
            ));
        }
        let output = match config.output {
            Some(output) => OutputFormat::from_str(&output).map_err(|_| {
                ConfigError::Validation(format!(
                    "unknown output format '{}', expected table or json",
                    output
                ))
            })?,
            None => OutputFormat::Table,
        };

        Ok(Settings {
            endpoints: config.endpoints.unwrap_or_default(),
            file: config.file,
            scan: ScanOptions {
                timeout: Duration::from_secs(timeout),
                workers,
            },
            debug: config.debug.unwrap_or(false),
            output,
            csv: config.csv,
            sort: config.sort.unwrap_or(false),
            exit_code: config.exit_code.unwrap_or(0),
        })
    }

    /// Generates an example configuration file in TOML format.
    pub fn example_toml() -> String {
        let example = Config {
            endpoints: Some(vec![
                "example.com:443".to_string(),
                "self-signed.badssl.com:443".to_string(),
                "expired.badssl.com:443".to_string(),
            ]),
            file: Some(PathBuf::from("hosts.txt")),
            timeout: Some(5),
            workers: Some(8),
            debug: Some(false),
            output: Some("table".to_string()),
            csv: Some(PathBuf::from("certificates.csv")),
            sort: Some(true),
            exit_code: Some(2),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("IO Error: {0}")]
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    #[error("Parse Error: {0}")]
    Parse(String),
    /// Validation error (invalid values)
    #[error("Validation Error: {0}")]
    Validation(String),
}
