//! Configuration loading
//!
//! Settings are resolved once at startup in this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! The resulting [`ApiConfig`] is immutable and shared by reference for the
//! lifetime of the process.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Hosts accepted when running outside production
pub const DEBUG_HOSTS: &str = "127.0.0.1 localhost reducedev2.isis.cclrc.ac.uk";

/// Hosts accepted in production
pub const PROD_HOSTS: &str = "127.0.0.1 localhost 0.0.0.0 reduce.isis.cclrc.ac.uk";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_ARCHIVE_ROOT: &str = "/isis";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "AUTOREDUCE_CONFIG";

/// Optional settings read from the TOML config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_path: Option<PathBuf>,
    pub production: Option<bool>,
    pub allowed_hosts: Option<Vec<String>>,
    pub archive_root: Option<PathBuf>,
    pub verify_data_files: Option<bool>,
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }

    /// Read and parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_file: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_path: Option<PathBuf>,
}

/// Where the file-level settings came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

/// Process-wide service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    /// Production mode narrows the default allowed hosts
    pub production: bool,
    pub allowed_hosts: Vec<String>,
    /// Root of the instrument data archive used for catalog lookups
    pub archive_root: PathBuf,
    /// Require archive data files to exist before accepting a submission
    pub verify_data_files: bool,
    pub log_level: String,
}

impl ApiConfig {
    /// Locate, read and resolve the configuration
    ///
    /// A missing default config file is not an error: the caller gets
    /// [`ConfigSource::Defaults`] and should log a warning. An explicitly
    /// named file that is missing or malformed is an error.
    pub fn load(overrides: &CliOverrides) -> Result<(Self, ConfigSource)> {
        let (file, source) = match locate_config_file(overrides.config_file.as_deref())? {
            Some(path) => (TomlConfig::from_file(&path)?, ConfigSource::File(path)),
            None => (TomlConfig::default(), ConfigSource::Defaults),
        };

        Ok((Self::resolve(file, overrides)?, source))
    }

    /// Merge file settings, environment and CLI overrides into a config
    pub fn resolve(file: TomlConfig, overrides: &CliOverrides) -> Result<Self> {
        let host = overrides
            .host
            .clone()
            .or_else(|| env_string("AUTOREDUCE_HOST"))
            .or(file.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match overrides.port {
            Some(port) => port,
            None => match env_string("AUTOREDUCE_PORT") {
                Some(raw) => raw.parse::<u16>().map_err(|_| {
                    Error::Config(format!("AUTOREDUCE_PORT is not a valid port: {}", raw))
                })?,
                None => file.port.unwrap_or(DEFAULT_PORT),
            },
        };

        let database_path = overrides
            .database_path
            .clone()
            .or_else(|| env_string("AUTOREDUCE_DATABASE").map(PathBuf::from))
            .or(file.database_path)
            .unwrap_or_else(default_database_path);

        // Presence alone switches production on, matching the deployment scripts
        let production = std::env::var_os("AUTOREDUCTION_PRODUCTION").is_some()
            || file.production.unwrap_or(false);

        let allowed_hosts = env_string("AUTOREDUCE_ALLOWED_HOSTS")
            .or_else(|| env_string("DJANGO_ALLOWED_HOSTS"))
            .map(|raw| split_hosts(&raw))
            .or(file.allowed_hosts)
            .unwrap_or_else(|| split_hosts(if production { PROD_HOSTS } else { DEBUG_HOSTS }));

        let archive_root = env_string("AUTOREDUCE_ARCHIVE_ROOT")
            .map(PathBuf::from)
            .or(file.archive_root)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ARCHIVE_ROOT));

        let verify_data_files = match env_string("AUTOREDUCE_VERIFY_DATA_FILES") {
            Some(raw) => parse_flag(&raw).ok_or_else(|| {
                Error::Config(format!(
                    "AUTOREDUCE_VERIFY_DATA_FILES is not a boolean: {}",
                    raw
                ))
            })?,
            None => file.verify_data_files.unwrap_or(false),
        };

        let log_level = file
            .log_level
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        Ok(Self {
            host,
            port,
            database_path,
            production,
            allowed_hosts,
            archive_root,
            verify_data_files,
            log_level,
        })
    }

    /// Socket address string for the HTTP listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check a `Host` header value against the allowed hosts
    ///
    /// Any port suffix is ignored. `*` matches everything and a leading dot
    /// matches the domain and all of its subdomains.
    pub fn is_host_allowed(&self, host_header: &str) -> bool {
        let host = strip_port(host_header).to_ascii_lowercase();
        if host.is_empty() {
            return false;
        }

        self.allowed_hosts.iter().any(|pattern| {
            let pattern = pattern.to_ascii_lowercase();
            if pattern == "*" {
                return true;
            }
            match pattern.strip_prefix('.') {
                Some(domain) => host == domain || host.ends_with(&pattern),
                None => host == pattern,
            }
        })
    }
}

/// Find the config file to read, if any
///
/// Explicit paths (CLI flag, then `AUTOREDUCE_CONFIG`) must exist. The
/// per-user and system-wide locations are optional.
fn locate_config_file(cli_path: Option<&Path>) -> Result<Option<PathBuf>> {
    let explicit = cli_path
        .map(Path::to_path_buf)
        .or_else(|| env_string(CONFIG_ENV_VAR).map(PathBuf::from));

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("autoreduce").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(Some(path));
        }
    }

    let system_config = PathBuf::from("/etc/autoreduce/config.toml");
    if system_config.exists() {
        return Ok(Some(system_config));
    }

    Ok(None)
}

/// Get OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("autoreduce"))
        .unwrap_or_else(|| PathBuf::from("./autoreduce_data"))
        .join("autoreduce.db")
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn split_hosts(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literal, e.g. "[::1]:8000"
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }

    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}
