//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the root folder (read by the CLI parser)
pub const ROOT_FOLDER_ENV: &str = "MBT_ROOT_FOLDER";

/// Default database file name inside the root folder
pub const DEFAULT_DATABASE_FILE: &str = "backlog.db";

/// Default HTTP bind address
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5780;

/// Contents of `config.toml`
///
/// Every key is optional; missing keys fall through to the next tier.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub root_folder: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub log_filter: Option<String>,
}

impl FileConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }

    /// Load a config file from an explicit path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load the platform config file, or an empty config when none exists
    pub fn load_default() -> Self {
        match default_config_file() {
            Some(path) if path.exists() => match Self::load(&path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Ignoring config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            _ => Self::default(),
        }
    }
}

/// Resolved service settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub root_folder: PathBuf,
    pub database_path: PathBuf,
    pub bind: String,
    pub port: u16,
    pub log_filter: Option<String>,
}

/// Values given on the command line (clap fills these, env fallbacks included)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub bind: Option<String>,
    pub port: Option<u16>,
}

impl Settings {
    /// Merge command line values over the config file, then compiled defaults
    pub fn resolve(cli: CliOverrides, file: FileConfig) -> Self {
        let root_folder = resolve_root_folder(cli.root_folder.as_deref(), &file);

        let database_path = cli
            .database
            .or(file.database)
            .map(|p| if p.is_relative() { root_folder.join(p) } else { p })
            .unwrap_or_else(|| root_folder.join(DEFAULT_DATABASE_FILE));

        Self {
            database_path,
            bind: cli
                .bind
                .or(file.bind)
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port: cli.port.or(file.port).unwrap_or(DEFAULT_PORT),
            log_filter: file.log_filter,
            root_folder,
        }
    }

    /// `bind:port` string for the TCP listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Root folder resolution priority order:
/// 1. Command line, with `ROOT_FOLDER_ENV` as its fallback (highest priority)
/// 2. TOML config file
/// 3. OS-dependent compiled default
pub fn resolve_root_folder(cli_arg: Option<&Path>, file: &FileConfig) -> PathBuf {
    if let Some(path) = cli_arg.filter(|p| !p.as_os_str().is_empty()) {
        return path.to_path_buf();
    }

    if let Some(path) = &file.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Platform config file path (`~/.config/mbt/config.toml` on Linux)
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mbt").join("config.toml"))
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("mbt"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\mbt"))
    } else {
        // ~/.local/share/mbt on Linux, ~/Library/Application Support/mbt on macOS
        dirs::data_dir()
            .map(|d| d.join("mbt"))
            .unwrap_or_else(|| PathBuf::from("./mbt_data"))
    }
}
