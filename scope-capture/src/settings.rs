//! # Settings
//!
//! The instrument address and capture directory are taken, in increasing order of
//! precedence, from built-in defaults, a JSON config file and the command line.
//!
//! The config file is named `scope_config.json` and is looked up in the working
//! directory first, then in `~/.config/scope_capture/`. Only the first file found
//! is used:
//!
//! ```json
//! { "hostname": "192.168.1.50", "port": 5555, "capture_dir": "/tmp/captures" }
//! ```
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use scope_client::config::DEFAULT_PORT;
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "scope_config.json";
pub const DEFAULT_HOST: &str = "169.254.247.73";
pub const DEFAULT_CAPTURE_DIR: &str = "scope_captures";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read config file {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("Unable to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Contents of a config file. Every entry is optional.
#[derive(Debug, Default, Deserialize, Eq, PartialEq)]
pub struct FileConfig {
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub capture_dir: Option<PathBuf>,
}

impl FileConfig {
    fn is_empty(&self) -> bool {
        self.hostname.is_none() && self.port.is_none() && self.capture_dir.is_none()
    }
}

/// Locations searched for the config file, in order.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(".").join(CONFIG_FILE_NAME)];
    if let Some(home) = dirs::home_dir() {
        paths.push(
            home.join(".config")
                .join("scope_capture")
                .join(CONFIG_FILE_NAME),
        );
    }
    paths
}

/// Loads the first config file among `paths` that exists.
pub fn load_config_file(paths: &[PathBuf]) -> Result<Option<FileConfig>, ConfigError> {
    for path in paths {
        log::info!("Checking for config file at {}", path.display());
        if path.is_file() {
            log::info!("Found config file, loading");
            return parse_config_file(path).map(Some);
        }
    }
    log::info!("No config file found, using default values");
    Ok(None)
}

fn parse_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: FileConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if config.is_empty() {
        log::warn!("No known configuration items found in {}", path.display());
    }
    log::debug!("Config file contents: {:?}", config);
    Ok(config)
}

/// The resolved settings of one run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub capture_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            capture_dir: PathBuf::from(DEFAULT_CAPTURE_DIR),
        }
    }
}

impl Settings {
    /// Adopts every entry present in `file`.
    pub fn with_file(mut self, file: FileConfig) -> Self {
        if let Some(host) = file.hostname.filter(|h| !h.is_empty()) {
            log::info!("Adopting scope hostname from config file: {:?}", host);
            self.host = host;
        }
        if let Some(port) = file.port.filter(|p| *p != 0) {
            log::info!("Adopting scope port from config file: {}", port);
            self.port = port;
        }
        if let Some(dir) = file.capture_dir {
            log::info!("Adopting capture directory from config file: {}", dir.display());
            self.capture_dir = dir;
        }
        self
    }

    /// Adopts the values given on the command line.
    pub fn with_overrides(
        mut self,
        host: Option<String>,
        port: Option<u16>,
        capture_dir: Option<PathBuf>,
    ) -> Self {
        if let Some(host) = host {
            log::info!("Adopting scope hostname from command line: {:?}", host);
            self.host = host;
        }
        if let Some(port) = port {
            log::info!("Adopting scope port from command line: {}", port);
            self.port = port;
        }
        if let Some(dir) = capture_dir {
            self.capture_dir = dir;
        }
        self
    }
}

#[cfg(test)]
mod test {
    use super::{ConfigError, FileConfig, Settings, load_config_file};
    use std::path::PathBuf;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.host, "169.254.247.73");
        assert_eq!(settings.port, 5555);
    }

    #[test]
    fn command_line_beats_file() {
        let file = FileConfig {
            hostname: Some("file-host".to_string()),
            port: Some(6000),
            capture_dir: None,
        };
        let settings = Settings::default()
            .with_file(file)
            .with_overrides(Some("cli-host".to_string()), None, None);
        assert_eq!(settings.host, "cli-host");
        assert_eq!(settings.port, 6000);
        assert_eq!(settings.capture_dir, PathBuf::from("scope_captures"));
    }

    #[test]
    fn first_existing_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let first = dir.path().join("first.json");
        let second = dir.path().join("second.json");
        std::fs::write(&first, r#"{"hostname": "10.0.0.2"}"#).unwrap();
        std::fs::write(&second, r#"{"hostname": "10.0.0.3", "port": 1234}"#).unwrap();

        let config = load_config_file(&[missing, first, second]).unwrap().unwrap();
        assert_eq!(config.hostname.as_deref(), Some("10.0.0.2"));
        assert_eq!(config.port, None);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scope_config.json");
        std::fs::write(&path, r#"{"colour": "blue"}"#).unwrap();
        let config = load_config_file(&[path]).unwrap().unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scope_config.json");
        std::fs::write(&path, "{ hostname: ").unwrap();
        match load_config_file(std::slice::from_ref(&path)) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected Parse, got {:?}", other),
        }
    }

    #[test]
    fn no_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config_file(&[dir.path().join("nope.json")])
            .unwrap()
            .is_none());
    }
}
