use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5037;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const ENV_SERIAL: &str = "ANDROID_SERIAL";
const ENV_ADB_PATH: &str = "ADB_PATH";
const CONFIG_FILE: &str = ".adbhost.toml";

/// Everything an [`AdbClient`](crate::adb::AdbClient) needs, resolved up front.
///
/// Environment-derived values are captured here once so that device resolution
/// never consults the process environment on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Read/write deadline for every connection. Zero means block forever.
    pub timeout: Duration,
    /// Consulted only when a device is resolved from an empty identity.
    pub default_serial: Option<String>,
    /// Executable used to start the server when nobody is listening.
    pub adb_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            default_serial: None,
            adb_path: None,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
            ..Self::default()
        }
    }

    /// Defaults overlaid with `ANDROID_SERIAL` and `ADB_PATH`.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    pub fn with_env(mut self) -> Self {
        if let Some(serial) = non_empty_env(ENV_SERIAL) {
            debug!("Default serial from {}: {}", ENV_SERIAL, serial);
            self.default_serial = Some(serial);
        }
        if let Some(path) = non_empty_env(ENV_ADB_PATH) {
            self.adb_path = Some(PathBuf::from(path));
        }
        self
    }

    pub fn with_default_serial(mut self, serial: impl Into<String>) -> Self {
        self.default_serial = Some(serial.into());
        self
    }

    pub fn with_adb_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.adb_path = Some(path.into());
        self
    }

    /// `host:port`, with `localhost` pinned to IPv4 as the server listens there.
    pub fn address(&self) -> String {
        let host = if self.host == "localhost" {
            "127.0.0.1"
        } else {
            self.host.as_str()
        };
        format!("{}:{}", host, self.port)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Seconds
    pub timeout: Option<u64>,
}

/// On-disk settings, `~/.adbhost.toml`.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSection,
    pub default_serial: Option<String>,
    pub adb_path: Option<PathBuf>,
    /// Friendly name to serial.
    #[serde(default)]
    pub devices: HashMap<String, String>,
}

impl Config {
    pub fn load() -> Self {
        match Config::get_config_path() {
            Some(path) => Config::load_from_path(&path),
            None => {
                debug!("No home directory, using default config");
                Config::default()
            }
        }
    }

    pub fn load_from_path(path: &Path) -> Self {
        debug!("Loading config from: {:?}", path);

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    debug!("Parsed config: {:?}", config);
                    config
                }
                Err(e) => {
                    log::warn!("Error parsing config file {}: {}", path.display(), e);
                    Config::default()
                }
            },
            Err(_) => {
                debug!("No config file found or unable to read it");
                Config::default()
            }
        }
    }

    fn get_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_FILE))
    }

    /// Maps a configured device alias to its serial; unknown names pass through.
    pub fn resolve_serial(&self, name: &str) -> String {
        self.devices
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// File values first, then the environment on top.
    pub fn client_config(&self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            host: self.server.host.clone().unwrap_or(defaults.host),
            port: self.server.port.unwrap_or(defaults.port),
            timeout: self
                .server
                .timeout
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            default_serial: self.default_serial.clone(),
            adb_path: self.adb_path.clone(),
        }
        .with_env()
    }
}
