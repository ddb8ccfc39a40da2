use crate::adb::connection::{AdbConnection, Status};
use crate::adb::device::{AdbDevice, DeviceInfo};
use crate::adb::server::{AdbServer, ServerLauncher};
use crate::adb::shell::ShellResult;
use crate::adb::transport::DeviceIdentity;
use crate::config::ClientConfig;
use crate::error::{AdbError, Result};
use log::*;
use regex::Regex;
use std::sync::{Arc, LazyLock};

/// Added to the server's reported version: the oldest server this client
/// expects to talk to.
pub const MIN_SERVER_VERSION_OFFSET: u32 = 16;

/// Phrases a server puts in a `host:connect` reply body when the connection
/// did not happen, even though the status token was `OKAY`. Best effort only:
/// the text depends on server version and locale.
const CONNECT_FAILURE_MARKERS: &[&str] = &[
    "由于",
    "unable to connect",
    "failed to connect",
    "cannot connect",
    "connection refused",
];

static RE_DEVICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\S+)\s+device\s+(?:usb:\S+\s+)?product:(\S+)\s+model:(\S+)\s+device:(\S+)\s+transport_id:(\d+)\s*$",
    )
    .expect("device line pattern is valid")
});

/// Talks to one ADB server. Every call opens its own connection, so a
/// client can be cloned and used from several threads at once.
#[derive(Clone)]
pub struct AdbClient {
    config: ClientConfig,
    launcher: Arc<dyn ServerLauncher>,
}

impl AdbClient {
    pub fn new(config: ClientConfig) -> Self {
        let launcher = Arc::new(AdbServer::new(config.adb_path.as_deref()));
        Self { config, launcher }
    }

    /// Uses `launcher` instead of the adb executable to recover from a
    /// refused dial.
    pub fn with_launcher(config: ClientConfig, launcher: Arc<dyn ServerLauncher>) -> Self {
        Self { config, launcher }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// A fresh server-scope connection with no deadline applied.
    pub fn open_connection(&self) -> Result<AdbConnection> {
        AdbConnection::open(&self.config, self.launcher.as_ref())
    }

    /// Opens a connection, sends `command` and checks the status token.
    fn host_command(&self, command: &str) -> Result<AdbConnection> {
        let mut conn = self.open_connection()?;
        conn.set_timeout(self.config.timeout)?;
        conn.send_command(command)?;
        conn.expect_okay()?;
        Ok(conn)
    }

    /// Server protocol version plus [`MIN_SERVER_VERSION_OFFSET`].
    pub fn server_version(&self) -> Result<u32> {
        let mut conn = self.host_command("host:version")?;
        let block = conn.read_block_string()?;
        conn.close();

        let version = u32::from_str_radix(&block, 16)?;
        debug!("Server reported version {:#06x}", version);
        version.checked_add(MIN_SERVER_VERSION_OFFSET).ok_or_else(|| {
            AdbError::Desync(format!("server version {:#x} out of range", version))
        })
    }

    /// Asks the server to exit. A server that is not listening counts as
    /// already stopped.
    pub fn kill_server(&self) -> Result<()> {
        if !AdbServer::is_running(&self.config.address(), self.config.timeout) {
            debug!("No server at {}, nothing to kill", self.config.address());
            return Ok(());
        }

        let mut conn = self.open_connection()?;
        conn.set_timeout(self.config.timeout)?;
        conn.send_command("host:kill")?;
        let status = conn.read_status()?;
        match status {
            Status::Okay => Ok(()),
            Status::Fail => Err(AdbError::Status(conn.read_failure_message())),
            Status::Other(token) => {
                // The server may hang up before acknowledging.
                debug!("host:kill answered {:?}", String::from_utf8_lossy(&token));
                Ok(())
            }
        }
    }

    /// `host:connect:<address>`; returns the server's message on success.
    pub fn connect(&self, address: &str) -> Result<String> {
        let mut conn = self.host_command(&format!("host:connect:{}", address))?;
        let message = conn.read_block_string()?;
        conn.close();

        if let Some(marker) = connect_failure_marker(&message) {
            debug!("connect reply contains failure marker {:?}", marker);
            return Err(AdbError::ConnectFailed(message));
        }
        info!("Connected {}: {}", address, message);
        Ok(message)
    }

    /// `host:disconnect:<address>`; returns the server's message.
    pub fn disconnect(&self, address: &str) -> Result<String> {
        let mut conn = self.host_command(&format!("host:disconnect:{}", address))?;
        let message = conn.read_block_string()?;
        conn.close();
        Ok(message)
    }

    /// Online devices from `host:devices-l`.
    pub fn list_devices(&self) -> Result<Vec<AdbDevice>> {
        Ok(self
            .list_device_info()?
            .into_iter()
            .map(|info| AdbDevice::new(self.clone(), info))
            .collect())
    }

    pub fn list_device_info(&self) -> Result<Vec<DeviceInfo>> {
        let mut conn = self.host_command("host:devices-l")?;
        let block = conn.read_block()?;
        conn.close();

        let devices = parse_device_list(&String::from_utf8_lossy(&block));
        debug!("Found {} devices", devices.len());
        Ok(devices)
    }

    /// Builds a device handle without checking that the device exists.
    ///
    /// An empty identity falls back to the first listed device when a default
    /// serial is configured, otherwise to an empty handle whose first command
    /// fails.
    pub fn device(&self, identity: DeviceIdentity) -> Result<AdbDevice> {
        if !identity.is_empty() {
            return Ok(AdbDevice::from_identity(self.clone(), identity));
        }

        if let Some(serial) = self.config.default_serial.as_deref().filter(|s| !s.is_empty()) {
            debug!("Empty identity, default serial {} configured", serial);
            if let Some(first) = self.list_devices()?.into_iter().next() {
                return Ok(first);
            }
        }

        Ok(AdbDevice::from_identity(self.clone(), identity))
    }

    pub fn shell(&self, serial: &str, command: &str, stream: bool) -> Result<ShellResult> {
        self.device(DeviceIdentity::serial(serial))?
            .shell(command, stream, self.config.timeout)
    }
}

impl std::fmt::Debug for AdbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdbClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn connect_failure_marker(message: &str) -> Option<&'static str> {
    let lowered = message.to_lowercase();
    CONNECT_FAILURE_MARKERS
        .iter()
        .copied()
        .find(|marker| lowered.contains(marker))
}

/// Parses one `host:devices-l` line. Anything not in the expected shape,
/// including a transport id that is not a number, yields `None`.
pub fn parse_device_line(line: &str) -> Option<DeviceInfo> {
    let caps = RE_DEVICE.captures(line.trim())?;
    let transport_id = caps[5].parse::<u32>().ok()?;

    Some(DeviceInfo {
        serial: caps[1].to_string(),
        transport_id,
        product: Some(caps[2].to_string()),
        model: Some(caps[3].to_string()),
        device_type: Some(caps[4].to_string()),
    })
}

pub fn parse_device_list(text: &str) -> Vec<DeviceInfo> {
    text.lines().filter_map(parse_device_line).collect()
}
