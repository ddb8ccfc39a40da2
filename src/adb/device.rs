use crate::adb::client::AdbClient;
use crate::adb::connection::AdbConnection;
use crate::adb::file_transfer::SyncClient;
use crate::adb::protocol::Network;
use crate::adb::transport::{self, DeviceIdentity};
use crate::error::{AdbError, Result};
use log::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Identity and descriptive fields of a device as listed by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub serial: String,
    /// Zero when unknown.
    pub transport_id: u32,
    pub product: Option<String>,
    pub model: Option<String>,
    /// The `device:` tag of the listing.
    pub device_type: Option<String>,
}

/// A device handle: the client to reach it, how to address it, and a lazily
/// filled property cache shared by clones of the handle.
#[derive(Debug, Clone)]
pub struct AdbDevice {
    client: AdbClient,
    info: DeviceInfo,
    properties: Arc<Mutex<HashMap<String, String>>>,
}

impl AdbDevice {
    pub(crate) fn new(client: AdbClient, info: DeviceInfo) -> Self {
        Self {
            client,
            info,
            properties: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) fn from_identity(client: AdbClient, identity: DeviceIdentity) -> Self {
        Self::new(
            client,
            DeviceInfo {
                serial: identity.serial.unwrap_or_default(),
                transport_id: identity.transport_id.unwrap_or(0),
                ..DeviceInfo::default()
            },
        )
    }

    pub fn client(&self) -> &AdbClient {
        &self.client
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn serial(&self) -> &str {
        &self.info.serial
    }

    pub fn transport_id(&self) -> u32 {
        self.info.transport_id
    }

    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity {
            serial: Some(self.info.serial.clone()).filter(|s| !s.is_empty()),
            transport_id: Some(self.info.transport_id).filter(|id| *id > 0),
        }
    }

    pub(crate) fn default_timeout(&self) -> Duration {
        self.client.config().timeout
    }

    /// Handshake in direct form: the connection now speaks to the device.
    pub fn open_transport(&self, timeout: Duration) -> Result<AdbConnection> {
        transport::open_transport(&self.client, &self.identity(), None, timeout)
    }

    /// Handshake in scoped form: the server runs `sub_command` for this device.
    pub fn open_scoped(&self, sub_command: &str) -> Result<AdbConnection> {
        transport::open_transport(
            &self.client,
            &self.identity(),
            Some(sub_command),
            self.default_timeout(),
        )
    }

    /// Scoped query answered with one length-prefixed block.
    fn get_with_command(&self, sub_command: &str) -> Result<String> {
        let mut conn = self.open_scoped(sub_command)?;
        let reply = conn.read_block_string()?;
        conn.close();
        Ok(reply)
    }

    pub fn get_state(&self) -> Result<String> {
        self.get_with_command("get-state")
    }

    pub fn get_serialno(&self) -> Result<String> {
        self.get_with_command("get-serialno")
    }

    pub fn get_devpath(&self) -> Result<String> {
        self.get_with_command("get-devpath")
    }

    pub fn get_features(&self) -> Result<Vec<String>> {
        let features = self.get_with_command("features")?;
        Ok(features
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(String::from)
            .collect())
    }

    /// `serialno`, `devpath` and `state` in one map.
    pub fn summary(&self) -> Result<BTreeMap<String, String>> {
        let mut summary = BTreeMap::new();
        summary.insert("serialno".to_string(), self.get_serialno()?);
        summary.insert("devpath".to_string(), self.get_devpath()?);
        summary.insert("state".to_string(), self.get_state()?);
        Ok(summary)
    }

    /// Opens a raw byte stream to a device-local endpoint.
    pub fn create_connection(&self, network: Network, address: &str) -> Result<AdbConnection> {
        let mut conn = self.open_transport(Duration::ZERO)?;
        let service = network.service(address);
        debug!("Connecting {} to {}", self.identity(), service);
        conn.send_command(&service)?;
        conn.expect_okay()?;
        Ok(conn)
    }

    pub fn sync(&self) -> SyncClient {
        SyncClient::new(self.clone())
    }

    pub(crate) fn properties(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        self.properties
            .lock()
            .map_err(|_| AdbError::Usage("property cache poisoned".to_string()))
    }

    pub fn cached_prop(&self, name: &str) -> Option<String> {
        self.properties().ok()?.get(name).cloned()
    }
}
