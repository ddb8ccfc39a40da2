//! The "open transport" handshake that moves a connection from the server's
//! command scope into one device's scope.
//!
//! Two independent choices decide the request:
//!
//! | addressing   | scoped (sub-command)              | direct                   |
//! |--------------|-----------------------------------|--------------------------|
//! | transport id | `host-transport-id:<id>:<subcmd>` | `host:transport-id:<id>` |
//! | serial       | `host-serial:<serial>:<subcmd>`   | `host:transport:<serial>`|
//!
//! A transport id wins when both are known.

use crate::adb::client::AdbClient;
use crate::adb::connection::AdbConnection;
use crate::error::{AdbError, Result};
use log::*;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// How a caller names a device: by serial, by transport id, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceIdentity {
    pub serial: Option<String>,
    pub transport_id: Option<u32>,
}

impl DeviceIdentity {
    pub fn serial(serial: impl Into<String>) -> Self {
        Self {
            serial: Some(serial.into()),
            transport_id: None,
        }
    }

    pub fn transport_id(id: u32) -> Self {
        Self {
            serial: None,
            transport_id: Some(id),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Neither a non-empty serial nor a non-zero transport id.
    pub fn is_empty(&self) -> bool {
        self.serial_str().is_none() && self.id().is_none()
    }

    fn serial_str(&self) -> Option<&str> {
        self.serial.as_deref().filter(|s| !s.is_empty())
    }

    fn id(&self) -> Option<u32> {
        self.transport_id.filter(|id| *id > 0)
    }

    /// The single authoritative address for this identity.
    pub fn target(&self) -> Result<TransportTarget<'_>> {
        if let Some(id) = self.id() {
            return Ok(TransportTarget::TransportId(id));
        }
        if let Some(serial) = self.serial_str() {
            return Ok(TransportTarget::Serial(serial));
        }
        error!("Device identity has neither serial nor transport id");
        Err(AdbError::Usage(
            "device identity needs a serial or a transport id".to_string(),
        ))
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.serial_str(), self.id()) {
            (Some(serial), Some(id)) => write!(f, "{} (transport {})", serial, id),
            (Some(serial), None) => f.write_str(serial),
            (None, Some(id)) => write!(f, "transport {}", id),
            (None, None) => f.write_str("<any>"),
        }
    }
}

impl From<&str> for DeviceIdentity {
    fn from(serial: &str) -> Self {
        Self::serial(serial)
    }
}

impl From<u32> for DeviceIdentity {
    fn from(id: u32) -> Self {
        Self::transport_id(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportTarget<'a> {
    TransportId(u32),
    Serial(&'a str),
}

impl TransportTarget<'_> {
    /// Builds the request; `None` selects the direct form.
    pub fn request(&self, sub_command: Option<&str>) -> String {
        match (self, sub_command) {
            (TransportTarget::TransportId(id), Some(sub)) => {
                format!("host-transport-id:{}:{}", id, sub)
            }
            (TransportTarget::TransportId(id), None) => format!("host:transport-id:{}", id),
            (TransportTarget::Serial(serial), Some(sub)) => {
                format!("host-serial:{}:{}", serial, sub)
            }
            (TransportTarget::Serial(serial), None) => format!("host:transport:{}", serial),
        }
    }
}

/// Opens a connection and performs the handshake for `identity`.
///
/// With a sub-command the server runs it against the device's metadata and
/// the caller reads the reply. Without one, the returned connection is in the
/// device's scope. A non-zero `timeout` becomes the connection deadline.
pub fn open_transport(
    client: &AdbClient,
    identity: &DeviceIdentity,
    sub_command: Option<&str>,
    timeout: Duration,
) -> Result<AdbConnection> {
    let request = identity.target()?.request(sub_command);

    let mut conn = client.open_connection()?;
    conn.set_timeout(timeout)?;
    conn.send_command(&request)?;
    conn.expect_okay()?;

    if sub_command.is_none() {
        conn.promote(&request)?;
    }
    debug!("Transport open: {}", request);
    Ok(conn)
}
