use crate::adb::connection::Status;
use crate::adb::device::AdbDevice;
use crate::error::{AdbError, Result};
use log::*;
use serde::Serialize;
use std::net::TcpListener;

/// One forward rule as reported by `list-forward`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwardMapping {
    pub serial: String,
    pub local: String,
    pub remote: String,
}

impl ForwardMapping {
    /// Local TCP port, when the local side is `tcp:<port>`.
    pub fn local_tcp_port(&self) -> Option<u16> {
        self.local.strip_prefix("tcp:")?.parse().ok()
    }
}

/// Parses `"<serial> <local> <remote>"` lines; any other shape is skipped.
pub fn parse_forward_list(text: &str) -> Vec<ForwardMapping> {
    text.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [serial, local, remote] => Some(ForwardMapping {
                    serial: serial.to_string(),
                    local: local.to_string(),
                    remote: remote.to_string(),
                }),
                _ => None,
            }
        })
        .collect()
}

/// A local port the OS considers free right now.
pub fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

pub fn forward_command(local: &str, remote: &str, no_rebind: bool) -> String {
    if no_rebind {
        format!("forward:norebind:{};{}", local, remote)
    } else {
        format!("forward:{};{}", local, remote)
    }
}

impl AdbDevice {
    /// Creates (or with `no_rebind == false`, replaces) a forward rule.
    pub fn forward(&self, local: &str, remote: &str, no_rebind: bool) -> Result<()> {
        let mut conn = self.open_scoped(&forward_command(local, remote, no_rebind))?;

        // Servers confirm the rule itself with a second token; some just hang up.
        match conn.read_status()? {
            Status::Fail => return Err(AdbError::Status(conn.read_failure_message())),
            Status::Okay => {}
            Status::Other(token) => {
                trace!("forward trailer {:?}", String::from_utf8_lossy(&token));
            }
        }
        conn.close();
        info!("Forward {} -> {} on {}", local, remote, self.identity());
        Ok(())
    }

    pub fn forward_list(&self) -> Result<Vec<ForwardMapping>> {
        let mut conn = self.open_scoped("list-forward")?;
        let block = conn.read_block()?;
        conn.close();
        Ok(parse_forward_list(&String::from_utf8_lossy(&block)))
    }

    /// Local TCP port forwarding to `remote`, reusing an existing rule for
    /// this device when there is one.
    pub fn forward_port(&self, remote: &str) -> Result<u16> {
        // Handles built from a transport id carry no serial; rules are keyed by it.
        let serial = match self.serial() {
            "" => self.get_serialno()?,
            known => known.to_string(),
        };
        let existing = self.forward_list()?.into_iter().find_map(|f| {
            if f.serial == serial && f.remote == remote {
                f.local_tcp_port()
            } else {
                None
            }
        });
        if let Some(port) = existing {
            debug!("Reusing forward tcp:{} -> {}", port, remote);
            return Ok(port);
        }

        let port = free_port()?;
        self.forward(&format!("tcp:{}", port), remote, false)?;
        Ok(port)
    }

    pub fn forward_tcp_port(&self, remote_port: u16) -> Result<u16> {
        self.forward_port(&format!("tcp:{}", remote_port))
    }
}
