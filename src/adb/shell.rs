use crate::adb::connection::AdbConnection;
use crate::adb::device::AdbDevice;
use crate::error::{AdbError, Result};
use log::*;
use std::time::Duration;

/// What a shell call hands back: the whole output, or the live connection.
#[derive(Debug)]
pub enum ShellResult {
    CapturedOutput(String),
    /// Output arrives on this connection until the device closes it. The
    /// caller owns it.
    StreamHandle(AdbConnection),
}

impl ShellResult {
    pub fn into_output(self) -> Result<String> {
        match self {
            ShellResult::CapturedOutput(output) => Ok(output),
            ShellResult::StreamHandle(_) => Err(AdbError::Usage(
                "shell was opened in stream mode, read the connection instead".to_string(),
            )),
        }
    }

    pub fn into_stream(self) -> Result<AdbConnection> {
        match self {
            ShellResult::StreamHandle(conn) => Ok(conn),
            ShellResult::CapturedOutput(_) => Err(AdbError::Usage(
                "shell output was already captured".to_string(),
            )),
        }
    }
}

impl AdbDevice {
    /// Runs `shell:<cmdargs>` on the device.
    ///
    /// Output is unframed; only the device closing the connection ends it, so
    /// `timeout` (when non-zero) is the only bound on a silent command.
    pub fn shell(&self, cmdargs: &str, stream: bool, timeout: Duration) -> Result<ShellResult> {
        let mut conn = self.open_transport(timeout)?;
        conn.send_command(&format!("shell:{}", cmdargs))?;
        conn.expect_okay()?;

        if stream {
            return Ok(ShellResult::StreamHandle(conn));
        }

        let output = conn.read_until_close()?;
        conn.close();
        Ok(ShellResult::CapturedOutput(
            String::from_utf8_lossy(&output).into_owned(),
        ))
    }

    /// Captured output with the client's default timeout.
    pub fn shell_output(&self, cmdargs: &str) -> Result<String> {
        self.shell(cmdargs, false, self.default_timeout())?
            .into_output()
    }

    /// `getprop <name>`, answered from the cache after the first query.
    pub fn get_prop(&self, name: &str) -> Result<String> {
        if let Some(value) = self.cached_prop(name) {
            trace!("getprop {} served from cache", name);
            return Ok(value);
        }

        let value = self
            .shell_output(&format!("getprop {}", name))?
            .trim()
            .to_string();
        self.properties()?.insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Every property from a bare `getprop`; refreshes the cache.
    pub fn get_props(&self) -> Result<Vec<(String, String)>> {
        let output = self.shell_output("getprop")?;
        let props: Vec<(String, String)> =
            output.lines().filter_map(parse_property_line).collect();

        let mut cache = self.properties()?;
        for (key, value) in &props {
            cache.insert(key.clone(), value.clone());
        }
        debug!("Cached {} properties for {}", props.len(), self.identity());
        Ok(props)
    }
}

/// Parses a `[key]: [value]` line from getprop output.
pub fn parse_property_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    let rest = line.strip_prefix('[')?;
    let close_bracket = rest.find(']')?;
    let key = &rest[..close_bracket];

    let value = rest[close_bracket + 1..]
        .trim()
        .strip_prefix(": [")?
        .strip_suffix(']')?;
    Some((key.to_string(), value.to_string()))
}
