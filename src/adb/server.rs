use crate::error::{AdbError, Result};
use log::*;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

const SERVER_START_DELAY: Duration = Duration::from_secs(1);

/// Starts a local ADB server when a dial finds nobody listening.
pub trait ServerLauncher: Send + Sync {
    fn start(&self, port: u16) -> Result<()>;
}

/// Captured result of running the adb executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The `adb` executable as an external collaborator.
#[derive(Debug, Clone)]
pub struct AdbServer {
    executable: PathBuf,
}

impl Default for AdbServer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl AdbServer {
    pub fn new(executable: Option<&Path>) -> Self {
        Self {
            executable: executable
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("adb")),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Plain TCP dial, no protocol exchange.
    pub fn is_running(address: &str, timeout: Duration) -> bool {
        let resolved = match address.to_socket_addrs().map(|mut a| a.next()) {
            Ok(Some(addr)) => addr,
            _ => {
                debug!("Could not resolve {}", address);
                return false;
            }
        };

        let probe = if timeout.is_zero() {
            TcpStream::connect(resolved)
        } else {
            TcpStream::connect_timeout(&resolved, timeout)
        };

        match probe {
            Ok(_) => {
                debug!("ADB server is running at {}", address);
                true
            }
            Err(_) => {
                debug!("ADB server is not running at {}", address);
                false
            }
        }
    }

    /// Runs the executable with `args`, optionally pinned to one device.
    pub fn exec(&self, serial: Option<&str>, args: &[&str]) -> Result<ProcessOutput> {
        let mut command = Command::new(&self.executable);
        if let Some(serial) = serial {
            command.args(["-s", serial]);
        }
        command.args(args);
        debug!("Executing {:?}", command);

        let output = command.output().map_err(|e| {
            AdbError::Server(format!(
                "Failed to execute {}: {}",
                self.executable.display(),
                e
            ))
        })?;

        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

impl ServerLauncher for AdbServer {
    fn start(&self, port: u16) -> Result<()> {
        info!("Starting ADB server on port {}", port);

        let port = port.to_string();
        let output = self.exec(None, &["-P", &port, "start-server"])?;
        if !output.success() {
            return Err(AdbError::Server(format!(
                "Failed to start ADB server: {}",
                output.stderr
            )));
        }

        info!("ADB server started successfully");
        std::thread::sleep(SERVER_START_DELAY);
        Ok(())
    }
}
