use crate::adb::protocol::{self, CHUNK_SIZE, FAIL, OKAY};
use crate::adb::server::ServerLauncher;
use crate::config::ClientConfig;
use crate::error::{AdbError, Result};
use log::*;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Which command namespace the server applies to the next request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Server,
    /// Promoted by a transport request; holds the request that did it.
    Device(String),
}

/// Status token read after a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Okay,
    Fail,
    /// Anything else, including a short read when the peer hung up.
    Other(Vec<u8>),
}

/// One TCP connection to the ADB server, carrying one command sequence.
pub struct AdbConnection {
    stream: TcpStream,
    address: String,
    scope: Scope,
    closed: bool,
}

impl AdbConnection {
    /// Dials the server. If nobody is listening, asks `launcher` to start it
    /// once and dials again. `config.timeout` bounds the dial only; the
    /// read/write deadline is left to the caller.
    pub fn open(config: &ClientConfig, launcher: &dyn ServerLauncher) -> Result<Self> {
        let address = config.address();
        debug!("=== Creating new ADB connection to {} ===", address);

        let stream = match Self::dial(&address, config.timeout) {
            Ok(stream) => stream,
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                info!("ADB server not listening on {}, starting it", address);
                if let Err(start_err) = launcher.start(config.port) {
                    warn!("Could not start ADB server: {}", start_err);
                    return Err(AdbError::Connection { address, source: e });
                }
                Self::dial(&address, config.timeout)
                    .map_err(|source| AdbError::Connection {
                        address: address.clone(),
                        source,
                    })?
            }
            Err(source) => return Err(AdbError::Connection { address, source }),
        };

        Ok(Self::from_stream(stream, address))
    }

    pub(crate) fn from_stream(stream: TcpStream, address: String) -> Self {
        Self {
            stream,
            address,
            scope: Scope::Server,
            closed: false,
        }
    }

    fn dial(address: &str, timeout: Duration) -> io::Result<TcpStream> {
        let resolved = address
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(ErrorKind::NotFound, "Could not resolve address"))?;
        debug!("Resolved address: {:?}", resolved);

        let stream = if timeout.is_zero() {
            TcpStream::connect(resolved)?
        } else {
            TcpStream::connect_timeout(&resolved, timeout)?
        };
        debug!("Connection established");
        Ok(stream)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Records that the server moved this connection into a device's scope.
    pub(crate) fn promote(&mut self, request: &str) -> Result<()> {
        if let Scope::Device(previous) = &self.scope {
            return Err(AdbError::Usage(format!(
                "connection already promoted by '{}', refusing '{}'",
                previous, request
            )));
        }
        self.scope = Scope::Device(request.to_string());
        Ok(())
    }

    /// Applies a read/write deadline. Zero leaves the socket blocking forever.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        if timeout.is_zero() {
            return Ok(());
        }
        self.stream.set_read_timeout(Some(timeout))?;
        self.stream.set_write_timeout(Some(timeout))?;
        debug!("Timeouts set to {:?}", timeout);
        Ok(())
    }

    /// Send a command to the ADB server
    pub fn send_command(&mut self, command: &str) -> Result<()> {
        debug!("Sending command: {}", command);
        let request = protocol::encode_command(command)?;
        self.write_all(&request)
    }

    /// Write all bytes to the connection
    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.stream.write_all(buf)?;
        Ok(())
    }

    /// Reads up to `n` bytes, stopping early when the peer closes.
    ///
    /// A short result is not an error here; callers that need all `n` bytes
    /// check the length. Deadline expiry is still reported as an error.
    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        let mut filled = 0;

        while filled < n {
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) => {
                    debug!("Server closed the connection after {} of {} bytes", filled, n);
                    break;
                }
                Ok(read) => filled += read,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(AdbError::Io(e));
                }
                Err(e) => {
                    debug!("Error reading from socket: {}", e);
                    break;
                }
            }
        }

        buf.truncate(filled);
        Ok(buf)
    }

    /// Like [`read_exact`](Self::read_exact) but a short read is a `Truncated` error.
    pub fn read_full(&mut self, n: usize) -> Result<Vec<u8>> {
        let data = self.read_exact(n)?;
        if data.len() != n {
            return Err(AdbError::Truncated {
                expected: n,
                actual: data.len(),
            });
        }
        Ok(data)
    }

    /// Reads a trimmed, lossily decoded string of up to `n` bytes.
    pub fn read_string(&mut self, n: usize) -> Result<String> {
        let data = self.read_exact(n)?;
        Ok(String::from_utf8_lossy(&data).trim().to_string())
    }

    /// Reads a `%04x`-length-prefixed block.
    pub fn read_block(&mut self) -> Result<Vec<u8>> {
        let header = self.read_full(4)?;
        let len = protocol::parse_hex_length(&header)?;
        trace!("Block length: {}", len);
        self.read_full(len)
    }

    pub fn read_block_string(&mut self) -> Result<String> {
        let block = self.read_block()?;
        Ok(String::from_utf8_lossy(&block).trim().to_string())
    }

    /// Reads fixed chunks until the peer closes the connection.
    pub fn read_until_close(&mut self) -> Result<Vec<u8>> {
        let mut response = Vec::new();
        loop {
            let chunk = self.read_exact(CHUNK_SIZE)?;
            if chunk.is_empty() {
                break;
            }
            response.extend_from_slice(&chunk);
        }
        debug!("Read {} bytes until close", response.len());
        Ok(response)
    }

    pub fn read_status(&mut self) -> Result<Status> {
        let token = self.read_exact(4)?;
        trace!("Status token: {:?}", String::from_utf8_lossy(&token));
        Ok(match token.as_slice() {
            t if t == OKAY => Status::Okay,
            t if t == FAIL => Status::Fail,
            _ => Status::Other(token),
        })
    }

    /// Whether the next 4 bytes are `OKAY`.
    pub fn check_okay(&mut self) -> Result<bool> {
        Ok(self.read_status()? == Status::Okay)
    }

    /// Reads the status token and turns `FAIL` into an error carrying the
    /// server's diagnostic block.
    pub fn expect_okay(&mut self) -> Result<()> {
        match self.read_status()? {
            Status::Okay => Ok(()),
            Status::Fail => Err(AdbError::Status(self.read_failure_message())),
            Status::Other(token) if token.is_empty() => Err(AdbError::Status(
                "connection closed before status".to_string(),
            )),
            Status::Other(token) => Err(AdbError::Desync(format!(
                "expected OKAY or FAIL, got {:?}",
                String::from_utf8_lossy(&token)
            ))),
        }
    }

    /// The block that follows `FAIL`. Missing or malformed blocks yield a
    /// placeholder rather than masking the failure itself.
    pub fn read_failure_message(&mut self) -> String {
        match self.read_block_string() {
            Ok(message) if !message.is_empty() => message,
            Ok(_) => "unknown failure".to_string(),
            Err(e) => {
                debug!("Could not read failure message: {}", e);
                "unknown failure".to_string()
            }
        }
    }

    /// A second handle to the socket. Shutting it down from another thread
    /// unblocks a pending read here.
    pub fn try_clone_stream(&self) -> Result<TcpStream> {
        Ok(self.stream.try_clone()?)
    }

    /// Releases the socket. Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            if e.kind() != ErrorKind::NotConnected {
                debug!("Error closing connection to {}: {}", self.address, e);
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Hands out the raw socket, for tunnels to device-local services.
    pub fn into_stream(self) -> TcpStream {
        self.stream
    }
}

impl Read for AdbConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for AdbConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl std::fmt::Debug for AdbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdbConnection")
            .field("address", &self.address)
            .field("scope", &self.scope)
            .field("closed", &self.closed)
            .finish()
    }
}
