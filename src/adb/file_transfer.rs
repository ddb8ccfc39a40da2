use crate::adb::connection::AdbConnection;
use crate::adb::device::AdbDevice;
use crate::adb::protocol::{
    self, sync, FileStat, CHUNK_SIZE, SYNC_DATA_MAX, SYNC_NAME_MAX, S_IFREG,
};
use crate::error::{AdbError, Result};
use crate::progress::{NoOpProgress, ProgressReporter};
use chrono::Utc;
use log::*;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::time::Duration;

/// How long push verification keeps polling the remote size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
        }
    }
}

/// File operations over the sync protocol. Each call opens its own
/// connection and closes it before returning.
pub struct SyncClient {
    device: AdbDevice,
    progress: Box<dyn ProgressReporter>,
    verify: VerifyPolicy,
}

impl SyncClient {
    pub fn new(device: AdbDevice) -> Self {
        Self {
            device,
            progress: Box::new(NoOpProgress),
            verify: VerifyPolicy::default(),
        }
    }

    /// Enable progress reporting
    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_verify_policy(mut self, verify: VerifyPolicy) -> Self {
        self.verify = verify;
        self
    }

    /// Enters sync mode and sends one request header with `path`.
    fn prepare(&self, opcode: &[u8; 4], path: &str) -> Result<AdbConnection> {
        let mut conn = self.device.open_transport(self.device.default_timeout())?;
        conn.send_command("sync:")?;
        conn.expect_okay()?;

        debug!(
            "Sending sync command: {} {}",
            String::from_utf8_lossy(opcode),
            path
        );
        conn.write_all(&protocol::encode_sync_request(opcode, path.as_bytes()))?;
        Ok(conn)
    }

    /// Get file statistics. A missing path comes back with `mtime == None`.
    pub fn stat(&self, path: &str) -> Result<FileStat> {
        let mut conn = self.prepare(sync::STAT, path)?;
        let reply = conn.read_full(16)?;
        conn.close();

        if &reply[..4] != sync::STAT {
            debug!(
                "STAT reply tagged {:?}",
                String::from_utf8_lossy(&reply[..4])
            );
        }
        let [mode, size, mtime] = protocol::le_words::<3>(&reply[4..]);
        Ok(FileStat::from_wire(path, mode, size, mtime))
    }

    pub fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.stat(path)?.exists())
    }

    /// Directory entries of `path`, without `.` and `..`.
    pub fn list(&self, path: &str) -> Result<Vec<FileStat>> {
        let mut conn = self.prepare(sync::LIST, path)?;
        let mut entries = Vec::new();

        loop {
            let tag = conn.read_exact(4)?;
            if tag == sync::DONE {
                break;
            }
            if tag.len() < 4 {
                return Err(AdbError::Truncated {
                    expected: 4,
                    actual: tag.len(),
                });
            }
            if tag != sync::DENT {
                trace!("LIST entry tagged {:?}", String::from_utf8_lossy(&tag));
            }

            let header = conn.read_full(16)?;
            let [mode, size, mtime, name_len] = protocol::le_words::<4>(&header);
            let name_len =
                protocol::check_wire_length("LIST name", name_len as usize, SYNC_NAME_MAX)?;
            let name = conn.read_full(name_len)?;
            let name = String::from_utf8_lossy(&name).into_owned();

            if name == "." || name == ".." {
                continue;
            }
            entries.push(FileStat::from_wire(name, mode, size, mtime));
        }

        conn.close();
        debug!("Listed {} entries in {}", entries.len(), path);
        Ok(entries)
    }

    /// Streams `reader` to `dst` as a regular file with permission bits `mode`.
    /// Returns the number of bytes sent.
    pub fn push_reader<R: Read>(
        &self,
        mut reader: R,
        dst: &str,
        mode: u32,
        check: bool,
    ) -> Result<u64> {
        let header = format!("{},{}", dst, S_IFREG | mode);
        let mut conn = self.prepare(sync::SEND, &header)?;

        let mut buffer = [0u8; CHUNK_SIZE];
        let mut bytes_sent = 0u64;

        loop {
            let bytes_read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            conn.write_all(&protocol::encode_sync_request(
                sync::DATA,
                &buffer[..bytes_read],
            ))?;
            bytes_sent += bytes_read as u64;
            self.progress.update(bytes_sent);
        }

        let mtime = u32::try_from(Utc::now().timestamp()).unwrap_or(0);
        conn.write_all(&protocol::encode_sync_word(sync::DONE, mtime))?;
        Self::read_send_ack(&mut conn)?;
        conn.close();
        self.progress.finish();

        if check {
            self.verify_size(dst, bytes_sent)?;
        }
        info!("Pushed {} bytes to {}", bytes_sent, dst);
        Ok(bytes_sent)
    }

    /// Push a local file to the device
    pub fn push(&self, src: &Path, dst: &str, mode: u32, check: bool) -> Result<u64> {
        info!("Pushing {} to {}", src.display(), dst);
        let file = File::open(src)?;
        self.progress.start(file.metadata()?.len());
        self.push_reader(file, dst, mode, check)
    }

    /// The server acknowledges a finished SEND with `OKAY` or `FAIL`+message.
    /// A server that closes without a word is taken at face value.
    fn read_send_ack(conn: &mut AdbConnection) -> Result<()> {
        let ack = conn.read_exact(8)?;
        if ack.is_empty() {
            debug!("Connection closed without SEND acknowledgement");
            return Ok(());
        }
        if ack.len() < 8 {
            return Err(AdbError::Truncated {
                expected: 8,
                actual: ack.len(),
            });
        }

        let [len] = protocol::le_words::<1>(&ack[4..]);
        match &ack[..4] {
            tag if tag == sync::OKAY => Ok(()),
            tag if tag == sync::FAIL => {
                let len =
                    protocol::check_wire_length("FAIL message", len as usize, SYNC_DATA_MAX)?;
                let message = conn.read_string(len)?;
                Err(AdbError::Status(message))
            }
            tag => Err(AdbError::Desync(format!(
                "unexpected SEND reply {:?}",
                String::from_utf8_lossy(tag)
            ))),
        }
    }

    /// Polls STAT until the remote size reaches `expected`, with bounded
    /// exponential backoff.
    fn verify_size(&self, dst: &str, expected: u64) -> Result<()> {
        let mut backoff = self.verify.initial_backoff;
        let mut actual = 0u64;

        for attempt in 1..=self.verify.attempts {
            actual = u64::from(self.stat(dst)?.size);
            if actual == expected {
                debug!("Verified {} after {} attempt(s)", dst, attempt);
                return Ok(());
            }
            debug!(
                "Push not complete, expected {} bytes, found {} (attempt {})",
                expected, actual, attempt
            );
            if attempt < self.verify.attempts {
                std::thread::sleep(backoff);
                backoff = (backoff * 2).min(self.verify.max_backoff);
            }
        }

        Err(AdbError::VerifyTimeout {
            path: dst.to_string(),
            expected,
            actual,
        })
    }

    /// Receives the whole content of `path`.
    ///
    /// A `FAIL` from the device, or a tag outside DATA/DONE/FAIL, ends the
    /// transfer early: it is logged and the bytes received so far returned.
    pub fn recv(&self, path: &str) -> Result<Vec<u8>> {
        let mut conn = self.prepare(sync::RECV, path)?;
        let mut content = Vec::new();

        loop {
            let tag = conn.read_exact(4)?;
            match tag.as_slice() {
                t if t == sync::DATA => {
                    let Some(len) = Self::read_le_length(&mut conn)? else {
                        error!("DATA without length while pulling {}", path);
                        break;
                    };
                    let len = protocol::check_wire_length("DATA", len, SYNC_DATA_MAX)?;
                    let chunk = conn.read_exact(len)?;
                    if chunk.len() != len {
                        warn!("read chunk missing: {} of {} bytes", chunk.len(), len);
                    }
                    content.extend_from_slice(&chunk);
                    self.progress.update(content.len() as u64);
                }
                t if t == sync::DONE => break,
                t if t == sync::FAIL => {
                    let message = match Self::read_le_length(&mut conn)? {
                        Some(len) => conn.read_string(protocol::check_wire_length(
                            "FAIL message",
                            len,
                            SYNC_DATA_MAX,
                        )?)?,
                        None => String::new(),
                    };
                    warn!("Get {} error: {}", path, message);
                    break;
                }
                other => {
                    error!(
                        "Invalid sync tag {:?} while pulling {}",
                        String::from_utf8_lossy(other),
                        path
                    );
                    break;
                }
            }
        }

        conn.close();
        self.progress.finish();
        Ok(content)
    }

    fn read_le_length(conn: &mut AdbConnection) -> Result<Option<usize>> {
        let raw = conn.read_exact(4)?;
        if raw.len() < 4 {
            return Ok(None);
        }
        let [len] = protocol::le_words::<1>(&raw);
        Ok(Some(len as usize))
    }

    pub fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        self.recv(path)
    }

    pub fn read_text(&self, path: &str) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.recv(path)?).into_owned())
    }

    /// Pull a file from the device into `dst`, truncating it first.
    pub fn pull(&self, src: &str, dst: &Path) -> Result<usize> {
        info!("Pulling {} to {}", src, dst.display());
        let mut file = File::create(dst)?;
        let content = self.recv(src)?;
        file.write_all(&content)?;
        Ok(content.len())
    }
}

/// Permission bits of a local file, for use as a push mode.
#[cfg(unix)]
pub fn local_file_mode(path: &Path) -> Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    Ok(fs::metadata(path)?.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
pub fn local_file_mode(path: &Path) -> Result<u32> {
    fs::metadata(path)?;
    Ok(0o644)
}
