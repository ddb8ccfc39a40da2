use crate::error::{AdbError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

// File mode constants
pub const S_IFMT: u32 = 0o170000; // bit mask for the file type bit field
pub const S_IFSOCK: u32 = 0o140000; // socket
pub const S_IFLNK: u32 = 0o120000; // symbolic link
pub const S_IFREG: u32 = 0o100000; // regular file
pub const S_IFBLK: u32 = 0o060000; // block device
pub const S_IFDIR: u32 = 0o040000; // directory
pub const S_IFCHR: u32 = 0o020000; // character device
pub const S_IFIFO: u32 = 0o010000; // FIFO

/// Chunk size for unbounded reads and for SEND payloads.
pub const CHUNK_SIZE: usize = 4096;

/// Largest payload a sync DATA frame may announce.
pub const SYNC_DATA_MAX: usize = 64 * 1024;

/// Largest file name a LIST entry may announce.
pub const SYNC_NAME_MAX: usize = 4096;

pub const OKAY: &[u8; 4] = b"OKAY";
pub const FAIL: &[u8; 4] = b"FAIL";

/// Sync protocol commands
pub mod sync {
    pub const DATA: &[u8; 4] = b"DATA";
    pub const DONE: &[u8; 4] = b"DONE";
    pub const DENT: &[u8; 4] = b"DENT";
    pub const SEND: &[u8; 4] = b"SEND";
    pub const RECV: &[u8; 4] = b"RECV";
    pub const LIST: &[u8; 4] = b"LIST";
    pub const STAT: &[u8; 4] = b"STAT";
    pub const FAIL: &[u8; 4] = b"FAIL";
    pub const OKAY: &[u8; 4] = b"OKAY";
}

/// Frames a host command as `%04x<command>`.
pub fn encode_command(command: &str) -> Result<Bytes> {
    let len = command.len();
    if len > 0xffff {
        return Err(AdbError::Usage(format!(
            "command of {} bytes does not fit a 4 hex digit length",
            len
        )));
    }
    let mut buf = BytesMut::with_capacity(4 + len);
    buf.put_slice(format!("{:04x}", len).as_bytes());
    buf.put_slice(command.as_bytes());
    Ok(buf.freeze())
}

/// Parses the 4 ASCII hex digits that prefix every textual server reply.
pub fn parse_hex_length(bytes: &[u8]) -> Result<usize> {
    let text = std::str::from_utf8(bytes)?;
    Ok(usize::from_str_radix(text.trim(), 16)?)
}

/// 8-byte sync header, opcode plus little-endian length, followed by `payload`.
pub fn encode_sync_request(opcode: &[u8; 4], payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(8 + payload.len());
    buf.put_slice(opcode);
    buf.put_u32_le(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// 8-byte sync header carrying a raw 32-bit argument instead of a length.
pub fn encode_sync_word(opcode: &[u8; 4], value: u32) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(opcode);
    out[4..].copy_from_slice(&value.to_le_bytes());
    out
}

/// Rejects a length read off the wire before anything is allocated for it.
pub fn check_wire_length(what: &str, len: usize, max: usize) -> Result<usize> {
    if len > max {
        return Err(AdbError::Desync(format!(
            "{} length {} exceeds {}",
            what, len, max
        )));
    }
    Ok(len)
}

/// Decodes consecutive little-endian `u32` words. Callers guarantee the length.
pub fn le_words<const N: usize>(bytes: &[u8]) -> [u32; N] {
    let mut words = [0u32; N];
    for (i, word) in words.iter_mut().enumerate() {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[i * 4..i * 4 + 4]);
        *word = u32::from_le_bytes(raw);
    }
    words
}

/// Result of a sync STAT or one LIST entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStat {
    pub path: String,
    pub mode: u32,
    pub size: u32,
    /// `None` when the wire value was zero, which means the path does not exist.
    pub mtime: Option<DateTime<Utc>>,
}

impl FileStat {
    pub fn from_wire(path: impl Into<String>, mode: u32, size: u32, mtime: u32) -> Self {
        let mtime = if mtime == 0 {
            None
        } else {
            DateTime::from_timestamp(i64::from(mtime), 0)
        };
        Self {
            path: path.into(),
            mode,
            size,
            mtime,
        }
    }

    pub fn exists(&self) -> bool {
        self.mtime.is_some()
    }

    pub fn is_dir(&self) -> bool {
        (self.mode & S_IFMT) == S_IFDIR
    }

    pub fn is_file(&self) -> bool {
        (self.mode & S_IFMT) == S_IFREG
    }

    pub fn is_link(&self) -> bool {
        (self.mode & S_IFMT) == S_IFLNK
    }

    pub fn file_type(&self) -> &'static str {
        match self.mode & S_IFMT {
            S_IFSOCK => "socket",
            S_IFLNK => "symlink",
            S_IFREG => "file",
            S_IFBLK => "block",
            S_IFDIR => "directory",
            S_IFCHR => "char",
            S_IFIFO => "fifo",
            _ => "unknown",
        }
    }

    pub fn permissions_string(&self) -> String {
        let mode = self.mode;
        let file_type = match mode & S_IFMT {
            S_IFIFO => 'p',
            S_IFCHR => 'c',
            S_IFDIR => 'd',
            S_IFBLK => 'b',
            S_IFREG => '-',
            S_IFLNK => 'l',
            S_IFSOCK => 's',
            _ => '?',
        };

        let mut out = String::with_capacity(10);
        out.push(file_type);
        out.push_str(&permission_triplet(mode >> 6, mode & 0o4000 != 0, 's'));
        out.push_str(&permission_triplet(mode >> 3, mode & 0o2000 != 0, 's'));
        out.push_str(&permission_triplet(mode, mode & 0o1000 != 0, 't'));
        out
    }
}

fn permission_triplet(bits: u32, special: bool, special_char: char) -> String {
    let mut triplet = String::with_capacity(3);
    triplet.push(if bits & 4 != 0 { 'r' } else { '-' });
    triplet.push(if bits & 2 != 0 { 'w' } else { '-' });
    triplet.push(match (bits & 1 != 0, special) {
        (false, false) => '-',
        (true, false) => 'x',
        (false, true) => special_char.to_ascii_uppercase(),
        (true, true) => special_char,
    });
    triplet
}

impl fmt::Display for FileStat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mtime = self
            .mtime
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{} {:>10} {} {}",
            self.permissions_string(),
            self.size,
            mtime,
            self.path
        )
    }
}

/// Device-local endpoint classes reachable through a raw connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Tcp,
    Unix,
    LocalAbstract,
    LocalFilesystem,
    Local,
    Dev,
    LocalReserved,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Unix => "unix",
            Network::LocalAbstract => "localabstract",
            Network::LocalFilesystem => "localfilesystem",
            Network::Local => "local",
            Network::Dev => "dev",
            Network::LocalReserved => "localreserved",
        }
    }

    /// The service request that attaches a transport to `address`.
    pub fn service(&self, address: &str) -> String {
        match self {
            Network::Tcp => format!("tcp:{}", address),
            Network::Unix | Network::LocalAbstract => format!("localabstract:{}", address),
            Network::LocalFilesystem | Network::Local | Network::Dev | Network::LocalReserved => {
                format!("{}:{}", self.as_str(), address)
            }
        }
    }
}

impl FromStr for Network {
    type Err = AdbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tcp" => Ok(Network::Tcp),
            "unix" => Ok(Network::Unix),
            "localabstract" => Ok(Network::LocalAbstract),
            "localfilesystem" => Ok(Network::LocalFilesystem),
            "local" => Ok(Network::Local),
            "dev" => Ok(Network::Dev),
            "localreserved" => Ok(Network::LocalReserved),
            other => Err(AdbError::Usage(format!("unsupported network: {}", other))),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
