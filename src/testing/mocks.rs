//! In-process ADB server speaking enough of the host and sync protocols to
//! exercise the client end to end.

use crate::adb::protocol::{S_IFDIR, S_IFMT, S_IFREG};
use crate::adb::{AdbClient, ServerLauncher};
use crate::config::ClientConfig;
use crate::error::{AdbError, Result};
use std::collections::{BTreeMap, HashMap};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

pub const DEFAULT_MTIME: u32 = 1_700_000_000;
const RECV_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct MockDevice {
    pub serial: String,
    pub transport_id: u32,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockFile {
    pub mode: u32,
    pub data: Vec<u8>,
    pub mtime: u32,
}

/// Everything the mock server knows, plus a log of what it was asked.
#[derive(Debug, Clone)]
pub struct MockState {
    pub version: u32,
    pub devices: Vec<MockDevice>,
    pub extra_device_lines: Vec<String>,
    pub connect_reply: Option<String>,
    pub shell: HashMap<String, String>,
    pub props: BTreeMap<String, String>,
    pub forwards: Vec<(String, String, String)>,
    pub files: BTreeMap<String, MockFile>,
    /// Bytes sent verbatim as the reply to RECV of a path.
    pub raw_recv: HashMap<String, Vec<u8>>,
    /// Bytes sent verbatim as the reply to LIST of a path.
    pub raw_list: HashMap<String, Vec<u8>>,
    /// Size reported by STAT regardless of the stored content.
    pub stat_size_override: HashMap<String, u32>,
    pub requests: Vec<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            version: 0x28,
            devices: Vec::new(),
            extra_device_lines: Vec::new(),
            connect_reply: None,
            shell: HashMap::new(),
            props: BTreeMap::new(),
            forwards: Vec::new(),
            files: BTreeMap::new(),
            raw_recv: HashMap::new(),
            raw_list: HashMap::new(),
            stat_size_override: HashMap::new(),
            requests: Vec::new(),
        }
    }
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, serial: &str, transport_id: u32) -> Self {
        self.devices.push(MockDevice {
            serial: serial.to_string(),
            transport_id,
            model: format!("Model_{}", transport_id),
        });
        self
    }

    pub fn with_device_line(mut self, line: &str) -> Self {
        self.extra_device_lines.push(line.to_string());
        self
    }

    pub fn with_connect_reply(mut self, reply: &str) -> Self {
        self.connect_reply = Some(reply.to_string());
        self
    }

    pub fn with_shell(mut self, command: &str, output: &str) -> Self {
        self.shell.insert(command.to_string(), output.to_string());
        self
    }

    pub fn with_prop(mut self, key: &str, value: &str) -> Self {
        self.props.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_forward(mut self, serial: &str, local: &str, remote: &str) -> Self {
        self.forwards
            .push((serial.to_string(), local.to_string(), remote.to_string()));
        self
    }

    pub fn with_file(mut self, path: &str, data: &[u8]) -> Self {
        self.files.insert(
            path.to_string(),
            MockFile {
                mode: S_IFREG | 0o644,
                data: data.to_vec(),
                mtime: DEFAULT_MTIME,
            },
        );
        self
    }

    pub fn with_dir(mut self, path: &str) -> Self {
        self.files.insert(
            path.to_string(),
            MockFile {
                mode: S_IFDIR | 0o755,
                data: Vec::new(),
                mtime: DEFAULT_MTIME,
            },
        );
        self
    }

    pub fn with_raw_recv(mut self, path: &str, bytes: &[u8]) -> Self {
        self.raw_recv.insert(path.to_string(), bytes.to_vec());
        self
    }

    pub fn with_raw_list(mut self, path: &str, bytes: &[u8]) -> Self {
        self.raw_list.insert(path.to_string(), bytes.to_vec());
        self
    }

    pub fn with_stat_size(mut self, path: &str, size: u32) -> Self {
        self.stat_size_override.insert(path.to_string(), size);
        self
    }

    fn find_device(&self, serial: Option<&str>, id: Option<u32>) -> Option<MockDevice> {
        self.devices
            .iter()
            .find(|d| Some(d.serial.as_str()) == serial || Some(d.transport_id) == id)
            .cloned()
    }

    fn device_list(&self) -> String {
        let mut out = String::new();
        for d in &self.devices {
            out.push_str(&format!(
                "{:<22} device product:sdk_{} model:{} device:generic_{} transport_id:{}\n",
                d.serial, d.transport_id, d.model, d.transport_id, d.transport_id
            ));
        }
        for line in &self.extra_device_lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    fn shell_output(&self, command: &str) -> String {
        if let Some(output) = self.shell.get(command) {
            return output.clone();
        }
        if command == "getprop" {
            return self
                .props
                .iter()
                .map(|(k, v)| format!("[{}]: [{}]\n", k, v))
                .collect();
        }
        if let Some(key) = command.strip_prefix("getprop ") {
            return format!("{}\n", self.props.get(key.trim()).cloned().unwrap_or_default());
        }
        if let Some(text) = command.strip_prefix("echo ") {
            return format!("{}\n", text);
        }
        String::new()
    }
}

pub struct MockAdbServer {
    addr: SocketAddr,
    state: Arc<Mutex<MockState>>,
}

impl MockAdbServer {
    pub fn start(state: MockState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        Self::serve(listener, state)
    }

    pub fn start_on(port: u16, state: MockState) -> io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port))?;
        Ok(Self::serve(listener, state))
    }

    fn serve(listener: TcpListener, state: MockState) -> Self {
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(state));
        let shared = Arc::clone(&state);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let state = Arc::clone(&shared);
                thread::spawn(move || {
                    let _ = handle_connection(stream, state);
                });
            }
        });

        Self { addr, state }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new("127.0.0.1", self.port(), Duration::from_secs(5))
    }

    pub fn client(&self) -> AdbClient {
        AdbClient::new(self.config())
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn requests(&self) -> Vec<String> {
        self.state().requests.clone()
    }

    pub fn file(&self, path: &str) -> Option<MockFile> {
        self.state().files.get(path).cloned()
    }
}

fn okay(s: &mut TcpStream) -> io::Result<()> {
    s.write_all(b"OKAY")
}

fn block(s: &mut TcpStream, text: &str) -> io::Result<()> {
    s.write_all(format!("{:04x}{}", text.len(), text).as_bytes())
}

fn fail(s: &mut TcpStream, message: &str) -> io::Result<()> {
    s.write_all(b"FAIL")?;
    block(s, message)
}

fn sync_word(s: &mut TcpStream, tag: &[u8; 4], value: u32) -> io::Result<()> {
    s.write_all(tag)?;
    s.write_all(&value.to_le_bytes())
}

fn read_request(s: &mut TcpStream) -> io::Result<Option<String>> {
    let mut len = [0u8; 4];
    match s.read_exact(&mut len) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = usize::from_str_radix(std::str::from_utf8(&len).unwrap_or("0"), 16).unwrap_or(0);
    let mut body = vec![0u8; len];
    s.read_exact(&mut body)?;
    Ok(Some(String::from_utf8_lossy(&body).into_owned()))
}

fn handle_connection(mut s: TcpStream, state: Arc<Mutex<MockState>>) -> io::Result<()> {
    let mut device: Option<MockDevice> = None;

    while let Some(request) = read_request(&mut s)? {
        state.lock().unwrap().requests.push(request.clone());

        if let Some(dev) = &device {
            return device_service(&mut s, &state, dev, &request);
        }

        if let Some(serial) = request.strip_prefix("host:transport:") {
            let found = state.lock().unwrap().find_device(Some(serial), None);
            match found {
                Some(d) => {
                    okay(&mut s)?;
                    device = Some(d);
                    continue;
                }
                None => return fail(&mut s, &format!("device '{}' not found", serial)),
            }
        }
        if let Some(id) = request.strip_prefix("host:transport-id:") {
            let found = state
                .lock()
                .unwrap()
                .find_device(None, id.parse().ok());
            match found {
                Some(d) => {
                    okay(&mut s)?;
                    device = Some(d);
                    continue;
                }
                None => return fail(&mut s, &format!("no device with transport id '{}'", id)),
            }
        }

        return host_service(&mut s, &state, &request);
    }
    Ok(())
}

fn host_service(s: &mut TcpStream, state: &Arc<Mutex<MockState>>, request: &str) -> io::Result<()> {
    let snapshot = state.lock().unwrap().clone();

    match request {
        "host:version" => {
            okay(s)?;
            block(s, &format!("{:04x}", snapshot.version))
        }
        "host:kill" => {
            okay(s)?;
            s.shutdown(Shutdown::Both)
        }
        "host:devices-l" => {
            okay(s)?;
            block(s, &snapshot.device_list())
        }
        _ => {
            if let Some(address) = request.strip_prefix("host:connect:") {
                okay(s)?;
                let reply = snapshot
                    .connect_reply
                    .unwrap_or_else(|| format!("connected to {}", address));
                return block(s, &reply);
            }
            if let Some(address) = request.strip_prefix("host:disconnect:") {
                okay(s)?;
                return block(s, &format!("disconnected {}", address));
            }
            if let Some((dev, sub)) = scoped_target(&snapshot, request) {
                return scoped_service(s, state, &dev, sub);
            }
            fail(s, &format!("unknown host service '{}'", request))
        }
    }
}

/// Splits `host-serial:<serial>:<sub>` / `host-transport-id:<id>:<sub>`.
fn scoped_target<'a>(state: &MockState, request: &'a str) -> Option<(MockDevice, &'a str)> {
    if let Some(rest) = request.strip_prefix("host-transport-id:") {
        let (id, sub) = rest.split_once(':')?;
        return Some((state.find_device(None, id.parse().ok())?, sub));
    }
    let rest = request.strip_prefix("host-serial:")?;
    state.devices.iter().find_map(|d| {
        rest.strip_prefix(d.serial.as_str())
            .and_then(|r| r.strip_prefix(':'))
            .map(|sub| (d.clone(), sub))
    })
}

fn scoped_service(
    s: &mut TcpStream,
    state: &Arc<Mutex<MockState>>,
    dev: &MockDevice,
    sub: &str,
) -> io::Result<()> {
    match sub {
        "get-state" => {
            okay(s)?;
            block(s, "device")
        }
        "get-serialno" => {
            okay(s)?;
            block(s, &dev.serial)
        }
        "get-devpath" => {
            okay(s)?;
            block(s, &format!("usb:1-{}", dev.transport_id))
        }
        "features" => {
            okay(s)?;
            block(s, "shell_v2,cmd,stat_v2")
        }
        "list-forward" => {
            let text: String = state
                .lock()
                .unwrap()
                .forwards
                .iter()
                .map(|(serial, local, remote)| format!("{} {} {}\n", serial, local, remote))
                .collect();
            okay(s)?;
            block(s, &text)
        }
        _ => {
            let Some(spec) = sub.strip_prefix("forward:") else {
                return fail(s, &format!("unsupported '{}'", sub));
            };
            let (no_rebind, spec) = match spec.strip_prefix("norebind:") {
                Some(rest) => (true, rest),
                None => (false, spec),
            };
            let Some((local, remote)) = spec.split_once(';') else {
                return fail(s, "malformed forward");
            };

            okay(s)?;
            let mut st = state.lock().unwrap();
            let existing = st.forwards.iter().position(|(_, l, _)| l == local);
            match (existing, no_rebind) {
                (Some(_), true) => {
                    drop(st);
                    fail(s, &format!("cannot rebind existing socket {}", local))
                }
                (Some(i), false) => {
                    st.forwards[i] = (dev.serial.clone(), local.to_string(), remote.to_string());
                    okay(s)
                }
                (None, _) => {
                    st.forwards
                        .push((dev.serial.clone(), local.to_string(), remote.to_string()));
                    okay(s)
                }
            }
        }
    }
}

fn device_service(
    s: &mut TcpStream,
    state: &Arc<Mutex<MockState>>,
    _dev: &MockDevice,
    request: &str,
) -> io::Result<()> {
    if let Some(command) = request.strip_prefix("shell:") {
        let output = state.lock().unwrap().shell_output(command);
        okay(s)?;
        s.write_all(output.as_bytes())?;
        return s.shutdown(Shutdown::Both);
    }
    if request == "sync:" {
        okay(s)?;
        return sync_loop(s, state);
    }

    let raw = ["tcp:", "localabstract:", "localfilesystem:", "local:", "dev:", "localreserved:"];
    if raw.iter().any(|prefix| request.starts_with(prefix)) {
        okay(s)?;
        // Echo service
        let mut buf = [0u8; 1024];
        loop {
            let n = s.read(&mut buf)?;
            if n == 0 {
                return Ok(());
            }
            s.write_all(&buf[..n])?;
        }
    }

    fail(s, &format!("unknown service '{}'", request))
}

fn sync_loop(s: &mut TcpStream, state: &Arc<Mutex<MockState>>) -> io::Result<()> {
    loop {
        let mut header = [0u8; 8];
        match s.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        }
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let mut payload = vec![0u8; len];
        s.read_exact(&mut payload)?;
        let path = String::from_utf8_lossy(&payload).into_owned();
        let opcode = String::from_utf8_lossy(&header[..4]).into_owned();
        state
            .lock()
            .unwrap()
            .requests
            .push(format!("SYNC {} {}", opcode, path));

        match &header[..4] {
            b"STAT" => sync_stat(s, state, &path)?,
            b"LIST" => sync_list(s, state, &path)?,
            b"SEND" => sync_send(s, state, &path)?,
            b"RECV" => sync_recv(s, state, &path)?,
            _ => return Ok(()),
        }
    }
}

fn sync_stat(s: &mut TcpStream, state: &Arc<Mutex<MockState>>, path: &str) -> io::Result<()> {
    let st = state.lock().unwrap();
    let (mode, size, mtime) = match st.files.get(path) {
        Some(f) => (
            f.mode,
            st.stat_size_override
                .get(path)
                .copied()
                .unwrap_or(f.data.len() as u32),
            f.mtime,
        ),
        None => (0, 0, 0),
    };
    drop(st);
    s.write_all(b"STAT")?;
    for word in [mode, size, mtime] {
        s.write_all(&word.to_le_bytes())?;
    }
    Ok(())
}

fn parent_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) => "/",
        Some((parent, _)) => parent,
        None => "",
    }
}

fn sync_list(s: &mut TcpStream, state: &Arc<Mutex<MockState>>, path: &str) -> io::Result<()> {
    let raw = state.lock().unwrap().raw_list.get(path).cloned();
    if let Some(raw) = raw {
        s.write_all(&raw)?;
        return s.shutdown(Shutdown::Write);
    }

    let dir = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    let mut entries: Vec<(String, u32, u32, u32)> = vec![
        (".".into(), S_IFDIR | 0o755, 4096, DEFAULT_MTIME),
        ("..".into(), S_IFDIR | 0o755, 4096, DEFAULT_MTIME),
    ];
    {
        let st = state.lock().unwrap();
        for (file_path, f) in &st.files {
            if parent_of(file_path) == dir && file_path != dir {
                let name = file_path.rsplit('/').next().unwrap_or(file_path).to_string();
                let size = if f.mode & S_IFMT == S_IFDIR {
                    4096
                } else {
                    f.data.len() as u32
                };
                entries.push((name, f.mode, size, f.mtime));
            }
        }
    }

    for (name, mode, size, mtime) in entries {
        s.write_all(b"DENT")?;
        for word in [mode, size, mtime, name.len() as u32] {
            s.write_all(&word.to_le_bytes())?;
        }
        s.write_all(name.as_bytes())?;
    }
    s.write_all(b"DONE")?;
    s.write_all(&[0u8; 16])
}

fn sync_send(s: &mut TcpStream, state: &Arc<Mutex<MockState>>, spec: &str) -> io::Result<()> {
    let (path, mode) = match spec.rsplit_once(',') {
        Some((path, mode)) => (path.to_string(), mode.parse::<u32>().unwrap_or(0)),
        None => (spec.to_string(), S_IFREG | 0o644),
    };

    let mut data = Vec::new();
    let mtime = loop {
        let mut header = [0u8; 8];
        s.read_exact(&mut header)?;
        let value = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        match &header[..4] {
            b"DATA" => {
                let mut chunk = vec![0u8; value as usize];
                s.read_exact(&mut chunk)?;
                data.extend_from_slice(&chunk);
            }
            b"DONE" => break value,
            _ => return Ok(()),
        }
    };

    if path.starts_with("/proc/") {
        let message = "Read-only file system";
        s.write_all(b"FAIL")?;
        s.write_all(&(message.len() as u32).to_le_bytes())?;
        return s.write_all(message.as_bytes());
    }

    state
        .lock()
        .unwrap()
        .files
        .insert(path, MockFile { mode, data, mtime });
    sync_word(s, b"OKAY", 0)
}

fn sync_recv(s: &mut TcpStream, state: &Arc<Mutex<MockState>>, path: &str) -> io::Result<()> {
    let (raw, file) = {
        let st = state.lock().unwrap();
        (st.raw_recv.get(path).cloned(), st.files.get(path).cloned())
    };

    if let Some(raw) = raw {
        s.write_all(&raw)?;
        return s.shutdown(Shutdown::Write);
    }

    match file {
        Some(f) => {
            for chunk in f.data.chunks(RECV_CHUNK) {
                sync_word(s, b"DATA", chunk.len() as u32)?;
                s.write_all(chunk)?;
            }
            sync_word(s, b"DONE", 0)
        }
        None => {
            let message = "No such file or directory";
            sync_word(s, b"FAIL", message.len() as u32)?;
            s.write_all(message.as_bytes())
        }
    }
}

/// Launcher that "starts" a mock server on the requested port.
pub struct MockLauncher {
    state: MockState,
    pub started: Mutex<Vec<u16>>,
    servers: Mutex<Vec<MockAdbServer>>,
}

impl MockLauncher {
    pub fn new(state: MockState) -> Self {
        Self {
            state,
            started: Mutex::new(Vec::new()),
            servers: Mutex::new(Vec::new()),
        }
    }

    pub fn start_count(&self) -> usize {
        self.started.lock().unwrap().len()
    }
}

impl ServerLauncher for MockLauncher {
    fn start(&self, port: u16) -> Result<()> {
        self.started.lock().unwrap().push(port);
        let server = MockAdbServer::start_on(port, self.state.clone())?;
        self.servers.lock().unwrap().push(server);
        Ok(())
    }
}

/// Launcher whose executable is always missing.
pub struct BrokenLauncher;

impl ServerLauncher for BrokenLauncher {
    fn start(&self, _port: u16) -> Result<()> {
        Err(AdbError::Server("adb executable not found".to_string()))
    }
}
