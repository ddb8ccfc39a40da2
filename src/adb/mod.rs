pub mod client;
pub mod connection;
pub mod device;
pub mod file_transfer;
pub mod forward;
pub mod protocol;
pub mod server;
pub mod shell;
pub mod transport;



pub use client::AdbClient;
pub use connection::{AdbConnection, Scope, Status};
pub use device::{AdbDevice, DeviceInfo};
pub use file_transfer::{SyncClient, VerifyPolicy};
pub use forward::ForwardMapping;
pub use protocol::{FileStat, Network};
pub use server::{AdbServer, ProcessOutput, ServerLauncher};
pub use shell::ShellResult;
pub use transport::{DeviceIdentity, TransportTarget};

// Re-export commonly used types
pub use crate::error::Result;
