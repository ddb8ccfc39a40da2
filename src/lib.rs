pub mod adb;
pub mod config;
pub mod error;
pub mod progress;

#[cfg(test)]
pub mod testing;



pub use adb::{AdbClient, AdbDevice, DeviceIdentity};
pub use config::ClientConfig;
pub use error::{AdbError, Result};
