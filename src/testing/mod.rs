pub mod mocks;

pub use mocks::{BrokenLauncher, MockAdbServer, MockLauncher, MockState};
