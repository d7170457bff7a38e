pub use m2k_types;

pub mod builder;
pub mod bus;
pub mod channel;
pub mod config;
pub mod devices;
pub mod error;
pub mod identify;
pub mod registry;
pub mod session;
pub mod trigger;

pub use config::RegistryConfig;
pub use error::{BusError, HalError};
pub use registry::{DeviceHandle, DeviceRegistry};
pub use session::Session;
