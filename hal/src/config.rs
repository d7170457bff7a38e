use m2k_types::{FirmwareVersion, Transport};
use serde::{Deserialize, Serialize};

/// Knobs for how a [`DeviceRegistry`](crate::registry::DeviceRegistry) opens instruments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Which transport an open without a URI scans.
    pub scan_transport: Transport,

    /// Put every trigger stage back to neutral as part of opening an M2K.
    pub reset_triggers_on_open: bool,

    /// Assumed when an M2K doesn't report its firmware version.
    pub fallback_firmware: FirmwareVersion,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            scan_transport: Transport::Usb,
            reset_triggers_on_open: true,
            fallback_firmware: FirmwareVersion::V0_23,
        }
    }
}
