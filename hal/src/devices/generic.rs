use crate::bus::{AttributeAddress, BusContext, FIRMWARE_ATTRIBUTE};
use crate::channel::ChannelDevice;
use crate::error::HalError;
use crate::session::Session;
use log::{debug, warn};
use m2k_types::{DeviceKind, FirmwareVersion};
use std::collections::{BTreeMap, BTreeSet};

/// Any instrument: owns the context and exposes every scope that has channels, with no
/// knowledge of what the scopes are for.
pub struct GenericDevice {
    uri: String,
    kind: DeviceKind,
    context: Box<dyn BusContext>,
    channel_devices: BTreeMap<String, ChannelDevice>,
}

impl GenericDevice {
    pub fn new(uri: &str, kind: DeviceKind, context: Box<dyn BusContext>) -> Result<Self, HalError> {
        let mut channel_devices = BTreeMap::new();
        for scope in context.scopes() {
            if context.channels(&scope)?.is_empty() {
                continue;
            }
            let device = ChannelDevice::new(&*context, &scope, None)?;
            channel_devices.insert(scope, device);
        }

        debug!(
            "{} ({}) has {} scopes with channels",
            uri,
            kind,
            channel_devices.len()
        );
        Ok(Self {
            uri: uri.to_owned(),
            kind,
            context,
            channel_devices,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn name(&self) -> String {
        self.kind.to_string()
    }

    pub fn scopes(&self) -> BTreeSet<String> {
        self.context.scopes()
    }

    pub fn context_attribute(&self, name: &str) -> Option<String> {
        self.context.context_attribute(name)
    }

    /// None when the context doesn't say, or says something unreadable.
    pub fn firmware_version(&self) -> Option<FirmwareVersion> {
        let raw = self.context.context_attribute(FIRMWARE_ATTRIBUTE)?;
        match raw.parse() {
            Ok(version) => Some(version),
            Err(error) => {
                warn!("{}: {}", self.uri, error);
                None
            }
        }
    }

    pub fn channel_scopes(&self) -> impl Iterator<Item = &str> {
        self.channel_devices.keys().map(String::as_str)
    }

    pub fn channel_device(&mut self, scope: &str) -> Option<Session<'_, ChannelDevice>> {
        let device = self.channel_devices.get(scope)?;
        Some(Session::new(device, self.context.as_mut()))
    }

    pub fn read_attribute(&self, attribute: &AttributeAddress) -> Result<String, HalError> {
        Ok(self.context.read_string(attribute)?)
    }

    pub fn write_attribute(&mut self, attribute: &AttributeAddress, value: &str) -> Result<(), HalError> {
        Ok(self.context.write_string(attribute, value)?)
    }

    pub(crate) fn context_mut(&mut self) -> &mut dyn BusContext {
        self.context.as_mut()
    }
}
