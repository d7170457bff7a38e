use crate::builder;
use crate::bus::AttributeBus;
use crate::config::RegistryConfig;
use crate::devices::generic::GenericDevice;
use crate::devices::m2k::M2k;
use crate::devices::Instrument;
use crate::error::HalError;
use crate::identify;
use log::{debug, info, warn};
use m2k_types::DeviceKind;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// An open instrument, owned by the registry. Dropping it releases the bus context.
pub struct DeviceHandle {
    session: u64,
    instrument: Instrument,
}

impl DeviceHandle {
    /// Unique per open, a reopened URI gets a new value.
    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn uri(&self) -> &str {
        self.instrument.uri()
    }

    pub fn kind(&self) -> DeviceKind {
        self.instrument.kind()
    }

    pub fn name(&self) -> String {
        self.instrument.name()
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn instrument_mut(&mut self) -> &mut Instrument {
        &mut self.instrument
    }

    pub fn generic(&self) -> &GenericDevice {
        self.instrument.generic()
    }

    pub fn generic_mut(&mut self) -> &mut GenericDevice {
        self.instrument.generic_mut()
    }

    pub fn as_m2k_mut(&mut self) -> Option<&mut M2k> {
        self.instrument.as_m2k_mut()
    }
}

/// The open instruments, at most one per URI.
pub struct DeviceRegistry {
    bus: Box<dyn AttributeBus>,
    config: RegistryConfig,
    devices: HashMap<String, DeviceHandle>,
    last_session: u64,
}

impl DeviceRegistry {
    pub fn new(bus: Box<dyn AttributeBus>) -> Self {
        Self::with_config(bus, RegistryConfig::default())
    }

    pub fn with_config(bus: Box<dyn AttributeBus>, config: RegistryConfig) -> Self {
        Self {
            bus,
            config,
            devices: HashMap::new(),
            last_session: 0,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// URIs of the instruments reachable over the configured transport.
    pub fn list_devices(&self) -> Result<Vec<String>, HalError> {
        Ok(self.bus.scan(self.config.scan_transport)?)
    }

    /// Returns the handle already open for `uri`, or connects, identifies and builds one.
    pub fn open(&mut self, uri: &str) -> Result<&mut DeviceHandle, HalError> {
        match self.devices.entry(uri.to_owned()) {
            Entry::Occupied(entry) => {
                debug!("{} is already open, reusing it", uri);
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                let context = self.bus.create_context(uri).map_err(|error| {
                    warn!("Unable to open {}: {}", uri, error);
                    HalError::no_device(uri, Some(error))
                })?;

                let kind = identify::classify(&*context);
                let instrument = builder::build(kind, uri, context, &self.config)?;

                self.last_session += 1;
                info!("Opened {} as {} (session {})", uri, kind, self.last_session);
                Ok(entry.insert(DeviceHandle {
                    session: self.last_session,
                    instrument,
                }))
            }
        }
    }

    /// Opens the first instrument the scan reports. There's no ranking when more than one
    /// is attached, and a scan that fails finds nothing.
    pub fn open_default(&mut self) -> Result<&mut DeviceHandle, HalError> {
        let transport = self.config.scan_transport;
        let uris = match self.bus.scan(transport) {
            Ok(uris) => uris,
            Err(error) => {
                warn!("Scanning {} failed: {}", transport, error);
                return Err(HalError::no_device(
                    format!("scan over {} failed", transport),
                    Some(error),
                ));
            }
        };
        if uris.len() > 1 {
            info!("{} instruments found, using {}", uris.len(), uris[0]);
        }

        match uris.into_iter().next() {
            Some(uri) => self.open(&uri),
            None => Err(HalError::no_device(
                format!("nothing found over {}", transport),
                None,
            )),
        }
    }

    pub fn get(&self, uri: &str) -> Option<&DeviceHandle> {
        self.devices.get(uri)
    }

    pub fn get_mut(&mut self, uri: &str) -> Option<&mut DeviceHandle> {
        self.devices.get_mut(uri)
    }

    pub fn is_open(&self, uri: &str) -> bool {
        self.devices.contains_key(uri)
    }

    pub fn open_uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.devices.keys().cloned().collect();
        uris.sort();
        uris
    }

    /// Releases the handle with this `session`. False when it's already gone, which
    /// includes a URI that has since been reopened under a new session.
    pub fn close(&mut self, session: u64) -> bool {
        let uri = self
            .devices
            .iter()
            .find(|(_, handle)| handle.session == session)
            .map(|(uri, _)| uri.clone());

        match uri.and_then(|uri| self.devices.remove_entry(&uri)) {
            Some((uri, _)) => {
                info!("Closing {} (session {})", uri, session);
                true
            }
            None => {
                debug!("Session {} isn't open, nothing to close", session);
                false
            }
        }
    }

    pub fn shutdown(&mut self) {
        if !self.devices.is_empty() {
            info!("Closing {} open instruments", self.devices.len());
        }
        self.devices.clear();
    }
}
