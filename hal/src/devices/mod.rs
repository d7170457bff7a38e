use crate::devices::generic::GenericDevice;
use crate::devices::m2k::M2k;
use m2k_types::DeviceKind;

pub mod generic;
pub mod m2k;

/// A constructed instrument, typed by what the identifier recognised.
pub enum Instrument {
    M2k(M2k),
    Generic(GenericDevice),
}

impl Instrument {
    pub fn generic(&self) -> &GenericDevice {
        match self {
            Instrument::M2k(m2k) => m2k.generic(),
            Instrument::Generic(device) => device,
        }
    }

    pub fn generic_mut(&mut self) -> &mut GenericDevice {
        match self {
            Instrument::M2k(m2k) => m2k.generic_mut(),
            Instrument::Generic(device) => device,
        }
    }

    pub fn kind(&self) -> DeviceKind {
        self.generic().kind()
    }

    pub fn uri(&self) -> &str {
        self.generic().uri()
    }

    pub fn name(&self) -> String {
        self.generic().name()
    }

    pub fn as_m2k(&self) -> Option<&M2k> {
        match self {
            Instrument::M2k(m2k) => Some(m2k),
            Instrument::Generic(_) => None,
        }
    }

    pub fn as_m2k_mut(&mut self) -> Option<&mut M2k> {
        match self {
            Instrument::M2k(m2k) => Some(m2k),
            Instrument::Generic(_) => None,
        }
    }
}
