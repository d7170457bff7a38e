use crate::bus::BusContext;
use crate::config::RegistryConfig;
use crate::devices::generic::GenericDevice;
use crate::devices::m2k::M2k;
use crate::devices::Instrument;
use crate::error::HalError;
use m2k_types::DeviceKind;

/// Constructs the device type for `kind`. A new instrument needs an arm here and a
/// signature in [`identify`](crate::identify).
pub fn build(
    kind: DeviceKind,
    uri: &str,
    context: Box<dyn BusContext>,
    config: &RegistryConfig,
) -> Result<Instrument, HalError> {
    let instrument = match kind {
        DeviceKind::M2k => Instrument::M2k(M2k::new(uri, context, config)?),

        // FMCOMMS is recognised but has nothing specialised to offer yet.
        DeviceKind::FmComms | DeviceKind::Generic => {
            Instrument::Generic(GenericDevice::new(uri, kind, context)?)
        }
    };
    Ok(instrument)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::simulated::SimulatedInstrument;
    use m2k_types::FirmwareVersion;

    #[test]
    fn every_kind_builds_its_device() {
        let config = RegistryConfig::default();

        let m2k = SimulatedInstrument::m2k("usb:1.2.5", FirmwareVersion::V0_26).into_context();
        let instrument = build(DeviceKind::M2k, "usb:1.2.5", Box::new(m2k), &config).unwrap();
        assert!(instrument.as_m2k().is_some());
        assert_eq!(instrument.name(), "M2K");

        let fmcomms = SimulatedInstrument::fmcomms("ip:192.168.2.1").into_context();
        let instrument = build(DeviceKind::FmComms, "ip:192.168.2.1", Box::new(fmcomms), &config).unwrap();
        assert!(instrument.as_m2k().is_none());
        assert_eq!(instrument.kind(), DeviceKind::FmComms);
        assert_eq!(instrument.name(), "FMCOMMS");
        assert_eq!(instrument.uri(), "ip:192.168.2.1");
    }

    #[test]
    fn m2k_without_its_scopes_fails() {
        let config = RegistryConfig::default();
        let fmcomms = SimulatedInstrument::fmcomms("ip:192.168.2.1").into_context();
        let result = build(DeviceKind::M2k, "ip:192.168.2.1", Box::new(fmcomms), &config);
        assert!(matches!(result, Err(HalError::InvalidParameter { .. })));
    }
}
