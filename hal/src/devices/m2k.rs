use crate::bus::{BusContext, FIRMWARE_ATTRIBUTE};
use crate::channel::{ChannelDevice, Direction};
use crate::config::RegistryConfig;
use crate::devices::generic::GenericDevice;
use crate::error::HalError;
use crate::session::Session;
use crate::trigger::{TriggerController, TriggerRevision};
use enum_map::EnumMap;
use log::{info, warn};
use m2k_types::{DacChannel, DeviceKind, FirmwareVersion};

pub const ANALOG_IN: &str = "m2k-adc";
pub const ANALOG_OUT_A: &str = "m2k-dac-a";
pub const ANALOG_OUT_B: &str = "m2k-dac-b";
pub const DIGITAL_IN: &str = "m2k-logic-analyzer-rx";
pub const DIGITAL_OUT: &str = "m2k-logic-analyzer-tx";

/// An ADALM2000: two analog inputs, two analog outputs, sixteen digital lines and the
/// trigger stages its firmware provides.
pub struct M2k {
    base: GenericDevice,
    firmware: FirmwareVersion,
    analog_in: ChannelDevice,
    analog_out: EnumMap<DacChannel, ChannelDevice>,
    digital_in: ChannelDevice,
    digital_out: ChannelDevice,
    trigger: TriggerController,
}

fn firmware_of(context: &dyn BusContext, config: &RegistryConfig) -> FirmwareVersion {
    match context.context_attribute(FIRMWARE_ATTRIBUTE) {
        Some(raw) => match raw.parse() {
            Ok(version) => version,
            Err(error) => {
                warn!(
                    "{}: {}, assuming {}",
                    context.uri(),
                    error,
                    config.fallback_firmware
                );
                config.fallback_firmware
            }
        },
        None => {
            warn!(
                "{} doesn't report a firmware version, assuming {}",
                context.uri(),
                config.fallback_firmware
            );
            config.fallback_firmware
        }
    }
}

impl M2k {
    pub fn new(uri: &str, context: Box<dyn BusContext>, config: &RegistryConfig) -> Result<Self, HalError> {
        let firmware = firmware_of(&*context, config);
        let revision = TriggerRevision::for_firmware(firmware);

        let analog_in = ChannelDevice::new(&*context, ANALOG_IN, Some(Direction::Input))?;
        let analog_out = EnumMap::from_array([
            ChannelDevice::new(&*context, ANALOG_OUT_A, Some(Direction::Output))?,
            ChannelDevice::new(&*context, ANALOG_OUT_B, Some(Direction::Output))?,
        ]);
        let digital_in = ChannelDevice::new(&*context, DIGITAL_IN, Some(Direction::Input))?;
        let digital_out = ChannelDevice::new(&*context, DIGITAL_OUT, Some(Direction::Output))?;
        let trigger = TriggerController::new(&*context, revision)?;

        let mut base = GenericDevice::new(uri, DeviceKind::M2k, context)?;
        if config.reset_triggers_on_open {
            trigger.reset(base.context_mut())?;
        }

        info!("Opened M2K at {} running firmware {}", uri, firmware);
        Ok(Self {
            base,
            firmware,
            analog_in,
            analog_out,
            digital_in,
            digital_out,
            trigger,
        })
    }

    pub fn uri(&self) -> &str {
        self.base.uri()
    }

    pub fn name(&self) -> String {
        self.base.name()
    }

    pub fn firmware_version(&self) -> FirmwareVersion {
        self.firmware
    }

    pub fn trigger_revision(&self) -> TriggerRevision {
        self.trigger.revision()
    }

    pub fn generic(&self) -> &GenericDevice {
        &self.base
    }

    pub fn generic_mut(&mut self) -> &mut GenericDevice {
        &mut self.base
    }

    pub fn analog_in(&mut self) -> Session<'_, ChannelDevice> {
        Session::new(&self.analog_in, self.base.context_mut())
    }

    pub fn analog_out(&mut self, channel: DacChannel) -> Session<'_, ChannelDevice> {
        Session::new(&self.analog_out[channel], self.base.context_mut())
    }

    pub fn digital_in(&mut self) -> Session<'_, ChannelDevice> {
        Session::new(&self.digital_in, self.base.context_mut())
    }

    pub fn digital_out(&mut self) -> Session<'_, ChannelDevice> {
        Session::new(&self.digital_out, self.base.context_mut())
    }

    pub fn trigger(&mut self) -> Session<'_, TriggerController> {
        Session::new(&self.trigger, self.base.context_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::simulated::SimulatedInstrument;
    use m2k_types::{TriggerOutSource, TriggerStage};

    fn open(instrument: SimulatedInstrument, config: &RegistryConfig) -> Result<M2k, HalError> {
        let uri = instrument.uri().to_owned();
        M2k::new(&uri, Box::new(instrument.into_context()), config)
    }

    #[test]
    fn revision_follows_reported_firmware() {
        let config = RegistryConfig::default();
        let m2k = open(SimulatedInstrument::m2k("usb:1.2.5", FirmwareVersion::V0_26), &config).unwrap();
        assert_eq!(m2k.firmware_version(), FirmwareVersion::V0_26);
        assert_eq!(m2k.trigger_revision(), TriggerRevision::V0_26);
        assert_eq!(m2k.name(), "M2K");

        let m2k = open(SimulatedInstrument::m2k("usb:1.2.6", FirmwareVersion(0, 25)), &config).unwrap();
        assert_eq!(m2k.trigger_revision(), TriggerRevision::V0_24);
    }

    #[test]
    fn missing_firmware_uses_fallback() {
        let mut instrument = SimulatedInstrument::m2k("usb:1.2.5", FirmwareVersion::V0_26);
        instrument = instrument.context_attribute(FIRMWARE_ATTRIBUTE, "unknown");

        let config = RegistryConfig::default();
        let m2k = open(instrument, &config).unwrap();
        assert_eq!(m2k.firmware_version(), FirmwareVersion::V0_23);
        assert_eq!(m2k.trigger_revision(), TriggerRevision::Baseline);
    }

    #[test]
    fn fallback_newer_than_hardware_fails_construction() {
        let instrument = SimulatedInstrument::m2k("usb:1.2.5", FirmwareVersion::V0_23)
            .context_attribute(FIRMWARE_ATTRIBUTE, "");
        let config = RegistryConfig {
            fallback_firmware: FirmwareVersion::V0_26,
            ..Default::default()
        };
        assert!(matches!(
            open(instrument, &config),
            Err(HalError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn channel_groups() {
        let config = RegistryConfig::default();
        let mut m2k = open(SimulatedInstrument::m2k("usb:1.2.5", FirmwareVersion::V0_26), &config).unwrap();

        assert_eq!(m2k.analog_in().channel_count(), 2);
        assert_eq!(m2k.analog_out(DacChannel::A).scope(), ANALOG_OUT_A);
        assert_eq!(m2k.analog_out(DacChannel::B).scope(), ANALOG_OUT_B);
        assert_eq!(m2k.digital_in().channel_count(), 16);
        assert_eq!(m2k.digital_out().channel_count(), 16);

        let applied = m2k.analog_out(DacChannel::B).set_sample_rate(70_000.0).unwrap();
        assert_eq!(applied, 75_000.0);
        assert_eq!(m2k.analog_out(DacChannel::A).sample_rate().unwrap(), 75_000_000.0);
    }

    #[test]
    fn triggers_are_reset_on_open() {
        let mut instrument = SimulatedInstrument::m2k("usb:1.2.5", FirmwareVersion::V0_26);
        if let Some(scope) = instrument.scope_mut(DIGITAL_OUT) {
            *scope = scope.clone().attribute("trigger_src", "trigger-la");
        }

        let config = RegistryConfig::default();
        let mut m2k = open(instrument.clone(), &config).unwrap();
        assert_eq!(m2k.trigger().digital_out_source().unwrap(), TriggerOutSource::None);

        let config = RegistryConfig {
            reset_triggers_on_open: false,
            ..Default::default()
        };
        let mut m2k = open(instrument, &config).unwrap();
        assert_eq!(m2k.trigger().digital_out_source().unwrap(), TriggerOutSource::DigitalIn);
        assert_eq!(
            m2k.trigger().source(TriggerStage::DigitalOut).unwrap(),
            TriggerOutSource::DigitalIn as usize
        );
    }
}
