// A single IIO scope with its channels, the common ground for the ADC, both DACs and
// the logic analyser halves. Nothing is cached, every getter goes back to the bus.
use crate::bus::{parse_double_list, AttributeAddress, BusContext, ChannelId};
use crate::error::HalError;
use crate::session::Session;
use log::debug;

pub const SAMPLE_RATE: &str = "sampling_frequency";
pub const AVAILABLE_SAMPLE_RATES: &str = "sampling_frequency_available";
pub const ENABLE: &str = "en";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone)]
pub struct ChannelDevice {
    scope: String,
    channels: Vec<ChannelId>,
}

impl ChannelDevice {
    /// Binds to `scope`, keeping only the channels going in `direction` (or all of them).
    pub fn new(
        bus: &dyn BusContext,
        scope: &str,
        direction: Option<Direction>,
    ) -> Result<Self, HalError> {
        if !bus.has_scope(scope) {
            return Err(HalError::invalid(scope, "No such device on this board"));
        }

        let channels: Vec<ChannelId> = bus
            .channels(scope)?
            .into_iter()
            .filter(|channel| match direction {
                None => true,
                Some(Direction::Input) => !channel.is_output(),
                Some(Direction::Output) => channel.is_output(),
            })
            .collect();

        debug!("{} bound with {} channels", scope, channels.len());
        Ok(Self {
            scope: scope.to_owned(),
            channels,
        })
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    pub fn channel(&self, index: usize) -> Result<&ChannelId, HalError> {
        self.channels.get(index).ok_or_else(|| {
            HalError::invalid(
                &self.scope,
                format!(
                    "Channel index {} out of range, {} channels available",
                    index,
                    self.channels.len()
                ),
            )
        })
    }

    fn device_attribute(&self, name: &str) -> AttributeAddress {
        AttributeAddress::device(&self.scope, name)
    }

    fn channel_attribute(&self, index: usize, name: &str) -> Result<AttributeAddress, HalError> {
        Ok(AttributeAddress::channel(&self.scope, self.channel(index)?, name))
    }

    fn check_rate(&self, rate: f64) -> Result<(), HalError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(HalError::invalid(
                &self.scope,
                format!("Invalid sample rate {}", rate),
            ));
        }
        Ok(())
    }

    // The hardware may snap to a supported rate, so report what it actually took.
    fn apply_rate(
        bus: &mut dyn BusContext,
        attribute: &AttributeAddress,
        rate: f64,
    ) -> Result<f64, HalError> {
        bus.write_double(attribute, rate)?;
        let applied = bus.read_double(attribute)?;
        if applied != rate {
            debug!("{} requested {} but applied {}", attribute, rate, applied);
        }
        Ok(applied)
    }

    pub(crate) fn sample_rate(&self, bus: &dyn BusContext) -> Result<f64, HalError> {
        Ok(bus.read_double(&self.device_attribute(SAMPLE_RATE))?)
    }

    pub(crate) fn channel_sample_rate(
        &self,
        bus: &dyn BusContext,
        index: usize,
    ) -> Result<f64, HalError> {
        Ok(bus.read_double(&self.channel_attribute(index, SAMPLE_RATE)?)?)
    }

    pub(crate) fn set_sample_rate(
        &self,
        bus: &mut dyn BusContext,
        rate: f64,
    ) -> Result<f64, HalError> {
        self.check_rate(rate)?;
        Self::apply_rate(bus, &self.device_attribute(SAMPLE_RATE), rate)
    }

    pub(crate) fn set_channel_sample_rate(
        &self,
        bus: &mut dyn BusContext,
        index: usize,
        rate: f64,
    ) -> Result<f64, HalError> {
        let attribute = self.channel_attribute(index, SAMPLE_RATE)?;
        self.check_rate(rate)?;
        Self::apply_rate(bus, &attribute, rate)
    }

    pub(crate) fn available_sample_rates(&self, bus: &dyn BusContext) -> Result<Vec<f64>, HalError> {
        let attribute = self.device_attribute(AVAILABLE_SAMPLE_RATES);
        let value = bus.read_string(&attribute)?;
        Ok(parse_double_list(&attribute, &value)?)
    }

    pub(crate) fn enable_channel(
        &self,
        bus: &mut dyn BusContext,
        index: usize,
        enable: bool,
    ) -> Result<(), HalError> {
        let attribute = self.channel_attribute(index, ENABLE)?;
        bus.write_string(&attribute, if enable { "1" } else { "0" })?;
        Ok(())
    }

    pub(crate) fn is_channel_enabled(
        &self,
        bus: &dyn BusContext,
        index: usize,
    ) -> Result<bool, HalError> {
        let attribute = self.channel_attribute(index, ENABLE)?;
        let value = bus.read_string(&attribute)?;
        let enabled = match value.trim() {
            "1" => Some(true),
            "0" => Some(false),
            _ => None,
        };
        enabled.ok_or(HalError::UnexpectedHardwareValue { attribute, value })
    }
}

impl Session<'_, ChannelDevice> {
    pub fn scope(&self) -> &str {
        self.part().scope()
    }

    pub fn channel_count(&self) -> usize {
        self.part().channels().len()
    }

    pub fn sample_rate(&self) -> Result<f64, HalError> {
        self.part().sample_rate(self.bus())
    }

    pub fn channel_sample_rate(&self, index: usize) -> Result<f64, HalError> {
        self.part().channel_sample_rate(self.bus(), index)
    }

    /// Returns the rate the hardware settled on, which may differ from `rate`.
    pub fn set_sample_rate(&mut self, rate: f64) -> Result<f64, HalError> {
        let (part, bus) = self.split();
        part.set_sample_rate(bus, rate)
    }

    pub fn set_channel_sample_rate(&mut self, index: usize, rate: f64) -> Result<f64, HalError> {
        let (part, bus) = self.split();
        part.set_channel_sample_rate(bus, index, rate)
    }

    pub fn available_sample_rates(&self) -> Result<Vec<f64>, HalError> {
        self.part().available_sample_rates(self.bus())
    }

    pub fn enable_channel(&mut self, index: usize, enable: bool) -> Result<(), HalError> {
        let (part, bus) = self.split();
        part.enable_channel(bus, index, enable)
    }

    pub fn is_channel_enabled(&self, index: usize) -> Result<bool, HalError> {
        self.part().is_channel_enabled(self.bus(), index)
    }
}
