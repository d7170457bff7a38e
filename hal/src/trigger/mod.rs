use crate::bus::{AttributeAddress, BusContext};
use crate::error::HalError;
use crate::session::Session;
use enumset::EnumSet;
use log::{debug, info};
use m2k_types::{
    AnalogCondition, AnalogInSource, DigitalCondition, DigitalInSource, TriggerOutSource,
    TriggerStage, TriggerValue,
};

pub mod tables;

pub use tables::{RevisionTable, StageTable, TriggerRevision};

/// Translates an ordinal into the raw string the firmware expects.
pub fn encode(
    values: &'static [&'static str],
    attribute: &AttributeAddress,
    ordinal: usize,
) -> Result<&'static str, HalError> {
    values
        .get(ordinal)
        .copied()
        .ok_or_else(|| HalError::UnsupportedValue {
            attribute: attribute.clone(),
            ordinal,
            supported: values.len(),
        })
}

/// Finds the ordinal of a raw value reported by the firmware.
pub fn decode(
    values: &[&str],
    attribute: &AttributeAddress,
    raw: &str,
) -> Result<usize, HalError> {
    let raw = raw.trim();
    values
        .iter()
        .position(|value| *value == raw)
        .ok_or_else(|| HalError::UnexpectedHardwareValue {
            attribute: attribute.clone(),
            value: raw.to_owned(),
        })
}

/// Source and condition settings for every trigger stage a firmware revision owns.
///
/// The controller doesn't hold the bus, the owning device lends its context for each call
/// (see [`Session`]), so the controller can never outlive the scopes it points at.
#[derive(Debug, Clone)]
pub struct TriggerController {
    table: &'static RevisionTable,
}

impl TriggerController {
    /// Checks that every owned stage exposes both attributes. Nothing is read or written.
    pub fn new(bus: &dyn BusContext, revision: TriggerRevision) -> Result<Self, HalError> {
        let table = revision.table();

        for stage in table.stages {
            if !bus.has_scope(stage.scope) {
                return Err(HalError::invalid(
                    stage.scope,
                    format!("No {} trigger available on this board", stage.stage),
                ));
            }

            let source = stage.source_address();
            let condition = stage.condition_address();
            if !bus.has_attribute(&source) || !bus.has_attribute(&condition) {
                return Err(HalError::invalid(
                    stage.scope,
                    format!("{} trigger not available on this board", stage.stage),
                ));
            }
        }

        info!(
            "Trigger controller ready, revision {} with stages {:?}",
            revision,
            table.owned_stages()
        );
        Ok(Self { table })
    }

    pub fn revision(&self) -> TriggerRevision {
        self.table.revision
    }

    pub fn stages(&self) -> EnumSet<TriggerStage> {
        self.table.owned_stages()
    }

    fn stage(&self, stage: TriggerStage) -> Result<&'static StageTable, HalError> {
        self.table.stage(stage).ok_or_else(|| HalError::InvalidParameter {
            scope: stage.to_string(),
            message: format!(
                "Trigger stage not available with firmware revision {}",
                self.table.revision
            ),
        })
    }

    pub fn supported_sources(&self, stage: TriggerStage) -> Result<&'static [&'static str], HalError> {
        Ok(self.stage(stage)?.sources)
    }

    pub fn supported_conditions(
        &self,
        stage: TriggerStage,
    ) -> Result<&'static [&'static str], HalError> {
        Ok(self.stage(stage)?.conditions)
    }

    pub(crate) fn set_source(
        &self,
        bus: &mut dyn BusContext,
        stage: TriggerStage,
        ordinal: usize,
    ) -> Result<(), HalError> {
        let table = self.stage(stage)?;
        let attribute = table.source_address();
        let value = encode(table.sources, &attribute, ordinal)?;
        bus.write_string(&attribute, value)?;
        Ok(())
    }

    pub(crate) fn source(&self, bus: &dyn BusContext, stage: TriggerStage) -> Result<usize, HalError> {
        let table = self.stage(stage)?;
        let attribute = table.source_address();
        let raw = bus.read_string(&attribute)?;
        decode(table.sources, &attribute, &raw)
    }

    pub(crate) fn set_condition(
        &self,
        bus: &mut dyn BusContext,
        stage: TriggerStage,
        ordinal: usize,
    ) -> Result<(), HalError> {
        let table = self.stage(stage)?;
        let attribute = table.condition_address();
        let value = encode(table.conditions, &attribute, ordinal)?;
        bus.write_string(&attribute, value)?;
        Ok(())
    }

    pub(crate) fn condition(
        &self,
        bus: &dyn BusContext,
        stage: TriggerStage,
    ) -> Result<usize, HalError> {
        let table = self.stage(stage)?;
        let attribute = table.condition_address();
        let raw = bus.read_string(&attribute)?;
        decode(table.conditions, &attribute, &raw)
    }

    /// Returns every owned stage to its neutral setting, oldest stages first.
    pub(crate) fn reset(&self, bus: &mut dyn BusContext) -> Result<(), HalError> {
        debug!("Resetting triggers ({})", self.table.revision);
        for stage in self.table.stages {
            self.set_source(bus, stage.stage, stage.neutral_source)?;
            self.set_condition(bus, stage.stage, stage.neutral_condition)?;
        }
        Ok(())
    }

    fn typed<T: TriggerValue>(
        attribute: AttributeAddress,
        ordinal: usize,
    ) -> Result<T, HalError> {
        T::from_ordinal(ordinal).ok_or(HalError::UnexpectedHardwareValue {
            attribute,
            value: ordinal.to_string(),
        })
    }

    pub(crate) fn typed_source<T: TriggerValue>(
        &self,
        bus: &dyn BusContext,
        stage: TriggerStage,
    ) -> Result<T, HalError> {
        let ordinal = self.source(bus, stage)?;
        Self::typed(self.stage(stage)?.source_address(), ordinal)
    }

    pub(crate) fn typed_condition<T: TriggerValue>(
        &self,
        bus: &dyn BusContext,
        stage: TriggerStage,
    ) -> Result<T, HalError> {
        let ordinal = self.condition(bus, stage)?;
        Self::typed(self.stage(stage)?.condition_address(), ordinal)
    }
}

impl Session<'_, TriggerController> {
    pub fn revision(&self) -> TriggerRevision {
        self.part().revision()
    }

    pub fn stages(&self) -> EnumSet<TriggerStage> {
        self.part().stages()
    }

    pub fn set_source(&mut self, stage: TriggerStage, ordinal: usize) -> Result<(), HalError> {
        let (part, bus) = self.split();
        part.set_source(bus, stage, ordinal)
    }

    pub fn source(&self, stage: TriggerStage) -> Result<usize, HalError> {
        self.part().source(self.bus(), stage)
    }

    pub fn set_condition(&mut self, stage: TriggerStage, ordinal: usize) -> Result<(), HalError> {
        let (part, bus) = self.split();
        part.set_condition(bus, stage, ordinal)
    }

    pub fn condition(&self, stage: TriggerStage) -> Result<usize, HalError> {
        self.part().condition(self.bus(), stage)
    }

    pub fn reset(&mut self) -> Result<(), HalError> {
        let (part, bus) = self.split();
        part.reset(bus)
    }

    pub fn set_analog_in_source(&mut self, source: AnalogInSource) -> Result<(), HalError> {
        self.set_source(TriggerStage::AnalogIn, source.ordinal())
    }

    pub fn analog_in_source(&self) -> Result<AnalogInSource, HalError> {
        self.part().typed_source(self.bus(), TriggerStage::AnalogIn)
    }

    pub fn set_analog_in_condition(&mut self, condition: AnalogCondition) -> Result<(), HalError> {
        self.set_condition(TriggerStage::AnalogIn, condition.ordinal())
    }

    pub fn analog_in_condition(&self) -> Result<AnalogCondition, HalError> {
        self.part().typed_condition(self.bus(), TriggerStage::AnalogIn)
    }

    pub fn set_digital_in_source(&mut self, source: DigitalInSource) -> Result<(), HalError> {
        self.set_source(TriggerStage::DigitalIn, source.ordinal())
    }

    pub fn digital_in_source(&self) -> Result<DigitalInSource, HalError> {
        self.part().typed_source(self.bus(), TriggerStage::DigitalIn)
    }

    pub fn set_digital_in_condition(&mut self, condition: DigitalCondition) -> Result<(), HalError> {
        self.set_condition(TriggerStage::DigitalIn, condition.ordinal())
    }

    pub fn digital_in_condition(&self) -> Result<DigitalCondition, HalError> {
        self.part().typed_condition(self.bus(), TriggerStage::DigitalIn)
    }

    pub fn set_digital_out_source(&mut self, source: TriggerOutSource) -> Result<(), HalError> {
        self.set_source(TriggerStage::DigitalOut, source.ordinal())
    }

    pub fn digital_out_source(&self) -> Result<TriggerOutSource, HalError> {
        self.part().typed_source(self.bus(), TriggerStage::DigitalOut)
    }

    pub fn set_digital_out_condition(&mut self, condition: DigitalCondition) -> Result<(), HalError> {
        self.set_condition(TriggerStage::DigitalOut, condition.ordinal())
    }

    pub fn digital_out_condition(&self) -> Result<DigitalCondition, HalError> {
        self.part().typed_condition(self.bus(), TriggerStage::DigitalOut)
    }

    pub fn set_analog_out_source(&mut self, source: TriggerOutSource) -> Result<(), HalError> {
        self.set_source(TriggerStage::AnalogOut, source.ordinal())
    }

    pub fn analog_out_source(&self) -> Result<TriggerOutSource, HalError> {
        self.part().typed_source(self.bus(), TriggerStage::AnalogOut)
    }

    pub fn set_analog_out_condition(&mut self, condition: DigitalCondition) -> Result<(), HalError> {
        self.set_condition(TriggerStage::AnalogOut, condition.ordinal())
    }

    pub fn analog_out_condition(&self) -> Result<DigitalCondition, HalError> {
        self.part().typed_condition(self.bus(), TriggerStage::AnalogOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::simulated::{BusOperation, SimulatedContext, SimulatedInstrument};
    use m2k_types::FirmwareVersion;

    fn context(firmware: FirmwareVersion) -> SimulatedContext {
        SimulatedInstrument::m2k("usb:1.2.5", firmware).into_context()
    }

    #[test]
    fn encode_and_decode_use_table_positions() {
        let attribute = AttributeAddress::device("m2k-dac-a", "trigger_src");
        let values: &'static [&'static str] = &["none", "trigger-adc"];

        assert_eq!(encode(values, &attribute, 1).unwrap(), "trigger-adc");
        assert!(matches!(
            encode(values, &attribute, 2),
            Err(HalError::UnsupportedValue {
                ordinal: 2,
                supported: 2,
                ..
            })
        ));

        assert_eq!(decode(values, &attribute, "trigger-adc\n").unwrap(), 1);
        assert!(matches!(
            decode(values, &attribute, "trigger-la"),
            Err(HalError::UnexpectedHardwareValue { value, .. }) if value == "trigger-la"
        ));
    }

    #[test]
    fn construction_only_inspects() {
        let context = context(FirmwareVersion::V0_26);
        let controller = TriggerController::new(&context, TriggerRevision::V0_26).unwrap();

        assert_eq!(controller.stages(), EnumSet::all());
        assert!(context.journal().is_empty());
    }

    #[test]
    fn older_firmware_cannot_host_newer_revision() {
        let context = context(FirmwareVersion::V0_24);
        let result = TriggerController::new(&context, TriggerRevision::V0_26);

        match result {
            Err(HalError::InvalidParameter { scope, message }) => {
                assert_eq!(scope, "m2k-logic-analyzer-tx");
                assert!(message.contains("not available on this board"));
            }
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn stage_outside_revision_is_rejected() {
        let mut context = context(FirmwareVersion(0, 23));
        let controller = TriggerController::new(&context, TriggerRevision::Baseline).unwrap();

        assert!(matches!(
            controller.set_source(&mut context, TriggerStage::DigitalOut, 0),
            Err(HalError::InvalidParameter { .. })
        ));
        assert!(context.journal().is_empty());
    }

    #[test]
    fn baseline_rejects_trigger_in_sources() {
        let mut context = context(FirmwareVersion(0, 23));
        let controller = TriggerController::new(&context, TriggerRevision::Baseline).unwrap();

        let result = controller.set_source(
            &mut context,
            TriggerStage::AnalogIn,
            AnalogInSource::TriggerIn.ordinal(),
        );
        assert!(matches!(
            result,
            Err(HalError::UnsupportedValue { supported: 5, .. })
        ));

        controller
            .set_source(
                &mut context,
                TriggerStage::AnalogIn,
                AnalogInSource::ChannelOneXorTwo.ordinal(),
            )
            .unwrap();
        assert_eq!(
            context.journal(),
            vec![BusOperation::Write(
                AttributeAddress::device("m2k-adc-trigger", "logic_mode"),
                String::from("a_XOR_b")
            )]
        );
    }

    fn reset_writes(
        firmware: FirmwareVersion,
        revision: TriggerRevision,
    ) -> Vec<(String, String, String)> {
        let mut context = context(firmware);
        let controller = TriggerController::new(&context, revision).unwrap();
        controller.reset(&mut context).unwrap();

        context
            .journal()
            .into_iter()
            .filter_map(|operation| match operation {
                BusOperation::Write(attribute, value) => Some((
                    attribute.scope().to_owned(),
                    attribute.name().to_owned(),
                    value,
                )),
                BusOperation::Read(_) => None,
            })
            .collect()
    }

    fn owned(expected: &[(&str, &str, &str)]) -> Vec<(String, String, String)> {
        expected
            .iter()
            .map(|(scope, name, value)| {
                (scope.to_string(), name.to_string(), value.to_string())
            })
            .collect()
    }

    #[test]
    fn reset_writes_stages_in_order() {
        let expected = [
            ("m2k-logic-analyzer-rx", "trigger_src", "none"),
            ("m2k-logic-analyzer-rx", "trigger_condition", "none"),
            ("m2k-adc-trigger", "logic_mode", "a"),
            ("m2k-adc-trigger", "trigger", "edge-rising"),
            ("m2k-logic-analyzer-tx", "trigger_src", "none"),
            ("m2k-logic-analyzer-tx", "trigger_condition", "none"),
            ("m2k-dac-a", "trigger_src", "none"),
            ("m2k-dac-a", "trigger_condition", "none"),
        ];
        assert_eq!(
            reset_writes(FirmwareVersion::V0_26, TriggerRevision::V0_26),
            owned(&expected)
        );
    }

    #[test]
    fn older_revisions_reset_only_their_stages() {
        let expected = [
            ("m2k-logic-analyzer-rx", "trigger_src", "none"),
            ("m2k-logic-analyzer-rx", "trigger_condition", "none"),
            ("m2k-adc-trigger", "logic_mode", "a"),
            ("m2k-adc-trigger", "trigger", "edge-rising"),
        ];
        assert_eq!(
            reset_writes(FirmwareVersion::V0_24, TriggerRevision::V0_24),
            owned(&expected)
        );

        let expected = [
            ("m2k-adc-trigger", "logic_mode", "a"),
            ("m2k-adc-trigger", "trigger", "edge-rising"),
        ];
        assert_eq!(
            reset_writes(FirmwareVersion::V0_23, TriggerRevision::Baseline),
            owned(&expected)
        );
    }

    #[test]
    fn unknown_hardware_value_is_surfaced() {
        let mut context = context(FirmwareVersion::V0_26);
        let controller = TriggerController::new(&context, TriggerRevision::V0_26).unwrap();

        // A value the firmware might report that this table doesn't know about.
        context
            .write_string(
                &AttributeAddress::device("m2k-logic-analyzer-tx", "trigger_src"),
                "trigger-ext",
            )
            .unwrap();

        assert!(matches!(
            controller.source(&context, TriggerStage::DigitalOut),
            Err(HalError::UnexpectedHardwareValue { .. })
        ));
    }

    #[test]
    fn typed_session_helpers() {
        let mut context = context(FirmwareVersion::V0_26);
        let controller = TriggerController::new(&context, TriggerRevision::V0_26).unwrap();
        let mut session = Session::new(&controller, &mut context);

        session
            .set_digital_out_source(TriggerOutSource::DigitalIn)
            .unwrap();
        session
            .set_analog_out_condition(DigitalCondition::AnyEdge)
            .unwrap();
        session
            .set_digital_in_source(DigitalInSource::AnalogIn)
            .unwrap();
        session
            .set_analog_in_condition(AnalogCondition::HighLevel)
            .unwrap();

        assert_eq!(
            session.digital_out_source().unwrap(),
            TriggerOutSource::DigitalIn
        );
        assert_eq!(
            session.analog_out_condition().unwrap(),
            DigitalCondition::AnyEdge
        );
        assert_eq!(
            session.digital_in_source().unwrap(),
            DigitalInSource::AnalogIn
        );
        assert_eq!(
            session.analog_in_condition().unwrap(),
            AnalogCondition::HighLevel
        );

        session.reset().unwrap();
        assert_eq!(session.digital_out_source().unwrap(), TriggerOutSource::None);
        assert_eq!(session.analog_in_source().unwrap(), AnalogInSource::ChannelOne);
    }
}
