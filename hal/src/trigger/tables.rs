// Raw attribute strings understood by each firmware revision. These are a contract with
// the firmware and have to match it byte for byte. A value's position in its list is
// the ordinal of the matching enum in `m2k_types`.
use crate::bus::AttributeAddress;
use enumset::EnumSet;
use m2k_types::{FirmwareVersion, TriggerStage};
use strum::Display;

pub const SOURCE_ATTRIBUTE: &str = "trigger_src";
pub const CONDITION_ATTRIBUTE: &str = "trigger_condition";

const BASELINE_ANALOG_SOURCES: [&str; 5] = ["a", "b", "a_OR_b", "a_AND_b", "a_XOR_b"];

// Later firmware appends the external trigger input.
const ANALOG_SOURCES: [&str; 9] = [
    "a",
    "b",
    "a_OR_b",
    "a_AND_b",
    "a_XOR_b",
    "trigger_in",
    "a_OR_trigger_in",
    "b_OR_trigger_in",
    "a_OR_b_OR_trigger_in",
];

const ANALOG_CONDITIONS: [&str; 4] = ["edge-rising", "edge-falling", "level-low", "level-high"];

const DIGITAL_IN_SOURCES: [&str; 3] = ["trigger-in", "trigger-adc", "none"];

const DIGITAL_CONDITIONS: [&str; 6] = [
    "edge-rising",
    "edge-falling",
    "level-low",
    "level-high",
    "edge-any",
    "none",
];

const OUT_SOURCES: [&str; 5] = ["none", "trigger_i_0", "trigger_i_1", "trigger-adc", "trigger-la"];

#[derive(Debug)]
pub struct StageTable {
    pub stage: TriggerStage,
    pub scope: &'static str,
    pub source_attribute: &'static str,
    pub sources: &'static [&'static str],
    pub condition_attribute: &'static str,
    pub conditions: &'static [&'static str],

    // Ordinals written by a reset.
    pub neutral_source: usize,
    pub neutral_condition: usize,
}

impl StageTable {
    pub fn source_address(&self) -> AttributeAddress {
        AttributeAddress::device(self.scope, self.source_attribute)
    }

    pub fn condition_address(&self) -> AttributeAddress {
        AttributeAddress::device(self.scope, self.condition_attribute)
    }
}

const ANALOG_IN_BASELINE: StageTable = StageTable {
    stage: TriggerStage::AnalogIn,
    scope: "m2k-adc-trigger",
    source_attribute: "logic_mode",
    sources: &BASELINE_ANALOG_SOURCES,
    condition_attribute: "trigger",
    conditions: &ANALOG_CONDITIONS,
    neutral_source: 0,
    neutral_condition: 0,
};

const ANALOG_IN_V0_24: StageTable = StageTable {
    sources: &ANALOG_SOURCES,
    ..ANALOG_IN_BASELINE
};

const DIGITAL_IN_V0_24: StageTable = StageTable {
    stage: TriggerStage::DigitalIn,
    scope: "m2k-logic-analyzer-rx",
    source_attribute: SOURCE_ATTRIBUTE,
    sources: &DIGITAL_IN_SOURCES,
    condition_attribute: CONDITION_ATTRIBUTE,
    conditions: &DIGITAL_CONDITIONS,
    neutral_source: 2,
    neutral_condition: 5,
};

const DIGITAL_OUT_V0_26: StageTable = StageTable {
    stage: TriggerStage::DigitalOut,
    scope: "m2k-logic-analyzer-tx",
    source_attribute: SOURCE_ATTRIBUTE,
    sources: &OUT_SOURCES,
    condition_attribute: CONDITION_ATTRIBUTE,
    conditions: &DIGITAL_CONDITIONS,
    neutral_source: 0,
    neutral_condition: 5,
};

// Both DACs share the trigger of DAC A.
const ANALOG_OUT_V0_26: StageTable = StageTable {
    stage: TriggerStage::AnalogOut,
    scope: "m2k-dac-a",
    ..DIGITAL_OUT_V0_26
};

#[derive(Debug)]
pub struct RevisionTable {
    pub revision: TriggerRevision,
    // Reset order. Stages inherited from older revisions come first.
    pub stages: &'static [StageTable],
}

impl RevisionTable {
    pub fn stage(&self, stage: TriggerStage) -> Option<&'static StageTable> {
        self.stages.iter().find(|table| table.stage == stage)
    }

    pub fn owned_stages(&self) -> EnumSet<TriggerStage> {
        self.stages.iter().map(|table| table.stage).collect()
    }
}

static BASELINE_TABLE: RevisionTable = RevisionTable {
    revision: TriggerRevision::Baseline,
    stages: &[ANALOG_IN_BASELINE],
};

static V0_24_TABLE: RevisionTable = RevisionTable {
    revision: TriggerRevision::V0_24,
    stages: &[DIGITAL_IN_V0_24, ANALOG_IN_V0_24],
};

static V0_26_TABLE: RevisionTable = RevisionTable {
    revision: TriggerRevision::V0_26,
    stages: &[
        DIGITAL_IN_V0_24,
        ANALOG_IN_V0_24,
        DIGITAL_OUT_V0_26,
        ANALOG_OUT_V0_26,
    ],
};

/// The trigger capability sets shipped by the firmware over time.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, PartialOrd, Ord)]
pub enum TriggerRevision {
    #[strum(to_string = "baseline")]
    Baseline,
    #[strum(to_string = "v0.24")]
    V0_24,
    #[strum(to_string = "v0.26")]
    V0_26,
}

impl TriggerRevision {
    pub fn for_firmware(firmware: FirmwareVersion) -> Self {
        if firmware >= FirmwareVersion::V0_26 {
            TriggerRevision::V0_26
        } else if firmware >= FirmwareVersion::V0_24 {
            TriggerRevision::V0_24
        } else {
            TriggerRevision::Baseline
        }
    }

    pub fn table(self) -> &'static RevisionTable {
        match self {
            TriggerRevision::Baseline => &BASELINE_TABLE,
            TriggerRevision::V0_24 => &V0_24_TABLE,
            TriggerRevision::V0_26 => &V0_26_TABLE,
        }
    }
}
