#[cfg(feature = "clap")]
use clap::ValueEnum;
use enum_map::Enum;
use enumset::EnumSetType;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt::Formatter;
use std::str::FromStr;
use strum::{Display, EnumCount, EnumIter, FromRepr};

/// The families of instrument we know how to recognise from the scopes on a context.
#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DeviceKind {
    #[strum(to_string = "FMCOMMS")]
    FmComms,
    #[strum(to_string = "M2K")]
    M2k,
    Generic,
}

/// Transport a context URI lives on, also used to pick what a discovery scan looks at.
#[derive(Copy, Clone, Debug, Default, Display, EnumIter, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "clap", derive(ValueEnum))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[strum(serialize_all = "lowercase")]
pub enum Transport {
    #[default]
    Usb,
    Local,
    Ip,
}

impl Transport {
    /// The URI prefix contexts on this transport are addressed with (`usb:`, `local:`..)
    pub fn prefix(&self) -> String {
        format!("{self}:")
    }

    pub fn from_uri(uri: &str) -> Option<Transport> {
        let (scheme, _) = uri.split_once(':')?;
        match scheme {
            "usb" => Some(Transport::Usb),
            "local" => Some(Transport::Local),
            "ip" => Some(Transport::Ip),
            _ => None,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
#[error("Invalid firmware version: {0}")]
pub struct ParseFirmwareError(String);

/// Firmware version as published by the instrument (`v0.26`).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct FirmwareVersion(pub u32, pub u32);

impl FirmwareVersion {
    pub const V0_23: FirmwareVersion = FirmwareVersion(0, 23);
    pub const V0_24: FirmwareVersion = FirmwareVersion(0, 24);
    pub const V0_26: FirmwareVersion = FirmwareVersion(0, 26);
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}.{}", self.0, self.1)
    }
}

impl std::fmt::Debug for FirmwareVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}.{}", self.0, self.1)
    }
}

impl FromStr for FirmwareVersion {
    type Err = ParseFirmwareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let version = trimmed.strip_prefix('v').unwrap_or(trimmed);

        // Anything past major.minor (build suffixes and the like) is ignored.
        let mut parts = version.split(['.', '-']);
        let major = parts.next().and_then(|part| part.parse().ok());
        let minor = parts.next().and_then(|part| part.parse().ok());

        match (major, minor) {
            (Some(major), Some(minor)) => Ok(FirmwareVersion(major, minor)),
            _ => Err(ParseFirmwareError(s.to_owned())),
        }
    }
}

impl TryFrom<String> for FirmwareVersion {
    type Error = ParseFirmwareError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FirmwareVersion> for String {
    fn from(value: FirmwareVersion) -> Self {
        value.to_string()
    }
}

/// A trigger block on the instrument. Inputs arm captures, outputs arm generation.
#[derive(Debug, Display, EnumIter, EnumCount)]
#[cfg_attr(feature = "clap", derive(ValueEnum))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(EnumSetType)]
#[strum(serialize_all = "kebab-case")]
pub enum TriggerStage {
    DigitalIn,
    AnalogIn,
    DigitalOut,
    AnalogOut,
}

#[derive(Debug, Display, Enum, EnumIter, EnumCount)]
#[cfg_attr(feature = "clap", derive(ValueEnum))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, PartialEq, Eq)]
pub enum DacChannel {
    A,
    B,
}

/// Shared behaviour of every trigger enumeration: the ordinal doubles as the index
/// into the firmware's table of raw attribute strings.
pub trait TriggerValue: Copy + std::fmt::Debug {
    fn ordinal(self) -> usize;
    fn from_ordinal(ordinal: usize) -> Option<Self>;
}

macro_rules! trigger_value {
    ($($value:ty),*) => {
        $(
            impl TriggerValue for $value {
                fn ordinal(self) -> usize {
                    self as usize
                }

                fn from_ordinal(ordinal: usize) -> Option<Self> {
                    Self::from_repr(ordinal)
                }
            }
        )*
    };
}

#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, FromRepr, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AnalogInSource {
    ChannelOne,
    ChannelTwo,
    ChannelOneOrTwo,
    ChannelOneAndTwo,
    ChannelOneXorTwo,
    TriggerIn,
    ChannelOneOrTriggerIn,
    ChannelTwoOrTriggerIn,
    ChannelOneOrTwoOrTriggerIn,
}

#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, FromRepr, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AnalogCondition {
    RisingEdge,
    FallingEdge,
    LowLevel,
    HighLevel,
}

#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, FromRepr, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DigitalInSource {
    TriggerIn,
    AnalogIn,
    None,
}

#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, FromRepr, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TriggerOutSource {
    None,
    TriggerIn0,
    TriggerIn1,
    AnalogIn,
    DigitalIn,
}

#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, FromRepr, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DigitalCondition {
    RisingEdge,
    FallingEdge,
    LowLevel,
    HighLevel,
    AnyEdge,
    None,
}

trigger_value!(
    AnalogInSource,
    AnalogCondition,
    DigitalInSource,
    TriggerOutSource,
    DigitalCondition
);
