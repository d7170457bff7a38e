// The attribute bus is the only way this crate talks to hardware. Everything the driver
// exposes is a named string attribute on a named scope (an IIO device), optionally
// narrowed down to a single channel of that scope.
use crate::error::BusError;
use log::debug;
use m2k_types::Transport;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

pub mod simulated;
pub mod sysfs;

/// Context attribute carrying the instrument's firmware version (`v0.26`).
pub const FIRMWARE_ATTRIBUTE: &str = "fw_version";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId {
    name: String,
    output: bool,
}

impl ChannelId {
    pub fn input(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            output: false,
        }
    }

    pub fn output(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            output: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_output(&self) -> bool {
        self.output
    }
}

impl Display for ChannelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.output {
            true => write!(f, "{}(out)", self.name),
            false => write!(f, "{}(in)", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Device,
    Channel(ChannelId),
}

/// A fully qualified attribute: which scope, whether it's a device or channel attribute,
/// and its name. Nothing outside of this type glues these names together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeAddress {
    scope: String,
    target: Target,
    name: String,
}

impl AttributeAddress {
    pub fn device(scope: &str, name: &str) -> Self {
        Self {
            scope: scope.to_owned(),
            target: Target::Device,
            name: name.to_owned(),
        }
    }

    pub fn channel(scope: &str, channel: &ChannelId, name: &str) -> Self {
        Self {
            scope: scope.to_owned(),
            target: Target::Channel(channel.clone()),
            name: name.to_owned(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn channel_id(&self) -> Option<&ChannelId> {
        match &self.target {
            Target::Device => None,
            Target::Channel(channel) => Some(channel),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for AttributeAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            Target::Device => write!(f, "[{}][{}]", self.scope, self.name),
            Target::Channel(channel) => {
                write!(f, "[{}][{}][{}]", self.scope, channel, self.name)
            }
        }
    }
}

/// A live connection to one instrument. Dropping the context releases it.
///
/// Contexts are not internally synchronised, writes need `&mut self` and a context is
/// expected to be driven by a single session at a time.
pub trait BusContext: Send {
    fn uri(&self) -> &str;

    fn scopes(&self) -> BTreeSet<String>;

    fn context_attribute(&self, name: &str) -> Option<String>;

    fn channels(&self, scope: &str) -> Result<Vec<ChannelId>, BusError>;

    fn has_attribute(&self, attribute: &AttributeAddress) -> bool;

    fn read_string(&self, attribute: &AttributeAddress) -> Result<String, BusError>;

    fn write_string(&mut self, attribute: &AttributeAddress, value: &str) -> Result<(), BusError>;

    fn read_double(&self, attribute: &AttributeAddress) -> Result<f64, BusError> {
        let value = self.read_string(attribute)?;
        value.trim().parse().map_err(|_| BusError::Malformed {
            attribute: attribute.clone(),
            value,
        })
    }

    fn write_double(&mut self, attribute: &AttributeAddress, value: f64) -> Result<(), BusError> {
        self.write_string(attribute, &value.to_string())
    }

    fn has_scope(&self, scope: &str) -> bool {
        self.scopes().contains(scope)
    }
}

/// Creates contexts from URIs and discovers what's attached.
pub trait AttributeBus: Send {
    fn create_context(&self, uri: &str) -> Result<Box<dyn BusContext>, BusError>;

    fn scan(&self, transport: Transport) -> Result<Vec<String>, BusError>;
}

pub(crate) fn log_read(attribute: &AttributeAddress, value: &str) {
    debug!("{}[read] {}", attribute, value);
}

pub(crate) fn log_write(attribute: &AttributeAddress, value: &str) {
    debug!("{}[write] {}", attribute, value);
}

/// Parses a whitespace separated list of doubles (`sampling_frequency_available` style).
pub fn parse_double_list(
    attribute: &AttributeAddress,
    value: &str,
) -> Result<Vec<f64>, BusError> {
    value
        .split_whitespace()
        .map(|item| {
            item.parse::<f64>().map_err(|_| BusError::Malformed {
                attribute: attribute.clone(),
                value: value.to_owned(),
            })
        })
        .collect()
}
