// An in-memory attribute bus. Instruments are declared up front with their scopes,
// channels and attribute values, and behave close enough to the real driver that the
// rest of the crate can't tell the difference (coercion to `_available` values,
// read-only `_available` lists, missing attributes surfacing as bus errors).
use crate::bus::{log_read, log_write, AttributeAddress, AttributeBus, BusContext, ChannelId};
use crate::bus::{Target, FIRMWARE_ATTRIBUTE};
use crate::error::BusError;
use log::{debug, info};
use m2k_types::{FirmwareVersion, Transport};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const AVAILABLE_SUFFIX: &str = "_available";

#[derive(Debug, Clone)]
pub struct SimulatedChannel {
    id: ChannelId,
    attributes: BTreeMap<String, String>,
}

impl SimulatedChannel {
    pub fn input(name: &str) -> Self {
        Self {
            id: ChannelId::input(name),
            attributes: BTreeMap::new(),
        }
    }

    pub fn output(name: &str) -> Self {
        Self {
            id: ChannelId::output(name),
            attributes: BTreeMap::new(),
        }
    }

    pub fn attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_owned(), value.to_owned());
        self
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedScope {
    name: String,
    attributes: BTreeMap<String, String>,
    channels: Vec<SimulatedChannel>,
}

impl SimulatedScope {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            attributes: BTreeMap::new(),
            channels: Vec::new(),
        }
    }

    pub fn attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_owned(), value.to_owned());
        self
    }

    pub fn channel(mut self, channel: SimulatedChannel) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.attributes.remove(name)
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedInstrument {
    uri: String,
    transport: Transport,
    context_attributes: BTreeMap<String, String>,
    scopes: BTreeMap<String, SimulatedScope>,
}

impl SimulatedInstrument {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_owned(),
            transport: Transport::from_uri(uri).unwrap_or_default(),
            context_attributes: BTreeMap::new(),
            scopes: BTreeMap::new(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn context_attribute(mut self, name: &str, value: &str) -> Self {
        self.context_attributes
            .insert(name.to_owned(), value.to_owned());
        self
    }

    pub fn scope(mut self, scope: SimulatedScope) -> Self {
        self.scopes.insert(scope.name.clone(), scope);
        self
    }

    pub fn scope_mut(&mut self, name: &str) -> Option<&mut SimulatedScope> {
        self.scopes.get_mut(name)
    }

    pub fn without_scope(mut self, name: &str) -> Self {
        self.scopes.remove(name);
        self
    }

    /// A context that isn't tracked by any bus, handy for exercising components directly.
    pub fn into_context(self) -> SimulatedContext {
        SimulatedContext::new(self, None)
    }

    /// An ADALM2000 laid out the way its firmware publishes itself. The trigger
    /// attributes present depend on the firmware version, as they do on hardware.
    pub fn m2k(uri: &str, firmware: FirmwareVersion) -> Self {
        let adc_rates = "1000 10000 100000 1000000 10000000 100000000";
        let dac_rates = "750 7500 75000 750000 7500000 75000000";

        let mut adc = SimulatedScope::new("m2k-adc")
            .attribute("sampling_frequency", "100000000")
            .attribute("sampling_frequency_available", adc_rates)
            .attribute("oversampling_ratio", "1");
        for index in 0..2 {
            adc = adc.channel(
                SimulatedChannel::input(&format!("voltage{index}"))
                    .attribute("sampling_frequency", "100000000")
                    .attribute("sampling_frequency_available", adc_rates)
                    .attribute("en", "0"),
            );
        }

        let dac = |name: &str| {
            SimulatedScope::new(name)
                .attribute("sampling_frequency", "75000000")
                .attribute("sampling_frequency_available", dac_rates)
                .attribute("dma_sync", "0")
                .channel(
                    SimulatedChannel::output("voltage0")
                        .attribute("sampling_frequency", "75000000")
                        .attribute("sampling_frequency_available", dac_rates)
                        .attribute("raw", "2048")
                        .attribute("en", "1"),
                )
        };
        let mut dac_a = dac("m2k-dac-a");
        let dac_b = dac("m2k-dac-b");

        let logic = |name: &str, output: bool| {
            let mut scope = SimulatedScope::new(name).attribute("sampling_frequency", "100000000");
            for index in 0..16 {
                let channel_name = format!("voltage{index}");
                let channel = match output {
                    true => SimulatedChannel::output(&channel_name),
                    false => SimulatedChannel::input(&channel_name),
                };
                scope = scope.channel(channel.attribute("en", "0"));
            }
            scope
        };
        let mut logic_rx = logic("m2k-logic-analyzer-rx", false);
        let mut logic_tx = logic("m2k-logic-analyzer-tx", true);

        let adc_trigger = SimulatedScope::new("m2k-adc-trigger")
            .attribute("logic_mode", "a")
            .attribute("trigger", "edge-rising");

        if firmware >= FirmwareVersion::V0_24 {
            logic_rx = logic_rx
                .attribute("trigger_src", "none")
                .attribute("trigger_condition", "none");
        }
        if firmware >= FirmwareVersion::V0_26 {
            logic_tx = logic_tx
                .attribute("trigger_src", "none")
                .attribute("trigger_condition", "none");
            dac_a = dac_a
                .attribute("trigger_src", "none")
                .attribute("trigger_condition", "none");
        }

        SimulatedInstrument::new(uri)
            .context_attribute(FIRMWARE_ATTRIBUTE, &firmware.to_string())
            .context_attribute("hw_model", "Analog Devices M2k Rev.D (Z7010)")
            .scope(adc)
            .scope(dac_a)
            .scope(dac_b)
            .scope(logic_rx)
            .scope(logic_tx)
            .scope(logic("m2k-logic-analyzer", false))
            .scope(adc_trigger)
            .scope(SimulatedScope::new("m2k-fabric").attribute("calibrate", "0"))
    }

    /// An AD9361 based FMCOMMS board, which is recognised but only driven generically.
    pub fn fmcomms(uri: &str) -> Self {
        SimulatedInstrument::new(uri)
            .scope(
                SimulatedScope::new("ad9361-phy")
                    .attribute("ensm_mode", "fdd")
                    .channel(
                        SimulatedChannel::input("voltage0")
                            .attribute("sampling_frequency", "30720000")
                            .attribute("en", "0"),
                    ),
            )
            .scope(
                SimulatedScope::new("cf-ad9361-lpc")
                    .attribute("sampling_frequency", "30720000")
                    .channel(SimulatedChannel::input("voltage0").attribute("en", "0"))
                    .channel(SimulatedChannel::input("voltage1").attribute("en", "0")),
            )
            .scope(
                SimulatedScope::new("cf-ad9361-dds-core-lpc")
                    .attribute("sampling_frequency", "30720000")
                    .channel(SimulatedChannel::output("voltage0").attribute("en", "0")),
            )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BusOperation {
    Read(AttributeAddress),
    Write(AttributeAddress, String),
}

#[derive(Debug, Default)]
struct BusCounters {
    created: AtomicUsize,
    live: AtomicUsize,
}

// Decrements the live count when the owning context is dropped.
struct LiveGuard {
    counters: Arc<BusCounters>,
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct SimulatedContext {
    instrument: SimulatedInstrument,
    journal: RefCell<Vec<BusOperation>>,
    _guard: Option<LiveGuard>,
}

impl SimulatedContext {
    fn new(instrument: SimulatedInstrument, guard: Option<LiveGuard>) -> Self {
        Self {
            instrument,
            journal: RefCell::new(Vec::new()),
            _guard: guard,
        }
    }

    /// Every attribute read and write performed through this context, in order.
    pub fn journal(&self) -> Vec<BusOperation> {
        self.journal.borrow().clone()
    }

    pub fn clear_journal(&self) {
        self.journal.borrow_mut().clear();
    }

    fn scope(&self, name: &str) -> Result<&SimulatedScope, BusError> {
        self.instrument
            .scopes
            .get(name)
            .ok_or_else(|| BusError::ScopeNotFound {
                scope: name.to_owned(),
            })
    }

    fn attributes(&self, attribute: &AttributeAddress) -> Result<&BTreeMap<String, String>, BusError> {
        let scope = self.scope(attribute.scope())?;
        match attribute.target() {
            Target::Device => Ok(&scope.attributes),
            Target::Channel(id) => scope
                .channels
                .iter()
                .find(|channel| &channel.id == id)
                .map(|channel| &channel.attributes)
                .ok_or_else(|| BusError::AttributeNotFound {
                    attribute: attribute.clone(),
                }),
        }
    }

    fn attributes_mut(
        &mut self,
        attribute: &AttributeAddress,
    ) -> Result<&mut BTreeMap<String, String>, BusError> {
        let scope = self
            .instrument
            .scopes
            .get_mut(attribute.scope())
            .ok_or_else(|| BusError::ScopeNotFound {
                scope: attribute.scope().to_owned(),
            })?;

        match attribute.target() {
            Target::Device => Ok(&mut scope.attributes),
            Target::Channel(id) => scope
                .channels
                .iter_mut()
                .find(|channel| &channel.id == id)
                .map(|channel| &mut channel.attributes)
                .ok_or_else(|| BusError::AttributeNotFound {
                    attribute: attribute.clone(),
                }),
        }
    }
}

// Hardware snaps numeric writes to the closest value it supports.
fn coerce(available: &str, requested: &str) -> Option<String> {
    let requested: f64 = requested.trim().parse().ok()?;
    available
        .split_whitespace()
        .filter_map(|token| token.parse::<f64>().ok().map(|value| (token, value)))
        .min_by(|(_, a), (_, b)| (a - requested).abs().total_cmp(&(b - requested).abs()))
        .map(|(token, _)| token.to_owned())
}

impl BusContext for SimulatedContext {
    fn uri(&self) -> &str {
        &self.instrument.uri
    }

    fn scopes(&self) -> BTreeSet<String> {
        self.instrument.scopes.keys().cloned().collect()
    }

    fn context_attribute(&self, name: &str) -> Option<String> {
        self.instrument.context_attributes.get(name).cloned()
    }

    fn channels(&self, scope: &str) -> Result<Vec<ChannelId>, BusError> {
        Ok(self
            .scope(scope)?
            .channels
            .iter()
            .map(|channel| channel.id.clone())
            .collect())
    }

    fn has_attribute(&self, attribute: &AttributeAddress) -> bool {
        self.attributes(attribute)
            .map(|attributes| attributes.contains_key(attribute.name()))
            .unwrap_or(false)
    }

    fn read_string(&self, attribute: &AttributeAddress) -> Result<String, BusError> {
        let value = self
            .attributes(attribute)?
            .get(attribute.name())
            .cloned()
            .ok_or_else(|| BusError::AttributeNotFound {
                attribute: attribute.clone(),
            })?;

        log_read(attribute, &value);
        self.journal
            .borrow_mut()
            .push(BusOperation::Read(attribute.clone()));
        Ok(value)
    }

    fn write_string(&mut self, attribute: &AttributeAddress, value: &str) -> Result<(), BusError> {
        if attribute.name().ends_with(AVAILABLE_SUFFIX) {
            return Err(BusError::ReadOnly {
                attribute: attribute.clone(),
            });
        }

        let attributes = self.attributes_mut(attribute)?;
        if !attributes.contains_key(attribute.name()) {
            return Err(BusError::AttributeNotFound {
                attribute: attribute.clone(),
            });
        }

        let available = format!("{}{}", attribute.name(), AVAILABLE_SUFFIX);
        let stored = attributes
            .get(&available)
            .and_then(|available| coerce(available, value))
            .unwrap_or_else(|| value.to_owned());

        if stored != value {
            debug!("{} coerced {} to {}", attribute, value, stored);
        }
        attributes.insert(attribute.name().to_owned(), stored.clone());

        log_write(attribute, &stored);
        self.journal
            .borrow_mut()
            .push(BusOperation::Write(attribute.clone(), stored));
        Ok(())
    }
}

/// Observes a [`SimulatedBus`] after it has been handed over to a registry.
#[derive(Clone)]
pub struct BusProbe {
    counters: Arc<BusCounters>,
}

impl BusProbe {
    pub fn contexts_created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    pub fn live_contexts(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct SimulatedBus {
    instruments: Vec<SimulatedInstrument>,
    counters: Arc<BusCounters>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instrument(mut self, instrument: SimulatedInstrument) -> Self {
        self.add_instrument(instrument);
        self
    }

    pub fn add_instrument(&mut self, instrument: SimulatedInstrument) {
        self.instruments.retain(|existing| existing.uri != instrument.uri);
        self.instruments.push(instrument);
    }

    pub fn probe(&self) -> BusProbe {
        BusProbe {
            counters: self.counters.clone(),
        }
    }
}

impl AttributeBus for SimulatedBus {
    fn create_context(&self, uri: &str) -> Result<Box<dyn BusContext>, BusError> {
        let instrument = self
            .instruments
            .iter()
            .find(|instrument| instrument.uri == uri)
            .ok_or_else(|| BusError::ContextUnavailable {
                uri: uri.to_owned(),
            })?;

        self.counters.created.fetch_add(1, Ordering::SeqCst);
        self.counters.live.fetch_add(1, Ordering::SeqCst);
        info!("Created simulated context for {}", uri);

        let guard = LiveGuard {
            counters: self.counters.clone(),
        };
        Ok(Box::new(SimulatedContext::new(instrument.clone(), Some(guard))))
    }

    fn scan(&self, transport: Transport) -> Result<Vec<String>, BusError> {
        Ok(self
            .instruments
            .iter()
            .filter(|instrument| instrument.transport == transport)
            .map(|instrument| instrument.uri.clone())
            .collect())
    }
}
