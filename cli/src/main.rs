use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{info, warn};
use m2k_hal::bus::simulated::{SimulatedBus, SimulatedInstrument};
use m2k_hal::bus::sysfs::SysfsBus;
use m2k_hal::bus::AttributeBus;
use m2k_hal::{DeviceHandle, DeviceRegistry};
use m2k_types::Transport;
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

use crate::cli::{Cli, Commands, LevelFilter, TriggerCommands};
use crate::settings::Settings;

mod cli;
mod settings;

const SIMULATED_URI: &str = "usb:1.2.5";
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    CombinedLogger::init(vec![TermLogger::new(
        match args.log_level {
            LevelFilter::Off => log::LevelFilter::Off,
            LevelFilter::Error => log::LevelFilter::Error,
            LevelFilter::Warn => log::LevelFilter::Warn,
            LevelFilter::Info => log::LevelFilter::Info,
            LevelFilter::Debug => log::LevelFilter::Debug,
            LevelFilter::Trace => log::LevelFilter::Trace,
        },
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )])
    .context("Could not configure the logger")?;

    info!("Starting M2K Utility v{}", VERSION);
    let mut config = Settings::load(&args.config)?.registry;

    let bus: Box<dyn AttributeBus> = match args.simulate {
        Some(firmware) => {
            let uri = args.uri.as_deref().unwrap_or(SIMULATED_URI);
            info!("Simulating an M2K at {} with firmware {}", uri, firmware);
            if let Some(transport) = Transport::from_uri(uri) {
                config.scan_transport = transport;
            }
            Box::new(SimulatedBus::new().with_instrument(SimulatedInstrument::m2k(uri, firmware)))
        }
        None => {
            if config.scan_transport != Transport::Local {
                warn!(
                    "Only local instruments are reachable, scanning local instead of {}",
                    config.scan_transport
                );
                config.scan_transport = Transport::Local;
            }
            Box::new(SysfsBus::new())
        }
    };

    let mut registry = DeviceRegistry::with_config(bus, config);
    let result = run(&args, &mut registry);
    registry.shutdown();
    result
}

fn run(args: &Cli, registry: &mut DeviceRegistry) -> Result<()> {
    if let Commands::List = args.command {
        let uris = registry.list_devices()?;
        if uris.is_empty() {
            println!("No instruments found.");
        }
        for uri in uris {
            println!("{}", uri);
        }
        return Ok(());
    }

    let device = match &args.uri {
        Some(uri) => registry.open(uri),
        None => registry.open_default(),
    }
    .context("Unable to open an instrument")?;

    match &args.command {
        Commands::List => Ok(()),
        Commands::Identify => identify(device),
        Commands::SampleRate {
            scope,
            channel,
            set,
        } => sample_rate(device, scope, *channel, *set),
        Commands::Trigger { command } => trigger(device, command),
    }
}

fn identify(device: &mut DeviceHandle) -> Result<()> {
    let generic = device.generic();
    println!("{} at {}", device.name(), device.uri());
    if let Some(model) = generic.context_attribute("hw_model") {
        println!("Model: {}", model);
    }
    match generic.firmware_version() {
        Some(version) => println!("Firmware: {}", version),
        None => println!("Firmware: unknown"),
    }

    for scope in generic.scopes() {
        println!("  {}", scope);
    }

    if let Some(m2k) = device.as_m2k_mut() {
        let trigger = m2k.trigger();
        println!(
            "Trigger revision {}, stages: {}",
            trigger.revision(),
            trigger
                .stages()
                .iter()
                .map(|stage| stage.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(())
}

fn sample_rate(
    device: &mut DeviceHandle,
    scope: &str,
    channel: Option<usize>,
    set: Option<f64>,
) -> Result<()> {
    let uri = device.uri().to_owned();
    let mut session = device
        .generic_mut()
        .channel_device(scope)
        .ok_or_else(|| anyhow!("{} has no channel device called {}", uri, scope))?;

    let rate = match (channel, set) {
        (None, None) => session.sample_rate()?,
        (Some(index), None) => session.channel_sample_rate(index)?,
        (None, Some(rate)) => session.set_sample_rate(rate)?,
        (Some(index), Some(rate)) => session.set_channel_sample_rate(index, rate)?,
    };
    println!("{}", rate);

    if let Some(requested) = set {
        if requested != rate {
            warn!("Requested {} but the hardware applied {}", requested, rate);
        }
    }
    Ok(())
}

fn trigger(device: &mut DeviceHandle, command: &TriggerCommands) -> Result<()> {
    let uri = device.uri().to_owned();
    let m2k = device
        .as_m2k_mut()
        .ok_or_else(|| anyhow!("{} is not an M2K, it has no hardware trigger", uri))?;
    let mut trigger = m2k.trigger();

    match command {
        TriggerCommands::Show => {}
        TriggerCommands::SetSource { stage, ordinal } => trigger.set_source(*stage, *ordinal)?,
        TriggerCommands::SetCondition { stage, ordinal } => {
            trigger.set_condition(*stage, *ordinal)?
        }
        TriggerCommands::Reset => trigger.reset()?,
    }

    for stage in trigger.stages() {
        let sources = trigger.part().supported_sources(stage)?;
        let conditions = trigger.part().supported_conditions(stage)?;
        let source = trigger.source(stage)?;
        let condition = trigger.condition(stage)?;
        println!(
            "{}: source {} ({}), condition {} ({})",
            stage, sources[source], source, conditions[condition], condition
        );
    }
    Ok(())
}
