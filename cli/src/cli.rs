use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;
use m2k_types::{FirmwareVersion, TriggerStage};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(about, version, author)]
pub struct Cli {
    /// The instrument to talk to (usb:1.2.5, ip:192.168.2.1, local:).
    /// When absent, the first instrument found on the configured transport is used.
    #[clap(long)]
    pub uri: Option<String>,

    /// Use a simulated M2K running the given firmware (eg. v0.26) instead of hardware
    #[clap(long)]
    pub simulate: Option<FirmwareVersion>,

    /// Minimum log level to print out
    #[clap(long, value_enum, default_value = "info")]
    pub log_level: LevelFilter,

    /// Location of the settings file on disk
    #[clap(long, default_value_os_t = default_config_location())]
    pub config: PathBuf,

    #[clap(subcommand)]
    pub command: Commands,
}

fn default_config_location() -> PathBuf {
    match ProjectDirs::from("org", "M2K-on-Linux", "M2K-Utility") {
        Some(proj_dirs) => proj_dirs.config_dir().join("settings.json"),
        None => PathBuf::from("m2k-settings.json"),
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the instruments reachable on the configured transport
    List,

    /// Identify the instrument and show what it exposes
    Identify,

    /// Read, or change, the sample rate of a device scope
    SampleRate {
        /// The scope to use (m2k-adc, m2k-dac-a, ...)
        scope: String,

        /// Address a single channel rather than the whole scope
        #[clap(long)]
        channel: Option<usize>,

        /// Request a new rate, the rate the hardware applied is printed
        #[clap(long)]
        set: Option<f64>,
    },

    /// Inspect or configure the hardware trigger
    Trigger {
        #[clap(subcommand)]
        command: TriggerCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum TriggerCommands {
    /// Show the source and condition of every trigger stage
    Show,

    /// Set a stage's source by its position in the firmware's list
    SetSource {
        #[clap(value_enum)]
        stage: TriggerStage,
        ordinal: usize,
    },

    /// Set a stage's condition by its position in the firmware's list
    SetCondition {
        #[clap(value_enum)]
        stage: TriggerStage,
        ordinal: usize,
    },

    /// Return every stage to its neutral setting
    Reset,
}

#[repr(usize)]
#[derive(ValueEnum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum LevelFilter {
    /// A level lower than all log levels.
    Off,
    /// Corresponds to the `Error` log level.
    Error,
    /// Corresponds to the `Warn` log level.
    Warn,
    /// Corresponds to the `Info` log level.
    Info,
    /// Corresponds to the `Debug` log level.
    Debug,
    /// Corresponds to the `Trace` log level.
    Trace,
}
