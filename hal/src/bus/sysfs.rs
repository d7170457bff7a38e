// The `local:` context, read straight out of the kernel's IIO sysfs tree. Every
// `iio:deviceN` directory is a scope named after its `name` file, device attributes are
// plain files and channel attributes follow the `in_voltage0_<attr>` naming scheme.
use crate::bus::{log_read, log_write, AttributeAddress, AttributeBus, BusContext, ChannelId};
use crate::bus::Target;
use crate::error::BusError;
use fancy_regex::Regex;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use m2k_types::Transport;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const DEFAULT_ROOT: &str = "/sys/bus/iio/devices";
const LOCAL_URI: &str = "local:";
const SCAN_ELEMENTS: &str = "scan_elements";
const ENABLE_ATTRIBUTE: &str = "en";

lazy_static! {
    static ref CHANNEL_FILE: Regex =
        Regex::new(r"^(in|out)_([a-z]+)(\d+)_([a-z0-9_]+)$").expect("Invalid channel pattern");
}

// Files in a device directory that aren't attributes.
const IGNORED_FILES: [&str; 3] = ["name", "uevent", "dev"];

pub struct SysfsBus {
    root: PathBuf,
}

impl Default for SysfsBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SysfsBus {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_ROOT)
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn device_directories(&self) -> Result<BTreeMap<String, PathBuf>, BusError> {
        let mut devices = BTreeMap::new();

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(devices),
            Err(error) => return Err(error.into()),
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let is_device = entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with("iio:device"))
                .unwrap_or(false);
            if !is_device {
                continue;
            }

            let Ok(name) = fs::read_to_string(path.join("name")) else {
                debug!("Skipping {:?}, no name attribute", path);
                continue;
            };

            let name = name.trim().to_owned();
            if devices.contains_key(&name) {
                warn!("Duplicate IIO device name {}, keeping the first", name);
                continue;
            }
            devices.insert(name, path);
        }
        Ok(devices)
    }
}

impl AttributeBus for SysfsBus {
    fn create_context(&self, uri: &str) -> Result<Box<dyn BusContext>, BusError> {
        if uri != LOCAL_URI {
            return match Transport::from_uri(uri) {
                Some(transport) if transport != Transport::Local => {
                    Err(BusError::UnsupportedTransport { transport })
                }
                _ => Err(BusError::ContextUnavailable {
                    uri: uri.to_owned(),
                }),
            };
        }

        let devices = self.device_directories()?;
        if devices.is_empty() {
            return Err(BusError::ContextUnavailable {
                uri: uri.to_owned(),
            });
        }

        info!("Created local context with {} devices", devices.len());
        Ok(Box::new(SysfsContext { devices }))
    }

    fn scan(&self, transport: Transport) -> Result<Vec<String>, BusError> {
        if transport != Transport::Local {
            return Ok(vec![]);
        }

        match self.device_directories()?.is_empty() {
            true => Ok(vec![]),
            false => Ok(vec![String::from(LOCAL_URI)]),
        }
    }
}

pub struct SysfsContext {
    devices: BTreeMap<String, PathBuf>,
}

fn direction(channel: &ChannelId) -> &'static str {
    match channel.is_output() {
        true => "out",
        false => "in",
    }
}

fn file_names(directory: &Path) -> Vec<String> {
    match fs::read_dir(directory) {
        Ok(entries) => entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_str().map(str::to_owned))
            .collect(),
        Err(_) => vec![],
    }
}

impl SysfsContext {
    fn directory(&self, scope: &str) -> Result<&PathBuf, BusError> {
        self.devices.get(scope).ok_or_else(|| BusError::ScopeNotFound {
            scope: scope.to_owned(),
        })
    }

    fn resolve(&self, attribute: &AttributeAddress) -> Result<PathBuf, BusError> {
        let directory = self.directory(attribute.scope())?;
        let not_found = || BusError::AttributeNotFound {
            attribute: attribute.clone(),
        };

        let candidates = match attribute.target() {
            Target::Device => {
                if IGNORED_FILES.contains(&attribute.name()) {
                    return Err(not_found());
                }
                vec![directory.join(attribute.name())]
            }
            Target::Channel(channel) if attribute.name() == ENABLE_ATTRIBUTE => {
                vec![directory.join(SCAN_ELEMENTS).join(format!(
                    "{}_{}_{}",
                    direction(channel),
                    channel.name(),
                    ENABLE_ATTRIBUTE
                ))]
            }
            Target::Channel(channel) => {
                // Attributes shared by every channel of a type drop the index.
                let channel_type = channel.name().trim_end_matches(|c: char| c.is_ascii_digit());
                vec![
                    directory.join(format!(
                        "{}_{}_{}",
                        direction(channel),
                        channel.name(),
                        attribute.name()
                    )),
                    directory.join(format!(
                        "{}_{}_{}",
                        direction(channel),
                        channel_type,
                        attribute.name()
                    )),
                ]
            }
        };

        candidates
            .into_iter()
            .find(|path| path.is_file())
            .ok_or_else(not_found)
    }
}

impl BusContext for SysfsContext {
    fn uri(&self) -> &str {
        LOCAL_URI
    }

    fn scopes(&self) -> BTreeSet<String> {
        self.devices.keys().cloned().collect()
    }

    fn context_attribute(&self, _name: &str) -> Option<String> {
        // The kernel doesn't publish context level attributes.
        None
    }

    fn channels(&self, scope: &str) -> Result<Vec<ChannelId>, BusError> {
        let directory = self.directory(scope)?;

        let mut names = file_names(directory);
        names.extend(file_names(&directory.join(SCAN_ELEMENTS)));

        let mut channels = BTreeSet::new();
        for name in names {
            let Ok(Some(captures)) = CHANNEL_FILE.captures(&name) else {
                continue;
            };

            let channel = format!("{}{}", &captures[2], &captures[3]);
            match &captures[1] {
                "out" => channels.insert(ChannelId::output(&channel)),
                _ => channels.insert(ChannelId::input(&channel)),
            };
        }
        Ok(channels.into_iter().collect())
    }

    fn has_attribute(&self, attribute: &AttributeAddress) -> bool {
        self.resolve(attribute).is_ok()
    }

    fn read_string(&self, attribute: &AttributeAddress) -> Result<String, BusError> {
        let path = self.resolve(attribute)?;
        let value = fs::read_to_string(path)?.trim_end().to_owned();
        log_read(attribute, &value);
        Ok(value)
    }

    fn write_string(&mut self, attribute: &AttributeAddress, value: &str) -> Result<(), BusError> {
        let path = self.resolve(attribute)?;
        match fs::write(path, value) {
            Ok(()) => {
                log_write(attribute, value);
                Ok(())
            }
            Err(error) if error.kind() == ErrorKind::PermissionDenied => Err(BusError::ReadOnly {
                attribute: attribute.clone(),
            }),
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn fake_tree() -> TempDir {
        let root = tempfile::tempdir().unwrap();

        let adc = root.path().join("iio:device0");
        write(&adc.join("name"), "m2k-adc\n");
        write(&adc.join("uevent"), "DEVTYPE=iio_device\n");
        write(&adc.join("sampling_frequency"), "100000000\n");
        write(&adc.join("in_voltage0_raw"), "12\n");
        write(&adc.join("in_voltage1_raw"), "-3\n");
        write(&adc.join("in_voltage_scale"), "0.000244\n");
        write(&adc.join("scan_elements/in_voltage0_en"), "0\n");
        write(&adc.join("scan_elements/in_voltage1_en"), "1\n");

        let dac = root.path().join("iio:device1");
        write(&dac.join("name"), "m2k-dac-a\n");
        write(&dac.join("out_voltage0_raw"), "2048\n");

        // Not a device directory.
        write(&root.path().join("trigger0/name"), "irqtrig\n");
        root
    }

    #[test]
    fn scan_only_answers_local() {
        let root = fake_tree();
        let bus = SysfsBus::with_root(root.path());

        assert_eq!(bus.scan(Transport::Local).unwrap(), vec![String::from("local:")]);
        assert!(bus.scan(Transport::Usb).unwrap().is_empty());

        let empty = tempfile::tempdir().unwrap();
        assert!(SysfsBus::with_root(empty.path()).scan(Transport::Local).unwrap().is_empty());
        assert!(SysfsBus::with_root(empty.path().join("missing"))
            .scan(Transport::Local)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn context_lists_named_scopes_and_channels() {
        let root = fake_tree();
        let context = SysfsBus::with_root(root.path()).create_context("local:").unwrap();

        let scopes: Vec<String> = context.scopes().into_iter().collect();
        assert_eq!(scopes, vec!["m2k-adc", "m2k-dac-a"]);

        assert_eq!(
            context.channels("m2k-adc").unwrap(),
            vec![ChannelId::input("voltage0"), ChannelId::input("voltage1")]
        );
        assert_eq!(
            context.channels("m2k-dac-a").unwrap(),
            vec![ChannelId::output("voltage0")]
        );
    }

    #[test]
    fn channel_attributes_resolve_with_shared_fallback() {
        let root = fake_tree();
        let mut context = SysfsBus::with_root(root.path()).create_context("local:").unwrap();
        let voltage1 = ChannelId::input("voltage1");

        let raw = AttributeAddress::channel("m2k-adc", &voltage1, "raw");
        assert_eq!(context.read_double(&raw).unwrap(), -3.0);

        let scale = AttributeAddress::channel("m2k-adc", &voltage1, "scale");
        assert_eq!(context.read_string(&scale).unwrap(), "0.000244");

        let enable = AttributeAddress::channel("m2k-adc", &voltage1, "en");
        assert_eq!(context.read_string(&enable).unwrap(), "1");
        context.write_string(&enable, "0").unwrap();
        assert_eq!(context.read_string(&enable).unwrap(), "0");

        assert!(!context.has_attribute(&AttributeAddress::device("m2k-adc", "name")));
        assert!(context.has_attribute(&AttributeAddress::device("m2k-adc", "sampling_frequency")));
    }

    #[test]
    fn only_local_uris_are_served() {
        let root = fake_tree();
        let bus = SysfsBus::with_root(root.path());

        assert!(matches!(
            bus.create_context("usb:1.2.5"),
            Err(BusError::UnsupportedTransport {
                transport: Transport::Usb
            })
        ));
        assert!(matches!(
            bus.create_context("nonsense"),
            Err(BusError::ContextUnavailable { .. })
        ));

        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(
            SysfsBus::with_root(empty.path()).create_context("local:"),
            Err(BusError::ContextUnavailable { .. })
        ));
    }
}
