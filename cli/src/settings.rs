use anyhow::{Context, Result};
use log::{debug, error};
use m2k_hal::RegistryConfig;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub registry: RegistryConfig,
}

impl Settings {
    /// Reads the settings, writing out the defaults on first run.
    pub fn load(path: &Path) -> Result<Settings> {
        if path.exists() {
            return Settings::read(path);
        }

        let settings = Settings::default();
        debug!("No settings at {}, writing defaults", path.to_string_lossy());
        if let Err(e) = settings.write(path) {
            error!(
                "Couldn't save settings to {}: {}",
                path.to_string_lossy(),
                e
            );
        }
        Ok(settings)
    }

    pub fn read(path: &Path) -> Result<Settings> {
        match File::open(path) {
            Ok(reader) => serde_json::from_reader(reader).context(format!(
                "Could not parse settings file at {}",
                path.to_string_lossy()
            )),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(Settings::default()),
            Err(error) => Err(error).context(format!(
                "Could not open settings file for reading at {}",
                path.to_string_lossy()
            )),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if let Err(e) = create_dir_all(parent) {
                if e.kind() != ErrorKind::AlreadyExists {
                    return Err(e).context(format!(
                        "Could not create settings directory at {}",
                        parent.to_string_lossy()
                    ));
                }
            }
        }
        let writer = File::create(path).context(format!(
            "Could not open settings file for writing at {}",
            path.to_string_lossy()
        ))?;
        serde_json::to_writer_pretty(writer, self).context(format!(
            "Could not write to settings file at {}",
            path.to_string_lossy()
        ))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use m2k_types::{FirmwareVersion, Transport};
    use std::fs;

    #[test]
    fn first_load_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.registry, RegistryConfig::default());
        assert!(path.exists());

        let written = Settings::read(&path).unwrap();
        assert_eq!(written.registry, RegistryConfig::default());
    }

    #[test]
    fn partial_files_keep_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{ "registry": { "scan_transport": "ip", "reset_triggers_on_open": false } }"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.registry.scan_transport, Transport::Ip);
        assert!(!settings.registry.reset_triggers_on_open);
        assert_eq!(settings.registry.fallback_firmware, FirmwareVersion::V0_23);
    }

    #[test]
    fn broken_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ registry: ").unwrap();

        let error = Settings::read(&path).unwrap_err();
        assert!(error.to_string().contains("Could not parse settings file"));
    }
}
