use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "modelink".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Identity of the peripheral's mode service. The defaults match the
/// shipped firmware; both UUIDs can be overridden from the settings file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSettings {
    #[serde(default = "default_service_uuid")]
    pub service_uuid: String,
    #[serde(default = "default_mode_characteristic_uuid")]
    pub mode_characteristic_uuid: String,
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            service_uuid: default_service_uuid(),
            mode_characteristic_uuid: default_mode_characteristic_uuid(),
            scan_timeout_secs: default_scan_timeout_secs(),
        }
    }
}

impl LinkSettings {
    pub fn service_uuid(&self) -> anyhow::Result<Uuid> {
        Uuid::parse_str(&self.service_uuid)
            .with_context(|| format!("invalid service UUID {:?}", self.service_uuid))
    }

    pub fn mode_characteristic_uuid(&self) -> anyhow::Result<Uuid> {
        Uuid::parse_str(&self.mode_characteristic_uuid).with_context(|| {
            format!(
                "invalid characteristic UUID {:?}",
                self.mode_characteristic_uuid
            )
        })
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}

fn default_service_uuid() -> String {
    "c137e765-1e37-4eb6-9153-bd768a3ef084".to_string()
}
fn default_mode_characteristic_uuid() -> String {
    "0b45d758-52b5-46e6-acd5-7765357f9c9b".to_string()
}
fn default_scan_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub link: LinkSettings,
    #[serde(default)]
    pub log_settings: LogSettings,
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::settings_path()?;
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();

        Ok(Self {
            settings,
            settings_path,
        })
    }

    fn settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;
        path.push("ModeLink");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uuids_parse() {
        let link = LinkSettings::default();
        assert!(link.service_uuid().is_ok());
        assert!(link.mode_characteristic_uuid().is_ok());
    }

    #[test]
    fn empty_settings_file_falls_back_to_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.link.service_uuid, default_service_uuid());
        assert_eq!(settings.log_settings.level, "info");
    }

    #[test]
    fn rejects_malformed_uuid_override() {
        let link = LinkSettings {
            service_uuid: "not-a-uuid".to_string(),
            ..LinkSettings::default()
        };
        assert!(link.service_uuid().is_err());
    }
}
