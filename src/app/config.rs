use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app::error::ProvisionError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AvdSettings {
    pub name: String,
    pub api_level: String,
    pub android_version: String,
    pub device_profile: String,
    pub device_label: String,
}

impl Default for AvdSettings {
    fn default() -> Self {
        Self {
            name: "Pixel_7_Pro_API_33".to_string(),
            api_level: "33".to_string(),
            android_version: "13".to_string(),
            device_profile: "pixel_7_pro".to_string(),
            device_label: "Pixel 7 Pro".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TargetSettings {
    pub package: String,
    pub display_name: String,
    pub bypass_module: String,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            package: "it.bicoccapp.unimib".to_string(),
            display_name: "Bicoccapp".to_string(),
            bypass_module: "it.attendance100.bicoccapp".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceSettings {
    pub lsposed_url: String,
    pub bypass_apk_url: String,
    pub root_avd_repo: String,
    /// Empty means the platform's cmdline-tools archive.
    pub sdk_tools_url: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            lsposed_url: "https://github.com/Auties00/MyBicocca/raw/refs/heads/main/documentation/bicoccapp/emulator/dependencies/LSPosed-v1.10.2-7199-zygisk-debug.zip".to_string(),
            bypass_apk_url: "https://github.com/Auties00/MyBicocca/raw/refs/heads/main/documentation/bicoccapp/magisk/bin/bypass.apk".to_string(),
            root_avd_repo: "https://gitlab.com/newbit/rootAVD.git".to_string(),
            sdk_tools_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WaitSettings {
    pub connectivity_timeout_secs: u64,
    pub boot_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub package_timeout_secs: u64,
    pub package_poll_interval_secs: u64,
    pub screen_text_attempts: u32,
    pub screen_text_delay_ms: u64,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            connectivity_timeout_secs: 120,
            boot_timeout_secs: 300,
            poll_interval_secs: 2,
            package_timeout_secs: 3600,
            package_poll_interval_secs: 5,
            screen_text_attempts: 10,
            screen_text_delay_ms: 1000,
        }
    }
}

impl WaitSettings {
    pub fn connectivity_timeout(&self) -> Duration {
        Duration::from_secs(self.connectivity_timeout_secs)
    }

    pub fn boot_timeout(&self) -> Duration {
        Duration::from_secs(self.boot_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn package_timeout(&self) -> Duration {
        Duration::from_secs(self.package_timeout_secs)
    }

    pub fn package_poll_interval(&self) -> Duration {
        Duration::from_secs(self.package_poll_interval_secs)
    }

    pub fn screen_text_delay(&self) -> Duration {
        Duration::from_millis(self.screen_text_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CommandSettings {
    /// Hard limit for one process; system image downloads and rootAVD are slow.
    pub command_timeout: u64,
    pub adb_path: String,
    pub emulator_path: String,
    pub sdkmanager_path: String,
    pub avdmanager_path: String,
    pub download_attempts: usize,
    pub download_retry_delay_ms: u64,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            command_timeout: 1800,
            adb_path: String::new(),
            emulator_path: String::new(),
            sdkmanager_path: String::new(),
            avdmanager_path: String::new(),
            download_attempts: 3,
            download_retry_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub log_level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProvisionConfig {
    #[serde(default)]
    pub avd: AvdSettings,
    #[serde(default)]
    pub target: TargetSettings,
    #[serde(default)]
    pub sources: SourceSettings,
    #[serde(default)]
    pub wait: WaitSettings,
    #[serde(default)]
    pub command: CommandSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub version: String,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            avd: AvdSettings::default(),
            target: TargetSettings::default(),
            sources: SourceSettings::default(),
            wait: WaitSettings::default(),
            command: CommandSettings::default(),
            logging: LoggingSettings::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("ROOTED_AVD_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rooted_avd_config.json")
}

pub fn backup_config_path(path: &Path) -> PathBuf {
    path.with_extension("backup.json")
}

pub fn load_config_from_path(path: &Path) -> Result<ProvisionConfig, ProvisionError> {
    if !path.exists() {
        return Ok(ProvisionConfig::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| ProvisionError::config(format!("Failed to read config: {err}")))?;
    let config: ProvisionConfig = serde_json::from_str(&raw).map_err(|err| {
        ProvisionError::config(format!("Failed to parse config {}: {err}", path.display()))
    })?;
    Ok(validate_config(config))
}

pub fn save_config_to_path(
    config: &ProvisionConfig,
    path: &Path,
    backup_path: &Path,
) -> Result<(), ProvisionError> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if path.exists() {
        let _ = fs::copy(path, backup_path);
    }
    let payload = serde_json::to_string_pretty(config)
        .map_err(|err| ProvisionError::config(format!("Failed to serialize config: {err}")))?;
    fs::write(path, payload)
        .map_err(|err| ProvisionError::config(format!("Failed to write config: {err}")))?;
    Ok(())
}

fn validate_config(mut config: ProvisionConfig) -> ProvisionConfig {
    let defaults = ProvisionConfig::default();
    if config.avd.name.trim().is_empty() {
        config.avd.name = defaults.avd.name;
    }
    if config.avd.api_level.trim().is_empty() {
        config.avd.api_level = defaults.avd.api_level;
    }
    if config.avd.device_profile.trim().is_empty() {
        config.avd.device_profile = defaults.avd.device_profile;
    }
    if config.target.package.trim().is_empty() {
        config.target.package = defaults.target.package;
    }
    if config.target.bypass_module.trim().is_empty() {
        config.target.bypass_module = defaults.target.bypass_module;
    }
    if config.wait.poll_interval_secs == 0 {
        config.wait.poll_interval_secs = defaults.wait.poll_interval_secs;
    }
    if config.wait.connectivity_timeout_secs < 10 {
        config.wait.connectivity_timeout_secs = defaults.wait.connectivity_timeout_secs;
    }
    if config.wait.boot_timeout_secs < 30 {
        config.wait.boot_timeout_secs = defaults.wait.boot_timeout_secs;
    }
    if config.wait.package_timeout_secs == 0 {
        config.wait.package_timeout_secs = defaults.wait.package_timeout_secs;
    }
    if config.wait.package_poll_interval_secs == 0 {
        config.wait.package_poll_interval_secs = defaults.wait.package_poll_interval_secs;
    }
    if config.wait.screen_text_attempts == 0 {
        config.wait.screen_text_attempts = defaults.wait.screen_text_attempts;
    }
    if config.command.command_timeout < 10 {
        config.command.command_timeout = defaults.command.command_timeout;
    }
    if config.command.download_attempts == 0 {
        config.command.download_attempts = defaults.command.download_attempts;
    }
    let level = config.logging.log_level.to_ascii_lowercase();
    config.logging.log_level = match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => level,
        _ => defaults.logging.log_level,
    };
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_take_defaults() {
        let value = serde_json::json!({
            "avd": { "name": "Custom_AVD" },
            "wait": { "boot_timeout_secs": 600 }
        });
        let config: ProvisionConfig = serde_json::from_value(value).expect("parse");
        assert_eq!(config.avd.name, "Custom_AVD");
        assert_eq!(config.avd.api_level, "33");
        assert_eq!(config.wait.boot_timeout_secs, 600);
        assert_eq!(config.wait.poll_interval_secs, 2);
        assert_eq!(config.target.package, "it.bicoccapp.unimib");
    }

    #[test]
    fn clamps_invalid_values() {
        let mut config = ProvisionConfig::default();
        config.wait.poll_interval_secs = 0;
        config.wait.boot_timeout_secs = 1;
        config.target.package = "  ".to_string();
        config.command.command_timeout = 0;
        config.logging.log_level = "LOUD".to_string();
        let validated = validate_config(config);
        assert_eq!(validated.wait.poll_interval_secs, 2);
        assert_eq!(validated.wait.boot_timeout_secs, 300);
        assert_eq!(validated.target.package, "it.bicoccapp.unimib");
        assert_eq!(validated.command.command_timeout, 1800);
        assert_eq!(validated.logging.log_level, "warn");
    }

    #[test]
    fn save_then_load_keeps_backup() {
        let dir = tempfile::TempDir::new().expect("tmp");
        let path = dir.path().join("config.json");
        let backup = backup_config_path(&path);

        let mut config = ProvisionConfig::default();
        save_config_to_path(&config, &path, &backup).expect("first save");
        config.avd.name = "Second".to_string();
        save_config_to_path(&config, &path, &backup).expect("second save");

        assert_eq!(load_config_from_path(&path).expect("load").avd.name, "Second");
        let previous = load_config_from_path(&backup).expect("backup");
        assert_eq!(previous.avd.name, "Pixel_7_Pro_API_33");
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        let dir = tempfile::TempDir::new().expect("tmp");
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").expect("write");
        let err = load_config_from_path(&path).expect_err("parse error");
        assert_eq!(err.code(), "ERR_CONFIG");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::TempDir::new().expect("tmp");
        let config = load_config_from_path(&dir.path().join("absent.json")).expect("defaults");
        assert_eq!(config, ProvisionConfig::default());
    }
}
