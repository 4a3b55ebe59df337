use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceCommandResult {
    pub combined_output: String,
    pub succeeded: bool,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceSummary {
    pub serial: String,
    pub state: String,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LspdModule {
    pub package: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StepRecord {
    pub name: String,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompletionSummary {
    pub avd_name: String,
    pub android_version: String,
    pub api_level: String,
    pub device_label: String,
    pub architecture: String,
    pub elapsed: Duration,
}
