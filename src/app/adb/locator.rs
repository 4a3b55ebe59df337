use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkTool {
    Adb,
    Emulator,
    SdkManager,
    AvdManager,
}

impl SdkTool {
    pub fn name(self) -> &'static str {
        match self {
            Self::Adb => "adb",
            Self::Emulator => "emulator",
            Self::SdkManager => "sdkmanager",
            Self::AvdManager => "avdmanager",
        }
    }

    fn file_name(self) -> String {
        if cfg!(windows) {
            match self {
                Self::Adb | Self::Emulator => format!("{}.exe", self.name()),
                Self::SdkManager | Self::AvdManager => format!("{}.bat", self.name()),
            }
        } else {
            self.name().to_string()
        }
    }

    pub fn sdk_path(self, android_home: &Path) -> PathBuf {
        let dir = match self {
            Self::Adb => android_home.join("platform-tools"),
            Self::Emulator => android_home.join("emulator"),
            Self::SdkManager | Self::AvdManager => {
                android_home.join("cmdline-tools").join("latest").join("bin")
            }
        };
        dir.join(self.file_name())
    }
}

pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(inner) = trimmed
        .strip_prefix('"')
        .and_then(|candidate| candidate.strip_suffix('"'))
    {
        return inner.trim().to_string();
    }
    if let Some(inner) = trimmed
        .strip_prefix('\'')
        .and_then(|candidate| candidate.strip_suffix('\''))
    {
        return inner.trim().to_string();
    }
    trimmed.to_string()
}

/// Configured override, else the SDK copy if present, else the bare name for PATH lookup.
pub fn resolve_sdk_tool(tool: SdkTool, configured: &str, android_home: &Path) -> String {
    let normalized = normalize_command_path(configured);
    if !normalized.is_empty() {
        return normalized;
    }
    let candidate = tool.sdk_path(android_home);
    if candidate.is_file() {
        return candidate.to_string_lossy().to_string();
    }
    tool.name().to_string()
}
