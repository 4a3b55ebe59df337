use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use crate::app::adb::client::Adb;
use crate::app::adb::locator::{resolve_sdk_tool, SdkTool};
use crate::app::adb::runner::{CommandChannel, SystemChannel};
use crate::app::arch::ArchConfig;
use crate::app::config::ProvisionConfig;
use crate::app::device::Device;
use crate::app::error::ProvisionError;
use crate::app::fetch::{Fetcher, HttpFetcher};
use crate::app::host::{HostPlatform, SystemHost};
use crate::app::present::Reporter;
use crate::app::ui_automation::UiAutomator;

/// Resolved SDK tool commands; bare names until the SDK root is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub adb: String,
    pub emulator: String,
    pub sdkmanager: String,
    pub avdmanager: String,
}

impl ToolPaths {
    pub fn resolve(config: &ProvisionConfig, android_home: &Path) -> Self {
        let command = &config.command;
        Self {
            adb: resolve_sdk_tool(SdkTool::Adb, &command.adb_path, android_home),
            emulator: resolve_sdk_tool(SdkTool::Emulator, &command.emulator_path, android_home),
            sdkmanager: resolve_sdk_tool(SdkTool::SdkManager, &command.sdkmanager_path, android_home),
            avdmanager: resolve_sdk_tool(SdkTool::AvdManager, &command.avdmanager_path, android_home),
        }
    }
}

/// Everything a provisioning step reads or records, passed by `&mut`.
pub struct ProvisionContext {
    pub config: ProvisionConfig,
    pub trace_id: String,
    pub arch: ArchConfig,
    pub channel: Box<dyn CommandChannel>,
    pub host: Box<dyn HostPlatform>,
    pub fetcher: Box<dyn Fetcher>,
    scratch: Option<TempDir>,
    scratch_path: PathBuf,
    pub android_home: PathBuf,
    pub tools: ToolPaths,
    pub java_home: Option<PathBuf>,
    pub python: Option<String>,
    pub started: Instant,
}

impl ProvisionContext {
    pub fn new(
        config: ProvisionConfig,
        trace_id: String,
        channel: Box<dyn CommandChannel>,
        host: Box<dyn HostPlatform>,
        fetcher: Box<dyn Fetcher>,
    ) -> Result<Self, ProvisionError> {
        let scratch = tempfile::Builder::new()
            .prefix("android-setup-")
            .tempdir()
            .map_err(|err| ProvisionError::io(format!("Failed to create temp directory: {err}")))?;
        let arch = ArchConfig::for_host_arch(&host.cpu_arch(), &config.avd.api_level);
        let android_home = host
            .env_var("ANDROID_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| host.default_android_home());
        let tools = ToolPaths::resolve(&config, &android_home);
        Ok(Self {
            scratch_path: scratch.path().to_path_buf(),
            scratch: Some(scratch),
            config,
            trace_id,
            arch,
            channel,
            host,
            fetcher,
            android_home,
            tools,
            java_home: None,
            python: None,
            started: Instant::now(),
        })
    }

    /// Context wired to the real host, process runner and HTTP client.
    pub fn system(config: ProvisionConfig, trace_id: String) -> Result<Self, ProvisionError> {
        let channel = SystemChannel::new(
            Duration::from_secs(config.command.command_timeout),
            trace_id.clone(),
        );
        let fetcher = HttpFetcher::new(
            config.command.download_attempts,
            config.command.download_retry_delay_ms,
        );
        Self::new(
            config,
            trace_id,
            Box::new(channel),
            Box::new(SystemHost::new()),
            Box::new(fetcher),
        )
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_path
    }

    pub fn set_android_home(&mut self, android_home: PathBuf) {
        self.tools = ToolPaths::resolve(&self.config, &android_home);
        self.android_home = android_home;
    }

    /// Re-resolves tool paths after components were installed under the SDK root.
    pub fn refresh_tools(&mut self) {
        self.tools = ToolPaths::resolve(&self.config, &self.android_home);
    }

    pub fn adb(&self) -> Adb<'_> {
        Adb::new(self.channel.as_ref(), &self.tools.adb)
    }

    pub fn device<'a>(&'a self, reporter: &'a dyn Reporter) -> Device<'a> {
        Device::new(self.adb(), &self.config.wait, reporter, &self.trace_id)
    }

    pub fn ui(&self) -> UiAutomator<'_> {
        UiAutomator::new(self.adb(), &self.trace_id)
    }

    /// Removes the scratch directory after a clean run.
    pub fn cleanup_scratch(&mut self) -> Result<(), ProvisionError> {
        match self.scratch.take() {
            Some(dir) => dir
                .close()
                .map_err(|err| ProvisionError::io(format!("Failed to cleanup temporary directory: {err}"))),
            None => Ok(()),
        }
    }

    /// Keeps the scratch directory on disk for inspection and returns its path.
    pub fn keep_scratch(&mut self) -> PathBuf {
        match self.scratch.take() {
            Some(dir) => dir.keep(),
            None => self.scratch_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{FakeChannel, FakeFetcher, FakeHost};

    fn context_with(channel: FakeChannel, host: FakeHost) -> ProvisionContext {
        crate::app::testing::test_context(channel, host, FakeFetcher::new())
    }

    #[test]
    fn resolves_android_home_from_env_or_default() {
        let host = FakeHost::default();
        let ctx = context_with(FakeChannel::new(), host.clone());
        assert_eq!(ctx.android_home, PathBuf::from("/home/tester/Android/Sdk"));

        host.set_env("ANDROID_HOME", std::ffi::OsStr::new("/opt/sdk"));
        let ctx = context_with(FakeChannel::new(), host);
        assert_eq!(ctx.android_home, PathBuf::from("/opt/sdk"));
        assert_eq!(ctx.tools.adb, "adb");
    }

    #[test]
    fn scratch_is_removed_on_cleanup_and_kept_on_request() {
        let mut ctx = context_with(FakeChannel::new(), FakeHost::default());
        let path = ctx.scratch_dir().to_path_buf();
        assert!(path.is_dir());
        ctx.cleanup_scratch().expect("cleanup");
        assert!(!path.exists());

        let mut ctx = context_with(FakeChannel::new(), FakeHost::default());
        let kept = ctx.keep_scratch();
        assert!(kept.is_dir());
        std::fs::remove_dir_all(kept).expect("manual cleanup");
    }

    #[test]
    fn arch_is_selected_when_context_is_built() {
        let host = FakeHost {
            arch: "aarch64".to_string(),
            ..FakeHost::default()
        };
        let ctx = context_with(FakeChannel::new(), host);
        assert_eq!(ctx.arch.name, "arm64");
    }
}
