//! Scripted collaborators shared by unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use crate::app::adb::runner::{CommandChannel, Invocation};
use crate::app::config::{ProvisionConfig, WaitSettings};
use crate::app::error::ProvisionError;
use crate::app::fetch::Fetcher;
use crate::app::host::{HostPlatform, OsKind, PackageManager};
use crate::app::models::{CompletionSummary, DeviceCommandResult, StepRecord};
use crate::app::poller::WaitPhase;
use crate::app::present::Reporter;
use crate::app::state::ProvisionContext;

#[derive(Debug, Clone)]
pub enum Reply {
    Output { text: String, exit_code: i32 },
    SpawnFailure(String),
}

impl Reply {
    pub fn ok(text: impl Into<String>) -> Self {
        Self::Output {
            text: text.into(),
            exit_code: 0,
        }
    }

    pub fn fail(text: impl Into<String>, exit_code: i32) -> Self {
        Self::Output {
            text: text.into(),
            exit_code,
        }
    }
}

struct Rule {
    pattern: String,
    replies: VecDeque<Reply>,
}

#[derive(Default)]
struct ChannelState {
    rules: Vec<Rule>,
    calls: Vec<String>,
    detached: Vec<String>,
    stdin: Vec<Option<String>>,
}

/// Matches each invocation's command line against registered substrings in
/// registration order. A rule's last reply repeats; unmatched commands succeed
/// with empty output.
#[derive(Clone, Default)]
pub struct FakeChannel {
    state: Rc<RefCell<ChannelState>>,
}

impl FakeChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, pattern: &str, reply: Reply) -> &Self {
        self.sequence(pattern, vec![reply])
    }

    pub fn sequence(&self, pattern: &str, replies: Vec<Reply>) -> &Self {
        self.state.borrow_mut().rules.push(Rule {
            pattern: pattern.to_string(),
            replies: replies.into(),
        });
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|line| line.contains(pattern))
            .count()
    }

    pub fn detached(&self) -> Vec<String> {
        self.state.borrow().detached.clone()
    }

    pub fn stdin_inputs(&self) -> Vec<Option<String>> {
        self.state.borrow().stdin.clone()
    }

    fn next_reply(&self, line: &str) -> Option<Reply> {
        let mut state = self.state.borrow_mut();
        let rule = state
            .rules
            .iter_mut()
            .find(|rule| line.contains(&rule.pattern))?;
        if rule.replies.len() > 1 {
            rule.replies.pop_front()
        } else {
            rule.replies.front().cloned()
        }
    }
}

impl CommandChannel for FakeChannel {
    fn execute(&self, invocation: &Invocation) -> Result<DeviceCommandResult, ProvisionError> {
        let line = invocation.command_line();
        {
            let mut state = self.state.borrow_mut();
            state.calls.push(line.clone());
            state.stdin.push(invocation.stdin.clone());
        }
        match self.next_reply(&line) {
            None => Ok(DeviceCommandResult {
                combined_output: String::new(),
                succeeded: true,
                exit_code: Some(0),
            }),
            Some(Reply::Output { text, exit_code }) => Ok(DeviceCommandResult {
                combined_output: text,
                succeeded: exit_code == 0,
                exit_code: Some(exit_code),
            }),
            Some(Reply::SpawnFailure(message)) => Err(ProvisionError::Spawn {
                program: invocation.program.clone(),
                message,
            }),
        }
    }

    fn launch_detached(&self, invocation: &Invocation) -> Result<(), ProvisionError> {
        self.state
            .borrow_mut()
            .detached
            .push(invocation.command_line());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct FakeFetcher {
    downloads: Rc<RefCell<Vec<String>>>,
    failing: bool,
    payload: Option<Vec<u8>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Serves `payload` as the body of every download.
    pub fn serving(payload: Vec<u8>) -> Self {
        Self {
            payload: Some(payload),
            ..Self::default()
        }
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.borrow().clone()
    }
}

impl Fetcher for FakeFetcher {
    fn download(&self, url: &str, destination: &Path) -> Result<(), ProvisionError> {
        self.downloads.borrow_mut().push(url.to_string());
        if self.failing {
            return Err(ProvisionError::io(format!("HTTP 404 for {url}")));
        }
        let body = self.payload.as_deref().unwrap_or(b"payload");
        std::fs::write(destination, body)
            .map_err(|err| ProvisionError::io(format!("Failed to write download: {err}")))
    }
}

#[derive(Clone)]
pub struct FakeHost {
    pub os: OsKind,
    pub arch: String,
    pub programs: Vec<String>,
    pub env: Rc<RefCell<Vec<(String, String)>>>,
    pub killed: Rc<RefCell<u32>>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            os: OsKind::Linux,
            arch: "x86_64".to_string(),
            programs: vec!["git".to_string(), "apt-get".to_string()],
            env: Rc::new(RefCell::new(Vec::new())),
            killed: Rc::new(RefCell::new(0)),
        }
    }
}

impl HostPlatform for FakeHost {
    fn os(&self) -> OsKind {
        self.os
    }

    fn cpu_arch(&self) -> String {
        self.arch.clone()
    }

    fn find_program(&self, name: &str) -> Option<PathBuf> {
        self.programs
            .iter()
            .any(|program| program == name)
            .then(|| PathBuf::from("/usr/bin").join(name))
    }

    fn package_manager(&self) -> Option<PackageManager> {
        PackageManager::candidates(self.os)
            .iter()
            .copied()
            .find(|manager| self.find_program(manager.program()).is_some())
    }

    fn kill_existing_emulators(&self, _channel: &dyn CommandChannel) {
        *self.killed.borrow_mut() += 1;
    }

    fn env_var(&self, key: &str) -> Option<String> {
        self.env
            .borrow()
            .iter()
            .rev()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
    }

    fn set_env(&self, key: &str, value: &OsStr) {
        self.env
            .borrow_mut()
            .push((key.to_string(), value.to_string_lossy().to_string()));
    }

    fn prepend_path(&self, dir: &Path) {
        self.set_env("PATH", dir.as_os_str());
    }

    fn home_dir(&self) -> Option<PathBuf> {
        Some(PathBuf::from("/home/tester"))
    }

    fn detect_java_home(&self, _channel: &dyn CommandChannel) -> Option<PathBuf> {
        None
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    events: RefCell<Vec<String>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    fn push(&self, event: String) {
        self.events.borrow_mut().push(event);
    }
}

impl Reporter for RecordingReporter {
    fn step_started(&self, _index: usize, _total: usize, name: &str) {
        self.push(format!("start:{name}"));
    }

    fn info(&self, message: &str) {
        self.push(format!("info:{message}"));
    }

    fn warn(&self, message: &str) {
        self.push(format!("warn:{message}"));
    }

    fn waiting(&self, phase: WaitPhase, _elapsed: Duration) {
        self.push(format!("wait:{phase}"));
    }

    fn step_finished(&self, record: &StepRecord) {
        self.push(format!("done:{}", record.name));
    }

    fn step_failed(&self, name: &str, _err: &ProvisionError) {
        self.push(format!("failed:{name}"));
    }

    fn completed(&self, summary: &CompletionSummary) {
        self.push(format!("complete:{}", summary.avd_name));
    }
}

/// Waits that never sleep, so scripted device sequences run instantly.
pub fn fast_waits() -> WaitSettings {
    WaitSettings {
        connectivity_timeout_secs: 5,
        boot_timeout_secs: 5,
        poll_interval_secs: 0,
        package_timeout_secs: 5,
        package_poll_interval_secs: 0,
        screen_text_attempts: 2,
        screen_text_delay_ms: 0,
    }
}

pub fn test_context(channel: FakeChannel, host: FakeHost, fetcher: FakeFetcher) -> ProvisionContext {
    let mut config = ProvisionConfig::default();
    config.wait = fast_waits();
    ProvisionContext::new(
        config,
        "trace-test".to_string(),
        Box::new(channel),
        Box::new(host),
        Box::new(fetcher),
    )
    .expect("context")
}
