use std::path::Path;

use crate::app::adb::runner::{CommandChannel, Invocation};
use crate::app::error::ProvisionError;
use crate::app::models::DeviceCommandResult;

/// adb front-end over a command channel. Every call is one `adb` process.
pub struct Adb<'a> {
    channel: &'a dyn CommandChannel,
    program: &'a str,
}

impl<'a> Adb<'a> {
    pub fn new(channel: &'a dyn CommandChannel, program: &'a str) -> Self {
        Self { channel, program }
    }

    fn invocation<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::new(self.program).args(args)
    }

    pub fn execute<I, S>(&self, args: I) -> Result<DeviceCommandResult, ProvisionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channel.execute(&self.invocation(args))
    }

    pub fn run<I, S>(&self, args: I) -> Result<String, ProvisionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channel.run(&self.invocation(args))
    }

    pub fn devices(&self) -> Result<String, ProvisionError> {
        self.run(["devices"])
    }

    /// `adb shell <command>`; the device shell splits the command itself.
    pub fn shell(&self, command: &str) -> Result<String, ProvisionError> {
        self.run(["shell", command])
    }

    pub fn shell_args(&self, args: &[&str]) -> Result<String, ProvisionError> {
        self.run(std::iter::once("shell").chain(args.iter().copied()))
    }

    /// `adb shell su -c <command>`.
    pub fn su(&self, command: &str) -> Result<String, ProvisionError> {
        self.run(["shell", "su", "-c", command])
    }

    pub fn push(&self, local: &Path, remote: &str) -> Result<String, ProvisionError> {
        self.run([
            "push".to_string(),
            local.to_string_lossy().to_string(),
            remote.to_string(),
        ])
    }

    pub fn install(&self, apk: &Path) -> Result<String, ProvisionError> {
        self.run([
            "install".to_string(),
            "-r".to_string(),
            apk.to_string_lossy().to_string(),
        ])
    }

    pub fn reboot(&self) -> Result<String, ProvisionError> {
        self.run(["reboot"])
    }

    pub fn tap(&self, x: i32, y: i32) -> Result<String, ProvisionError> {
        self.run([
            "shell".to_string(),
            "input".to_string(),
            "tap".to_string(),
            x.to_string(),
            y.to_string(),
        ])
    }

    pub fn getprop(&self, name: &str) -> Result<String, ProvisionError> {
        self.run(["shell", "getprop", name])
            .map(|output| output.trim().to_string())
    }

    pub fn kill_server(&self) -> Result<String, ProvisionError> {
        self.run(["kill-server"])
    }

    pub fn start_server(&self) -> Result<String, ProvisionError> {
        self.run(["start-server"])
    }

    pub fn wait_for_device(&self) -> Result<String, ProvisionError> {
        self.run(["wait-for-device"])
    }

    pub fn list_packages(&self) -> Result<String, ProvisionError> {
        self.run(["shell", "pm", "list", "packages"])
    }

    pub fn remove_file(&self, remote: &str) -> Result<String, ProvisionError> {
        self.run(["shell", "rm", remote])
    }
}
