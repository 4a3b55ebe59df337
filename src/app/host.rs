use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::app::adb::runner::{CommandChannel, Invocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsKind {
    Linux,
    MacOs,
    Windows,
}

impl OsKind {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }

    pub fn sdk_tools_url(self) -> &'static str {
        match self {
            Self::Linux => "https://dl.google.com/android/repository/commandlinetools-linux-11076708_latest.zip",
            Self::MacOs => "https://dl.google.com/android/repository/commandlinetools-mac-11076708_latest.zip",
            Self::Windows => "https://dl.google.com/android/repository/commandlinetools-win-11076708_latest.zip",
        }
    }

    pub fn root_script_name(self) -> &'static str {
        match self {
            Self::Windows => "rootAVD.bat",
            Self::Linux | Self::MacOs => "rootAVD.sh",
        }
    }
}

impl fmt::Display for OsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Linux => "linux",
            Self::MacOs => "mac",
            Self::Windows => "windows",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostTool {
    Git,
    Python,
    Java,
}

impl HostTool {
    pub fn label(self) -> &'static str {
        match self {
            Self::Git => "Git",
            Self::Python => "Python",
            Self::Java => "Java",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    AptGet,
    Yum,
    Pacman,
    Brew,
    Winget,
}

impl PackageManager {
    /// Probe order per OS.
    pub fn candidates(os: OsKind) -> &'static [PackageManager] {
        match os {
            OsKind::Linux => &[Self::AptGet, Self::Yum, Self::Pacman],
            OsKind::MacOs => &[Self::Brew],
            OsKind::Windows => &[Self::Winget],
        }
    }

    pub fn program(self) -> &'static str {
        match self {
            Self::AptGet => "apt-get",
            Self::Yum => "yum",
            Self::Pacman => "pacman",
            Self::Brew => "brew",
            Self::Winget => "winget",
        }
    }

    pub fn package_name(self, tool: HostTool) -> &'static str {
        match (self, tool) {
            (Self::Winget, HostTool::Git) => "Git.Git",
            (Self::Winget, HostTool::Python) => "Python.Python.3.12",
            (Self::Winget, HostTool::Java) => "Oracle.JDK.17",
            (Self::Brew, HostTool::Java) => "openjdk@17",
            (_, HostTool::Git) => "git",
            (_, HostTool::Python) => "python3",
            (_, HostTool::Java) => "openjdk-17-jdk",
        }
    }

    pub fn install_invocation(self, package: &str) -> Invocation {
        match self {
            Self::AptGet => Invocation::new("sudo").args(["apt-get", "install", "-y", "-qq", package]),
            Self::Yum => Invocation::new("sudo").args(["yum", "install", "-y", "-q", package]),
            Self::Pacman => Invocation::new("sudo").args(["pacman", "-S", "--noconfirm", package]),
            Self::Brew => Invocation::new("brew").args(["install", package]),
            Self::Winget => Invocation::new("winget").args([
                "install",
                package,
                "--silent",
                "--accept-package-agreements",
                "--accept-source-agreements",
            ]),
        }
    }
}

/// Host operating system seam: program lookup, environment and process control.
pub trait HostPlatform {
    fn os(&self) -> OsKind;

    fn cpu_arch(&self) -> String;

    fn find_program(&self, name: &str) -> Option<PathBuf>;

    fn package_manager(&self) -> Option<PackageManager>;

    fn kill_existing_emulators(&self, channel: &dyn CommandChannel);

    fn env_var(&self, key: &str) -> Option<String>;

    fn set_env(&self, key: &str, value: &OsStr);

    fn prepend_path(&self, dir: &Path);

    fn home_dir(&self) -> Option<PathBuf>;

    fn detect_java_home(&self, channel: &dyn CommandChannel) -> Option<PathBuf>;

    /// Picks up binaries a package manager just installed.
    fn refresh_path(&self) {}

    fn command_exists(&self, name: &str) -> bool {
        self.find_program(name).is_some()
    }

    fn default_android_home(&self) -> PathBuf {
        let home = self.home_dir().unwrap_or_else(|| PathBuf::from("."));
        match self.os() {
            OsKind::Linux => home.join("Android").join("Sdk"),
            OsKind::MacOs => home.join("Library").join("Android").join("sdk"),
            OsKind::Windows => self
                .env_var("LOCALAPPDATA")
                .map(PathBuf::from)
                .unwrap_or(home)
                .join("Android")
                .join("Sdk"),
        }
    }
}

#[derive(Debug, Default)]
pub struct SystemHost;

impl SystemHost {
    pub fn new() -> Self {
        Self
    }
}

impl HostPlatform for SystemHost {
    fn os(&self) -> OsKind {
        OsKind::current()
    }

    fn cpu_arch(&self) -> String {
        std::env::consts::ARCH.to_string()
    }

    fn find_program(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }

    fn package_manager(&self) -> Option<PackageManager> {
        PackageManager::candidates(self.os())
            .iter()
            .copied()
            .find(|manager| self.command_exists(manager.program()))
    }

    fn kill_existing_emulators(&self, channel: &dyn CommandChannel) {
        let invocations = match self.os() {
            OsKind::Windows => vec![
                Invocation::new("taskkill").args(["/F", "/IM", "qemu-system-x86_64.exe"]),
                Invocation::new("taskkill").args(["/F", "/IM", "emulator.exe"]),
            ],
            OsKind::Linux | OsKind::MacOs => vec![
                Invocation::new("pkill").args(["-9", "emulator"]),
                Invocation::new("pkill").args(["-9", "qemu-system"]),
            ],
        };
        for invocation in invocations {
            // Exit status 1 just means nothing matched.
            if let Err(err) = channel.execute(&invocation) {
                debug!(command = %invocation.command_line(), error = %err, "kill skipped");
            }
        }
    }

    fn env_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|value| !value.trim().is_empty())
    }

    fn set_env(&self, key: &str, value: &OsStr) {
        std::env::set_var(key, value);
    }

    fn prepend_path(&self, dir: &Path) {
        let current = std::env::var_os("PATH").unwrap_or_default();
        let mut entries: Vec<PathBuf> = std::env::split_paths(&current).collect();
        if entries.iter().any(|entry| entry == dir) {
            return;
        }
        entries.insert(0, dir.to_path_buf());
        match std::env::join_paths(entries) {
            Ok(joined) => std::env::set_var("PATH", joined),
            Err(err) => warn!(dir = %dir.display(), error = %err, "cannot extend PATH"),
        }
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    fn detect_java_home(&self, channel: &dyn CommandChannel) -> Option<PathBuf> {
        match self.os() {
            OsKind::MacOs => mac_java_home(channel),
            OsKind::Linux => {
                let java = self.find_program("java")?;
                let resolved = java.canonicalize().unwrap_or(java);
                resolved.parent()?.parent().map(Path::to_path_buf)
            }
            OsKind::Windows => {
                let roots = [
                    self.env_var("ProgramFiles").map(|base| PathBuf::from(base).join("Java")),
                    self.env_var("ProgramFiles(x86)").map(|base| PathBuf::from(base).join("Java")),
                    self.env_var("LOCALAPPDATA")
                        .map(|base| PathBuf::from(base).join("Programs").join("Java")),
                ];
                roots.into_iter().flatten().find_map(|root| find_jdk_under(&root))
            }
        }
    }

    fn refresh_path(&self) {
        let extra: &[&str] = match self.os() {
            OsKind::Linux => &["/usr/local/bin", "/usr/bin", "/bin"],
            OsKind::MacOs => &["/opt/homebrew/bin", "/usr/local/bin"],
            OsKind::Windows => &[],
        };
        for dir in extra {
            let dir = Path::new(dir);
            if dir.is_dir() {
                self.prepend_path(dir);
            }
        }
    }
}

/// Asks `/usr/libexec/java_home` for the active JDK.
fn mac_java_home(channel: &dyn CommandChannel) -> Option<PathBuf> {
    let result = channel
        .execute(&Invocation::new("/usr/libexec/java_home"))
        .ok()?;
    let home = result.combined_output.trim();
    (result.succeeded && !home.is_empty()).then(|| PathBuf::from(home))
}

fn find_jdk_under(root: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(root).ok()?;
    entries.flatten().map(|entry| entry.path()).find(|path| {
        let is_jdk = path
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase().contains("jdk"))
            .unwrap_or(false);
        is_jdk && path.join("bin").join("java.exe").is_file()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{FakeChannel, Reply};

    #[test]
    fn install_commands_follow_package_manager() {
        let apt = PackageManager::AptGet.install_invocation("git");
        assert_eq!(apt.command_line(), "sudo apt-get install -y -qq git");
        let winget = PackageManager::Winget
            .install_invocation(PackageManager::Winget.package_name(HostTool::Java));
        assert_eq!(
            winget.command_line(),
            "winget install Oracle.JDK.17 --silent --accept-package-agreements --accept-source-agreements"
        );
        assert_eq!(PackageManager::Brew.package_name(HostTool::Java), "openjdk@17");
        assert_eq!(PackageManager::Pacman.package_name(HostTool::Python), "python3");
    }

    #[test]
    fn candidates_are_os_specific() {
        assert_eq!(
            PackageManager::candidates(OsKind::Linux),
            &[PackageManager::AptGet, PackageManager::Yum, PackageManager::Pacman]
        );
        assert_eq!(PackageManager::candidates(OsKind::Windows), &[PackageManager::Winget]);
        assert_eq!(OsKind::Windows.root_script_name(), "rootAVD.bat");
        assert_eq!(OsKind::Linux.root_script_name(), "rootAVD.sh");
    }

    #[test]
    fn mac_java_home_goes_through_channel() {
        let channel = FakeChannel::new();
        channel.reply(
            "/usr/libexec/java_home",
            Reply::ok("/Library/Java/JavaVirtualMachines/temurin-17.jdk/Contents/Home\n"),
        );
        assert_eq!(
            mac_java_home(&channel),
            Some(PathBuf::from("/Library/Java/JavaVirtualMachines/temurin-17.jdk/Contents/Home"))
        );
        assert_eq!(channel.calls(), vec!["/usr/libexec/java_home"]);

        let missing = FakeChannel::new();
        missing.reply(
            "/usr/libexec/java_home",
            Reply::fail("Unable to locate a Java Runtime.", 1),
        );
        assert_eq!(mac_java_home(&missing), None);
    }

    #[test]
    fn finds_jdk_directory_with_java_exe() {
        let dir = tempfile::TempDir::new().expect("tmp");
        let jdk = dir.path().join("jdk-17.0.2");
        std::fs::create_dir_all(jdk.join("bin")).expect("mkdir");
        std::fs::create_dir_all(dir.path().join("jre-8")).expect("mkdir");
        std::fs::write(jdk.join("bin").join("java.exe"), b"").expect("write");
        assert_eq!(find_jdk_under(dir.path()), Some(jdk));
    }
}
