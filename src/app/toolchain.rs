use std::path::PathBuf;

use tracing::{debug, info};

use crate::app::adb::runner::Invocation;
use crate::app::error::{ProvisionError, ResultExt};
use crate::app::host::{HostTool, OsKind};
use crate::app::present::Reporter;
use crate::app::state::ProvisionContext;

const HOMEBREW_INSTALL_URL: &str = "https://raw.githubusercontent.com/Homebrew/install/HEAD/install.sh";
const WINGET_REPAIR_SCRIPT: &str = "$progressPreference = 'silentlyContinue'; \
Install-PackageProvider -Name NuGet -Force | Out-Null; \
Install-Module -Name Microsoft.WinGet.Client -Force -Repository PSGallery | Out-Null; \
Repair-WinGetPackageManager -AllUsers | Out-Null";

fn restart_terminal(what: &str) -> ProvisionError {
    ProvisionError::dependency(format!(
        "{what} installation completed but command not found - restart terminal"
    ))
}

/// Installs `tool` with the host package manager. A failing install only
/// warns; callers re-check for the command afterwards.
pub fn install_package(
    ctx: &ProvisionContext,
    reporter: &dyn Reporter,
    tool: HostTool,
) -> Result<(), ProvisionError> {
    let manager = ctx
        .host
        .package_manager()
        .ok_or_else(|| ProvisionError::dependency("no supported package manager found"))?;
    let invocation = manager.install_invocation(manager.package_name(tool));
    info!(trace_id = %ctx.trace_id, command = %invocation.command_line(), "installing host package");
    if let Err(err) = ctx.channel.run(&invocation) {
        reporter.warn(&format!("{} installation warning: {err} (may be fine)", tool.label()));
    }
    ctx.host.refresh_path();
    Ok(())
}

fn ensure_homebrew(ctx: &ProvisionContext, reporter: &dyn Reporter) -> Result<(), ProvisionError> {
    if ctx.host.command_exists("brew") {
        reporter.info("Homebrew detected");
        return Ok(());
    }
    reporter.info("Installing Homebrew");
    let script = ctx.scratch_dir().join("homebrew-install.sh");
    ctx.fetcher
        .download(HOMEBREW_INSTALL_URL, &script)
        .context("failed to download Homebrew installer")?;
    ctx.channel
        .run(&Invocation::new("/bin/bash").arg(script.to_string_lossy()))
        .context("Homebrew installation failed")?;
    ctx.host.refresh_path();
    if !ctx.host.command_exists("brew") {
        return Err(restart_terminal("homebrew"));
    }
    reporter.info("Homebrew installed");
    Ok(())
}

fn ensure_winget(ctx: &ProvisionContext, reporter: &dyn Reporter) -> Result<(), ProvisionError> {
    if ctx.host.command_exists("winget") {
        reporter.info("winget detected");
        return Ok(());
    }
    reporter.info("Installing winget");
    let repair = Invocation::new("powershell.exe").args([
        "-ExecutionPolicy",
        "Bypass",
        "-Command",
        WINGET_REPAIR_SCRIPT,
    ]);
    // The repair cmdlets report spurious failures; the re-check below decides.
    if let Err(err) = ctx.channel.run(&repair) {
        debug!(trace_id = %ctx.trace_id, error = %err, "winget repair reported failure");
    }
    ctx.host.refresh_path();
    if !ctx.host.command_exists("winget") {
        return Err(restart_terminal("winget"));
    }
    reporter.info("winget installed");
    Ok(())
}

/// Package manager bootstrap (Homebrew, winget) and git.
pub fn ensure_system_tools(ctx: &ProvisionContext, reporter: &dyn Reporter) -> Result<(), ProvisionError> {
    match ctx.host.os() {
        OsKind::MacOs => ensure_homebrew(ctx, reporter).context("homebrew setup failed")?,
        OsKind::Windows => ensure_winget(ctx, reporter).context("winget setup failed")?,
        OsKind::Linux => match ctx.host.package_manager() {
            Some(manager) => reporter.info(&format!("Package manager: {}", manager.program())),
            None => reporter.warn("No supported package manager found"),
        },
    }

    if ctx.host.command_exists("git") {
        reporter.info("Git detected");
        return Ok(());
    }
    reporter.info("Installing Git");
    install_package(ctx, reporter, HostTool::Git).context("git setup failed")?;
    if !ctx.host.command_exists("git") {
        return Err(restart_terminal("git").context("git setup failed"));
    }
    Ok(())
}

fn detect_python(ctx: &ProvisionContext) -> Option<&'static str> {
    ["python3", "python"].into_iter().find(|candidate| {
        ctx.channel
            .execute(&Invocation::new(*candidate).arg("--version"))
            .map(|result| result.succeeded)
            .unwrap_or(false)
    })
}

pub fn ensure_python(ctx: &mut ProvisionContext, reporter: &dyn Reporter) -> Result<(), ProvisionError> {
    if let Some(python) = detect_python(ctx) {
        reporter.info(&format!("{python} detected"));
        ctx.python = Some(python.to_string());
        return Ok(());
    }

    reporter.info("Installing Python");
    install_package(ctx, reporter, HostTool::Python)?;
    if ctx.host.os() == OsKind::Windows {
        if let Some(local) = ctx.host.env_var("LOCALAPPDATA") {
            let dir = PathBuf::from(local)
                .join("Programs")
                .join("Python")
                .join("Python312");
            ctx.host.prepend_path(&dir);
        }
    }

    match detect_python(ctx) {
        Some(python) => {
            reporter.info(&format!("{python} installed"));
            ctx.python = Some(python.to_string());
            Ok(())
        }
        None => Err(ProvisionError::dependency(
            "python installation completed but not functioning - restart terminal",
        )),
    }
}

pub fn ensure_java(ctx: &mut ProvisionContext, reporter: &dyn Reporter) -> Result<(), ProvisionError> {
    if ctx.host.command_exists("java") {
        reporter.info("Java detected");
    } else {
        reporter.info("Installing Java");
        install_package(ctx, reporter, HostTool::Java)?;
    }

    if let Some(home) = ctx.host.env_var("JAVA_HOME") {
        reporter.info(&format!("JAVA_HOME: {home}"));
        ctx.java_home = Some(PathBuf::from(home));
        return Ok(());
    }
    match ctx.host.detect_java_home(ctx.channel.as_ref()) {
        Some(home) => {
            ctx.host.set_env("JAVA_HOME", home.as_os_str());
            reporter.info(&format!("JAVA_HOME: {}", home.display()));
            ctx.java_home = Some(home);
        }
        None => reporter.warn("JAVA_HOME could not be determined"),
    }
    Ok(())
}
