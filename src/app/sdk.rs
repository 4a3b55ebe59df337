use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::app::adb::locator::SdkTool;
use crate::app::adb::parse::sdk_component_installed;
use crate::app::adb::runner::Invocation;
use crate::app::error::{ProvisionError, ResultExt};
use crate::app::fetch::unzip;
use crate::app::present::Reporter;
use crate::app::state::ProvisionContext;

pub const PLATFORM_TOOLS: &str = "platform-tools";
pub const EMULATOR: &str = "emulator";

pub fn sdkmanager_available(ctx: &ProvisionContext) -> bool {
    !ctx.config.command.sdkmanager_path.trim().is_empty()
        || SdkTool::SdkManager.sdk_path(&ctx.android_home).is_file()
        || ctx.host.command_exists(SdkTool::SdkManager.name())
}

fn tools_url(ctx: &ProvisionContext) -> String {
    let configured = ctx.config.sources.sdk_tools_url.trim();
    if configured.is_empty() {
        ctx.host.os().sdk_tools_url().to_string()
    } else {
        configured.to_string()
    }
}

/// Downloads cmdline-tools and installs them as `cmdline-tools/latest`.
pub fn install_cmdline_tools(
    ctx: &mut ProvisionContext,
    reporter: &dyn Reporter,
) -> Result<PathBuf, ProvisionError> {
    let url = tools_url(ctx);
    let scratch = ctx.scratch_dir().to_path_buf();
    let archive = scratch.join("cmdline-tools.zip");
    reporter.info("Installing SDK tools");
    ctx.fetcher
        .download(&url, &archive)
        .context("SDK tools download failed")?;

    let extracted = scratch.join("extracted");
    unzip(&archive, &extracted)?;

    let tools_dir = ctx.android_home.join("cmdline-tools");
    fs::create_dir_all(&tools_dir).map_err(|err| {
        ProvisionError::io(format!("Failed to create {}: {err}", tools_dir.display()))
    })?;
    let latest = tools_dir.join("latest");
    if latest.exists() {
        fs::remove_dir_all(&latest).map_err(|err| {
            ProvisionError::io(format!("Failed to remove {}: {err}", latest.display()))
        })?;
    }
    move_dir(&extracted.join("cmdline-tools"), &latest)?;

    let bin = latest.join("bin");
    ctx.host.prepend_path(&bin);
    ctx.refresh_tools();
    info!(trace_id = %ctx.trace_id, path = %latest.display(), "cmdline-tools installed");
    Ok(latest)
}

/// Rename, falling back to copy-then-delete when the scratch dir lives on
/// another filesystem.
fn move_dir(from: &Path, to: &Path) -> Result<(), ProvisionError> {
    if !from.is_dir() {
        return Err(ProvisionError::io(format!(
            "Archive did not contain {}",
            from.display()
        )));
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    copy_dir_all(from, to)?;
    fs::remove_dir_all(from)
        .map_err(|err| ProvisionError::io(format!("Failed to remove {}: {err}", from.display())))
}

fn copy_dir_all(from: &Path, to: &Path) -> Result<(), ProvisionError> {
    let io_err = |path: &Path, err: std::io::Error| {
        ProvisionError::io(format!("Failed to copy {}: {err}", path.display()))
    };
    fs::create_dir_all(to).map_err(|err| io_err(to, err))?;
    for entry in fs::read_dir(from).map_err(|err| io_err(from, err))? {
        let entry = entry.map_err(|err| io_err(from, err))?;
        let target = to.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|err| io_err(&entry.path(), err))?;
        }
    }
    Ok(())
}

/// Installs one SDK package unless `--list_installed` already reports it.
/// Returns whether an install was performed.
pub fn install_component(
    ctx: &ProvisionContext,
    reporter: &dyn Reporter,
    component: &str,
    label: &str,
) -> Result<bool, ProvisionError> {
    let sdkmanager = ctx.tools.sdkmanager.as_str();
    let listing = ctx
        .channel
        .execute(&Invocation::new(sdkmanager).arg("--list_installed"));
    match listing {
        Ok(result) if sdk_component_installed(&result.combined_output, component) => {
            reporter.info(&format!("{label} already installed"));
            return Ok(false);
        }
        Ok(_) => {}
        Err(err) => {
            debug!(trace_id = %ctx.trace_id, error = %err, "sdkmanager --list_installed failed");
        }
    }

    reporter.info(&format!("Installing {label}"));
    ctx.channel
        .run(&Invocation::new(sdkmanager).arg(component).stdin("y\n"))
        .context(format!("{label} installation failed"))?;
    info!(trace_id = %ctx.trace_id, component, "sdk component installed");
    Ok(true)
}

/// Resolves the SDK root, bootstraps cmdline-tools when `sdkmanager` is
/// missing and installs the emulator's packages.
pub fn ensure_android_sdk(
    ctx: &mut ProvisionContext,
    reporter: &dyn Reporter,
) -> Result<(), ProvisionError> {
    if ctx.host.env_var("ANDROID_HOME").is_none() {
        ctx.host.set_env("ANDROID_HOME", ctx.android_home.as_os_str());
    }
    reporter.info(&format!("ANDROID_HOME: {}", ctx.android_home.display()));

    if sdkmanager_available(ctx) {
        reporter.info("SDK manager detected");
    } else {
        install_cmdline_tools(ctx, reporter)?;
    }
    ensure_sdk_components(ctx, reporter)
}

/// Makes sure every SDK package the emulator needs is present, extending
/// PATH for freshly installed tool directories.
pub fn ensure_sdk_components(
    ctx: &mut ProvisionContext,
    reporter: &dyn Reporter,
) -> Result<(), ProvisionError> {
    if install_component(ctx, reporter, PLATFORM_TOOLS, "Platform-Tools")? {
        ctx.host.prepend_path(&ctx.android_home.join(PLATFORM_TOOLS));
    }
    if install_component(ctx, reporter, EMULATOR, "Emulator")? {
        ctx.host.prepend_path(&ctx.android_home.join(EMULATOR));
    }
    let image = ctx.arch.system_image_id.clone();
    install_component(ctx, reporter, &image, "System image")?;
    ctx.refresh_tools();
    Ok(())
}
