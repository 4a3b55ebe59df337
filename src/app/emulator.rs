use std::path::PathBuf;

use tracing::info;

use crate::app::adb::locator::SdkTool;
use crate::app::adb::parse::parse_avd_list;
use crate::app::adb::runner::Invocation;
use crate::app::error::{ProvisionError, ResultExt};
use crate::app::present::Reporter;
use crate::app::state::ProvisionContext;

pub fn list_avds(ctx: &ProvisionContext) -> Result<Vec<String>, ProvisionError> {
    let output = ctx
        .channel
        .run(&Invocation::new(&ctx.tools.emulator).arg("-list-avds"))
        .context("Failed to list AVDs")?;
    Ok(parse_avd_list(&output))
}

fn avd_dir(ctx: &ProvisionContext) -> Result<PathBuf, ProvisionError> {
    let home = ctx
        .host
        .home_dir()
        .ok_or_else(|| ProvisionError::dependency("Unable to resolve home directory"))?;
    Ok(home
        .join(".android")
        .join("avd")
        .join(format!("{}.avd", ctx.config.avd.name)))
}

pub fn create_avd(ctx: &ProvisionContext) -> Result<(), ProvisionError> {
    let avd = &ctx.config.avd;
    let path = avd_dir(ctx)?;
    ctx.channel
        .run(&Invocation::new(&ctx.tools.avdmanager).args([
            "create".to_string(),
            "avd".to_string(),
            "-n".to_string(),
            avd.name.clone(),
            "-k".to_string(),
            ctx.arch.system_image_id.clone(),
            "--device".to_string(),
            avd.device_profile.clone(),
            "--force".to_string(),
            "-p".to_string(),
            path.to_string_lossy().to_string(),
        ]))
        .context("AVD creation failed")?;
    info!(trace_id = %ctx.trace_id, avd = %avd.name, path = %path.display(), "avd created");
    Ok(())
}

/// Creates the configured AVD unless the emulator already lists it.
pub fn ensure_avd(ctx: &ProvisionContext, reporter: &dyn Reporter) -> Result<bool, ProvisionError> {
    let name = &ctx.config.avd.name;
    if list_avds(ctx)?.iter().any(|avd| avd == name) {
        reporter.info("AVD already exists");
        return Ok(false);
    }
    reporter.info(&format!("Creating AVD: {name}"));
    create_avd(ctx)?;
    Ok(true)
}

/// Cold-starts the AVD on a fresh adb server and waits until it has booted.
pub fn start(ctx: &ProvisionContext, reporter: &dyn Reporter) -> Result<(), ProvisionError> {
    if ctx.config.command.emulator_path.trim().is_empty() {
        let binary = SdkTool::Emulator.sdk_path(&ctx.android_home);
        if !binary.is_file() {
            return Err(ProvisionError::dependency(format!(
                "emulator binary not found: {}",
                binary.display()
            )));
        }
    }

    ctx.host.kill_existing_emulators(ctx.channel.as_ref());

    reporter.info("Restarting ADB");
    let adb = ctx.adb();
    if let Err(err) = adb.kill_server() {
        reporter.warn(&format!("Failed to kill ADB server: {err}"));
    }
    adb.start_server().context("ADB start failed")?;

    let name = &ctx.config.avd.name;
    reporter.info(&format!("Starting emulator: {name}"));
    ctx.channel
        .launch_detached(&Invocation::new(&ctx.tools.emulator).args([
            "-avd",
            name.as_str(),
            "-writable-system",
            "-no-snapshot-load",
        ]))
        .context("emulator start failed")?;
    info!(trace_id = %ctx.trace_id, avd = %name, "emulator launched");

    ctx.device(reporter).wait_until_ready()
}

/// Patches the AVD ramdisk with rootAVD when `su` is not available yet.
/// Returns whether the rooting flow ran.
pub fn setup_root(ctx: &ProvisionContext, reporter: &dyn Reporter) -> Result<bool, ProvisionError> {
    if ctx.device(reporter).has_root() {
        reporter.info("Root access confirmed");
        return Ok(false);
    }

    reporter.info("Setting up rootAVD");
    let checkout = ctx.scratch_dir().join("rootAVD");
    if checkout.is_dir() {
        reporter.info("rootAVD already cloned");
    } else {
        ctx.channel
            .run(&Invocation::new("git").args([
                "clone".to_string(),
                ctx.config.sources.root_avd_repo.clone(),
                checkout.to_string_lossy().to_string(),
            ]))
            .context("rootAVD clone failed")?;
    }

    let script = checkout.join(ctx.host.os().root_script_name());
    reporter.info("Running rootAVD script");
    ctx.channel
        .run(
            &Invocation::new(script.to_string_lossy())
                .arg(ctx.arch.ramdisk_path.to_string_lossy())
                .cwd(&checkout),
        )
        .context("rootAVD failed")?;

    reporter.info("Waiting for emulator to go offline");
    ctx.device(reporter)
        .wait_for_connectivity(false)
        .context("rootAVD wait failed")?;

    reporter.info("Restarting emulator");
    start(ctx, reporter).context("failed to start emulator")?;
    Ok(true)
}
