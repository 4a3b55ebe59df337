use tracing::{info, warn};

use crate::app::emulator;
use crate::app::error::{ProvisionError, ResultExt};
use crate::app::lsposed;
use crate::app::magisk;
use crate::app::models::CompletionSummary;
use crate::app::pipeline::Pipeline;
use crate::app::present::Reporter;
use crate::app::sdk;
use crate::app::state::ProvisionContext;
use crate::app::toolchain;

pub const STEP_NAMES: [&str; 11] = [
    "Initialize",
    "System Tools",
    "Python",
    "Java",
    "Android SDK",
    "Emulator",
    "Root",
    "Zygisk",
    "LSPosed",
    "Bypass Module",
    "Target App",
];

fn initialize(ctx: &mut ProvisionContext, reporter: &dyn Reporter) -> Result<(), ProvisionError> {
    reporter.info(&format!("OS: {}", ctx.host.os()));
    reporter.info(&format!("Architecture: {} ({})", ctx.arch.name, ctx.arch.abi));
    if let Some(cpu) = &ctx.arch.unrecognized {
        reporter.warn(&format!("Unknown architecture {cpu}, defaulting to x86_64"));
    }
    reporter.info(&format!("Temp directory: {}", ctx.scratch_dir().display()));
    reporter.info(&format!("Hook architecture: {}", ctx.arch.hook_arch_tag));
    Ok(())
}

fn start_emulator(ctx: &mut ProvisionContext, reporter: &dyn Reporter) -> Result<(), ProvisionError> {
    emulator::ensure_avd(ctx, reporter)?;
    emulator::start(ctx, reporter).context("failed to start emulator")
}

fn root(ctx: &mut ProvisionContext, reporter: &dyn Reporter) -> Result<(), ProvisionError> {
    emulator::setup_root(ctx, reporter).map(|_| ())
}

fn zygisk(ctx: &mut ProvisionContext, reporter: &dyn Reporter) -> Result<(), ProvisionError> {
    magisk::enable_zygisk(ctx, reporter)?;
    magisk::configure_auto_allow(ctx, reporter);
    Ok(())
}

fn install_lsposed(ctx: &mut ProvisionContext, reporter: &dyn Reporter) -> Result<(), ProvisionError> {
    magisk::install_lsposed(ctx, reporter).map(|_| ())
}

fn bypass_module(ctx: &mut ProvisionContext, reporter: &dyn Reporter) -> Result<(), ProvisionError> {
    lsposed::configure_bypass(ctx, reporter).map(|_| ())
}

fn target_app(ctx: &mut ProvisionContext, reporter: &dyn Reporter) -> Result<(), ProvisionError> {
    let target = &ctx.config.target;
    let device = ctx.device(reporter);
    if device.is_package_installed(&target.package).unwrap_or(false) {
        reporter.info(&format!("{} detected", target.display_name));
        return Ok(());
    }
    reporter.info(&format!(
        "{} is not installed: please install it manually from the Google Play Store (you might need to log in)",
        target.display_name
    ));
    device
        .wait_for_package(&target.package)
        .context(format!("{} was not installed", target.display_name))?;
    reporter.info(&format!("{} installation detected", target.display_name));
    Ok(())
}

pub fn provisioning_pipeline() -> Pipeline<ProvisionContext> {
    Pipeline::new()
        .step(STEP_NAMES[0], initialize)
        .step(STEP_NAMES[1], |ctx: &mut ProvisionContext, reporter: &dyn Reporter| {
            toolchain::ensure_system_tools(ctx, reporter)
        })
        .step(STEP_NAMES[2], toolchain::ensure_python)
        .step(STEP_NAMES[3], toolchain::ensure_java)
        .step(STEP_NAMES[4], sdk::ensure_android_sdk)
        .step(STEP_NAMES[5], start_emulator)
        .step(STEP_NAMES[6], root)
        .step(STEP_NAMES[7], zygisk)
        .step(STEP_NAMES[8], install_lsposed)
        .step(STEP_NAMES[9], bypass_module)
        .step(STEP_NAMES[10], target_app)
}

pub fn summarize(ctx: &ProvisionContext) -> CompletionSummary {
    let avd = &ctx.config.avd;
    CompletionSummary {
        avd_name: avd.name.clone(),
        android_version: avd.android_version.clone(),
        api_level: avd.api_level.clone(),
        device_label: avd.device_label.clone(),
        architecture: ctx.arch.name.to_string(),
        elapsed: ctx.started.elapsed(),
    }
}

/// Runs `pipeline` to completion. The scratch directory is removed after a
/// clean run and kept for inspection after a failure.
pub fn run_provisioning(
    ctx: &mut ProvisionContext,
    pipeline: Pipeline<ProvisionContext>,
    reporter: &dyn Reporter,
) -> Result<CompletionSummary, ProvisionError> {
    let trace_id = ctx.trace_id.clone();
    match pipeline.run(ctx, reporter, &trace_id) {
        Ok(records) => {
            let summary = summarize(ctx);
            info!(
                trace_id = %trace_id,
                steps = records.len(),
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "provisioning complete"
            );
            reporter.completed(&summary);
            if let Err(err) = ctx.cleanup_scratch() {
                reporter.warn(&err.to_string());
            }
            Ok(summary)
        }
        Err(err) => {
            let kept = ctx.keep_scratch();
            warn!(trace_id = %trace_id, path = %kept.display(), "scratch directory kept");
            Err(err)
        }
    }
}
