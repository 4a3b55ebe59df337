use tracing::{info, warn};

use crate::app::adb::parse::parse_zygisk_enabled;
use crate::app::adb::paths::{MAGISK_MODULES_DIR, MODULE_ARCHIVE_PATH};
use crate::app::error::{ProvisionError, ResultExt};
use crate::app::present::Reporter;
use crate::app::state::ProvisionContext;

const MAGISK_PACKAGE: &str = "com.topjohnwu.magisk";
const SETUP_DIALOG_TEXT: &str = "Additional Setup";

// Wrapped in double quotes so `su -c` receives the whole sqlite call as one argument.
const ZYGISK_QUERY: &str =
    "\"magisk --sqlite 'select value from settings where (key=\\\"zygisk\\\");'\"";
const ZYGISK_ENABLE: &str =
    "\"magisk --sqlite 'replace into settings (key,value) values(\\\"zygisk\\\",1);'\"";
const AUTO_ALLOW: &str = "magisk resetprop persist.sys.su.mode 2";

/// Query failures read as "not enabled".
pub fn is_zygisk_enabled(ctx: &ProvisionContext) -> bool {
    match ctx.adb().su(ZYGISK_QUERY) {
        Ok(output) => parse_zygisk_enabled(&output),
        Err(err) => {
            warn!(trace_id = %ctx.trace_id, error = %err, "zygisk query failed");
            false
        }
    }
}

pub fn enable_zygisk(ctx: &ProvisionContext, reporter: &dyn Reporter) -> Result<bool, ProvisionError> {
    reporter.info("Checking Zygisk status");
    if is_zygisk_enabled(ctx) {
        reporter.info("Zygisk is already enabled");
        return Ok(false);
    }
    reporter.info("Enabling Zygisk");
    ctx.adb()
        .su(ZYGISK_ENABLE)
        .context("Failed to enable Zygisk")?;
    reporter.info("Zygisk enabled successfully");
    Ok(true)
}

/// Grants root requests without a prompt. Best-effort.
pub fn configure_auto_allow(ctx: &ProvisionContext, reporter: &dyn Reporter) {
    reporter.info("Configuring Magisk auto-allow");
    if let Err(err) = ctx.adb().su(AUTO_ALLOW) {
        reporter.warn(&format!("Failed to set Magisk auto-allow: {err}"));
    }
}

pub fn lsposed_installed(ctx: &ProvisionContext) -> Result<bool, ProvisionError> {
    let listing = ctx
        .adb()
        .su(&format!("ls -1 {MAGISK_MODULES_DIR}"))
        .context("failed to list modules")?;
    Ok(listing.contains("lsposed"))
}

fn install_module_command() -> String {
    format!("su -c 'magisk --install-module {MODULE_ARCHIVE_PATH}'")
}

/// Installs the LSPosed Magisk module and reboots into it. A failed install
/// gets one retry after the Magisk app finished its own setup.
pub fn install_lsposed(ctx: &ProvisionContext, reporter: &dyn Reporter) -> Result<bool, ProvisionError> {
    if lsposed_installed(ctx)? {
        reporter.info("LSPosed already installed");
        return Ok(false);
    }

    let archive = ctx.scratch_dir().join("LSPosed.zip");
    ctx.fetcher
        .download(&ctx.config.sources.lsposed_url, &archive)
        .context("LSPosed download failed")?;

    let adb = ctx.adb();
    reporter.info("Installing LSPosed module");
    adb.push(&archive, MODULE_ARCHIVE_PATH)
        .context("LSPosed push failed")?;

    let install = install_module_command();
    if let Err(err) = adb.shell(&install) {
        warn!(trace_id = %ctx.trace_id, error = %err, "module install failed, fixing Magisk environment");
        fix_environment(ctx, reporter).context("Magisk environment fix failed")?;
        reporter.info("Retrying LSPosed installation");
        adb.shell(&install).context("LSPosed installation failed")?;
    }

    if let Err(err) = adb.remove_file(MODULE_ARCHIVE_PATH) {
        reporter.warn(&format!("Failed to cleanup LSPosed zip: {err}"));
    }

    reporter.info("Rebooting emulator");
    ctx.device(reporter).reboot()?;
    info!(trace_id = %ctx.trace_id, "lsposed installed");
    Ok(true)
}

/// Lets the Magisk app finish its first-run setup: it asks for an
/// "Additional Setup" confirmation and reboots once it is accepted.
pub fn fix_environment(ctx: &ProvisionContext, reporter: &dyn Reporter) -> Result<(), ProvisionError> {
    reporter.info("Finalizing Magisk environment");
    let adb = ctx.adb();
    adb.shell_args(&[
        "pm",
        "grant",
        MAGISK_PACKAGE,
        "android.permission.POST_NOTIFICATIONS",
    ])
    .context("Magisk permission grant failed")?;

    reporter.info("Opening Magisk app");
    adb.shell_args(&[
        "monkey",
        "-p",
        MAGISK_PACKAGE,
        "-c",
        "android.intent.category.LAUNCHER",
        "1",
    ])
    .context("Magisk app launch failed")?;

    let waits = &ctx.config.wait;
    let ui = ctx.ui();
    if ui.wait_for_label(SETUP_DIALOG_TEXT, waits.screen_text_attempts, waits.screen_text_delay()) {
        reporter.info("Setup dialog detected");
    }
    ui.find_and_tap("OK").context("failed to click OK")?;

    let device = ctx.device(reporter);
    device
        .wait_for_shutdown()
        .context("failed to wait for device to go offline")?;
    device
        .wait_until_ready()
        .context("failed to wait for device to go online")?;
    Ok(())
}
