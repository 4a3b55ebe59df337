use std::collections::BTreeMap;

use tracing::info;

use crate::app::adb::parse::{parse_lspd_modules, scope_contains};
use crate::app::adb::paths::LSPD_CLI;
use crate::app::error::{ProvisionError, ResultExt};
use crate::app::models::LspdModule;
use crate::app::present::Reporter;
use crate::app::state::ProvisionContext;

fn cli(ctx: &ProvisionContext, args: &str) -> Result<String, ProvisionError> {
    ctx.adb().su(&format!("{LSPD_CLI} {args}"))
}

pub fn list_modules(ctx: &ProvisionContext) -> Result<BTreeMap<String, LspdModule>, ProvisionError> {
    let output = cli(ctx, "modules ls").context("failed to list LSPosed modules")?;
    Ok(parse_lspd_modules(&output))
}

/// Installs, scopes and enables the bypass module, touching only what is
/// not already in place. Reboots when anything changed.
pub fn configure_bypass(ctx: &ProvisionContext, reporter: &dyn Reporter) -> Result<bool, ProvisionError> {
    let target = &ctx.config.target;
    let module = target.bypass_module.as_str();
    let mut changed = false;

    let enabled = match list_modules(ctx)?.get(module) {
        Some(entry) => {
            reporter.info("Bypass module already installed");
            entry.enabled
        }
        None => {
            let apk = ctx.scratch_dir().join("bypass.apk");
            ctx.fetcher
                .download(&ctx.config.sources.bypass_apk_url, &apk)
                .context("bypass module download failed")?;
            reporter.info("Installing bypass module");
            ctx.adb()
                .install(&apk)
                .context("bypass module installation failed")?;
            changed = true;
            false
        }
    };

    let scopes = cli(ctx, &format!("scope ls {module}")).context("failed to list scopes")?;
    if scope_contains(&scopes, &target.package) {
        reporter.info(&format!("{} already in scopes", target.display_name));
    } else {
        reporter.info(&format!("Adding {} to bypass scopes", target.display_name));
        cli(ctx, &format!("scope set -a {module} {}/0", target.package))
            .context("failed to set scopes")?;
        changed = true;
    }

    if enabled {
        reporter.info("Bypass module already enabled");
    } else {
        reporter.info("Enabling bypass module");
        cli(ctx, &format!("modules set -e {module}")).context("failed to enable module")?;
        changed = true;
    }

    if changed {
        reporter.info("Rebooting emulator");
        ctx.device(reporter).reboot()?;
    }
    info!(trace_id = %ctx.trace_id, module, changed, "bypass module configured");
    Ok(changed)
}
