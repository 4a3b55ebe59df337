use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use serde::Serialize;
use uuid::Uuid;

use rooted_avd_lib::app::adb::apps::listing_contains_package;
use rooted_avd_lib::app::adb::parse::{has_root_identity, parse_adb_devices, parse_boot_completed};
use rooted_avd_lib::app::config::{config_path, load_config_from_path};
use rooted_avd_lib::app::error::ProvisionError;
use rooted_avd_lib::app::logging::init_logging;
use rooted_avd_lib::app::state::ProvisionContext;
use rooted_avd_lib::app::{lsposed, magisk};

/// Read-only checks against the running emulator.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the summary as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ProbeSummary {
    tool: &'static str,
    status: &'static str,
    trace_id: String,
    generated_at: String,
    avd: String,
    adb_program: String,
    checks: Vec<ProbeCheck>,
}

#[derive(Serialize)]
struct ProbeCheck {
    name: &'static str,
    status: &'static str, // pass|fail|warn|skip
    duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

enum Outcome {
    Pass(Option<String>),
    Warn(String),
}

/// Records one check; returns whether later checks that depend on it may run.
fn run_check<F>(checks: &mut Vec<ProbeCheck>, name: &'static str, f: F) -> bool
where
    F: FnOnce() -> Result<Outcome, ProvisionError>,
{
    let start = Instant::now();
    let (status, detail, error_code, error) = match f() {
        Ok(Outcome::Pass(detail)) => ("pass", detail, None, None),
        Ok(Outcome::Warn(detail)) => ("warn", Some(detail), None, None),
        Err(err) => ("fail", None, Some(err.code()), Some(err.to_string())),
    };
    checks.push(ProbeCheck {
        name,
        status,
        duration_ms: start.elapsed().as_millis(),
        detail,
        error_code,
        error,
    });
    status != "fail"
}

fn skip(checks: &mut Vec<ProbeCheck>, name: &'static str, reason: &str) {
    checks.push(ProbeCheck {
        name,
        status: "skip",
        duration_ms: 0,
        detail: Some(reason.to_string()),
        error_code: None,
        error: None,
    });
}

fn probe(ctx: &ProvisionContext) -> Vec<ProbeCheck> {
    let mut checks = Vec::new();
    let adb = ctx.adb();

    let adb_ok = run_check(&mut checks, "adb", || {
        adb.execute(["version"]).and_then(|result| {
            if result.succeeded {
                let first = result.combined_output.lines().next().unwrap_or_default();
                Ok(Outcome::Pass(Some(first.trim().to_string())))
            } else {
                Err(ProvisionError::dependency(result.combined_output))
            }
        })
    });
    if !adb_ok {
        for name in ["emulator", "boot", "root", "zygisk", "lsposed", "bypass_module", "target_app"] {
            skip(&mut checks, name, "adb unavailable");
        }
        return checks;
    }

    let connected = run_check(&mut checks, "emulator", || {
        let devices = parse_adb_devices(&adb.devices()?);
        match devices.iter().find(|device| device.serial.contains("emulator")) {
            Some(device) if device.state == "device" => {
                let model = device.model.as_deref().unwrap_or("unknown model");
                Ok(Outcome::Pass(Some(format!("{} ({model})", device.serial))))
            }
            Some(device) => Ok(Outcome::Warn(format!("{} is {}", device.serial, device.state))),
            None => Err(ProvisionError::not_found("emulator")),
        }
    });
    if !connected {
        for name in ["boot", "root", "zygisk", "lsposed", "bypass_module", "target_app"] {
            skip(&mut checks, name, "no emulator connected");
        }
        return checks;
    }

    run_check(&mut checks, "boot", || {
        if parse_boot_completed(&adb.getprop("sys.boot_completed")?) {
            Ok(Outcome::Pass(None))
        } else {
            Ok(Outcome::Warn("sys.boot_completed not set".to_string()))
        }
    });

    let rooted = run_check(&mut checks, "root", || {
        let identity = adb.su("id")?;
        if has_root_identity(&identity) {
            Ok(Outcome::Pass(Some(identity.trim().to_string())))
        } else {
            Err(ProvisionError::dependency("su is not uid 0"))
        }
    });

    if rooted {
        run_check(&mut checks, "zygisk", || {
            if magisk::is_zygisk_enabled(ctx) {
                Ok(Outcome::Pass(None))
            } else {
                Ok(Outcome::Warn("zygisk disabled".to_string()))
            }
        });
        let lspd = run_check(&mut checks, "lsposed", || {
            if magisk::lsposed_installed(ctx)? {
                Ok(Outcome::Pass(None))
            } else {
                Err(ProvisionError::not_found("LSPosed module"))
            }
        });
        if lspd {
            run_check(&mut checks, "bypass_module", || {
                let module = &ctx.config.target.bypass_module;
                match lsposed::list_modules(ctx)?.get(module) {
                    Some(entry) if entry.enabled => Ok(Outcome::Pass(None)),
                    Some(_) => Ok(Outcome::Warn(format!("{module} installed but disabled"))),
                    None => Err(ProvisionError::not_found(module.clone())),
                }
            });
        } else {
            skip(&mut checks, "bypass_module", "LSPosed missing");
        }
    } else {
        for name in ["zygisk", "lsposed", "bypass_module"] {
            skip(&mut checks, name, "no root");
        }
    }

    run_check(&mut checks, "target_app", || {
        let target = &ctx.config.target;
        if listing_contains_package(&adb.list_packages()?, &target.package) {
            Ok(Outcome::Pass(None))
        } else {
            Ok(Outcome::Warn(format!("{} not installed", target.display_name)))
        }
    });

    checks
}

fn main() -> ExitCode {
    let args = Args::parse();
    let trace_id = Uuid::new_v4().to_string();

    let path = args.config.unwrap_or_else(config_path);
    let config = match load_config_from_path(&path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };
    init_logging(&config.logging.log_level);

    let ctx = match ProvisionContext::system(config, trace_id.clone()) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(1);
        }
    };
    let checks = probe(&ctx);
    let status = if checks.iter().any(|check| check.status == "fail") {
        "fail"
    } else if checks.iter().any(|check| check.status == "warn") {
        "warn"
    } else {
        "pass"
    };
    let summary = ProbeSummary {
        tool: "rooted_avd_probe",
        status,
        trace_id,
        generated_at: chrono::Utc::now().to_rfc3339(),
        avd: ctx.config.avd.name.clone(),
        adb_program: ctx.tools.adb.clone(),
        checks,
    };

    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                eprintln!("Failed to serialize summary: {err}");
                return ExitCode::from(1);
            }
        }
    } else {
        println!("probe {} ({})", summary.status, summary.avd);
        for check in &summary.checks {
            let note = check
                .error
                .as_deref()
                .or(check.detail.as_deref())
                .unwrap_or_default();
            println!("  {:<14} {:<4} {note}", check.name, check.status);
        }
    }

    if status == "fail" {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
