use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use rooted_avd_lib::app::config::{
    backup_config_path, config_path, load_config_from_path, save_config_to_path, ProvisionConfig,
};
use rooted_avd_lib::app::error::ProvisionError;
use rooted_avd_lib::app::logging::init_logging;
use rooted_avd_lib::app::present::console::ConsoleReporter;
use rooted_avd_lib::app::present::failure_lines;
use rooted_avd_lib::app::present::progress::ProgressReporter;
use rooted_avd_lib::app::present::Reporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum UiMode {
    Auto,
    Plain,
    Progress,
}

/// Provision a rooted Android emulator with LSPosed and the bypass module.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file (defaults to $ROOTED_AVD_CONFIG_PATH or ~/.rooted_avd_config.json).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = UiMode::Auto)]
    ui: UiMode,

    /// Write the default config and exit.
    #[arg(long, conflicts_with = "print_config")]
    init_config: bool,

    /// Print the effective config as JSON and exit.
    #[arg(long)]
    print_config: bool,

    /// Wait for Enter before exiting.
    #[arg(long)]
    pause_on_exit: bool,
}

fn pause() {
    print!("\nPress Enter to exit...");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
}

fn usage_error(err: &ProvisionError) -> ExitCode {
    eprintln!("{err}");
    ExitCode::from(2)
}

fn provision(cli: &Cli) -> ExitCode {
    let path = cli.config.clone().unwrap_or_else(config_path);

    if cli.init_config {
        let defaults = ProvisionConfig::default();
        return match save_config_to_path(&defaults, &path, &backup_config_path(&path)) {
            Ok(()) => {
                println!("Wrote default config to {}", path.display());
                ExitCode::SUCCESS
            }
            Err(err) => usage_error(&err),
        };
    }

    let config = match load_config_from_path(&path) {
        Ok(config) => config,
        Err(err) => return usage_error(&err),
    };
    if cli.print_config {
        return match serde_json::to_string_pretty(&config) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(err) => usage_error(&ProvisionError::config(format!(
                "Failed to serialize config: {err}"
            ))),
        };
    }

    init_logging(&config.logging.log_level);

    let progress = match cli.ui {
        UiMode::Progress => true,
        UiMode::Plain => false,
        UiMode::Auto => io::stdout().is_terminal(),
    };
    let reporter: Box<dyn Reporter> = if progress {
        Box::new(ProgressReporter::stdout())
    } else {
        Box::new(ConsoleReporter::stdout())
    };

    match rooted_avd_lib::run(config, reporter.as_ref()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            // Step failures were already rendered by the reporter.
            if err.step_name().is_none() {
                for line in failure_lines(&err) {
                    eprintln!("{line}");
                }
            }
            ExitCode::from(1)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let code = provision(&cli);
    if cli.pause_on_exit {
        pause();
    }
    code
}
