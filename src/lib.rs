pub mod app;

use tracing::{error, info};
use uuid::Uuid;

use app::config::ProvisionConfig;
use app::error::ProvisionError;
use app::models::CompletionSummary;
use app::present::Reporter;
use app::state::ProvisionContext;
use app::steps::{provisioning_pipeline, run_provisioning};

/// Provisions the emulator described by `config` on the real host.
pub fn run(config: ProvisionConfig, reporter: &dyn Reporter) -> Result<CompletionSummary, ProvisionError> {
    let trace_id = Uuid::new_v4().to_string();
    info!(
        trace_id = %trace_id,
        avd = %config.avd.name,
        target = %config.target.package,
        "provisioning started"
    );
    let mut ctx = ProvisionContext::system(config, trace_id.clone())?;
    let result = run_provisioning(&mut ctx, provisioning_pipeline(), reporter);
    if let Err(err) = &result {
        error!(trace_id = %trace_id, code = err.code(), error = %err, "provisioning failed");
    }
    result
}
