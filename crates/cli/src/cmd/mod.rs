pub mod add_webhook;
pub mod enable_incidents;

use anyhow::Result;
use mcd_jobs_core::{ConfigureRequest, Workspace, configure_jobs, report::RunReport};

/// Run the configurator, printing each outcome as soon as it's recorded.
async fn execute<W: Workspace>(workspace: &W, request: ConfigureRequest) -> Result<()> {
    let mut report = RunReport::echoing();
    configure_jobs(workspace, &request, &mut report).await
}
