use anyhow::Result;
use argp::FromArgs;
use mcd_jobs_core::{ConfigureRequest, Workspace};

use crate::util::job_name_filter;

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Add the Monte Carlo webhook to notify on job failures.
#[argp(subcommand, name = "add-webhook-notifications")]
pub struct Args {
    #[argp(option, short = 'n')]
    /// ID of the existing notification destination pointing to the Monte Carlo webhook endpoint
    mcd_notification_id: String,
    #[argp(option, short = 'j')]
    /// job to add the webhook to; repeatable (default: all jobs)
    databricks_job_name: Vec<String>,
}

pub async fn run<W: Workspace>(workspace: &W, args: Args) -> Result<()> {
    let request = ConfigureRequest {
        notification_id: args.mcd_notification_id,
        service_principal: None,
        job_names: job_name_filter(args.databricks_job_name),
    };
    super::execute(workspace, request).await
}
