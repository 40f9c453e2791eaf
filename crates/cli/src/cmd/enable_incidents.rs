use anyhow::Result;
use argp::FromArgs;
use mcd_jobs_core::{ConfigureRequest, Workspace};

use crate::util::job_name_filter;

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Enable Monte Carlo incidents for jobs: add the failure webhook and give the
/// Monte Carlo service principal Can View.
#[argp(subcommand, name = "enable-job-incidents")]
pub struct Args {
    #[argp(option, short = 'n')]
    /// ID of the existing notification destination pointing to the Monte Carlo webhook endpoint
    mcd_notification_id: String,
    #[argp(option, short = 'p')]
    /// application ID of the existing Monte Carlo service principal
    mcd_service_principal_name: String,
    #[argp(option, short = 'j')]
    /// job to enable incidents for; repeatable (default: all jobs)
    databricks_job_name: Vec<String>,
}

pub async fn run<W: Workspace>(workspace: &W, args: Args) -> Result<()> {
    let request = ConfigureRequest {
        notification_id: args.mcd_notification_id,
        service_principal: Some(args.mcd_service_principal_name),
        job_names: job_name_filter(args.databricks_job_name),
    };
    super::execute(workspace, request).await
}

