mod cmd;
mod util;

use anyhow::Result;
use argp::FromArgs;
use mcd_jobs_databricks::Databricks;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};
use typed_path::Utf8NativePathBuf;

use crate::util::{load_config, native_path};

#[derive(FromArgs, PartialEq, Debug)]
/// Configure Monte Carlo failure notifications on Databricks jobs.
struct TopLevel {
    #[argp(subcommand)]
    command: SubCommand,
    #[argp(option, short = 'c', from_str_fn(native_path))]
    /// config file (default: config.yml, if present)
    config: Option<Utf8NativePathBuf>,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argp(subcommand)]
enum SubCommand {
    AddWebhookNotifications(cmd::add_webhook::Args),
    EnableJobIncidents(cmd::enable_incidents::Args),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let env_filter = EnvFilter::builder()
        // Default to info level
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(env_filter).with_writer(std::io::stderr).init();

    let args: TopLevel = argp::parse_args_or_exit(argp::DEFAULT);
    if let Err(e) = run(args).await {
        tracing::error!("{:?}", e);
        std::process::exit(1);
    }
}

async fn run(args: TopLevel) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    let client = Databricks::new(&config.databricks)?;
    match args.command {
        SubCommand::AddWebhookNotifications(c) => cmd::add_webhook::run(&client, c).await,
        SubCommand::EnableJobIncidents(c) => cmd::enable_incidents::run(&client, c).await,
    }
}
