//! Print the worker invocation a query would dispatch

use crate::config::CliConfigLoader;
use crate::options::SessionArgs;
use anyhow::Result;
use narrow_core::job::worker_command;

pub async fn args_command(
    query: String,
    session_args: SessionArgs,
    config_loader: CliConfigLoader,
) -> Result<()> {
    let config = config_loader.load().await?;
    let options = session_args.to_options()?;
    let argv = worker_command(&query, &options, &config)?;

    println!("{}", serde_json::to_string(&argv)?);
    Ok(())
}
