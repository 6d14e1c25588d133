//! One-shot query execution command

use crate::config::CliConfigLoader;
use crate::options::SessionArgs;
use anyhow::{anyhow, Result};
use narrow_core::{
    spawn_session, ChannelSink, DisplayEvent, ForerunnerCache, ResultBatch, SessionContext,
    TokioProcessRunner,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Run a single query and print the final batch
pub async fn run_command(
    query: String,
    session_args: SessionArgs,
    json: bool,
    config_loader: CliConfigLoader,
) -> Result<()> {
    let config = Arc::new(config_loader.load().await?);
    let options = session_args.to_options()?;
    info!(%query, working_dir = %options.working_dir.display(), "running query");

    let (sink, mut events) = ChannelSink::channel();
    let sink = Arc::new(sink);
    let session = spawn_session(
        1,
        options,
        SessionContext {
            config,
            runner: Arc::new(TokioProcessRunner::new()),
            cache: ForerunnerCache::new(),
            display: sink.clone(),
            preview: sink,
        },
    );
    session.on_typed(query);

    let mut last: Option<ResultBatch> = None;
    let mut failure = None;
    while let Some(event) = events.recv().await {
        match event {
            DisplayEvent::Batch(batch) => {
                debug!(total = batch.total, lines = batch.lines.len(), "batch");
                last = Some(batch);
            }
            DisplayEvent::Complete { .. } => break,
            DisplayEvent::Error { message } => {
                failure = Some(message);
                break;
            }
            DisplayEvent::Preview { .. } => {}
        }
    }
    session.close().await;

    if let Some(message) = failure {
        return Err(anyhow!(message));
    }

    let batch = last.unwrap_or_else(|| ResultBatch::unranked(0, 0, Vec::new()));
    if json {
        println!("{}", serde_json::to_string(&batch)?);
    } else {
        for line in &batch.lines {
            println!("{line}");
        }
    }
    Ok(())
}
