//! CLI entry point for coursezip.

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use coursezip_core::portal::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use coursezip_core::{
    ChannelSink, DEFAULT_MAX_IN_FLIGHT, HostCommand, LogSink, PortalClient, ProgressSink,
    SyncEngine, SyncOptions, SyncRequest, load_session_cookie_jar,
};
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod progress_ui;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.default_log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = app_config::load_file_config(args.config.as_deref())?;
    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| config.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let cookies = args.cookies.clone().or_else(|| config.cookies.clone());
    let concurrency = args
        .concurrency
        .or(config.concurrency)
        .map_or(DEFAULT_MAX_IN_FLIGHT, usize::from);

    let jar = load_session_cookie_jar(cookies.as_deref()).context("Failed to load session cookies")?;
    let client = PortalClient::with_timeouts(
        jar,
        config.connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS),
        config.read_timeout_secs.unwrap_or(READ_TIMEOUT_SECS),
    )
    .context("Failed to build HTTP client")?;

    let draw_progress = !args.no_progress && !args.quiet && io::stderr().is_terminal();
    let (sink, progress_ui): (Arc<dyn ProgressSink>, _) = if draw_progress {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (
            Arc::new(ChannelSink::new(tx)),
            Some(progress_ui::spawn_progress_ui(rx)),
        )
    } else {
        (Arc::new(LogSink), None)
    };

    let engine = SyncEngine::new(Arc::new(client), config.endpoints(), sink).with_options(
        SyncOptions {
            max_in_flight: Some(concurrency),
        },
    );

    info!(code = %args.root_code, name = %args.root_name, concurrency, "coursezip starting");
    let reply = {
        let run = engine.handle(SyncRequest::new(&args.root_code, &args.root_name));
        tokio::pin!(run);
        tokio::select! {
            reply = &mut run => reply,
            signal = tokio::signal::ctrl_c() => {
                if signal.is_ok() {
                    warn!("interrupt received; cancelling sync run");
                    engine.cancel_active();
                }
                run.await
            }
        }
    };

    let handoff = engine.handle_command(HostCommand::GetZipBlob);
    // Dropping the engine closes the progress channel.
    drop(engine);
    if let Some(ui) = progress_ui {
        progress_ui::finish_progress_ui(ui).await;
    }

    if !reply.ok {
        bail!("{}", reply.message);
    }
    let handoff = handoff.ok_or_else(|| anyhow!("sync finished without an archive"))?;

    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("Cannot create output directory '{}'", output_dir.display()))?;
    let path = output_dir.join(handoff.file_name());
    tokio::fs::write(&path, &handoff.blob)
        .await
        .with_context(|| format!("Cannot write archive '{}'", path.display()))?;

    info!(path = %path.display(), bytes = handoff.blob.len(), "{}", reply.message);
    println!("{}", path.display());
    Ok(())
}
