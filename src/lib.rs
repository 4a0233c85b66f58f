// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod mcp;
pub mod speech;
pub mod types;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info, warn};

use crate::cli::{CliArgs, CliCommand};
use crate::config::{default_config_path, load_or_default};
use crate::speech::{HttpBackend, SpeechBackend, SpeechQueue, SpeechRequest, VoiceDefaults};

pub use crate::exec::{Executor, ExecutorSettings, TaskError, TaskHandle, WorkContext};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the speech queue (executor + backend)
/// - Ctrl-C handling, which shuts the executor down and kills the current
///   utterance
pub async fn run(args: CliArgs) -> Result<()> {
    let (config_path, explicit) = match &args.config {
        Some(path) => (PathBuf::from(path), true),
        None => (default_config_path(), false),
    };
    let cfg = load_or_default(&config_path, explicit)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let queue = SpeechQueue::from_config(&cfg)?;
    info!(backend = queue.backend_name(), "speech queue ready");

    match args.command {
        CliCommand::Voices => {
            if args.dry_run {
                println!("speakq dry-run: would list voices via {}", queue.backend_name());
                return Ok(());
            }
            for voice in queue.list_voices().await? {
                println!("{voice}");
            }
            Ok(())
        }
        CliCommand::Mcp => {
            if args.dry_run {
                println!(
                    "speakq dry-run: would serve MCP tools quick_speak, list_voices as '{}' via {}",
                    cfg.mcp.name,
                    queue.backend_name()
                );
                return Ok(());
            }
            mcp::serve_stdio(&queue, &cfg.mcp).await
        }
        CliCommand::Save { text, out, voice } => {
            let backend = HttpBackend::from_config(&cfg.speech.http)?;
            let request = VoiceDefaults::from_config(&cfg.speech).apply(voice.request(text));
            if args.dry_run {
                println!("speakq dry-run: would save {} <- {}", out.display(), backend.describe(&request));
                return Ok(());
            }
            backend.save(&request, &out).await?;
            println!("{}", out.display());
            Ok(())
        }
        CliCommand::Say { text, voice } => {
            let requests = text.into_iter().map(|t| voice.request(t)).collect();
            speak_all(&queue, requests, args.dry_run).await
        }
        CliCommand::Read { path, voice } => {
            let lines = read_lines(path.as_deref()).await?;
            let requests = lines.into_iter().map(|t| voice.request(t)).collect();
            speak_all(&queue, requests, args.dry_run).await
        }
    }
}

/// Queue every request, then wait until they have all been spoken (or until
/// Ctrl-C, which stops speech immediately).
async fn speak_all(queue: &SpeechQueue, requests: Vec<SpeechRequest>, dry_run: bool) -> Result<()> {
    if dry_run {
        print_dry_run(queue, requests);
        return Ok(());
    }

    let mut handles = Vec::with_capacity(requests.len());
    for request in requests {
        handles.push(queue.say(request)?);
    }
    info!(count = handles.len(), "queued utterances");

    let interrupted = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupted; stopping speech"),
            Err(e) => {
                warn!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = queue.wait_idle() => debug!("all utterances processed"),
        _ = interrupted => {}
    }

    queue.shutdown().await;

    let mut failures = 0usize;
    for handle in &handles {
        match handle.outcome() {
            Some(Ok(outcome)) => debug!(
                task_id = handle.id(),
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "utterance done"
            ),
            Some(Err(err)) => {
                failures += 1;
                error!(task_id = handle.id(), error = %err, "utterance failed");
            }
            None => debug!(task_id = handle.id(), "utterance never ran"),
        }
    }

    if failures > 0 {
        bail!("{failures} of {} utterance(s) failed", handles.len());
    }
    Ok(())
}

async fn read_lines(path: Option<&Path>) -> Result<Vec<String>> {
    let contents = match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("reading stdin")?;
            buf
        }
    };

    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Simple dry-run output: one line per utterance showing the command.
fn print_dry_run(queue: &SpeechQueue, requests: Vec<SpeechRequest>) {
    println!("speakq dry-run");
    println!("  backend = {}", queue.backend_name());
    println!();

    println!("utterances ({}):", requests.len());
    for (i, request) in requests.into_iter().enumerate() {
        println!("  {i}: {}", queue.describe(request));
    }

    debug!("dry-run complete (nothing spoken)");
}
