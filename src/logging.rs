// src/logging.rs

//! Log output for `speakq`.
//!
//! Everything goes to stderr. Stdout carries `voices` listings, dry-run
//! plans and, under `speakq mcp`, the MCP protocol stream itself, so a stray
//! log line there would corrupt it.
//!
//! `--log-level` wins over `SPEAKQ_LOG`; with neither set the level is `info`.

use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

/// Env variable read when `--log-level` is not given.
pub const LOG_ENV: &str = "SPEAKQ_LOG";

/// Install the global subscriber. Errors if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env_level = std::env::var(LOG_ENV).ok();
    let level = resolve_level(cli_level, env_level.as_deref());

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to initialise logging: {e}"))?;

    Ok(())
}

fn resolve_level(cli_level: Option<LogLevel>, env_level: Option<&str>) -> Level {
    cli_level
        .map(level_from_log_level)
        .or_else(|| env_level.and_then(parse_level_str))
        .unwrap_or(Level::INFO)
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_beats_env_and_unknown_env_falls_back() {
        assert_eq!(resolve_level(Some(LogLevel::Debug), Some("error")), Level::DEBUG);
        assert_eq!(resolve_level(None, Some("warn")), Level::WARN);
        assert_eq!(resolve_level(None, Some("shouty")), Level::INFO);
        assert_eq!(resolve_level(None, None), Level::INFO);
    }

    #[test]
    fn level_strings_are_lenient() {
        assert_eq!(parse_level_str(" Warning "), Some(Level::WARN));
        assert_eq!(parse_level_str("TRACE"), Some(Level::TRACE));
        assert_eq!(parse_level_str("loud"), None);
    }
}
