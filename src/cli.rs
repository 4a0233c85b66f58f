// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::speech::SpeechRequest;

/// Command-line arguments for `speakq`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "speakq",
    version,
    about = "Speak text one utterance at a time, in the order it was queued.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Speakq.toml` in the current working directory, if present.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SPEAKQ_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print what would be spoken and how, without speaking.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// Speak each TEXT argument in order.
    Say {
        #[arg(required = true, value_name = "TEXT")]
        text: Vec<String>,

        #[command(flatten)]
        voice: VoiceArgs,
    },

    /// Speak each non-empty line of FILE (or stdin) in order.
    Read {
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,

        #[command(flatten)]
        voice: VoiceArgs,
    },

    /// List the voices the configured backend offers.
    Voices,

    /// Synthesize TEXT to a WAV file through the http backend, without playing it.
    Save {
        #[arg(value_name = "TEXT")]
        text: String,

        /// Where to write the WAV file.
        #[arg(long, short, value_name = "PATH")]
        out: PathBuf,

        #[command(flatten)]
        voice: VoiceArgs,
    },

    /// Serve `quick_speak` and `list_voices` as MCP tools over stdio.
    Mcp,
}

/// Per-invocation voice overrides.
#[derive(Debug, Clone, Default, Args)]
pub struct VoiceArgs {
    /// Voice name (say) or speaker id (http).
    #[arg(long)]
    pub voice: Option<String>,

    /// Speaking rate in words per minute.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub rate: Option<u32>,

    /// Volume from 0.0 to 1.0.
    #[arg(long, value_parser = parse_volume)]
    pub volume: Option<f32>,
}

impl VoiceArgs {
    /// Build a request for `text` carrying these overrides.
    pub fn request(&self, text: impl Into<String>) -> SpeechRequest {
        SpeechRequest {
            text: text.into(),
            voice: self.voice.clone(),
            rate: self.rate,
            volume: self.volume,
            language: None,
        }
    }
}

fn parse_volume(s: &str) -> Result<f32, String> {
    let volume: f32 = s
        .parse()
        .map_err(|_| format!("invalid volume '{s}' (expected a number)"))?;
    if (0.0..=1.0).contains(&volume) {
        Ok(volume)
    } else {
        Err(format!("volume must be between 0.0 and 1.0 (got {volume})"))
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn say_collects_texts_and_overrides() {
        let args = CliArgs::try_parse_from([
            "speakq", "say", "one", "two", "--voice", "Samantha", "--volume", "0.5",
        ])
        .unwrap();

        match args.command {
            CliCommand::Say { text, voice } => {
                assert_eq!(text, vec!["one", "two"]);
                let req = voice.request("one");
                assert_eq!(req.voice.as_deref(), Some("Samantha"));
                assert_eq!(req.volume, Some(0.5));
                assert_eq!(req.rate, None);
            }
            other => panic!("expected Say, got {other:?}"),
        }
    }

    #[test]
    fn volume_outside_range_is_rejected() {
        assert!(CliArgs::try_parse_from(["speakq", "say", "x", "--volume", "2"]).is_err());
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let args = CliArgs::try_parse_from(["speakq", "voices", "--dry-run"]).unwrap();
        assert!(args.dry_run);
        assert!(matches!(args.command, CliCommand::Voices));
    }

    #[test]
    fn mcp_subcommand_parses() {
        let args = CliArgs::try_parse_from(["speakq", "--config", "x.toml", "mcp"]).unwrap();
        assert!(matches!(args.command, CliCommand::Mcp));
        assert_eq!(args.config.as_deref(), Some("x.toml"));
    }

    #[test]
    fn save_requires_an_output_path() {
        assert!(CliArgs::try_parse_from(["speakq", "save", "hi"]).is_err());

        let args = CliArgs::try_parse_from(["speakq", "save", "hi", "-o", "hi.wav"]).unwrap();
        match args.command {
            CliCommand::Save { text, out, .. } => {
                assert_eq!(text, "hi");
                assert_eq!(out, PathBuf::from("hi.wav"));
            }
            other => panic!("expected Save, got {other:?}"),
        }
    }
}
