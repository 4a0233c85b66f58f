// src/speech/say.rs

//! macOS `say` command backend.

use std::collections::BTreeSet;

use anyhow::{bail, Context};
use tokio::process::Command;
use tracing::debug;

use crate::config::SaySection;
use crate::errors::{Result, SpeakqError};
use crate::exec::WorkContext;

use super::{BoxFuture, SpeechBackend, SpeechRequest};

#[derive(Debug, Clone)]
pub struct SayBackend {
    program: String,
}

impl SayBackend {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_config(section: &SaySection) -> Self {
        Self::new(section.program.clone())
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for SayBackend {
    fn default() -> Self {
        Self::new("say")
    }
}

/// Build the argument list for one request.
///
/// `say` has no volume flag; volume goes through its inline `[[volm x]]`
/// command in front of the text.
pub fn say_args(request: &SpeechRequest) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(voice) = request.voice.as_deref().filter(|v| !v.trim().is_empty()) {
        args.push("-v".to_string());
        args.push(voice.to_string());
    }

    if let Some(rate) = request.rate.filter(|r| *r > 0) {
        args.push("-r".to_string());
        args.push(rate.to_string());
    }

    let text = match request.volume {
        Some(volume) => format!("[[volm {:.2}]] {}", volume.clamp(0.0, 1.0), request.text),
        None => request.text.clone(),
    };
    args.push(text);

    args
}

/// Parse `say -v '?'` output into a sorted, de-duplicated list of voice names.
///
/// Each line looks like `Samantha            en_US    # Hello, my name is Samantha.`;
/// the first token is taken as the name.
pub fn parse_voice_list(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// `say` only exists on macOS.
pub fn ensure_macos(backend: &'static str) -> Result<()> {
    if cfg!(target_os = "macos") {
        Ok(())
    } else {
        Err(SpeakqError::PlatformUnsupported {
            backend,
            os: std::env::consts::OS,
            required: "macos",
        })
    }
}

impl SpeechBackend for SayBackend {
    fn name(&self) -> &'static str {
        "say"
    }

    fn check_platform(&self) -> Result<()> {
        ensure_macos(self.name())
    }

    fn describe(&self, request: &SpeechRequest) -> String {
        let args = say_args(request)
            .into_iter()
            .map(|a| format!("{a:?}"))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{} {}", self.program, args)
    }

    fn speak<'a>(
        &'a self,
        ctx: WorkContext,
        request: SpeechRequest,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let mut cmd = Command::new(&self.program);
            cmd.args(say_args(&request));

            let status = ctx
                .run_process(cmd)
                .await
                .with_context(|| format!("speaking with '{}'", self.program))?;

            if !status.success() {
                bail!(
                    "'{}' exited with status {}",
                    self.program,
                    status.code().unwrap_or(-1)
                );
            }
            Ok(())
        })
    }

    fn list_voices(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move {
            self.check_platform()?;

            let output = Command::new(&self.program)
                .args(["-v", "?"])
                .output()
                .await?;

            if !output.status.success() {
                return Err(SpeakqError::Other(anyhow::anyhow!(
                    "'{} -v ?' exited with status {}",
                    self.program,
                    output.status.code().unwrap_or(-1)
                )));
            }

            let stdout = String::from_utf8_lossy(&output.stdout);
            let voices = parse_voice_list(&stdout);
            debug!(count = voices.len(), "listed say voices");
            Ok(voices)
        })
    }
}
