// src/speech/mod.rs

//! Speech synthesis on top of the serialized executor.
//!
//! Every utterance becomes one executor task, so utterances never overlap and
//! are spoken in the order they were queued. The backends only know how to
//! turn one [`SpeechRequest`] into sound:
//!
//! - [`say`] drives the macOS `say` command.
//! - [`http`] fetches WAV audio from a synthesis server and plays it through
//!   a local player process.
//!
//! Both run their process through [`WorkContext::run_process`], which is what
//! lets [`SpeechQueue::shutdown`] cut speech off mid-sentence.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::config::SpeechSection;
use crate::errors::Result;
use crate::exec::WorkContext;

pub mod http;
pub mod queue;
pub mod say;

pub use http::HttpBackend;
pub use queue::{backend_from_config, SpeechQueue};
pub use say::SayBackend;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One thing to say.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpeechRequest {
    pub text: String,
    /// Voice name (`say`) or speaker id (`http`).
    pub voice: Option<String>,
    /// Words per minute.
    pub rate: Option<u32>,
    /// 0.0 to 1.0.
    pub volume: Option<f32>,
    /// Language code; only the `http` backend uses it.
    pub language: Option<String>,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_rate(mut self, rate: u32) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Result of one spoken request.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechOutcome {
    pub backend: &'static str,
    pub elapsed: Duration,
}

/// Voice parameters applied to requests that leave them unset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VoiceDefaults {
    pub voice: Option<String>,
    pub rate: Option<u32>,
    pub volume: Option<f32>,
}

impl VoiceDefaults {
    pub fn from_config(section: &SpeechSection) -> Self {
        Self {
            voice: section.voice.clone(),
            rate: section.rate,
            volume: section.volume,
        }
    }

    pub fn apply(&self, mut request: SpeechRequest) -> SpeechRequest {
        if request.voice.is_none() {
            request.voice = self.voice.clone();
        }
        if request.rate.is_none() {
            request.rate = self.rate;
        }
        if request.volume.is_none() {
            request.volume = self.volume;
        }
        request
    }
}

/// A way of turning a [`SpeechRequest`] into audible speech.
pub trait SpeechBackend: Send + Sync + std::fmt::Debug + 'static {
    fn name(&self) -> &'static str;

    /// Fail fast when the backend cannot work on this machine.
    fn check_platform(&self) -> Result<()>;

    /// What `speak` would do, for dry runs.
    fn describe(&self, request: &SpeechRequest) -> String;

    /// Speak one request. Runs on the executor's worker.
    fn speak<'a>(
        &'a self,
        ctx: WorkContext,
        request: SpeechRequest,
    ) -> BoxFuture<'a, anyhow::Result<()>>;

    fn list_voices(&self) -> BoxFuture<'_, Result<Vec<String>>>;
}
