// src/speech/queue.rs

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::config::{ConfigFile, SpeechSection};
use crate::errors::Result;
use crate::exec::{Executor, TaskHandle};
use crate::types::SpeechBackendKind;

use super::{
    HttpBackend, SayBackend, SpeechBackend, SpeechOutcome, SpeechRequest, VoiceDefaults,
};

/// Serialized speech: one utterance at a time, in the order they were queued.
#[derive(Clone)]
pub struct SpeechQueue {
    executor: Executor,
    backend: Arc<dyn SpeechBackend>,
    defaults: VoiceDefaults,
}

impl fmt::Debug for SpeechQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechQueue")
            .field("backend", &self.backend.name())
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

/// Build the backend selected by `[speech].backend`.
pub fn backend_from_config(section: &SpeechSection) -> Result<Arc<dyn SpeechBackend>> {
    let backend: Arc<dyn SpeechBackend> = match section.backend {
        SpeechBackendKind::Say => Arc::new(SayBackend::from_config(&section.say)),
        SpeechBackendKind::Http => Arc::new(HttpBackend::from_config(&section.http)?),
    };
    Ok(backend)
}

impl SpeechQueue {
    pub fn new(executor: Executor, backend: Arc<dyn SpeechBackend>, defaults: VoiceDefaults) -> Self {
        Self {
            executor,
            backend,
            defaults,
        }
    }

    /// Build a queue (and its executor) from a validated config.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let executor = Executor::new(cfg.executor.settings())?;
        let backend = backend_from_config(&cfg.speech)?;
        Ok(Self::new(
            executor,
            backend,
            VoiceDefaults::from_config(&cfg.speech),
        ))
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Queue `request` for speaking.
    ///
    /// Fails only if the backend cannot run on this platform; that check
    /// happens before anything is queued. Everything else is reported on the
    /// returned handle.
    pub fn say(&self, request: SpeechRequest) -> Result<TaskHandle<SpeechOutcome>> {
        self.backend.check_platform()?;

        let request = self.defaults.apply(request);
        let backend = Arc::clone(&self.backend);

        Ok(self.executor.submit(move |ctx| async move {
            let started = Instant::now();

            if request.text.trim().is_empty() {
                debug!(task_id = ctx.task_id(), "empty text; nothing to say");
            } else {
                backend.speak(ctx, request).await?;
            }

            Ok(SpeechOutcome {
                backend: backend.name(),
                elapsed: started.elapsed(),
            })
        }))
    }

    /// Shorthand for `say(SpeechRequest::new(text))`.
    pub fn say_text(&self, text: impl Into<String>) -> Result<TaskHandle<SpeechOutcome>> {
        self.say(SpeechRequest::new(text))
    }

    /// What saying `request` would do, after defaults are applied.
    pub fn describe(&self, request: SpeechRequest) -> String {
        self.backend.describe(&self.defaults.apply(request))
    }

    pub async fn list_voices(&self) -> Result<Vec<String>> {
        self.backend.list_voices().await
    }

    pub async fn wait_idle(&self) {
        self.executor.wait_idle().await
    }

    /// Stop speaking now: kills the current utterance and drops queued ones.
    pub async fn shutdown(&self) {
        self.executor.shutdown().await
    }
}
