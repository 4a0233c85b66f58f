use std::sync::{Arc, Mutex};

use tokio::process::Command;

use speakq::errors::Result;
use speakq::exec::WorkContext;
use speakq::speech::{BoxFuture, SpeechBackend, SpeechRequest};

/// A speech backend that "speaks" by running `sleep <seconds>`.
///
/// Records each request's text in the order it was spoken.
#[derive(Debug, Clone)]
pub struct SleepBackend {
    seconds: f32,
    spoken: Arc<Mutex<Vec<String>>>,
}

impl SleepBackend {
    pub fn new(seconds: f32) -> Self {
        Self {
            seconds,
            spoken: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

impl SpeechBackend for SleepBackend {
    fn name(&self) -> &'static str {
        "sleep"
    }

    fn check_platform(&self) -> Result<()> {
        Ok(())
    }

    fn describe(&self, request: &SpeechRequest) -> String {
        format!("sleep {} # {}", self.seconds, request.text)
    }

    fn speak<'a>(
        &'a self,
        ctx: WorkContext,
        request: SpeechRequest,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.spoken.lock().unwrap().push(request.text.clone());

            let mut cmd = Command::new("sleep");
            cmd.arg(self.seconds.to_string());

            let status = ctx.run_process(cmd).await?;

            anyhow::ensure!(status.success(), "sleep exited with {status}");
            Ok(())
        })
    }

    fn list_voices(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move { Ok(vec!["sleepy".to_string()]) })
    }
}
