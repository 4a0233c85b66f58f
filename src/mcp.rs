// src/mcp.rs

//! MCP server exposing the speech queue as tools over stdio.
//!
//! - `quick_speak` speaks a piece of text and returns once it has been said.
//! - `list_voices` reports the voices of the configured backend.
//!
//! Calls from the client go through the same [`SpeechQueue`] as the CLI, so
//! overlapping tool calls are spoken one after the other.

use async_trait::async_trait;
use pmcp::types::capabilities::{ServerCapabilities, ToolCapabilities};
use pmcp::types::ToolInfo;
use pmcp::{RequestHandlerExtra, Server, ToolHandler};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::McpSection;
use crate::speech::{SpeechQueue, SpeechRequest};

#[derive(Debug, Deserialize)]
struct QuickSpeakArgs {
    text: String,
    #[serde(default)]
    voice: Option<String>,
}

#[derive(Debug, Serialize)]
struct QuickSpeakOutput {
    message: String,
    backend: &'static str,
    elapsed_ms: u64,
}

#[derive(Debug, Serialize)]
struct ListVoicesOutput {
    voices: Vec<String>,
    total: usize,
}

/// `quick_speak`: say `text` with the configured voice and wait until done.
#[derive(Debug, Clone)]
pub struct QuickSpeakTool {
    queue: SpeechQueue,
    voice: Option<String>,
}

impl QuickSpeakTool {
    pub fn new(queue: SpeechQueue, voice: Option<String>) -> Self {
        Self { queue, voice }
    }
}

#[async_trait]
impl ToolHandler for QuickSpeakTool {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> pmcp::Result<Value> {
        let args: QuickSpeakArgs = serde_json::from_value(args).map_err(|e| {
            pmcp::Error::validation(format!("invalid arguments for quick_speak: {e}"))
        })?;
        if args.text.trim().is_empty() {
            return Err(pmcp::Error::validation("text must not be empty"));
        }

        let voice = args.voice.or_else(|| self.voice.clone());
        let mut request = SpeechRequest::new(args.text);
        if let Some(voice) = &voice {
            request = request.with_voice(voice.clone());
        }

        let handle = self
            .queue
            .say(request)
            .map_err(|e| pmcp::Error::internal(e.to_string()))?;
        debug!(task_id = handle.id(), "quick_speak queued");

        let outcome = handle
            .wait()
            .await
            .map_err(|e| pmcp::Error::internal(format!("speaking failed: {e}")))?;

        let message = match &voice {
            Some(voice) => format!("Spoke text using voice {voice}"),
            None => "Spoke text using the default voice".to_string(),
        };

        Ok(serde_json::to_value(QuickSpeakOutput {
            message,
            backend: outcome.backend,
            elapsed_ms: outcome.elapsed.as_millis() as u64,
        })?)
    }

    fn metadata(&self) -> Option<ToolInfo> {
        Some(ToolInfo::new(
            "quick_speak",
            Some("Speak text aloud; returns once it has been spoken".to_string()),
            json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string", "description": "Text to speak" },
                    "voice": { "type": "string", "description": "Optional voice override" }
                },
                "required": ["text"]
            }),
        ))
    }
}

/// `list_voices`: the voices offered by the configured backend.
#[derive(Debug, Clone)]
pub struct ListVoicesTool {
    queue: SpeechQueue,
}

impl ListVoicesTool {
    pub fn new(queue: SpeechQueue) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl ToolHandler for ListVoicesTool {
    async fn handle(&self, _args: Value, _extra: RequestHandlerExtra) -> pmcp::Result<Value> {
        let voices = self
            .queue
            .list_voices()
            .await
            .map_err(|e| pmcp::Error::internal(e.to_string()))?;
        let total = voices.len();
        Ok(serde_json::to_value(ListVoicesOutput { voices, total })?)
    }

    fn metadata(&self) -> Option<ToolInfo> {
        Some(ToolInfo::new(
            "list_voices",
            Some("List the voices available for speaking".to_string()),
            json!({ "type": "object", "properties": {} }),
        ))
    }
}

/// Build the MCP server around `queue`.
pub fn build_server(queue: &SpeechQueue, section: &McpSection) -> pmcp::Result<Server> {
    let voice = section.voice.clone();

    Server::builder()
        .name(section.name.clone())
        .version(env!("CARGO_PKG_VERSION"))
        .capabilities({
            let mut capabilities = ServerCapabilities::default();
            capabilities.tools = Some(ToolCapabilities::default());
            capabilities
        })
        .tool("quick_speak", QuickSpeakTool::new(queue.clone(), voice))
        .tool("list_voices", ListVoicesTool::new(queue.clone()))
        .build()
}

/// Serve MCP over stdio until the client disconnects, then stop speaking.
pub async fn serve_stdio(queue: &SpeechQueue, section: &McpSection) -> anyhow::Result<()> {
    let server = build_server(queue, section)?;

    info!(name = %section.name, backend = queue.backend_name(), "starting MCP server on stdio");
    let served = server.run_stdio().await;

    queue.shutdown().await;
    served?;

    info!("MCP client disconnected");
    Ok(())
}
