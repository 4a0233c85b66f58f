// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::exec::ExecutorSettings;
use crate::types::SpeechBackendKind;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [executor]
/// kill_timeout_ms = 2000
///
/// [speech]
/// backend = "say"
/// voice = "Samantha"
/// rate = 180
/// volume = 0.8
///
/// [speech.http]
/// url = "http://localhost:5002"
/// speaker_id = "Tanja Adelina"
///
/// [mcp]
/// voice = "Samantha"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default)]
    pub speech: SpeechSection,

    #[serde(default)]
    pub mcp: McpSection,
}

/// Validated configuration. Only constructed through `TryFrom<RawConfigFile>`
/// (see `validate.rs`), so every value in here is known to be in range.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub executor: ExecutorSection,
    pub speech: SpeechSection,
    pub mcp: McpSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        executor: ExecutorSection,
        speech: SpeechSection,
        mcp: McpSection,
    ) -> Self {
        Self {
            executor,
            speech,
            mcp,
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(
            ExecutorSection::default(),
            SpeechSection::default(),
            McpSection::default(),
        )
    }
}

/// `[executor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    /// How long to wait for a killed process to be reaped during shutdown.
    #[serde(default = "default_kill_timeout_ms")]
    pub kill_timeout_ms: u64,
}

fn default_kill_timeout_ms() -> u64 {
    2000
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            kill_timeout_ms: default_kill_timeout_ms(),
        }
    }
}

impl ExecutorSection {
    pub fn settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            kill_timeout: Duration::from_millis(self.kill_timeout_ms),
        }
    }
}

/// `[speech]` section: backend selection plus default voice parameters that
/// apply to requests which do not set their own.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SpeechSection {
    #[serde(default)]
    pub backend: SpeechBackendKind,

    #[serde(default)]
    pub voice: Option<String>,

    /// Words per minute.
    #[serde(default)]
    pub rate: Option<u32>,

    /// 0.0 to 1.0.
    #[serde(default)]
    pub volume: Option<f32>,

    #[serde(default)]
    pub say: SaySection,

    #[serde(default)]
    pub http: HttpSection,
}

/// `[speech.say]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SaySection {
    /// Speaker program to invoke.
    #[serde(default = "default_say_program")]
    pub program: String,
}

fn default_say_program() -> String {
    "say".to_string()
}

impl Default for SaySection {
    fn default() -> Self {
        Self {
            program: default_say_program(),
        }
    }
}

/// `[speech.http]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSection {
    /// Base URL of the synthesis server; `/api/tts` is appended.
    #[serde(default = "default_http_url")]
    pub url: String,

    #[serde(default = "default_speaker_id")]
    pub speaker_id: String,

    #[serde(default = "default_language")]
    pub language: String,

    /// Audio player used for playback. Autodetected from PATH when unset.
    #[serde(default)]
    pub player: Option<String>,

    /// Speakers reported by `voices`. Falls back to a built-in list when empty.
    #[serde(default)]
    pub speakers: Vec<String>,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_http_url() -> String {
    "http://localhost:5002".to_string()
}

fn default_speaker_id() -> String {
    "Tanja Adelina".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            url: default_http_url(),
            speaker_id: default_speaker_id(),
            language: default_language(),
            player: None,
            speakers: Vec::new(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// `[mcp]` section, used by `speakq mcp`.
#[derive(Debug, Clone, Deserialize)]
pub struct McpSection {
    /// Server name reported to MCP clients.
    #[serde(default = "default_mcp_name")]
    pub name: String,

    /// Voice used by the `quick_speak` tool. Falls back to `[speech].voice`.
    #[serde(default)]
    pub voice: Option<String>,
}

fn default_mcp_name() -> String {
    "speakq".to_string()
}

impl Default for McpSection {
    fn default() -> Self {
        Self {
            name: default_mcp_name(),
            voice: None,
        }
    }
}
