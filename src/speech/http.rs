// src/speech/http.rs

//! Remote synthesis backend.
//!
//! Text is sent to `{url}/api/tts`, the returned WAV is written to a temp
//! file and played with a local audio player. Playback is a regular
//! executor-tracked process, so shutdown stops it like any other speech.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::HttpSection;
use crate::errors::{Result, SpeakqError};
use crate::exec::WorkContext;

use super::{BoxFuture, SpeechBackend, SpeechRequest};

/// Players tried in order when none is configured.
const PLAYERS: &[&str] = &["afplay", "aplay", "paplay", "ffplay"];

/// Speakers known to the stock XTTS server.
const DEFAULT_SPEAKERS: &[&str] = &[
    "Claribel Dervla",
    "Daisy Studious",
    "Gracie Wise",
    "Tammie Ema",
    "Alison Dietlinde",
    "Ana Florence",
    "Annmarie Nele",
    "Asya Anara",
    "Brenda Stern",
    "Gitta Nikolina",
    "Henriette Usha",
    "Sofia Hellen",
    "Tammy Grit",
    "Tanja Adelina",
    "Vjollca Johnnie",
    "Andrew Chipper",
    "Badr Odhiambo",
    "Dionisio Schuyler",
    "Royston Min",
    "Viktor Eka",
    "Abrahan Mack",
    "Adde Michal",
    "Baldur Sanjin",
    "Craig Gutsy",
    "Damien Black",
    "Gilberto Mathias",
    "Ilkin Urbano",
    "Kazuhiko Atallah",
    "Ludvig Milivoj",
    "Suad Qasim",
    "Torcull Diarmuid",
    "Viktor Menelaos",
    "Zacharie Aimilios",
    "Nova Hogarth",
    "Maja Ruoho",
    "Uta Obando",
    "Lidiya Szekeres",
    "Chandra MacFarland",
    "Szofi Granger",
    "Camilla Holmström",
    "Lilya Stainthorpe",
    "Zofija Kendrick",
    "Narelle Moon",
    "Barbora MacLean",
    "Alexandra Hisakawa",
    "Alma María",
    "Rosemary Okafor",
    "Ige Behringer",
    "Filip Traverse",
    "Damjan Chapman",
    "Wulf Carlevaro",
    "Aaron Dreschner",
    "Kumar Dahl",
    "Eugenio Mataracı",
    "Ferran Simen",
    "Xavier Hayasaka",
    "Luis Moray",
    "Marcos Rudaski",
];

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    speaker_id: String,
    language: String,
    player: Option<String>,
    speakers: Vec<String>,
}

impl HttpBackend {
    pub fn from_config(section: &HttpSection) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(section.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: section.url.trim().trim_end_matches('/').to_string(),
            speaker_id: section.speaker_id.clone(),
            language: section.language.clone(),
            player: section.player.clone(),
            speakers: section.speakers.clone(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/tts", self.base_url)
    }

    /// Synthesize `request` and return the raw WAV bytes.
    pub async fn fetch_wav(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        let speaker = request.voice.as_deref().unwrap_or(&self.speaker_id);
        let language = request.language.as_deref().unwrap_or(&self.language);

        debug!(speaker, language, "requesting synthesis");

        let response = self
            .client
            .get(self.endpoint())
            .query(&[
                ("text", request.text.as_str()),
                ("language_id", language),
                ("speaker_id", speaker),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeakqError::HttpError(format!(
                "synthesis request failed: {status} {body}"
            )));
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// Synthesize `request` straight to a WAV file without playing it.
    pub async fn save(&self, request: &SpeechRequest, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let wav = self.fetch_wav(request).await?;
        tokio::fs::write(path, &wav).await?;
        info!(path = %path.display(), bytes = wav.len(), "saved synthesized audio");
        Ok(())
    }

    fn resolve_player(&self) -> Option<String> {
        if let Some(preferred) = &self.player {
            if find_on_path(preferred).is_some() {
                return Some(preferred.clone());
            }
        }
        PLAYERS
            .iter()
            .find(|p| find_on_path(p).is_some())
            .map(|p| p.to_string())
    }
}

/// Command line that plays `wav` with `player`.
pub fn player_command(player: &str, wav: &Path) -> Command {
    let mut cmd = Command::new(player);
    let name = Path::new(player)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(player);
    if name == "ffplay" {
        cmd.args(["-nodisp", "-autoexit", "-loglevel", "quiet"]);
    }
    cmd.arg(wav);
    cmd
}

/// Look a binary up on PATH (or accept it as-is if it is a path).
pub fn find_on_path(bin: &str) -> Option<PathBuf> {
    if bin.contains(std::path::MAIN_SEPARATOR) {
        let p = PathBuf::from(bin);
        return p.exists().then_some(p);
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(bin))
        .find(|candidate| candidate.is_file())
}

impl SpeechBackend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    fn check_platform(&self) -> Result<()> {
        Ok(())
    }

    fn describe(&self, request: &SpeechRequest) -> String {
        let speaker = request.voice.as_deref().unwrap_or(&self.speaker_id);
        let player = self.resolve_player().unwrap_or_else(|| "<no player>".to_string());
        format!(
            "GET {} text={:?} speaker_id={:?} | {}",
            self.endpoint(),
            request.text,
            speaker,
            player
        )
    }

    fn speak<'a>(
        &'a self,
        ctx: WorkContext,
        request: SpeechRequest,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let player = self
                .resolve_player()
                .ok_or_else(|| anyhow!("no audio player found (tried {})", PLAYERS.join(", ")))?;

            let wav = self.fetch_wav(&request).await?;

            let file = tempfile::Builder::new()
                .prefix("speakq-")
                .suffix(".wav")
                .tempfile()
                .context("creating temp file for synthesized audio")?;
            tokio::fs::write(file.path(), &wav)
                .await
                .context("writing synthesized audio")?;

            let status = ctx
                .run_process(player_command(&player, file.path()))
                .await
                .with_context(|| format!("playing audio with '{player}'"))?;

            if !status.success() {
                bail!("'{player}' exited with status {}", status.code().unwrap_or(-1));
            }
            Ok(())
        })
    }

    fn list_voices(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move {
            if self.speakers.is_empty() {
                Ok(DEFAULT_SPEAKERS.iter().map(|s| s.to_string()).collect())
            } else {
                Ok(self.speakers.clone())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve exactly one HTTP response on a local port. Resolves the returned
    /// receiver with the request line the client sent.
    async fn serve_once(status: &'static str, body: Vec<u8>) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let request = String::from_utf8_lossy(&request);
            let _ = tx.send(request.lines().next().unwrap_or_default().to_string());

            let head = format!(
                "HTTP/1.1 {status}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            let _ = socket.shutdown().await;
        });

        (url, rx)
    }

    fn backend_for(url: String) -> HttpBackend {
        let section = HttpSection {
            url,
            speaker_id: "Ana Florence".to_string(),
            ..HttpSection::default()
        };
        HttpBackend::from_config(&section).unwrap()
    }

    #[tokio::test]
    async fn server_error_becomes_http_error_with_status_and_body() {
        let (url, _request) = serve_once("500 Internal Server Error", b"nope".to_vec()).await;
        let backend = backend_for(url);

        match backend.fetch_wav(&SpeechRequest::new("hello")).await {
            Err(SpeakqError::HttpError(msg)) => {
                assert!(msg.contains("500"), "{msg}");
                assert!(msg.contains("nope"), "{msg}");
            }
            other => panic!("expected HttpError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn save_writes_the_returned_audio() {
        let wav = b"RIFF\x24\x00\x00\x00WAVEfmt fake".to_vec();
        let (url, request) = serve_once("200 OK", wav.clone()).await;
        let backend = backend_for(url);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        backend
            .save(&SpeechRequest::new("hello world").with_language("de"), &path)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), wav);

        let line = request.await.unwrap();
        assert!(line.starts_with("GET /api/tts?"), "{line}");
        assert!(line.contains("language_id=de"), "{line}");
        assert!(line.contains("speaker_id=Ana+Florence"), "{line}");
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let section = HttpSection {
            url: "http://tts.local:5002/".to_string(),
            ..HttpSection::default()
        };
        let backend = HttpBackend::from_config(&section).unwrap();
        assert_eq!(backend.endpoint(), "http://tts.local:5002/api/tts");
    }

    #[test]
    fn ffplay_gets_headless_flags() {
        let cmd = player_command("ffplay", Path::new("/tmp/a.wav"));
        let args: Vec<_> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["-nodisp", "-autoexit", "-loglevel", "quiet", "/tmp/a.wav"]);
    }

    #[tokio::test]
    async fn configured_speakers_override_defaults() {
        let section = HttpSection {
            speakers: vec!["Ana Florence".to_string()],
            ..HttpSection::default()
        };
        let backend = HttpBackend::from_config(&section).unwrap();
        assert_eq!(backend.list_voices().await.unwrap(), vec!["Ana Florence"]);
    }

    #[tokio::test]
    async fn default_speakers_are_reported() {
        let backend = HttpBackend::from_config(&HttpSection::default()).unwrap();
        let voices = backend.list_voices().await.unwrap();
        assert!(voices.iter().any(|v| v == "Tanja Adelina"));
    }
}
