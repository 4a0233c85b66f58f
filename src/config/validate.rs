// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, SpeakqError};
use crate::types::SpeechBackendKind;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SpeakqError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.executor, raw.speech, raw.mcp))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_executor(cfg)?;
    validate_voice_defaults(cfg)?;
    validate_backend(cfg)?;
    validate_mcp(cfg)?;
    Ok(())
}

fn validate_mcp(cfg: &RawConfigFile) -> Result<()> {
    if cfg.mcp.name.trim().is_empty() {
        return Err(SpeakqError::ConfigError(
            "[mcp].name must not be empty".to_string(),
        ));
    }
    if let Some(voice) = &cfg.mcp.voice {
        if voice.trim().is_empty() {
            return Err(SpeakqError::ConfigError(
                "[mcp].voice must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_executor(cfg: &RawConfigFile) -> Result<()> {
    if cfg.executor.kill_timeout_ms == 0 {
        return Err(SpeakqError::ConfigError(
            "[executor].kill_timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_voice_defaults(cfg: &RawConfigFile) -> Result<()> {
    if let Some(volume) = cfg.speech.volume {
        if !(0.0..=1.0).contains(&volume) {
            return Err(SpeakqError::ConfigError(format!(
                "[speech].volume must be between 0.0 and 1.0 (got {volume})"
            )));
        }
    }

    if cfg.speech.rate == Some(0) {
        return Err(SpeakqError::ConfigError(
            "[speech].rate must be >= 1 word per minute (got 0)".to_string(),
        ));
    }

    if let Some(voice) = &cfg.speech.voice {
        if voice.trim().is_empty() {
            return Err(SpeakqError::ConfigError(
                "[speech].voice must not be empty".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_backend(cfg: &RawConfigFile) -> Result<()> {
    match cfg.speech.backend {
        SpeechBackendKind::Say => {
            if cfg.speech.say.program.trim().is_empty() {
                return Err(SpeakqError::ConfigError(
                    "[speech.say].program must not be empty".to_string(),
                ));
            }
        }
        SpeechBackendKind::Http => {
            let url = cfg.speech.http.url.trim();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(SpeakqError::ConfigError(format!(
                    "[speech.http].url must start with http:// or https:// (got '{url}')"
                )));
            }
            if cfg.speech.http.request_timeout_ms == 0 {
                return Err(SpeakqError::ConfigError(
                    "[speech.http].request_timeout_ms must be >= 1 (got 0)".to_string(),
                ));
            }
        }
    }
    Ok(())
}
