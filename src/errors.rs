// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpeakqError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// The speech backend only works on a specific OS family.
    #[error("{backend} backend is not supported on {os} (requires {required})")]
    PlatformUnsupported {
        backend: &'static str,
        os: &'static str,
        required: &'static str,
    },

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<reqwest::Error> for SpeakqError {
    fn from(err: reqwest::Error) -> Self {
        SpeakqError::HttpError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SpeakqError>;
