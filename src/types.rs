use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Which speech collaborator drives synthesis.
///
/// - `Say`: the macOS `say` command-line speaker (default).
/// - `Http`: a remote synthesis server returning WAV audio, played through a
///   local audio player process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpeechBackendKind {
    #[default]
    Say,
    Http,
}

impl FromStr for SpeechBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "say" => Ok(SpeechBackendKind::Say),
            "http" => Ok(SpeechBackendKind::Http),
            other => Err(format!(
                "invalid speech backend: {other} (expected \"say\" or \"http\")"
            )),
        }
    }
}

impl fmt::Display for SpeechBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeechBackendKind::Say => f.write_str("say"),
            SpeechBackendKind::Http => f.write_str("http"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_names_case_insensitively() {
        assert_eq!("Say".parse::<SpeechBackendKind>(), Ok(SpeechBackendKind::Say));
        assert_eq!(" http ".parse::<SpeechBackendKind>(), Ok(SpeechBackendKind::Http));
        assert!("espeak".parse::<SpeechBackendKind>().is_err());
    }
}
