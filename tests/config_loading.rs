use std::io::Write;
use std::time::Duration;

use tempfile::{tempdir, NamedTempFile};

use speakq::config::{load_and_validate, load_or_default};
use speakq::errors::SpeakqError;
use speakq::types::SpeechBackendKind;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn full_config_is_loaded() {
    let file = write_config(
        r#"
[executor]
kill_timeout_ms = 500

[speech]
backend = "http"
voice = "Ana Florence"
rate = 200
volume = 0.5

[speech.http]
url = "http://tts.local:5002"
language = "de"
player = "aplay"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.executor.settings().kill_timeout, Duration::from_millis(500));
    assert_eq!(cfg.speech.backend, SpeechBackendKind::Http);
    assert_eq!(cfg.speech.voice.as_deref(), Some("Ana Florence"));
    assert_eq!(cfg.speech.rate, Some(200));
    assert_eq!(cfg.speech.volume, Some(0.5));
    assert_eq!(cfg.speech.http.url, "http://tts.local:5002");
    assert_eq!(cfg.speech.http.language, "de");
    assert_eq!(cfg.speech.http.player.as_deref(), Some("aplay"));
    assert_eq!(cfg.speech.http.speaker_id, "Tanja Adelina");
    assert_eq!(cfg.speech.say.program, "say");
}

#[test]
fn empty_file_gets_defaults() {
    let file = write_config("");
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.executor.kill_timeout_ms, 2000);
    assert_eq!(cfg.speech.backend, SpeechBackendKind::Say);
    assert!(cfg.speech.voice.is_none());
}

#[test]
fn out_of_range_volume_is_a_config_error() {
    let file = write_config(
        r#"
[speech]
volume = 1.5
"#,
    );

    match load_and_validate(file.path()) {
        Err(SpeakqError::ConfigError(msg)) => assert!(msg.contains("volume")),
        other => panic!("Expected ConfigError, got: {other:?}"),
    }
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let file = write_config("[speech\nbackend = ");

    assert!(matches!(
        load_and_validate(file.path()),
        Err(SpeakqError::TomlError(_))
    ));
}

#[test]
fn missing_default_file_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Speakq.toml");

    let cfg = load_or_default(&path, false).unwrap();
    assert_eq!(cfg.executor.kill_timeout_ms, 2000);
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nope.toml");

    assert!(matches!(
        load_or_default(&path, true),
        Err(SpeakqError::IoError(_))
    ));
}
