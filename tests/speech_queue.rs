#![cfg(unix)]

use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use speakq::exec::{Executor, ExecutorSettings, TaskError};
use speakq::speech::{SpeechQueue, SpeechRequest, VoiceDefaults};
use speakq_test_utils::fake_backend::SleepBackend;
use speakq_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn queue_with(backend: &SleepBackend) -> Result<SpeechQueue, Box<dyn Error>> {
    let executor = Executor::new(ExecutorSettings::default())?;
    Ok(SpeechQueue::new(
        executor,
        Arc::new(backend.clone()),
        VoiceDefaults::default(),
    ))
}

#[tokio::test]
async fn utterances_are_spoken_in_order() -> TestResult {
    init_tracing();

    let backend = SleepBackend::new(0.1);
    let queue = queue_with(&backend)?;

    let handles = ["one", "two", "three"]
        .into_iter()
        .map(|text| queue.say_text(text))
        .collect::<Result<Vec<_>, _>>()?;

    with_timeout(queue.wait_idle()).await;

    assert_eq!(backend.spoken(), vec!["one", "two", "three"]);
    for handle in &handles {
        let outcome = handle.result().expect("utterance finished");
        assert_eq!(outcome.backend, "sleep");
        assert!(outcome.elapsed >= Duration::from_millis(100));
    }

    queue.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn empty_text_completes_without_speaking() -> TestResult {
    init_tracing();

    let backend = SleepBackend::new(0.1);
    let queue = queue_with(&backend)?;

    let handle = queue.say(SpeechRequest::new("   "))?;
    let outcome = with_timeout(handle.wait()).await?;

    assert_eq!(outcome.backend, "sleep");
    assert!(backend.spoken().is_empty());

    queue.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn shutdown_interrupts_speech_and_drops_the_rest() -> TestResult {
    init_tracing();

    let backend = SleepBackend::new(30.0);
    let queue = queue_with(&backend)?;

    let long = queue.say_text("long")?;
    let queued = queue.say_text("never")?;

    for _ in 0..200 {
        if queue.executor().in_flight_pid().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(queue.executor().in_flight_pid().is_some());

    let started = Instant::now();
    with_timeout(queue.shutdown()).await;
    assert!(started.elapsed() < Duration::from_secs(3));

    assert!(matches!(long.error(), Some(TaskError::Cancelled)));
    assert!(!queued.is_completed());
    assert_eq!(backend.spoken(), vec!["long"]);
    Ok(())
}

#[tokio::test]
async fn voices_come_from_the_backend() -> TestResult {
    init_tracing();

    let backend = SleepBackend::new(0.0);
    let queue = queue_with(&backend)?;

    assert_eq!(queue.list_voices().await?, vec!["sleepy"]);
    assert_eq!(queue.describe(SpeechRequest::new("hi")), "sleep 0 # hi");
    Ok(())
}
