use pacing::test_tools::{FlakyOperation, RecordingSleeper};
use pacing::{BackoffOptions, PacingError, with_backoff};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
enum FetchError {
    #[error("connection reset")]
    Transient,
    #[error("permission denied")]
    Fatal,
}

fn only_transient(err: &FetchError, _attempt: u32) -> bool {
    matches!(err, FetchError::Transient)
}

#[tokio::test]
async fn retries_transient_failures_until_success() {
    let flaky = FlakyOperation::new([FetchError::Transient, FetchError::Transient], "payload");
    let sleeper = RecordingSleeper::new();
    let op = flaky.clone();
    let backoff = with_backoff(
        move || op.clone().attempt(),
        BackoffOptions::default().retry_if(only_transient),
    )
    .expect("valid options")
    .with_sleeper(Arc::new(sleeper.clone()));

    assert_eq!(backoff.run().await, Ok("payload"));
    assert_eq!(flaky.attempts(), 3);

    let delays = sleeper.delays();
    assert_eq!(delays.len(), 2);
    // 200ms * 2^n, +/-25%
    assert!(delays[0] >= Duration::from_millis(300) && delays[0] <= Duration::from_millis(500));
    assert!(delays[1] >= Duration::from_millis(600) && delays[1] <= Duration::from_millis(1_000));
    let total = sleeper.total();
    assert!(total >= Duration::from_millis(900) && total <= Duration::from_millis(1_500));
}

#[tokio::test]
async fn predicate_rejection_stops_after_first_failure() {
    let flaky = FlakyOperation::failing(FetchError::Fatal, 10, ());
    let sleeper = RecordingSleeper::new();
    let op = flaky.clone();
    let backoff = with_backoff(
        move || op.clone().attempt(),
        BackoffOptions {
            max_attempts: 5,
            ..BackoffOptions::default()
        }
        .retry_if(only_transient),
    )
    .expect("valid options")
    .with_sleeper(Arc::new(sleeper.clone()));

    assert_eq!(backoff.run().await, Err(FetchError::Fatal));
    assert_eq!(flaky.attempts(), 1);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn exhaustion_returns_the_last_error_unchanged() {
    let flaky = FlakyOperation::failing(FetchError::Transient, 10, ());
    let sleeper = RecordingSleeper::new();
    let op = flaky.clone();
    let backoff = with_backoff(
        move || op.clone().attempt(),
        BackoffOptions {
            delay_factor: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_attempts: 5,
            ..BackoffOptions::default()
        },
    )
    .expect("valid options")
    .with_sleeper(Arc::new(sleeper.clone()));

    assert_eq!(backoff.run().await, Err(FetchError::Transient));
    assert_eq!(flaky.attempts(), 5);
    assert_eq!(sleeper.delays(), vec![Duration::ZERO; 4]);
}

#[tokio::test]
async fn predicate_sees_one_based_attempt_numbers() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let flaky = FlakyOperation::failing(FetchError::Transient, 10, ());
    let op = flaky.clone();
    let backoff = with_backoff(
        move || op.clone().attempt(),
        BackoffOptions {
            max_attempts: 4,
            ..BackoffOptions::default()
        }
        .retry_if(move |_err: &FetchError, attempt| {
            log.lock().unwrap().push(attempt);
            true
        }),
    )
    .expect("valid options")
    .with_sleeper(Arc::new(RecordingSleeper::new()));

    assert!(backoff.run().await.is_err());
    assert_eq!(flaky.attempts(), 4);
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn first_success_skips_retries() {
    let flaky = FlakyOperation::<_, FetchError>::new([], 42);
    let sleeper = RecordingSleeper::new();
    let op = flaky.clone();
    let backoff = with_backoff(move || op.clone().attempt(), BackoffOptions::default())
        .expect("valid options")
        .with_sleeper(Arc::new(sleeper.clone()));

    assert_eq!(backoff.run().await, Ok(42));
    assert_eq!(flaky.attempts(), 1);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test(start_paused = true)]
async fn default_sleeper_suspends_between_attempts() {
    let flaky = FlakyOperation::new([FetchError::Transient], "ok");
    let op = flaky.clone();
    let backoff = with_backoff(
        move || op.clone().attempt(),
        BackoffOptions {
            delay_factor: Duration::from_millis(100),
            randomization_factor: 0.0,
            ..BackoffOptions::default()
        },
    )
    .expect("valid options");

    let started = tokio::time::Instant::now();
    assert_eq!(backoff.run().await, Ok("ok"));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(201), "{elapsed:?}");
}

#[test]
fn zero_attempts_is_a_configuration_error() {
    let result = with_backoff(
        || async { Ok::<(), FetchError>(()) },
        BackoffOptions::<FetchError> {
            max_attempts: 0,
            ..BackoffOptions::default()
        },
    );
    assert!(matches!(result, Err(PacingError::Configuration(_))));
}
