//! End-to-end behaviour of wrapped operations: attempt counts, backoff waits,
//! and which recovery handler answers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use recourse_core::call_args;
use recourse_core::retry::{
    ArgType, CallArgs, FailureRecord, RecoveryHandler, RetryError, RetryPolicy, Retryable,
    StatsObserver,
};

fn preset(non_retryable: &[&str]) -> RetryPolicy {
    non_retryable
        .iter()
        .fold(
            RetryPolicy::builder()
                .max_attempts(5)
                .initial_delay(Duration::from_millis(100))
                .multiplier(2.0),
            |b, k| b.no_retry_for(*k),
        )
        .build()
        .unwrap()
}

fn recover1() -> RecoveryHandler<String> {
    RecoveryHandler::new("recover1", || Ok("recover1".to_string()))
}

fn recover2() -> RecoveryHandler<String> {
    RecoveryHandler::with_shape("recover2", [ArgType::Str, ArgType::Int], |failure, args| {
        Ok(format!(
            "recover2 {} {} {}",
            failure.kind(),
            args.get(0).and_then(|a| a.as_str()).unwrap_or("?"),
            args.get(1).and_then(|a| a.as_int()).unwrap_or(-1)
        ))
    })
}

/// Operation that always fails with `kind` and counts its calls.
fn always_fails(
    kind: &'static str,
    calls: Arc<AtomicU32>,
) -> impl FnMut(CallArgs) -> std::future::Ready<Result<String, FailureRecord>> {
    move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Err(FailureRecord::new(kind, "always fails")))
    }
}

#[tokio::test(start_paused = true)]
async fn exhausts_five_attempts_with_doubling_waits_then_recovers() {
    let stats = Arc::new(StatsObserver::new());
    let wrapper = Retryable::builder("timeouts")
        .policy(preset(&[]))
        .recover(recover1())
        .observer(stats.clone())
        .build()
        .unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let started = tokio::time::Instant::now();
    let out = wrapper
        .run(CallArgs::new(), always_fails("Timeout", calls.clone()))
        .await
        .unwrap();

    assert_eq!(out, "recover1");
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(
        stats.delays(),
        vec![
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(400),
            Duration::from_millis(800),
        ]
    );
    assert!(started.elapsed() >= Duration::from_millis(1500));
    assert_eq!(stats.recoveries(), 1);
}

#[tokio::test(start_paused = true)]
async fn non_retryable_kind_recovers_after_one_attempt() {
    let stats = Arc::new(StatsObserver::new());
    let wrapper = Retryable::builder("hello")
        .policy(preset(&["IllegalArgument"]))
        .recover(recover1())
        .observer(stats.clone())
        .build()
        .unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let started = tokio::time::Instant::now();
    let out = wrapper
        .run(CallArgs::new(), always_fails("IllegalArgument", calls.clone()))
        .await
        .unwrap();

    assert_eq!(out, "recover1");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(stats.delays().is_empty());
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn wrapped_non_retryable_cause_is_seen_through() {
    let wrapper = Retryable::builder("hello")
        .policy(preset(&["IllegalArgument"]))
        .recover(recover1())
        .build()
        .unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let out = wrapper
        .run(CallArgs::new(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Err::<String, _>(
                FailureRecord::new("IllegalArgument", "bad").wrap("ServiceError", "hello failed"),
            ))
        })
        .await
        .unwrap();

    assert_eq!(out, "recover1");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn most_specific_handler_is_selected() {
    let wrapper = Retryable::builder("hello")
        .policy(preset(&["IllegalArgument"]))
        .recover(recover1())
        .recover(recover2())
        .build()
        .unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let out = wrapper
        .run(call_args!["name", 99], always_fails("IllegalArgument", calls))
        .await
        .unwrap();

    assert_eq!(out, "recover2 IllegalArgument name 99");
}

#[tokio::test(start_paused = true)]
async fn pinned_handler_answers_even_when_less_specific() {
    let wrapper = Retryable::builder("hello")
        .policy(preset(&["IllegalArgument"]))
        .recover(recover1())
        .recover(recover2())
        .recover_with("recover1")
        .build()
        .unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let out = wrapper
        .run(call_args!["name", 99], always_fails("IllegalArgument", calls))
        .await
        .unwrap();

    assert_eq!(out, "recover1");
}

#[tokio::test(start_paused = true)]
async fn unmatched_failure_surfaces_no_recovery_match() {
    let wrapper = Retryable::builder("io")
        .policy(preset(&["IllegalArgument"]))
        .recover(recover1().accepts("Io"))
        .build()
        .unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let err = wrapper
        .run(call_args!["name", 99], always_fails("IllegalArgument", calls))
        .await
        .unwrap_err();

    match &err {
        RetryError::NoRecoveryMatch { failure } => {
            assert_eq!(failure.kind().as_str(), "IllegalArgument");
            assert_eq!(failure.message(), "always fails");
        }
        other => panic!("expected NoRecoveryMatch, got {:?}", other),
    }
    let source = std::error::Error::source(&err).expect("original failure as source");
    assert_eq!(source.to_string(), "IllegalArgument: always fails");
}

#[tokio::test(start_paused = true)]
async fn single_attempt_policy_recovers_without_waiting() {
    let stats = Arc::new(StatsObserver::new());
    let wrapper = Retryable::builder("once")
        .policy(RetryPolicy::builder().max_attempts(1).build().unwrap())
        .recover(recover1())
        .observer(stats.clone())
        .build()
        .unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let out = wrapper
        .run(CallArgs::new(), always_fails("Timeout", calls.clone()))
        .await
        .unwrap();

    assert_eq!(out, "recover1");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(stats.retries(), 0);
    assert!(stats.delays().is_empty());
}

#[tokio::test(start_paused = true)]
async fn equally_specific_handlers_are_ambiguous() {
    let wrapper = Retryable::builder("tie")
        .policy(RetryPolicy::builder().max_attempts(1).build().unwrap())
        .recover(recover2())
        .recover(RecoveryHandler::with_shape(
            "recover2b",
            [ArgType::Str, ArgType::Int],
            |_, _| Ok("b".to_string()),
        ))
        .build()
        .unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let err = wrapper
        .run(call_args!["name", 99], always_fails("Timeout", calls))
        .await
        .unwrap_err();

    match err {
        RetryError::AmbiguousRecoveryMatch { candidates, .. } => {
            assert_eq!(candidates, vec!["recover2".to_string(), "recover2b".to_string()]);
        }
        other => panic!("expected AmbiguousRecoveryMatch, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn failing_handler_propagates_its_own_failure() {
    let wrapper = Retryable::builder("broken")
        .policy(RetryPolicy::builder().max_attempts(2).build().unwrap())
        .recover(RecoveryHandler::new("broken", || {
            Err::<String, _>(FailureRecord::new("RecoveryFailed", "no fallback data"))
        }))
        .build()
        .unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let err = wrapper
        .run(CallArgs::new(), always_fails("Timeout", calls.clone()))
        .await
        .unwrap_err();

    match err {
        RetryError::RecoveryHandlerFailure { handler, failure } => {
            assert_eq!(handler, "broken");
            assert_eq!(failure, FailureRecord::new("RecoveryFailed", "no fallback data"));
        }
        other => panic!("expected RecoveryHandlerFailure, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_invocations_are_independent() {
    let wrapper = Retryable::builder("shared")
        .policy(
            RetryPolicy::builder()
                .max_attempts(3)
                .initial_delay(Duration::from_millis(10))
                .build()
                .unwrap(),
        )
        .recover(recover2())
        .build()
        .unwrap();

    let mut tasks = Vec::new();
    for i in 0..8i64 {
        let wrapper = wrapper.clone();
        tasks.push(tokio::spawn(async move {
            let calls = Arc::new(AtomicU32::new(0));
            let out = wrapper
                .run(call_args!["task", i], always_fails("Timeout", calls.clone()))
                .await
                .unwrap();
            (out, calls.load(Ordering::SeqCst))
        }));
    }
    for (i, task) in tasks.into_iter().enumerate() {
        let (out, calls) = task.await.unwrap();
        assert_eq!(out, format!("recover2 Timeout task {}", i));
        assert_eq!(calls, 3);
    }
}
