//! `recourse demo` – hello(name, age) under the internal preset.
//!
//! The call always fails with `IllegalArgument` (caused by `Runtime`), which the
//! preset never retries; recovery is pinned to `recover2`.

use std::future::{ready, Ready};
use std::time::Duration;

use anyhow::Result;
use recourse_core::call_args;
use recourse_core::engine::Engine;
use recourse_core::retry::{
    ArgType, CallArgs, FailureRecord, RecoveryHandler, RetryPolicy, TracingObserver,
};

/// maxAttempts 5, 100 ms doubling, IllegalArgument excluded.
fn internal_preset() -> Result<RetryPolicy> {
    Ok(RetryPolicy::builder()
        .max_attempts(5)
        .initial_delay(Duration::from_millis(100))
        .multiplier(2.0)
        .no_retry_for("IllegalArgument")
        .build()?)
}

fn hello(args: CallArgs) -> Ready<Result<String, FailureRecord>> {
    tracing::info!(args = %args, "hello invoked");
    ready(Err(
        FailureRecord::new("IllegalArgument", "Invalid arg").caused_by("Runtime")
    ))
}

fn recover1() -> RecoveryHandler<String> {
    RecoveryHandler::new("recover1", || {
        tracing::info!("fallback triggered in recover1");
        Ok("1".to_string())
    })
}

fn recover2() -> RecoveryHandler<String> {
    RecoveryHandler::with_shape("recover2", [ArgType::Str, ArgType::Int], |failure, args| {
        tracing::info!(failure = %failure, args = %args, "fallback triggered in recover2");
        Ok("Hello World backup!".to_string())
    })
    .accepts("Runtime")
}

async fn hello_with_recovery(engine: &mut Engine) -> Result<String> {
    let builder = engine
        .operation::<String>("hello")
        .policy(internal_preset()?)
        .recover(recover1())
        .recover(recover2())
        .recover_with("recover2");
    let wrapper = engine.install(builder)?;
    Ok(wrapper.run(call_args!["name", 99], hello).await?)
}

pub async fn run_demo() -> Result<()> {
    let mut engine = Engine::new().with_observer(TracingObserver);
    let result = hello_with_recovery(&mut engine).await?;
    println!("Result: {}", result);
    Ok(())
}
