//! Backoff delay: `initial_delay * multiplier^(attempt - 1)`, optionally capped.

use std::time::Duration;

use super::policy::RetryPolicy;

/// Largest nanosecond count representable through `Duration::from_nanos`.
const MAX_NANOS: f64 = u64::MAX as f64;

/// Wait inserted after failed attempt `attempt` (1-based; 0 is treated as 1).
///
/// Pure and total: overflow saturates instead of panicking, and the result is
/// clamped to the policy's `max_delay` when one is set.
pub fn delay(attempt: u32, policy: &RetryPolicy) -> Duration {
    let raw = if policy.initial_delay().is_zero() {
        Duration::ZERO
    } else {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let nanos = policy.initial_delay().as_nanos() as f64 * policy.multiplier().powi(exp);
        if nanos.is_finite() && nanos < MAX_NANOS {
            Duration::from_nanos(nanos.round() as u64)
        } else {
            Duration::MAX
        }
    };
    match policy.max_delay() {
        Some(cap) => raw.min(cap),
        None => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(initial_ms: u64, multiplier: f64) -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(20)
            .initial_delay(Duration::from_millis(initial_ms))
            .multiplier(multiplier)
            .build()
            .unwrap()
    }

    #[test]
    fn doubles_from_initial_delay() {
        let p = policy(100, 2.0);
        assert_eq!(delay(1, &p), Duration::from_millis(100));
        assert_eq!(delay(2, &p), Duration::from_millis(200));
        assert_eq!(delay(3, &p), Duration::from_millis(400));
        assert_eq!(delay(4, &p), Duration::from_millis(800));
    }

    #[test]
    fn multiplier_one_is_fixed_delay() {
        let p = policy(250, 1.0);
        for attempt in 1..10 {
            assert_eq!(delay(attempt, &p), Duration::from_millis(250));
        }
    }

    #[test]
    fn zero_initial_delay_never_waits() {
        let p = policy(0, 3.0);
        assert_eq!(delay(1, &p), Duration::ZERO);
        assert_eq!(delay(u32::MAX, &p), Duration::ZERO);
    }

    #[test]
    fn non_decreasing_across_attempts() {
        for (initial, multiplier) in [(1, 1.0), (10, 1.5), (100, 2.0), (7, 3.3)] {
            let p = policy(initial, multiplier);
            let mut prev = Duration::ZERO;
            for attempt in 1..64 {
                let d = delay(attempt, &p);
                assert!(d >= prev, "delay({}) decreased for {:?}", attempt, p);
                prev = d;
            }
        }
    }

    #[test]
    fn capped_by_max_delay() {
        let p = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(100))
            .multiplier(2.0)
            .max_delay(Duration::from_millis(300))
            .build()
            .unwrap();
        assert_eq!(delay(2, &p), Duration::from_millis(200));
        assert_eq!(delay(3, &p), Duration::from_millis(300));
        assert_eq!(delay(50, &p), Duration::from_millis(300));
    }

    #[test]
    fn huge_attempt_saturates() {
        let p = policy(100, 2.0);
        assert_eq!(delay(u32::MAX, &p), Duration::MAX);
    }
}
