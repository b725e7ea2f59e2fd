//! Exponential backoff retry
//!
//! The retry protocol is an explicit state machine:
//!
//! ```text
//! Attempting(n) --ok--------------------------> Succeeded
//! Attempting(n) --err, n < max_attempts-------> Waiting(n)
//! Attempting(n) --err, n == max_attempts------> Failed
//! Waiting(n)    --delay_after(n) elapsed------> Attempting(n + 1)
//! ```
//!
//! With the default schedule (1s base, 6 attempts) the waits are
//! 1s, 2s, 4s, 8s, 16s. [`run_with_retry`] drives the machine with
//! `tokio::time::sleep`; the transitions themselves do not depend on tokio.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default delay before the first retry
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default total attempts (initial attempt + 5 retries)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;

/// Backoff parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffSchedule {
    /// Wait after the first failed attempt; doubles after every further failure
    pub base_delay: Duration,
    /// Total attempts including the first one (at least 1)
    pub max_attempts: u32,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl BackoffSchedule {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Wait after failed attempt `attempt` (1-based): `base * 2^(attempt - 1)`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Every wait of a fully failing run, in order
    pub fn delays(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|n| self.delay_after(n)).collect()
    }
}

/// State of one retried operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Attempt `n` (1-based) is in flight
    Attempting(u32),
    /// Attempt `n` failed; waiting before attempt `n + 1`
    Waiting(u32),
    Succeeded,
    Failed,
}

impl RetryState {
    pub fn start() -> Self {
        RetryState::Attempting(1)
    }

    /// Transition after an attempt finished
    pub fn on_attempt(self, succeeded: bool, schedule: &BackoffSchedule) -> Self {
        match self {
            RetryState::Attempting(_) if succeeded => RetryState::Succeeded,
            RetryState::Attempting(n) if n < schedule.max_attempts => RetryState::Waiting(n),
            RetryState::Attempting(_) => RetryState::Failed,
            other => other,
        }
    }

    /// Transition after the backoff delay elapsed
    pub fn on_wake(self) -> Self {
        match self {
            RetryState::Waiting(n) => RetryState::Attempting(n + 1),
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Succeeded | RetryState::Failed)
    }
}

/// Final result of a retried operation
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Succeeded { value: T, attempts: u32 },
    /// `last_error` is the error of the final attempt
    Failed { last_error: Option<E>, attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts, .. } | RetryOutcome::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Run `operation` until it succeeds or the schedule is exhausted
///
/// # Arguments
/// * `operation_name` - Name for logging
/// * `schedule` - Backoff parameters
/// * `operation` - Called with the 1-based attempt number
pub async fn run_with_retry<F, Fut, T, E>(
    operation_name: &str,
    schedule: &BackoffSchedule,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut state = RetryState::start();
    let mut attempts = 0;
    let mut value = None;
    let mut last_error = None;

    while !state.is_terminal() {
        state = match state {
            RetryState::Attempting(n) => {
                attempts = n;
                let result = operation(n).await;
                let next = state.on_attempt(result.is_ok(), schedule);
                match result {
                    Ok(v) => value = Some(v),
                    Err(e) => {
                        warn!(
                            operation = operation_name,
                            attempt = n,
                            max_attempts = schedule.max_attempts,
                            error = %e,
                            "Attempt failed"
                        );
                        last_error = Some(e);
                    }
                }
                next
            }
            RetryState::Waiting(n) => {
                let delay = schedule.delay_after(n);
                debug!(
                    operation = operation_name,
                    attempt = n,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before retry"
                );
                tokio::time::sleep(delay).await;
                state.on_wake()
            }
            terminal => terminal,
        };
    }

    match value {
        Some(value) => {
            if attempts > 1 {
                info!(operation = operation_name, attempts, "Succeeded after retry");
            }
            RetryOutcome::Succeeded { value, attempts }
        }
        None => {
            warn!(operation = operation_name, attempts, "All attempts failed");
            RetryOutcome::Failed { last_error, attempts }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_default_delays() {
        let schedule = BackoffSchedule::default();
        assert_eq!(
            schedule.delays(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(16),
            ]
        );
    }

    #[test]
    fn test_transitions() {
        let schedule = BackoffSchedule::new(Duration::from_millis(10), 2);
        let state = RetryState::start();
        assert_eq!(state, RetryState::Attempting(1));

        let state = state.on_attempt(false, &schedule);
        assert_eq!(state, RetryState::Waiting(1));
        let state = state.on_wake();
        assert_eq!(state, RetryState::Attempting(2));
        assert_eq!(state.on_attempt(false, &schedule), RetryState::Failed);
        assert_eq!(state.on_attempt(true, &schedule), RetryState::Succeeded);

        // Terminal states are absorbing
        assert_eq!(RetryState::Failed.on_wake(), RetryState::Failed);
        assert_eq!(RetryState::Succeeded.on_attempt(false, &schedule), RetryState::Succeeded);
    }

    #[test]
    fn test_zero_attempts_is_raised_to_one() {
        let schedule = BackoffSchedule::new(Duration::from_secs(1), 0);
        assert_eq!(schedule.max_attempts, 1);
        assert!(schedule.delays().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_short_circuits() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let outcome = run_with_retry("test_op", &BackoffSchedule::default(), |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(42)
            }
        })
        .await;

        assert!(matches!(outcome, RetryOutcome::Succeeded { value: 42, attempts: 1 }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_total_wait() {
        let start = tokio::time::Instant::now();

        let outcome = run_with_retry("test_op", &BackoffSchedule::default(), |n| async move {
            Err::<(), _>(format!("failure {}", n))
        })
        .await;

        match outcome {
            RetryOutcome::Failed { last_error, attempts } => {
                assert_eq!(attempts, 6);
                assert_eq!(last_error.as_deref(), Some("failure 6"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        // 1 + 2 + 4 + 8 + 16 seconds of backoff
        assert_eq!(start.elapsed(), Duration::from_secs(31));
    }
}
