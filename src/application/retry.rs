//! Bounded retry schedules for settle-and-check page interactions.

use std::future::Future;
use std::time::Duration;

use crate::domain::Result;

/// Pause after a page error before the next attempt.
pub const ERROR_PAUSE: Duration = Duration::from_millis(500);

/// A bounded retry schedule with linearly increasing settle delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Settle delay of the first attempt.
    pub base_delay: Duration,
    /// Added to the settle delay for every further attempt.
    pub backoff_step: Duration,
}

impl RetryPolicy {
    /// Opening a Claude artifact side panel.
    pub const ARTIFACT_PANEL: Self = Self::new(3, 1500, 500);
    /// Opening a Claude pasted-content side panel.
    pub const PASTED_PANEL: Self = Self::new(3, 1500, 500);
    /// Claude action-bar copy of a whole assistant message.
    pub const ACTION_BAR_COPY: Self = Self::new(3, 100, 100);
    /// Polling for the Gemini edit textarea.
    pub const TEXTAREA_POLL: Self = Self::new(50, 100, 0);

    /// Creates a policy from millisecond values.
    #[must_use]
    pub const fn new(max_attempts: u32, base_ms: u64, step_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(base_ms),
            backoff_step: Duration::from_millis(step_ms),
        }
    }

    /// Settle delay for the zero-based `attempt`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay + self.backoff_step * attempt
    }

    /// `(attempt, settle delay)` pairs for every attempt.
    pub fn schedule(&self) -> impl Iterator<Item = (u32, Duration)> + '_ {
        (0..self.max_attempts).map(|attempt| (attempt, self.delay_for(attempt)))
    }

    /// Whether `attempt` is the last one the policy allows.
    #[must_use]
    pub const fn is_last(&self, attempt: u32) -> bool {
        attempt + 1 >= self.max_attempts
    }
}

/// Verdict of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    /// The attempt produced a value.
    Done(T),
    /// Nothing yet; try again after the next settle delay.
    Retry,
    /// Further attempts cannot succeed.
    GiveUp,
}

impl RetryPolicy {
    /// Runs `attempt` until it yields a value, gives up or the schedule is
    /// exhausted.
    ///
    /// Each call receives the zero-based attempt number and its settle
    /// delay. An error pauses for [`ERROR_PAUSE`] and is only returned when
    /// it happens on the last attempt.
    ///
    /// # Errors
    /// Returns the error of the last attempt if that attempt failed.
    pub async fn run<T, F, Fut>(&self, what: &str, mut attempt: F) -> Result<Option<T>>
    where
        F: FnMut(u32, Duration) -> Fut,
        Fut: Future<Output = Result<Attempt<T>>>,
    {
        for (n, delay) in self.schedule() {
            match attempt(n, delay).await {
                Ok(Attempt::Done(value)) => return Ok(Some(value)),
                Ok(Attempt::GiveUp) => return Ok(None),
                Ok(Attempt::Retry) => {
                    tracing::debug!(what, attempt = n + 1, "Nothing captured, retrying");
                }
                Err(e) if self.is_last(n) => return Err(e),
                Err(e) => {
                    tracing::debug!(what, attempt = n + 1, error = %e, "Attempt failed");
                    tokio::time::sleep(ERROR_PAUSE).await;
                }
            }
        }
        tracing::debug!(what, attempts = self.max_attempts, "Retries exhausted");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AppError;

    #[test]
    fn test_panel_backoff() {
        let delays: Vec<_> = RetryPolicy::ARTIFACT_PANEL
            .schedule()
            .map(|(_, d)| d.as_millis())
            .collect();
        assert_eq!(delays, vec![1500, 2000, 2500]);
    }

    #[test]
    fn test_poll_has_no_backoff() {
        let policy = RetryPolicy::TEXTAREA_POLL;
        assert_eq!(policy.schedule().count(), 50);
        assert_eq!(policy.delay_for(49), Duration::from_millis(100));
        assert!(policy.is_last(49));
        assert!(!policy.is_last(48));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_retries_until_done() {
        let mut seen = Vec::new();
        let result = RetryPolicy::PASTED_PANEL
            .run("panel", |n, delay| {
                seen.push(delay.as_millis());
                async move {
                    Ok::<_, AppError>(if n == 1 { Attempt::Done("ok") } else { Attempt::Retry })
                }
            })
            .await
            .unwrap();
        assert_eq!(result, Some("ok"));
        assert_eq!(seen, vec![1500, 2000]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_returns_last_error() {
        let result: Result<Option<()>> = RetryPolicy::ACTION_BAR_COPY
            .run("copy", |_, _| async { Err::<Attempt<()>, _>(AppError::page("gone")) })
            .await;
        assert!(matches!(result, Err(AppError::Page { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_gives_up_early() {
        let mut calls = 0;
        let result: Option<()> = RetryPolicy::ARTIFACT_PANEL
            .run("artifact", |_, _| {
                calls += 1;
                async { Ok::<_, AppError>(Attempt::GiveUp) }
            })
            .await
            .unwrap();
        assert_eq!(result, None);
        assert_eq!(calls, 1);
    }
}
