use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::app::error::ProvisionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    Connectivity,
    Boot,
    Package,
    ScreenText,
}

impl fmt::Display for WaitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connectivity => "connectivity",
            Self::Boot => "boot",
            Self::Package => "package",
            Self::ScreenText => "screen text",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Satisfied,
    Pending,
    /// The probe itself failed; counts as "not yet".
    Errored(String),
}

/// Polls `predicate` every `interval` until it is satisfied or `max` elapses.
///
/// Returns the number of polls issued. A satisfied first poll returns
/// immediately without sleeping.
pub fn wait_until<F>(
    phase: WaitPhase,
    max: Duration,
    interval: Duration,
    mut predicate: F,
) -> Result<u32, ProvisionError>
where
    F: FnMut(Duration) -> PollOutcome,
{
    let start = Instant::now();
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        match predicate(start.elapsed()) {
            PollOutcome::Satisfied => return Ok(attempts),
            PollOutcome::Pending => {}
            PollOutcome::Errored(message) => {
                debug!(%phase, attempt = attempts, error = %message, "poll attempt failed");
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= max {
            return Err(ProvisionError::Timeout { phase, elapsed });
        }
        std::thread::sleep(interval.min(max - elapsed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_after_one_poll_when_immediately_satisfied() {
        let mut calls = 0;
        let started = Instant::now();
        let attempts = wait_until(
            WaitPhase::Connectivity,
            Duration::from_secs(5),
            Duration::from_secs(2),
            |_| {
                calls += 1;
                PollOutcome::Satisfied
            },
        )
        .expect("satisfied");

        assert_eq!(attempts, 1);
        assert_eq!(calls, 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn stops_polling_as_soon_as_satisfied() {
        let mut calls = 0;
        let started = Instant::now();
        let attempts = wait_until(
            WaitPhase::Boot,
            Duration::from_secs(10),
            Duration::from_millis(10),
            |_| {
                calls += 1;
                if calls == 3 {
                    PollOutcome::Satisfied
                } else {
                    PollOutcome::Pending
                }
            },
        )
        .expect("satisfied on third poll");

        assert_eq!(attempts, 3);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn times_out_with_elapsed_at_least_budget() {
        let max = Duration::from_millis(60);
        let err = wait_until(WaitPhase::Package, max, Duration::from_millis(15), |_| {
            PollOutcome::Pending
        })
        .expect_err("never satisfied");

        match err {
            ProvisionError::Timeout { phase, elapsed } => {
                assert_eq!(phase, WaitPhase::Package);
                assert!(elapsed >= max, "elapsed {elapsed:?} < {max:?}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn errored_polls_are_retried_until_satisfied() {
        let mut calls = 0;
        let attempts = wait_until(
            WaitPhase::Connectivity,
            Duration::from_secs(5),
            Duration::from_millis(5),
            |_| {
                calls += 1;
                if calls < 3 {
                    PollOutcome::Errored("adb: device offline".to_string())
                } else {
                    PollOutcome::Satisfied
                }
            },
        )
        .expect("recovered");
        assert_eq!(attempts, 3);
    }
}
