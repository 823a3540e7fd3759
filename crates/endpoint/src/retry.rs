// SPDX-License-Identifier: Apache-2.0

//! Transient-failure retry for transport-level endpoint calls.

use crate::error::EndpointError;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Run `op` up to `attempts` times, sleeping `backoff` between tries.
///
/// Protocol and stats-shape errors are not retried (repeating them cannot
/// help); only [`EndpointError::Unreachable`] counts as transient. When
/// the budget is exhausted the last error is upgraded to an
/// `Unreachable` carrying the total attempt count, which callers treat as
/// "mark this tenant stale and skip the cycle".
pub fn with_retries<T>(
    attempts: u32,
    backoff: Duration,
    mut op: impl FnMut() -> Result<T, EndpointError>,
) -> Result<T, EndpointError> {
    let attempts = attempts.max(1);
    let mut last_reason = String::new();
    for attempt in 1..=attempts {
        match op() {
            Ok(v) => return Ok(v),
            Err(EndpointError::Unreachable { reason, .. }) => {
                warn!("endpoint call failed (attempt {attempt}/{attempts}): {reason}");
                last_reason = reason;
                if attempt < attempts {
                    thread::sleep(backoff);
                }
            }
            Err(other) => return Err(other),
        }
    }
    Err(EndpointError::Unreachable {
        attempts,
        reason: last_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn transient(reason: &str) -> EndpointError {
        EndpointError::Unreachable {
            attempts: 1,
            reason: reason.to_string(),
        }
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let calls = Cell::new(0u32);
        let result = with_retries(3, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(transient("connection reset"))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn exhaustion_reports_total_attempts() {
        let result: Result<(), _> =
            with_retries(2, Duration::ZERO, || Err(transient("refused")));
        match result {
            Err(EndpointError::Unreachable { attempts, reason }) => {
                assert_eq!(attempts, 2);
                assert_eq!(reason, "refused");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn protocol_errors_are_not_retried() {
        let calls = Cell::new(0u32);
        let result: Result<(), _> = with_retries(5, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            Err(EndpointError::Protocol {
                message: "garbage frame".to_string(),
            })
        });
        assert!(matches!(result, Err(EndpointError::Protocol { .. })));
        assert_eq!(calls.get(), 1);
    }
}
