//! Retry logic with exponential backoff.
//!
//! Two kinds of failure are retried. Connection failures and gateway
//! responses (502/503/504) are always retried. Beyond that a
//! request may carry a [`RetryPredicate`] that looks at a response the
//! server did send and asks for another attempt, such as the descriptor
//! merge race on repository writes.

use crate::error::{Error, Result};
use crate::transport::HttpResponse;
use crate::types::RetryConfig;
use declarative::CancellationToken;
use regex::Regex;
use std::sync::LazyLock;
use std::thread;

/// Decides whether a received response should be retried.
pub trait RetryPredicate: Send + Sync {
    fn should_retry(&self, response: &HttpResponse) -> bool;
}

impl<F> RetryPredicate for F
where
    F: Fn(&HttpResponse) -> bool + Send + Sync,
{
    fn should_retry(&self, response: &HttpResponse) -> bool {
        self(response)
    }
}

static MERGE_RACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(".*Could not merge and save new descriptor.*").expect("valid regex")
});

/// Retry when the server lost a race merging concurrent configuration
/// descriptor writes.
///
/// Repository writes replace the whole payload, so repeating one converges
/// on the same state.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeRace;

impl RetryPredicate for MergeRace {
    fn should_retry(&self, response: &HttpResponse) -> bool {
        MERGE_RACE.is_match(&response.body)
    }
}

/// Retry on one specific status code.
#[derive(Debug, Clone, Copy)]
pub struct StatusIs(pub u16);

impl RetryPredicate for StatusIs {
    fn should_retry(&self, response: &HttpResponse) -> bool {
        response.status == self.0
    }
}

/// Gateway errors a proxy or load balancer returns while the server restarts
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 502..=504)
}

/// Execute a request with retry logic.
///
/// `send` receives the 0-indexed attempt number. A response the predicate
/// rejects is retried until attempts run out; the last such response is
/// then returned as-is so the caller reports the server's own error.
pub fn with_retry<F>(
    config: &RetryConfig,
    cancel: Option<&CancellationToken>,
    predicate: Option<&dyn RetryPredicate>,
    what: &str,
    mut send: F,
) -> Result<HttpResponse>
where
    F: FnMut(u32) -> Result<HttpResponse>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(Error::Cancelled);
        }

        let last = attempt + 1 >= max_attempts;
        let reason = match send(attempt) {
            Ok(response) if !last && is_transient_status(response.status) => {
                format!("status {}", response.status)
            }
            Ok(response) => match predicate {
                Some(p) if !last && p.should_retry(&response) => {
                    format!("status {} matched retry condition", response.status)
                }
                _ => return Ok(response),
            },
            Err(e) if !last && e.is_retryable() => e.to_string(),
            Err(e) => return Err(e),
        };

        let delay = config.delay_for_attempt(attempt);
        log::warn!(
            "{what}: attempt {}/{max_attempts} failed ({}), retrying in {}ms",
            attempt + 1,
            reason.trim(),
            delay.as_millis()
        );
        thread::sleep(delay);
        attempt += 1;
    }
}
