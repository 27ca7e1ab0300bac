//! Reporting for event handler failures.

use super::error::HandlerError;

/// One event handler that failed during a publish.
#[derive(Debug)]
pub struct ListenerFailure {
    pub event: &'static str,
    pub handler: &'static str,
    pub error: HandlerError,
}

/// Receives every event handler failure.
///
/// Failures never unwind into the publisher, so this is where they become
/// visible. The default sink logs through `tracing`.
pub trait ErrorSink: Send + Sync {
    fn report(&self, failure: &ListenerFailure);
}

/// Logs failures at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, failure: &ListenerFailure) {
        tracing::error!(
            event = failure.event,
            handler = failure.handler,
            error = %failure.error,
            "event handler failed"
        );
    }
}

impl<F> ErrorSink for F
where
    F: Fn(&ListenerFailure) + Send + Sync,
{
    fn report(&self, failure: &ListenerFailure) {
        self(failure)
    }
}

/// Outcome of a `publish` call.
#[must_use = "event handler failures are reported here"]
#[derive(Debug, Default)]
pub struct PublishReport {
    /// Successful handler invocations, including follow-up events.
    pub delivered: usize,
    pub failures: Vec<ListenerFailure>,
}

impl PublishReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// `Ok(delivered)` when every handler succeeded.
    pub fn into_result(self) -> Result<usize, Vec<ListenerFailure>> {
        if self.failures.is_empty() {
            Ok(self.delivered)
        } else {
            Err(self.failures)
        }
    }
}
