use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::errors::ArchiveError;

/// Deadline and cancellation applied to every network call.
#[derive(Debug, Clone)]
pub struct CallGuard {
    timeout: Duration,
    cancel: CancellationToken,
}

impl CallGuard {
    #[must_use]
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self { timeout, cancel }
    }

    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Await `fut`, giving up when the deadline passes or the run is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` or `Timeout`, or whatever `fut` itself returned.
    pub async fn run<F, T>(&self, what: &str, fut: F) -> Result<T, ArchiveError>
    where
        F: Future<Output = Result<T, ArchiveError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(ArchiveError::Cancelled(format!("{what} not started")));
        }

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                warn!("{} cancelled", what);
                Err(ArchiveError::Cancelled(format!("{what} interrupted")))
            }
            result = tokio::time::timeout(self.timeout, fut) => match result {
                Ok(inner) => inner,
                Err(_) => {
                    warn!("{} exceeded {:?}", what, self.timeout);
                    Err(ArchiveError::Timeout(format!(
                        "{what} did not complete within {}s",
                        self.timeout.as_secs_f64()
                    )))
                }
            },
        }
    }
}
