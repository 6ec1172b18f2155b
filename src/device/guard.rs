use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::error::IdentityError;

/// Runs one blocking query with an upper bound on how long the caller waits.
///
/// The query goes to tokio's blocking pool and reports back over a oneshot
/// channel owned by that single call. When the deadline passes first the
/// task is left to finish on its own; whatever it sends is dropped.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutGuard {
    deadline: Duration,
}

impl Default for TimeoutGuard {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DEADLINE)
    }
}

impl TimeoutGuard {
    pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(3);

    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub async fn run<T, F>(&self, identifier: &'static str, query: F) -> Result<T, IdentityError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, IdentityError> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        tokio::task::spawn_blocking(move || {
            // Receiver is gone once the caller timed out.
            if tx.send(query()).is_err() {
                debug!("{} finished after its caller gave up, result dropped", identifier);
            }
        });

        match timeout(self.deadline, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(IdentityError::query_failed(
                identifier,
                "query task ended without a result",
            )),
            Err(_) => {
                warn!("⏱️  {} query exceeded {:?}, abandoning it", identifier, self.deadline);
                Err(IdentityError::QueryTimeout {
                    identifier,
                    deadline: self.deadline,
                })
            }
        }
    }
}
