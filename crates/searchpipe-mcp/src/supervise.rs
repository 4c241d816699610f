//! Process-level supervision.
//!
//! A bounded restart-with-backoff policy around the serve loop. This is
//! deliberately separate from the knowledge client's per-call transport
//! retry: one policy guards a single outbound call, the other guards the
//! whole server process.

use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct RestartPolicy {
    /// How many times to restart after a failure before giving up.
    pub max_restarts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RestartPolicy {
    /// Backoff before restart number `restart` (0-based): doubles each time,
    /// capped.
    pub fn backoff_for(&self, restart: u32) -> Duration {
        let factor = 2u32.saturating_pow(restart);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Run `serve` under the restart policy.
///
/// A clean exit (the transport closed) returns `Ok` immediately and is not
/// restarted. Failures are restarted until the budget is spent, then the
/// last error is returned after a final diagnostic.
pub async fn run_supervised<F, Fut>(
    policy: RestartPolicy,
    name: &str,
    mut serve: F,
) -> anyhow::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let mut restarts = 0;
    loop {
        match serve().await {
            Ok(()) => {
                info!(server = name, "server exited cleanly");
                return Ok(());
            }
            Err(e) if restarts < policy.max_restarts => {
                let pause = policy.backoff_for(restarts);
                restarts += 1;
                warn!(
                    server = name,
                    error = %e,
                    restart = restarts,
                    max_restarts = policy.max_restarts,
                    "server failed, restarting in {:?}",
                    pause
                );
                tokio::time::sleep(pause).await;
            }
            Err(e) => {
                error!(
                    server = name,
                    error = %e,
                    "server failed after {} restarts, giving up",
                    policy.max_restarts
                );
                return Err(e.context(format!(
                    "gave up after {} restarts",
                    policy.max_restarts
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RestartPolicy {
        RestartPolicy {
            max_restarts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RestartPolicy {
            max_restarts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        };
        assert_eq!(policy.backoff_for(0), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(10), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn clean_exit_is_not_restarted() {
        let calls = AtomicU32::new(0);
        let out = run_supervised(fast_policy(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;
        assert!(out.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_exhaust_the_budget_then_error() {
        let calls = AtomicU32::new(0);
        let out = run_supervised(fast_policy(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow::anyhow!("boom")) }
        })
        .await;
        assert!(out.is_err());
        // Initial attempt plus max_restarts restarts.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn recovery_after_one_failure_returns_ok() {
        let calls = AtomicU32::new(0);
        let out = run_supervised(fast_policy(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(anyhow::anyhow!("transient"))
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert!(out.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
