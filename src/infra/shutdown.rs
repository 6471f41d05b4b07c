//! Process-wide shutdown requests.
//!
//! Signals, panics and long-lived tasks that stop unexpectedly all funnel into one
//! [`Shutdown`], so the server drains the same way whatever started it.

use std::{fmt, future::Future, sync::Arc};

use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal,
    Panic,
    TaskExited(&'static str),
}

impl ShutdownReason {
    /// Anything but an operator signal ends the process with a failure status.
    pub fn is_fatal(self) -> bool {
        !matches!(self, ShutdownReason::Signal)
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal => f.write_str("signal"),
            ShutdownReason::Panic => f.write_str("panic"),
            ShutdownReason::TaskExited(task) => write!(f, "{task} exited"),
        }
    }
}

/// Cloneable handle; the first recorded reason wins.
#[derive(Debug, Clone)]
pub struct Shutdown {
    sender: Arc<watch::Sender<Option<ShutdownReason>>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Record `reason`. Returns `false` when shutdown was already requested.
    pub fn request(&self, reason: ShutdownReason) -> bool {
        let recorded = self.sender.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
        if recorded {
            info!(
                target = "codefolio::shutdown",
                reason = %reason,
                "shutdown requested"
            );
        }
        recorded
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.sender.borrow()
    }

    /// Resolves once shutdown has been requested, immediately if it already was.
    pub async fn requested(&self) -> ShutdownReason {
        let mut receiver = self.sender.subscribe();
        let reason = match receiver.wait_for(Option::is_some).await {
            Ok(reason) => *reason,
            Err(_) => None,
        };
        match reason {
            Some(reason) => reason,
            None => std::future::pending().await,
        }
    }
}

/// Spawn a task meant to live as long as the process. If it ever returns, request shutdown.
pub fn supervise<F>(name: &'static str, shutdown: Shutdown, task: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        task.await;
        error!(
            target = "codefolio::shutdown",
            task = name,
            "background task stopped unexpectedly"
        );
        shutdown.request(ShutdownReason::TaskExited(name));
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn first_reason_wins() {
        let shutdown = Shutdown::new();
        assert_eq!(shutdown.reason(), None);

        assert!(shutdown.request(ShutdownReason::Panic));
        assert!(!shutdown.request(ShutdownReason::Signal));
        assert_eq!(shutdown.reason(), Some(ShutdownReason::Panic));

        let reason = timeout(Duration::from_secs(1), shutdown.requested())
            .await
            .expect("already requested");
        assert_eq!(reason, ShutdownReason::Panic);
    }

    #[tokio::test]
    async fn waiters_wake_on_request_from_a_clone() {
        let shutdown = Shutdown::new();
        let waiter = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { shutdown.requested().await }
        });

        tokio::task::yield_now().await;
        shutdown.clone().request(ShutdownReason::Signal);

        let reason = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .unwrap();
        assert_eq!(reason, ShutdownReason::Signal);
        assert!(!reason.is_fatal());
    }

    #[tokio::test]
    async fn supervised_task_exit_requests_shutdown() {
        let shutdown = Shutdown::new();
        supervise("job monitor", shutdown.clone(), async {})
            .await
            .unwrap();

        assert_eq!(
            shutdown.reason(),
            Some(ShutdownReason::TaskExited("job monitor"))
        );
        assert!(ShutdownReason::TaskExited("job monitor").is_fatal());
    }
}
