//! Background task supervision for a running node.
//!
//! [`NodeTasks`] owns the node's long-running tasks (the replication receiver
//! and the periodic sweeper), hands each a shutdown receiver and joins them on
//! stop. Tasks that outlive the stop deadline are aborted and reported by name.

use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub struct NodeTasks {
    shutdown: broadcast::Sender<()>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl NodeTasks {
    pub fn new() -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            shutdown,
            handles: Vec::new(),
        }
    }

    /// Spawn `task` with a receiver that fires when the node stops.
    pub fn spawn<F, Fut>(&mut self, name: &'static str, task: F)
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task(self.shutdown.subscribe()));
        tracing::debug!(task = name, "spawned node task");
        self.handles.push((name, handle));
    }

    /// Run `tick` every `period` until the node stops. The first tick fires
    /// one period after spawning.
    pub fn spawn_periodic<F>(&mut self, name: &'static str, period: Duration, mut tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.spawn(name, move |mut shutdown| async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => {
                        tracing::info!(task = name, "periodic task shutting down");
                        break;
                    }
                    _ = interval.tick() => tick(),
                }
            }
        });
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Signal every task and join them, sharing one `timeout` between all.
    ///
    /// Returns the names of tasks that had to be aborted.
    pub async fn shutdown(&mut self, timeout: Duration) -> Vec<&'static str> {
        let _ = self.shutdown.send(());
        let deadline = tokio::time::Instant::now() + timeout;
        let mut aborted = Vec::new();
        for (name, mut handle) in self.handles.drain(..) {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_panic() => tracing::error!(task = name, error = %e, "node task panicked"),
                Ok(Err(_)) => {}
                Err(_) => {
                    tracing::warn!(task = name, ?timeout, "node task did not stop in time, aborting");
                    handle.abort();
                    aborted.push(name);
                }
            }
        }
        aborted
    }
}

impl Default for NodeTasks {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for SIGINT, or SIGTERM on unix.
pub async fn wait_for_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = signal::ctrl_c() => tracing::info!("received SIGINT"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
