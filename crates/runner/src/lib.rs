//! Process supervisor for the bridge.
//!
//! Long-running tasks (the MQTT listener, the metrics endpoint) are registered
//! as app processes and share one cancellation token. The first task to fail,
//! or a SIGINT/SIGTERM, cancels the rest. Closers (telemetry flush) then run
//! under a timeout and the process exits with 0 on a clean stop or 1 when a
//! task failed.
//!
//! ```no_run
//! use sensor_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     Runner::new()
//!         .with_app_process(|shutdown| async move {
//!             shutdown.cancelled().await;
//!             Ok(())
//!         })
//!         .with_closer(|| async move {
//!             tracing::info!("flushing telemetry");
//!             Ok(())
//!         })
//!         .with_closer_timeout(Duration::from_secs(5))
//!         .run()
//!         .await;
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type BoxFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Long-running task; returns when cancelled or on a fatal error
pub type AppProcess = Box<dyn FnOnce(CancellationToken) -> BoxFuture + Send>;

/// Cleanup step run once every app process has stopped
pub type Closer = Box<dyn FnOnce() -> BoxFuture + Send>;

const DEFAULT_CLOSER_TIMEOUT: Duration = Duration::from_secs(10);

/// How the supervised processes came to a stop
#[derive(Debug)]
pub enum RunOutcome {
    /// Shutdown was requested, or every process returned Ok
    Stopped,
    /// A process failed or panicked
    Failed(anyhow::Error),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Stopped => 0,
            RunOutcome::Failed(_) => 1,
        }
    }
}

pub struct Runner {
    app_processes: Vec<AppProcess>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    shutdown_token: CancellationToken,
    handle_signals: bool,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            app_processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: DEFAULT_CLOSER_TIMEOUT,
            shutdown_token: CancellationToken::new(),
            handle_signals: true,
        }
    }

    /// Register a task that runs until the shared token is cancelled.
    ///
    /// An `Err` from any task cancels all the others.
    pub fn with_app_process<F, Fut>(mut self, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.app_processes.push(Box::new(move |token| {
            let fut: BoxFuture = Box::pin(process(token));
            fut
        }));
        self
    }

    /// Register a cleanup step. Closers run concurrently after the app
    /// processes stop, whatever the reason, and one failing does not
    /// prevent the others.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Box::new(move || {
            let fut: BoxFuture = Box::pin(closer());
            fut
        }));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Use an externally owned shutdown token
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = token;
        self
    }

    /// Skip installing SIGINT/SIGTERM handlers
    pub fn without_signal_handlers(mut self) -> Self {
        self.handle_signals = false;
        self
    }

    /// Supervise until stopped, run the closers, then exit the process.
    pub async fn run(self) {
        let outcome = self.run_until_stopped().await;
        match &outcome {
            RunOutcome::Stopped => info!("sensor bridge stopped"),
            RunOutcome::Failed(err) => error!("sensor bridge exiting after failure: {:#}", err),
        }
        std::process::exit(outcome.exit_code());
    }

    /// Supervise until stopped and run the closers, without exiting.
    pub async fn run_until_stopped(self) -> RunOutcome {
        let token = self.shutdown_token;

        if self.handle_signals {
            spawn_signal_listeners(token.clone());
        }

        let mut processes = JoinSet::new();
        for process in self.app_processes {
            processes.spawn(process(token.clone()));
        }

        let mut failure = None;
        while let Some(joined) = processes.join_next().await {
            match joined {
                Ok(Ok(())) => debug!("app process finished"),
                Ok(Err(err)) => {
                    if token.is_cancelled() {
                        warn!("app process failed during shutdown: {:#}", err);
                    } else {
                        error!("app process failed: {:#}", err);
                        failure = Some(err);
                        token.cancel();
                    }
                }
                Err(join_err) => {
                    error!("app process panicked: {}", join_err);
                    if !token.is_cancelled() {
                        failure = Some(anyhow::anyhow!("app process panicked: {}", join_err));
                        token.cancel();
                    }
                }
            }

            if token.is_cancelled() {
                break;
            }
        }

        // Anything still running gets aborted
        processes.shutdown().await;

        run_closers(self.closers, self.closer_timeout).await;

        match failure {
            Some(err) => RunOutcome::Failed(err),
            None => RunOutcome::Stopped,
        }
    }
}

fn spawn_signal_listeners(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received SIGINT, shutting down");
                ctrl_c_token.cancel();
            }
            Err(err) => error!("failed to listen for SIGINT: {}", err),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received SIGTERM, shutting down");
                token.cancel();
            }
            Err(err) => error!("failed to listen for SIGTERM: {}", err),
        }
    });
}

async fn run_closers(closers: Vec<Closer>, timeout: Duration) {
    if closers.is_empty() {
        return;
    }

    info!(count = closers.len(), ?timeout, "running closers");

    let mut set = JoinSet::new();
    for closer in closers {
        set.spawn(closer());
    }

    let drain = async {
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(())) => debug!("closer finished"),
                Ok(Err(err)) => error!("closer failed: {:#}", err),
                Err(join_err) => error!("closer panicked: {}", join_err),
            }
        }
    };

    if tokio::time::timeout(timeout, drain).await.is_err() {
        error!("closers timed out after {:?}", timeout);
        set.abort_all();
    }
}
