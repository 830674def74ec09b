//! Runs the collector's long-lived processes side by side and shuts them down together.
//!
//! - every process gets a clone of one `CancellationToken`
//! - SIGINT/SIGTERM, or the first process error, cancels the token
//! - closers run afterwards under a timeout, whatever the outcome
//!
//! # Example
//!
//! ```no_run
//! use collector_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let outcome = Runner::new()
//!         .with_named_process("ticker", |ctx| async move {
//!             ctx.cancelled().await;
//!             Ok(())
//!         })
//!         .with_closer(|| async move { Ok(()) })
//!         .with_closer_timeout(Duration::from_secs(5))
//!         .run()
//!         .await;
//!
//!     std::process::exit(outcome.exit_code());
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Boxed future every process and closer resolves to
pub type BoxedTask = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Long-running process; must return once the token is cancelled
pub type AppProcess = Box<dyn FnOnce(CancellationToken) -> BoxedTask + Send>;

/// Cleanup function run after all processes stopped
pub type Closer = Box<dyn FnOnce() -> BoxedTask + Send>;

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// Every process stopped after cancellation or finished on its own
    Stopped,
    /// A process failed; the named process and its error
    Failed { process: String, error: anyhow::Error },
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Stopped => 0,
            RunOutcome::Failed { .. } => 1,
        }
    }
}

pub struct Runner {
    processes: Vec<(String, AppProcess)>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
    handle_signals: bool,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// New runner with a 10 second closer timeout and signal handling enabled
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
            handle_signals: true,
        }
    }

    pub fn with_named_process<N, F, Fut>(mut self, name: N, process: F) -> Self
    where
        N: Into<String>,
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.processes
            .push((name.into(), Box::new(move |token| Box::pin(process(token)))));
        self
    }

    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Box::new(move || Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Share cancellation with code outside the runner
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Disable SIGINT/SIGTERM handling, for embedding and tests
    pub fn without_signal_handling(mut self) -> Self {
        self.handle_signals = false;
        self
    }

    /// Run until cancelled or until a process fails, then run closers
    pub async fn run(self) -> RunOutcome {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();

        for (name, process) in self.processes {
            let process_token = token.clone();
            join_set.spawn(async move {
                tracing::debug!(process = %name, "starting app process");
                let result = process(process_token).await;
                (name, result)
            });
        }

        if self.handle_signals {
            let signal_token = token.clone();
            tokio::spawn(async move {
                wait_for_shutdown_signal().await;
                signal_token.cancel();
            });
        }

        let mut outcome = RunOutcome::Stopped;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    tracing::debug!(process = %name, "app process completed");
                }
                Ok((name, Err(error))) => {
                    if !token.is_cancelled() {
                        tracing::error!(process = %name, "app process error: {:#}", error);
                        outcome = RunOutcome::Failed {
                            process: name,
                            error,
                        };
                        token.cancel();
                    } else {
                        tracing::warn!(process = %name, "app process error during shutdown: {:#}", error);
                    }
                }
                Err(join_error) => {
                    tracing::error!("app process panicked: {}", join_error);
                    if !token.is_cancelled() {
                        outcome = RunOutcome::Failed {
                            process: "unknown".to_string(),
                            error: anyhow::anyhow!("app process panicked: {}", join_error),
                        };
                        token.cancel();
                    }
                }
            }
        }

        if !self.closers.is_empty() {
            tracing::info!("Running closers with timeout of {:?}", self.closer_timeout);
            match tokio::time::timeout(self.closer_timeout, run_closers(self.closers)).await {
                Ok(()) => tracing::info!("All closers completed"),
                Err(_) => tracing::error!("Closers timed out after {:?}", self.closer_timeout),
            }
        }

        match &outcome {
            RunOutcome::Stopped => tracing::info!("Application stopped normally"),
            RunOutcome::Failed { process, error } => {
                tracing::error!(process = %process, "Application stopping with error: {:#}", error)
            }
        }

        outcome
    }
}

/// Runs all closers concurrently; failures are logged, not propagated
async fn run_closers(closers: Vec<Closer>) {
    let mut closer_set = JoinSet::new();
    for closer in closers {
        closer_set.spawn(closer());
    }

    while let Some(result) = closer_set.join_next().await {
        match result {
            Ok(Ok(())) => tracing::debug!("Closer completed successfully"),
            Ok(Err(err)) => tracing::error!("Closer error: {:#}", err),
            Err(err) => tracing::error!("Closer panicked: {}", err),
        }
    }
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Error setting up signal handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!("Error setting up SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received shutdown signal"),
        _ = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
