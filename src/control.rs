//! Exit-code contract between the supervisor and the worker process.
//!
//! The worker never talks to the supervisor directly: it asks to be stopped or
//! restarted by exiting with one of the codes below, and the supervisor reads
//! the status of its child. [`ExitController`] is the worker-side half, used by
//! the control endpoint to request termination without blocking the response
//! that carries the acknowledgement.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

/// What the worker wants the supervisor to do after it exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitSignal {
    Stop,
    Restart,
}

impl ExitSignal {
    pub const STOP_CODE: i32 = 0;
    pub const RESTART_CODE: i32 = 11;

    pub fn code(self) -> i32 {
        match self {
            ExitSignal::Stop => Self::STOP_CODE,
            ExitSignal::Restart => Self::RESTART_CODE,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            Self::STOP_CODE => Some(ExitSignal::Stop),
            Self::RESTART_CODE => Some(ExitSignal::Restart),
            _ => None,
        }
    }
}

impl fmt::Display for ExitSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitSignal::Stop => write!(f, "stop"),
            ExitSignal::Restart => write!(f, "restart"),
        }
    }
}

/// How a worker process ended, as observed by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Signal(ExitSignal),
    /// Exit code outside the contract. `None` when the process was killed by
    /// an OS signal and has no exit code.
    Unexpected { code: Option<i32> },
}

impl Termination {
    pub fn from_status(code: Option<i32>) -> Self {
        match code.and_then(ExitSignal::from_code) {
            Some(signal) => Termination::Signal(signal),
            None => Termination::Unexpected { code },
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("unknown action: {0}")]
    UnknownAction(String),
}

/// Action accepted by `POST /api/system/control`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Restart,
    Exit,
}

impl ControlAction {
    pub fn signal(self) -> ExitSignal {
        match self {
            ControlAction::Restart => ExitSignal::Restart,
            ControlAction::Exit => ExitSignal::Stop,
        }
    }
}

impl FromStr for ControlAction {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restart" => Ok(ControlAction::Restart),
            "exit" => Ok(ControlAction::Exit),
            other => Err(ControlError::UnknownAction(other.to_string())),
        }
    }
}

/// Schedules worker termination after a grace delay.
///
/// The first scheduled signal wins; later requests are ignored. The HTTP
/// server listens through [`ExitListener`] and starts a graceful drain once a
/// signal is published, so the response that triggered it is flushed before
/// the process exits.
#[derive(Clone)]
pub struct ExitController {
    tx: Arc<watch::Sender<Option<ExitSignal>>>,
    grace: Duration,
}

impl ExitController {
    pub fn new(grace: Duration) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            grace,
        }
    }

    /// Spawn a detached task that publishes `signal` after the grace delay.
    /// Returns immediately; callers must not wait on the termination.
    pub fn schedule(&self, signal: ExitSignal) {
        let tx = Arc::clone(&self.tx);
        let grace = self.grace;

        debug!(%signal, grace_ms = grace.as_millis() as u64, "Scheduling worker termination");

        tokio::spawn(async move {
            tokio::time::sleep(grace).await;

            let first = tx.send_if_modified(|slot| {
                if slot.is_none() {
                    *slot = Some(signal);
                    true
                } else {
                    false
                }
            });

            if first {
                info!(%signal, code = signal.code(), "Worker termination requested");
            }
        });
    }

    /// Signal published so far, if any.
    pub fn requested(&self) -> Option<ExitSignal> {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> ExitListener {
        ExitListener {
            rx: self.tx.subscribe(),
        }
    }
}

pub struct ExitListener {
    rx: watch::Receiver<Option<ExitSignal>>,
}

impl ExitListener {
    /// Resolves once a termination signal has been published.
    pub async fn requested(&mut self) -> ExitSignal {
        loop {
            if let Some(signal) = *self.rx.borrow_and_update() {
                return signal;
            }
            if self.rx.changed().await.is_err() {
                // Controller dropped without ever publishing.
                std::future::pending::<()>().await;
            }
        }
    }
}
