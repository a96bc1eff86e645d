//! Launcher loop that keeps a worker process alive.
//!
//! The supervisor spawns the worker, waits for it and reads its exit code as
//! a command (see [`crate::control::ExitSignal`]): `Stop` ends the loop,
//! `Restart` relaunches after a short delay, and anything else is treated as
//! a crash and retried with exponential backoff until the budget runs out.

mod process;

pub use process::{ChildProcess, CommandLauncher, SystemBrowser};

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::control::{ExitSignal, Termination};

/// Supervisor errors
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to wait for worker: {0}")]
    Wait(#[source] std::io::Error),
    #[error("failed to kill worker: {0}")]
    Kill(#[source] std::io::Error),
    #[error("failed to open browser: {0}")]
    Browser(String),
}

/// A running worker.
#[async_trait]
pub trait WorkerProcess: Send {
    /// Exit code of the process, `None` if it was killed by a signal.
    ///
    /// Must be cancel-safe: it is raced against the interrupt future.
    async fn wait(&mut self) -> Result<Option<i32>, SupervisorError>;

    async fn kill(&mut self) -> Result<(), SupervisorError>;
}

/// Spawns worker processes.
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn WorkerProcess>, SupervisorError>;
}

pub trait BrowserOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), SupervisorError>;
}

/// How the supervisor loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    /// The worker asked to stop.
    Stopped,
    /// Ctrl-C or SIGTERM reached the supervisor.
    Interrupted,
    /// Too many consecutive unexpected exits.
    Crashed { code: Option<i32> },
}

impl SupervisorExit {
    /// Process exit code for the launcher itself.
    pub fn exit_code(self) -> i32 {
        match self {
            SupervisorExit::Stopped | SupervisorExit::Interrupted => 0,
            SupervisorExit::Crashed { .. } => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Running,
    Restarting,
    Stopped,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SupervisorState::Starting => "starting",
            SupervisorState::Running => "running",
            SupervisorState::Restarting => "restarting",
            SupervisorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Bounded exponential backoff for unexpected worker exits.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), `None` once exhausted.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retries {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(self.base.saturating_mul(factor).min(self.max_delay))
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub dashboard_url: String,
    pub open_browser: bool,
    pub browser_delay: Duration,
    pub restart_delay: Duration,
    pub healthy_uptime: Duration,
    pub retry: RetryPolicy,
}

impl SupervisorSettings {
    pub fn from_config(config: &Config) -> Self {
        let supervisor = &config.supervisor;
        Self {
            dashboard_url: config.server.dashboard_url(),
            open_browser: supervisor.open_browser,
            browser_delay: Duration::from_millis(supervisor.browser_delay_ms),
            restart_delay: Duration::from_millis(supervisor.restart_delay_ms),
            healthy_uptime: Duration::from_secs(supervisor.healthy_uptime_secs),
            retry: RetryPolicy {
                max_retries: supervisor.max_unexpected_restarts,
                base: Duration::from_millis(supervisor.backoff_base_ms),
                max_delay: Duration::from_secs(60),
            },
        }
    }
}

enum Waited {
    Exited(Option<i32>),
    Interrupted,
}

pub struct Supervisor {
    launcher: Box<dyn WorkerLauncher>,
    browser: Box<dyn BrowserOpener>,
    settings: SupervisorSettings,
    state: SupervisorState,
    launches: u32,
    /// Set once the first worker's wait starts; later launches never open the browser.
    browser_armed: bool,
}

impl Supervisor {
    pub fn new(
        launcher: Box<dyn WorkerLauncher>,
        browser: Box<dyn BrowserOpener>,
        settings: SupervisorSettings,
    ) -> Self {
        Self {
            launcher,
            browser,
            settings,
            state: SupervisorState::Starting,
            launches: 0,
            browser_armed: false,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Number of worker processes spawned so far.
    pub fn launches(&self) -> u32 {
        self.launches
    }

    /// Run until the worker stops for good or `interrupt` resolves.
    pub async fn run<F>(&mut self, interrupt: F) -> Result<SupervisorExit, SupervisorError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(interrupt);
        let mut unexpected = 0u32;

        loop {
            self.transition(SupervisorState::Starting);
            let mut child = match self.launcher.launch().await {
                Ok(child) => child,
                Err(e) => {
                    error!(error = %e, "Worker could not be started");
                    self.transition(SupervisorState::Stopped);
                    return Err(e);
                }
            };
            self.launches += 1;
            let started = Instant::now();
            self.transition(SupervisorState::Running);

            let code = match self.wait_child(child.as_mut(), interrupt.as_mut()).await? {
                Waited::Exited(code) => code,
                Waited::Interrupted => {
                    info!("Interrupted, stopping worker");
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "Failed to kill worker");
                    }
                    self.transition(SupervisorState::Stopped);
                    return Ok(SupervisorExit::Interrupted);
                }
            };
            let uptime = started.elapsed();

            let delay = match Termination::from_status(code) {
                Termination::Signal(ExitSignal::Stop) => {
                    info!("Worker requested stop");
                    self.transition(SupervisorState::Stopped);
                    return Ok(SupervisorExit::Stopped);
                }
                Termination::Signal(ExitSignal::Restart) => {
                    info!(
                        delay_ms = self.settings.restart_delay.as_millis() as u64,
                        "Worker requested restart"
                    );
                    unexpected = 0;
                    self.settings.restart_delay
                }
                Termination::Unexpected { code } => {
                    if uptime >= self.settings.healthy_uptime {
                        unexpected = 0;
                    }
                    unexpected += 1;

                    match self.settings.retry.delay(unexpected) {
                        Some(delay) => {
                            warn!(
                                ?code,
                                attempt = unexpected,
                                max = self.settings.retry.max_retries,
                                delay_ms = delay.as_millis() as u64,
                                "Worker exited unexpectedly, retrying"
                            );
                            delay
                        }
                        None => {
                            error!(?code, attempts = unexpected, "Worker keeps crashing, giving up");
                            self.transition(SupervisorState::Stopped);
                            return Ok(SupervisorExit::Crashed { code });
                        }
                    }
                }
            };

            self.transition(SupervisorState::Restarting);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = interrupt.as_mut() => {
                    info!("Interrupted while waiting to restart");
                    self.transition(SupervisorState::Stopped);
                    return Ok(SupervisorExit::Interrupted);
                }
            }
        }
    }

    /// Wait for the child while watching for an interrupt. The browser timer
    /// is armed only during the first worker's wait.
    async fn wait_child<F>(
        &mut self,
        child: &mut dyn WorkerProcess,
        mut interrupt: std::pin::Pin<&mut F>,
    ) -> Result<Waited, SupervisorError>
    where
        F: Future<Output = ()>,
    {
        let mut browser_pending = self.settings.open_browser && !self.browser_armed;
        self.browser_armed = true;
        let browser_timer = tokio::time::sleep(self.settings.browser_delay);
        tokio::pin!(browser_timer);

        loop {
            tokio::select! {
                status = child.wait() => {
                    return Ok(Waited::Exited(status?));
                }
                _ = interrupt.as_mut() => {
                    return Ok(Waited::Interrupted);
                }
                _ = &mut browser_timer, if browser_pending => {
                    browser_pending = false;
                    self.open_dashboard();
                }
            }
        }
    }

    fn open_dashboard(&self) {
        let url = &self.settings.dashboard_url;
        info!(%url, "Opening dashboard");
        if let Err(e) = self.browser.open(url) {
            warn!(%url, error = %e, "Could not open browser, open the dashboard manually");
        }
    }

    fn transition(&mut self, next: SupervisorState) {
        if self.state != next {
            info!(from = %self.state, to = %next, "Supervisor state changed");
        }
        self.state = next;
    }
}

/// Supervise `hubdeck serve` children until stopped or interrupted.
pub async fn run(
    config: &Config,
    config_path: Option<PathBuf>,
) -> Result<SupervisorExit, SupervisorError> {
    let launcher = CommandLauncher::for_worker(config.server.bind_addr, config_path)?;
    let settings = SupervisorSettings::from_config(config);

    info!(dashboard = %settings.dashboard_url, "Starting supervisor");

    let mut supervisor = Supervisor::new(Box::new(launcher), Box::new(SystemBrowser), settings);
    supervisor.run(crate::signal::terminate_requested()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delays_double_until_exhausted() {
        let policy = RetryPolicy {
            max_retries: 3,
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        };

        assert_eq!(policy.delay(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay(2), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay(3), Some(Duration::from_secs(4)));
        assert_eq!(policy.delay(4), None);
        assert_eq!(policy.delay(0), None);
    }

    #[test]
    fn retry_delay_is_capped() {
        let policy = RetryPolicy {
            max_retries: 40,
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        };

        assert_eq!(policy.delay(5), Some(Duration::from_secs(10)));
        assert_eq!(policy.delay(40), Some(Duration::from_secs(10)));
    }

    #[test]
    fn exit_codes() {
        assert_eq!(SupervisorExit::Stopped.exit_code(), 0);
        assert_eq!(SupervisorExit::Interrupted.exit_code(), 0);
        assert_eq!(SupervisorExit::Crashed { code: Some(2) }.exit_code(), 1);
    }

    #[test]
    fn settings_from_config() {
        let settings = SupervisorSettings::from_config(&Config::default());

        assert_eq!(settings.dashboard_url, "http://localhost:8050");
        assert_eq!(settings.restart_delay, Duration::from_secs(3));
        assert_eq!(settings.browser_delay, Duration::from_secs(2));
        assert_eq!(settings.retry.max_retries, 3);
    }
}
