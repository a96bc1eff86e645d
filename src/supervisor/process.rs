use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use super::{BrowserOpener, SupervisorError, WorkerLauncher, WorkerProcess};

/// Spawns the worker as a child process of the current executable.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: PathBuf,
    args: Vec<OsString>,
}

impl CommandLauncher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `<current exe> [--config <path>] serve --address <addr>`
    pub fn for_worker(
        address: SocketAddr,
        config_path: Option<PathBuf>,
    ) -> Result<Self, SupervisorError> {
        let program = std::env::current_exe().map_err(SupervisorError::Spawn)?;

        let mut args = Vec::new();
        if let Some(path) = config_path {
            args.push(OsString::from("--config"));
            args.push(path.into_os_string());
        }
        args.push(OsString::from("serve"));
        args.push(OsString::from("--address"));
        args.push(OsString::from(address.to_string()));

        Ok(Self::new(program, args))
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}

#[async_trait]
impl WorkerLauncher for CommandLauncher {
    async fn launch(&self) -> Result<Box<dyn WorkerProcess>, SupervisorError> {
        debug!(program = %self.program.display(), args = ?self.args, "Spawning worker");

        let child = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .spawn()
            .map_err(SupervisorError::Spawn)?;

        info!(pid = ?child.id(), "Worker started");
        Ok(Box::new(ChildProcess { child }))
    }
}

/// Worker backed by a `tokio::process::Child`.
pub struct ChildProcess {
    child: Child,
}

#[async_trait]
impl WorkerProcess for ChildProcess {
    async fn wait(&mut self) -> Result<Option<i32>, SupervisorError> {
        let status = self.child.wait().await.map_err(SupervisorError::Wait)?;
        debug!(%status, "Worker exited");
        Ok(status.code())
    }

    async fn kill(&mut self) -> Result<(), SupervisorError> {
        self.child.kill().await.map_err(SupervisorError::Kill)
    }
}

/// Opens URLs with the platform's default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), SupervisorError> {
        open::that(url).map_err(|e| SupervisorError::Browser(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_command_line() {
        let launcher = CommandLauncher::for_worker(
            "127.0.0.1:8050".parse().unwrap(),
            Some(PathBuf::from("conf/hubdeck.toml")),
        )
        .unwrap();

        let args: Vec<_> = launcher
            .args()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            ["--config", "conf/hubdeck.toml", "serve", "--address", "127.0.0.1:8050"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn child_exit_code_is_reported() {
        let launcher = CommandLauncher::new("sh", vec!["-c".into(), "exit 11".into()]);
        let mut child = launcher.launch().await.unwrap();

        assert_eq!(child.wait().await.unwrap(), Some(11));
    }
}
