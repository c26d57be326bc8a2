//! Child process lifecycle for the language server
//!
//! Spawns the server with piped stdio, hands stdin/stdout to a
//! [`StdioTransport`], drains stderr, and watches for exit.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tracing::{error, info, trace, warn};

use crate::io::transport::{StdioTransport, Transport};

// ============================================================================
// Process State
// ============================================================================

/// How to stop a process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// SIGTERM, let the server exit on its own
    Graceful,
    /// SIGKILL
    Force,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running { pid: u32 },
    Stopped,
}

impl ProcessState {
    pub fn pid(&self) -> Option<u32> {
        match self {
            ProcessState::Running { pid } => Some(*pid),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ProcessState::Running { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Process not started")]
    NotStarted,

    #[error("Process already started")]
    AlreadyStarted,

    #[error("{0} not available")]
    StreamNotAvailable(&'static str),
}

type StderrHandler = Box<dyn Fn(String) + Send + Sync>;

// ============================================================================
// Child Process Manager
// ============================================================================

/// Owns one spawned language server process
pub struct ChildProcessManager {
    command: String,
    args: Vec<String>,
    working_directory: Option<PathBuf>,
    state: Arc<Mutex<ProcessState>>,
    stdio_transport: Option<StdioTransport>,
    stderr_handler: Option<StderrHandler>,
    stderr_task: Option<JoinHandle<()>>,
    wait_task: Option<JoinHandle<()>>,
}

impl ChildProcessManager {
    pub fn new(command: String, args: Vec<String>, working_dir: Option<PathBuf>) -> Self {
        Self {
            command,
            args,
            working_directory: working_dir,
            state: Arc::new(Mutex::new(ProcessState::NotStarted)),
            stdio_transport: None,
            stderr_handler: None,
            stderr_task: None,
            wait_task: None,
        }
    }

    /// Current state; a poisoned lock reads as stopped
    pub fn state(&self) -> ProcessState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or(ProcessState::Stopped)
    }

    fn set_state(&self, new_state: ProcessState) {
        if let Ok(mut state) = self.state.lock() {
            *state = new_state;
        }
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Install a handler for stderr lines; must be called before `start`
    pub fn on_stderr_line<F>(&mut self, handler: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.stderr_handler = Some(Box::new(handler));
    }

    pub async fn start(&mut self) -> Result<(), ProcessError> {
        if self.is_running() {
            return Err(ProcessError::AlreadyStarted);
        }

        info!("Starting process: {} {:?}", self.command, self.args);

        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_directory {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            command: self.command.clone(),
            source,
        })?;

        let pid = child
            .id()
            .ok_or_else(|| ProcessError::Io(io::Error::other("Failed to get process ID")))?;
        info!("Process started with PID: {}", pid);
        self.set_state(ProcessState::Running { pid });

        let stdin = child
            .stdin
            .take()
            .ok_or(ProcessError::StreamNotAvailable("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(ProcessError::StreamNotAvailable("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(ProcessError::StreamNotAvailable("stderr"))?;

        self.stdio_transport = Some(StdioTransport::new(stdin, stdout));
        self.stderr_task = Some(self.spawn_stderr_drain(stderr));
        self.wait_task = Some(self.spawn_exit_watch(child, pid));

        Ok(())
    }

    /// Stderr is always drained so the server never blocks on a full pipe
    fn spawn_stderr_drain(&mut self, stderr: ChildStderr) -> JoinHandle<()> {
        let handler = self.stderr_handler.take();

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim_end().to_string();
                        if line.is_empty() {
                            continue;
                        }
                        trace!("server stderr: {}", line);
                        if let Some(handler) = &handler {
                            handler(line);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!("Failed to read server stderr: {}", e);
                        break;
                    }
                }
            }
            trace!("ChildProcessManager: stderr drain finished");
        })
    }

    fn spawn_exit_watch(&self, mut child: Child, pid: u32) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => info!("Process {} exited with status: {}", pid, status),
                Err(e) => error!("Error waiting for process {}: {}", pid, e),
            }
            if let Ok(mut state) = state.lock() {
                *state = ProcessState::Stopped;
            }
        })
    }

    /// Hand out the stdio transport; only available once per start
    pub fn take_stdio_transport(&mut self) -> Result<StdioTransport, ProcessError> {
        self.stdio_transport.take().ok_or(ProcessError::NotStarted)
    }

    pub async fn stop(&mut self, mode: StopMode) -> Result<(), ProcessError> {
        let pid = self.state().pid().ok_or(ProcessError::NotStarted)?;

        if let Some(mut transport) = self.stdio_transport.take() {
            let _ = transport.close().await;
        }

        Self::signal(pid, mode);

        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        self.set_state(ProcessState::Stopped);
        Ok(())
    }

    /// Force kill without awaiting; for Drop implementations
    pub fn kill_sync(&mut self) {
        let Some(pid) = self.state().pid() else {
            return;
        };

        Self::signal(pid, StopMode::Force);
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        self.set_state(ProcessState::Stopped);
    }

    #[cfg(unix)]
    fn signal(pid: u32, mode: StopMode) {
        let signal = match mode {
            StopMode::Graceful => libc::SIGTERM,
            StopMode::Force => libc::SIGKILL,
        };
        // SAFETY: kill(2) with a pid we spawned and a valid signal number
        let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
        if rc == 0 {
            info!("Sent {:?} signal to process {}", mode, pid);
        } else {
            warn!("Failed to signal process {}", pid);
        }
    }

    #[cfg(not(unix))]
    fn signal(pid: u32, _mode: StopMode) {
        warn!("Process termination not implemented on this platform (pid {})", pid);
    }
}

impl Drop for ChildProcessManager {
    fn drop(&mut self) {
        self.kill_sync();
        if let Some(task) = self.wait_task.take() {
            task.abort();
        }
    }
}
