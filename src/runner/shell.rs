//! Shell runner - runs each command as `<shell> -c <command>`

use crate::runner::{CommandOutput, CommandRunner, RunnerConfig, RunnerError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long to keep reading output after the shell exits
///
/// A command like `dockerd &` leaves a background process holding the
/// pipes open; its output is cut off after this grace period.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Runner that executes commands through a shell subprocess
#[derive(Debug, Clone)]
pub struct ShellRunner {
    config: RunnerConfig,
}

impl ShellRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    /// Spawns the shell, waits for it to exit and captures stdout/stderr
    ///
    /// The shell leads its own process group. If the returned future is
    /// dropped before the shell exits (the executor's timeout), the whole
    /// group is killed. Background processes of a command that exited
    /// normally are left running.
    async fn run(
        &self,
        command: &str,
        env: &HashMap<String, String>,
    ) -> Result<CommandOutput, RunnerError> {
        debug!("Spawning {} -c {:?}", self.config.shell, command);

        let mut cmd = Command::new(&self.config.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        if self.config.clear_env {
            cmd.env_clear();
        }
        cmd.envs(env);

        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|e| RunnerError::Spawn {
            command: command.to_string(),
            reason: e.to_string(),
        })?;

        let group = ProcessGroup::new(child.id());
        let mut capture = OutputCapture::default();
        let stdout = capture.read(child.stdout.take());
        let stderr = capture.read(child.stderr.take());

        let status = child.wait().await.map_err(|e| RunnerError::Wait {
            command: command.to_string(),
            reason: e.to_string(),
        })?;
        group.release();
        let duration = started.elapsed();

        if !capture.drain(OUTPUT_DRAIN_GRACE).await {
            debug!("`{}` left a background process holding its output open", command);
        }

        let exit_code = status.code();
        if !status.success() {
            warn!(
                "`{}` exited with {}",
                command,
                exit_code.map_or_else(|| "a signal".to_string(), |c| format!("code {}", c))
            );
        }

        let stdout = take_text(&stdout);
        let stderr = take_text(&stderr);
        debug!(
            "`{}` finished in {:?} ({} bytes stdout, {} bytes stderr)",
            command,
            duration,
            stdout.len(),
            stderr.len()
        );

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
            duration,
        })
    }
}

type SharedBuffer = Arc<Mutex<Vec<u8>>>;

fn take_text(buffer: &SharedBuffer) -> String {
    let bytes = std::mem::take(&mut *buffer.lock().unwrap_or_else(PoisonError::into_inner));
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Pipe readers for a running child; aborted when dropped
#[derive(Default)]
struct OutputCapture {
    readers: Vec<JoinHandle<()>>,
}

impl OutputCapture {
    /// Copy everything from `pipe` into the returned buffer until EOF
    fn read<P>(&mut self, pipe: Option<P>) -> SharedBuffer
    where
        P: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = SharedBuffer::default();
        if let Some(mut pipe) = pipe {
            let sink = buffer.clone();
            self.readers.push(tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                loop {
                    match pipe.read(&mut chunk).await {
                        Ok(0) => break,
                        Ok(n) => sink
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .extend_from_slice(&chunk[..n]),
                        Err(e) => {
                            debug!("Output pipe read failed: {}", e);
                            break;
                        }
                    }
                }
            }));
        }
        buffer
    }

    /// Wait up to `grace` for every pipe to reach EOF; false if one is still open
    async fn drain(&mut self, grace: Duration) -> bool {
        let readers = &mut self.readers;
        tokio::time::timeout(grace, async move {
            for reader in readers.iter_mut() {
                let _ = reader.await;
            }
        })
        .await
        .is_ok()
    }
}

impl Drop for OutputCapture {
    fn drop(&mut self) {
        for reader in &self.readers {
            reader.abort();
        }
    }
}

/// The process group led by a spawned shell
///
/// Dropping an unreleased group sends SIGKILL to every process in it.
struct ProcessGroup {
    #[cfg(unix)]
    leader: Option<nix::unistd::Pid>,
}

impl ProcessGroup {
    #[cfg(unix)]
    fn new(pid: Option<u32>) -> Self {
        Self {
            leader: pid.and_then(|p| i32::try_from(p).ok()).map(nix::unistd::Pid::from_raw),
        }
    }

    #[cfg(not(unix))]
    fn new(_pid: Option<u32>) -> Self {
        Self {}
    }

    /// The shell exited on its own; leave the group alone
    fn release(mut self) {
        #[cfg(unix)]
        {
            self.leader = None;
        }
    }
}

#[cfg(unix)]
impl Drop for ProcessGroup {
    fn drop(&mut self) {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};

        if let Some(leader) = self.leader.take() {
            debug!("Killing process group {}", leader);
            match killpg(leader, Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => warn!("Failed to kill process group {}: {}", leader, e),
            }
        }
    }
}
