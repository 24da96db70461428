//! Runner process execution
//!
//! The whole selection goes to a single runner process so the application
//! boots once for every suite. The runner gets its own process group, and
//! whatever is left in that group when it exits is killed.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tempfile::NamedTempFile;
use tokio::process::{Child, Command as TokioCommand};

use super::selection::TestSelection;
use crate::common::config::{EntryMode, Settings};
use crate::common::paths::ENV_OVERRIDE_FIXTURES_DIR;
use crate::common::{Error, Result};

/// Exit code reported when the run is interrupted with Ctrl-C
const INTERRUPTED: i32 = 130;

/// The program that executes suites, and how it wants to receive them
#[derive(Debug, Clone)]
pub struct RunnerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub entry_mode: EntryMode,
    /// The built-in runner takes a list file through `--list`
    builtin: bool,
}

impl RunnerCommand {
    /// Resolve the configured runner, falling back to `specrun exec`
    pub fn resolve(root: &Path, settings: &Settings) -> Result<Self> {
        let runner = &settings.runner;
        match &runner.program {
            Some(program) => {
                let path = which::which(program)
                    .map_err(|_| Error::RunnerNotFound(program.clone()))?;
                Ok(Self {
                    program: path,
                    args: runner.args.clone(),
                    entry_mode: runner.entry_mode,
                    builtin: false,
                })
            }
            None => {
                let exe = std::env::current_exe().map_err(|e| {
                    Error::Internal(format!("Failed to get current executable path: {}", e))
                })?;
                let mut args = vec![
                    "exec".to_string(),
                    "--root".to_string(),
                    root.display().to_string(),
                ];
                args.extend(runner.args.iter().cloned());
                Ok(Self {
                    program: exe,
                    args,
                    entry_mode: runner.entry_mode,
                    builtin: true,
                })
            }
        }
    }

    /// Arguments for a run, plus the list file backing them in aggregate mode
    ///
    /// The list file is deleted when the returned handle is dropped.
    fn arguments(&self, files: &[PathBuf]) -> Result<(Vec<String>, Option<NamedTempFile>)> {
        let mut args = self.args.clone();
        match self.entry_mode {
            EntryMode::Paths => {
                args.extend(files.iter().map(|f| f.display().to_string()));
                Ok((args, None))
            }
            EntryMode::Aggregate => {
                let list = write_list(files)?;
                if self.builtin {
                    args.push("--list".to_string());
                }
                args.push(list.path().display().to_string());
                Ok((args, Some(list)))
            }
        }
    }
}

/// Write one path per line to a fresh temporary file
pub fn write_list(files: &[PathBuf]) -> Result<NamedTempFile> {
    let mut list = tempfile::Builder::new()
        .prefix("specrun-")
        .suffix(".list")
        .tempfile()?;
    for file in files {
        writeln!(list, "{}", file.display())?;
    }
    list.flush()?;
    Ok(list)
}

/// Run the selection and return the runner's exit code
pub async fn execute(runner: &RunnerCommand, selection: &TestSelection) -> Result<i32> {
    let (args, list) = runner.arguments(&selection.files)?;

    let mut cmd = TokioCommand::new(&runner.program);
    cmd.args(&args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    if let Some(dir) = &selection.override_fixtures {
        cmd.env(ENV_OVERRIDE_FIXTURES_DIR, dir);
    }
    #[cfg(unix)]
    cmd.process_group(0);

    tracing::debug!(program = %runner.program.display(), ?args, "Spawning runner");
    let mut child = cmd.spawn().map_err(|e| {
        Error::Internal(format!(
            "Failed to spawn runner '{}': {}",
            runner.program.display(),
            e
        ))
    })?;
    let group = child.id();

    let interrupted = tokio::select! {
        exited = wait_for_exit(&mut child) => {
            exited?;
            false
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, stopping runner");
            true
        }
    };

    // The leader is still unreaped here, so its pid (and the group id) cannot
    // have been handed to another process yet
    if let Some(group) = group {
        kill_group(group);
    }
    let code = if interrupted {
        let _ = child.kill().await;
        INTERRUPTED
    } else {
        exit_code(child.wait().await?)
    };
    drop(list);

    tracing::debug!(code, "Runner finished");
    Ok(code)
}

/// Wait until the runner exits, leaving it unreaped
#[cfg(unix)]
async fn wait_for_exit(child: &mut Child) -> Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    tokio::task::spawn_blocking(move || loop {
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err);
        }
    })
    .await
    .map_err(|e| Error::Internal(format!("runner wait task failed: {e}")))??;
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_exit(child: &mut Child) -> Result<()> {
    child.wait().await?;
    Ok(())
}

/// Kill every process left in the runner's process group
#[cfg(unix)]
fn kill_group(group: u32) {
    let Ok(pgid) = libc::pid_t::try_from(group) else {
        return;
    };
    // ESRCH just means the group is already empty
    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_group: u32) {}

/// Map an exit status to a shell-style exit code
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
