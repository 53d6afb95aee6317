//! Package-supplied pre-install hook execution.
//!
//! The hook command comes from the package and runs with the installer's
//! privileges and inherited environment. `HookConfig` narrows that surface:
//! `direct` mode skips shell interpretation and `allowed_programs` restricts
//! what may be launched. Every way the hook can go wrong collapses into a
//! "do not proceed" answer; nothing here returns an error to the caller.

use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::package::preinstall_path;
use crate::{AuditLog, HookConfig, HookMode};

const HOOK_POLL_INTERVAL: Duration = Duration::from_millis(25);
const SHELL_METACHARACTERS: &[char] = &[';', '&', '|', '<', '>', '$', '`', '(', ')', '\n', '\r'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Absent,
    Blank,
    Succeeded,
    Failed { code: Option<i32> },
    TimedOut { after: Duration },
    Refused { reason: String },
    Errored { reason: String },
}

impl HookOutcome {
    pub fn should_proceed(&self) -> bool {
        matches!(self, Self::Absent | Self::Blank | Self::Succeeded)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PreInstallRunner {
    config: HookConfig,
}

impl PreInstallRunner {
    pub fn new(config: HookConfig) -> Self {
        Self { config }
    }

    /// Runs the package's hook, narrating to `audit`. `true` means deployment
    /// may proceed.
    pub fn run<A: AuditLog + ?Sized>(&self, package_root: &Path, audit: &A) -> bool {
        let outcome = self.execute(package_root, audit);
        let message = match &outcome {
            HookOutcome::Absent => "No pre-install hook found. Skipping.".to_string(),
            HookOutcome::Blank => "Pre-install hook is empty. Skipping.".to_string(),
            HookOutcome::Succeeded => "Pre-install exit code: 0".to_string(),
            HookOutcome::Failed { code: Some(code) } => format!("Pre-install exit code: {code}"),
            HookOutcome::Failed { code: None } => {
                "Pre-install terminated without an exit code".to_string()
            }
            HookOutcome::TimedOut { after } => format!(
                "Pre-install timed out after {}s; process killed",
                after.as_secs()
            ),
            HookOutcome::Refused { reason } => format!("Pre-install refused: {reason}"),
            HookOutcome::Errored { reason } => format!("Pre-install error: {reason}"),
        };
        note(audit, &message);

        if !outcome.should_proceed() {
            tracing::warn!(?outcome, package = %package_root.display(), "pre-install hook failed");
        }
        outcome.should_proceed()
    }

    pub fn execute<A: AuditLog + ?Sized>(&self, package_root: &Path, audit: &A) -> HookOutcome {
        let hook_path = preinstall_path(package_root);
        if !hook_path.is_file() {
            return HookOutcome::Absent;
        }

        let command_line = match fs::read_to_string(&hook_path) {
            Ok(raw) => raw.trim().to_string(),
            Err(err) => {
                return HookOutcome::Errored {
                    reason: format!("failed to read {}: {err}", hook_path.display()),
                };
            }
        };
        if command_line.is_empty() {
            return HookOutcome::Blank;
        }

        if let Err(reason) = self.check_allowed(&command_line) {
            return HookOutcome::Refused { reason };
        }

        note(audit, &format!("Running pre-install: {command_line}"));
        let mut command = match self.build_command(&command_line) {
            Some(command) => command,
            None => {
                return HookOutcome::Errored {
                    reason: "hook command line has no program".to_string(),
                };
            }
        };
        command
            .current_dir(package_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                return HookOutcome::Errored {
                    reason: format!("failed to start hook: {err}"),
                };
            }
        };

        let (output_tx, output_rx) = mpsc::channel();
        if let Some(mut stdout) = child.stdout.take() {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stdout.read_to_end(&mut buf);
                let _ = output_tx.send(String::from_utf8_lossy(&buf).into_owned());
            });
        }

        let timeout = self.config.timeout();
        // An unrepresentable deadline means the wait is effectively unbounded.
        let deadline = Instant::now().checked_add(timeout);
        match wait_until(&mut child, deadline) {
            Ok(Some(status)) => {
                // A backgrounded grandchild can keep the pipe open past the
                // hook's exit; the reader is left detached at the deadline.
                let output = match deadline {
                    Some(deadline) => {
                        output_rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
                    }
                    None => output_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                };
                match output {
                    Ok(output) => {
                        tracing::debug!(output = %output.trim(), "pre-install hook output");
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        tracing::debug!("pre-install hook output still open at deadline; not collected");
                    }
                    Err(RecvTimeoutError::Disconnected) => {}
                }
                exit_outcome(status)
            }
            Ok(None) => HookOutcome::TimedOut { after: timeout },
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                HookOutcome::Errored {
                    reason: format!("failed waiting for hook: {err}"),
                }
            }
        }
    }

    fn check_allowed(&self, command_line: &str) -> Result<(), String> {
        let allowed = &self.config.allowed_programs;
        if allowed.is_empty() {
            return Ok(());
        }

        if self.config.mode == HookMode::Shell && command_line.contains(SHELL_METACHARACTERS) {
            return Err(format!(
                "command contains shell metacharacters while an allow-list is configured: {command_line}"
            ));
        }

        let program = command_line.split_whitespace().next().unwrap_or_default();
        if allowed.iter().any(|entry| entry == program) {
            Ok(())
        } else {
            Err(format!("program '{program}' is not in the allow-list"))
        }
    }

    fn build_command(&self, command_line: &str) -> Option<Command> {
        match self.config.mode {
            HookMode::Shell => Some(shell_command(command_line)),
            HookMode::Direct => {
                let mut parts = command_line.split_whitespace();
                let mut command = Command::new(parts.next()?);
                command.args(parts);
                Some(command)
            }
        }
    }
}

fn shell_command(command_line: &str) -> Command {
    if cfg!(windows) {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(command_line);
        command
    } else {
        let mut command = Command::new("sh");
        command.arg("-c").arg(command_line);
        command
    }
}

/// `Ok(None)` means the deadline passed and the child was killed.
fn wait_until(child: &mut Child, deadline: Option<Instant>) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            let _ = child.kill();
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(HOOK_POLL_INTERVAL);
    }
}

fn exit_outcome(status: ExitStatus) -> HookOutcome {
    if status.success() {
        HookOutcome::Succeeded
    } else {
        HookOutcome::Failed {
            code: status.code(),
        }
    }
}

fn note<A: AuditLog + ?Sized>(audit: &A, message: &str) {
    if let Err(err) = audit.record(message) {
        tracing::warn!(error = %format!("{err:#}"), entry = message, "failed to record pre-install audit entry");
    }
}
