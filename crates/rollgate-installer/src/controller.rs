//! The install/rollback state machine.
//!
//! ```text
//! Idle -> Validating -> PreInstalling -> Deploying -> Activating -> Done
//!                            |
//!                            +-> RollingBack -> RolledBack
//! any step --fault--> Aborted
//! ```
//!
//! Only a failed pre-install hook rolls `current` back; it is the one failure
//! that happens before anything under `versions/` changes. Deployment and
//! pointer-write faults abort with the pointers as they were.

use anyhow::Result;
use std::path::Path;

use crate::fs_utils::remove_dir_if_exists;
use crate::{
    error_kind, AuditLog, FileDeployer, InstallerConfig, PackageReader, PreInstallRunner,
    RootLayout, RootLock, UpdateErrorKind, VersionStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    Validating,
    PreInstalling,
    Deploying,
    Activating,
    Done,
    RollingBack,
    RolledBack,
    Aborted,
}

impl UpdateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::PreInstalling => "pre_installing",
            Self::Deploying => "deploying",
            Self::Activating => "activating",
            Self::Done => "done",
            Self::RollingBack => "rolling_back",
            Self::RolledBack => "rolled_back",
            Self::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Activated {
        version: String,
        files_copied: u64,
    },
    RolledBack {
        attempted: String,
        rollback: RollbackOutcome,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    Restored { version: String },
    NothingToRestore,
}

pub struct UpdateController<A: AuditLog> {
    layout: RootLayout,
    store: VersionStore,
    reader: PackageReader,
    runner: PreInstallRunner,
    deployer: FileDeployer,
    audit: A,
    state: UpdateState,
    transitions: Vec<UpdateState>,
}

impl<A: AuditLog> UpdateController<A> {
    pub fn new(layout: RootLayout, config: InstallerConfig, audit: A) -> Self {
        Self {
            store: VersionStore::new(layout.clone()),
            layout,
            reader: PackageReader,
            runner: PreInstallRunner::new(config.hook),
            deployer: FileDeployer,
            audit,
            state: UpdateState::Idle,
            transitions: vec![UpdateState::Idle],
        }
    }

    pub fn state(&self) -> UpdateState {
        self.state
    }

    /// States visited by the most recent attempt, starting at `Idle`.
    pub fn transitions(&self) -> &[UpdateState] {
        &self.transitions
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    pub fn audit(&self) -> &A {
        &self.audit
    }

    pub fn update(&mut self, package_path: &Path) -> Result<UpdateOutcome> {
        self.reset();
        let result = self.locked_update(package_path);
        self.finish(result)
    }

    /// Points `current` back at `lastKnownGood` outside of an update attempt.
    pub fn rollback(&mut self) -> Result<RollbackOutcome> {
        self.reset();
        let result = self.locked_rollback();
        self.finish(result)
    }

    fn locked_update(&mut self, package_path: &Path) -> Result<UpdateOutcome> {
        let _lock = RootLock::acquire(&self.layout)?;
        self.record("----- Starting Update Process -----")?;

        self.transition(UpdateState::Validating);
        let package = self.reader.load(package_path)?;
        let version = package.version().to_string();
        self.record(&format!("Validated package for version: {version}"))?;

        self.transition(UpdateState::PreInstalling);
        if !self.runner.run(package.root(), &self.audit) {
            self.record("Pre-install failed. Rolling back...")?;
            let rollback = self.roll_back()?;
            return Ok(UpdateOutcome::RolledBack {
                attempted: version,
                rollback,
            });
        }

        self.transition(UpdateState::Deploying);
        let staging = self.layout.staging_version_dir(&version);
        let target = self.store.version_dir(&version);
        let report = match self.deployer.deploy(&package.files_dir(), &staging) {
            Ok(report) => report,
            Err(err) => {
                if let Err(cleanup_err) = remove_dir_if_exists(&staging) {
                    tracing::warn!(
                        error = %format!("{cleanup_err:#}"),
                        "failed to clean staging directory after deployment failure"
                    );
                }
                return Err(err);
            }
        };
        self.deployer.promote(&staging, &target)?;
        self.record(&format!(
            "Copied {} file(s) to {}",
            report.files_copied,
            target.display()
        ))?;

        self.transition(UpdateState::Activating);
        self.store.set_current(&version)?;
        self.store.set_last_known_good(&version)?;

        self.transition(UpdateState::Done);
        tracing::info!(version = %version, files = report.files_copied, "update activated");
        self.record(&format!("Update successful. Active version: {version}"))?;
        self.record("----- Update Complete -----")?;
        Ok(UpdateOutcome::Activated {
            version,
            files_copied: report.files_copied,
        })
    }

    fn locked_rollback(&mut self) -> Result<RollbackOutcome> {
        let _lock = RootLock::acquire(&self.layout)?;
        self.record("----- Starting Manual Rollback -----")?;
        self.roll_back()
    }

    fn roll_back(&mut self) -> Result<RollbackOutcome> {
        self.transition(UpdateState::RollingBack);
        let outcome = match self.store.get_last_known_good()? {
            Some(version) => {
                self.store.set_current(&version)?;
                tracing::warn!(version = %version, "rolled back active version");
                self.record(&format!("Rolled back to version: {version}"))?;
                RollbackOutcome::Restored { version }
            }
            None => {
                tracing::warn!("no last known good version to roll back to");
                self.record("No last known good version found. Cannot rollback.")?;
                RollbackOutcome::NothingToRestore
            }
        };

        self.transition(UpdateState::RolledBack);
        self.record("----- Rollback Complete -----")?;
        Ok(outcome)
    }

    fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                self.transition(UpdateState::Aborted);
                tracing::error!(error = %format!("{err:#}"), "update attempt aborted");
                // The history belongs to whoever holds the lock.
                if error_kind(&err) == Some(UpdateErrorKind::Locked) {
                    return Err(err);
                }
                if let Err(audit_err) = self.record(&format!("FATAL ERROR: {err:#}")) {
                    tracing::warn!(error = %format!("{audit_err:#}"), "failed to record fatal error");
                }
                Err(err)
            }
        }
    }

    fn reset(&mut self) {
        self.state = UpdateState::Idle;
        self.transitions.clear();
        self.transitions.push(UpdateState::Idle);
    }

    fn transition(&mut self, next: UpdateState) {
        tracing::info!(from = self.state.as_str(), to = next.as_str(), "update state transition");
        self.state = next;
        self.transitions.push(next);
    }

    fn record(&self, message: &str) -> Result<()> {
        self.audit.record(message)
    }
}
