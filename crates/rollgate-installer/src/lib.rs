mod audit;
mod config;
mod controller;
mod deploy;
mod error;
mod fs_utils;
mod layout;
mod lock;
mod package;
mod preinstall;
mod version_store;

pub use audit::{
    read_history, AuditEntry, AuditLog, FileAuditLog, MemoryAuditLog, ObservedAuditLog,
};
pub use config::{HookConfig, HookMode, InstallerConfig, DEFAULT_HOOK_TIMEOUT_SECS};
pub use controller::{RollbackOutcome, UpdateController, UpdateOutcome, UpdateState};
pub use deploy::{DeployReport, FileDeployer};
pub use error::{error_kind, UpdateError, UpdateErrorKind};
pub use layout::{default_user_root, RootLayout};
pub use lock::{break_lock, read_lock_holder, RootLock};
pub use package::{Package, PackageReader, FILES_DIR_NAME, PREINSTALL_FILE_NAME};
pub use preinstall::{HookOutcome, PreInstallRunner};
pub use version_store::VersionStore;
