use std::path::PathBuf;

/// Failures an update attempt can surface to its caller.
///
/// Carried inside `anyhow::Error`; recover with `downcast_ref::<UpdateError>()`
/// or [`error_kind`].
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("update package not found: {}", .0.display())]
    PackageNotFound(PathBuf),

    #[error("manifest file missing: {}", .0.display())]
    ManifestMissing(PathBuf),

    #[error("invalid manifest {}: {reason}", .path.display())]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("package files directory missing: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("update root is locked by another attempt: {} ({holder})", .path.display())]
    Locked { path: PathBuf, holder: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateErrorKind {
    PackageNotFound,
    ManifestMissing,
    ManifestInvalid,
    SourceMissing,
    Locked,
}

impl UpdateError {
    pub fn kind(&self) -> UpdateErrorKind {
        match self {
            Self::PackageNotFound(_) => UpdateErrorKind::PackageNotFound,
            Self::ManifestMissing(_) => UpdateErrorKind::ManifestMissing,
            Self::ManifestInvalid { .. } => UpdateErrorKind::ManifestInvalid,
            Self::SourceMissing(_) => UpdateErrorKind::SourceMissing,
            Self::Locked { .. } => UpdateErrorKind::Locked,
        }
    }

    /// Validation failures happen before anything under the root is touched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind(),
            UpdateErrorKind::PackageNotFound
                | UpdateErrorKind::ManifestMissing
                | UpdateErrorKind::ManifestInvalid
        )
    }
}

pub fn error_kind(err: &anyhow::Error) -> Option<UpdateErrorKind> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<UpdateError>())
        .map(UpdateError::kind)
}
