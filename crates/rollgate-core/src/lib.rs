mod manifest;
mod version;

pub use manifest::{Manifest, MANIFEST_FILE_NAME};
pub use version::validate_version_id;
