mod archive;
mod manifest;
mod overrides;

pub use archive::{Bundle, BundleEntry, MANIFEST_FILE, OVERRIDES_PREFIX};
pub use manifest::{BundleManifest, FileEnv, FileRef};
pub use overrides::apply_overrides;
