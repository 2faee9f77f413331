use std::path::Path;

use tracing::{info, warn};

use super::archive::{is_contained, Bundle};
use crate::core::error::{PackError, PackResult};
use crate::core::index::Index;

/// Copy the bundle's override files into the pack root and refresh their
/// index entries. Returns how many files were written.
///
/// Existing files whose index entry is preserved are left alone.
pub fn apply_overrides(bundle: &Bundle, index: &mut Index) -> PackResult<usize> {
    let mut copied = 0;

    for entry in &bundle.overrides {
        if !is_contained(&entry.path) {
            warn!("Refusing override outside the pack root: {}", entry.path);
            continue;
        }
        let dest = index.resolve_path(&entry.path);

        if entry.is_dir {
            std::fs::create_dir_all(&dest).map_err(|e| PackError::io(&dest, e))?;
            apply_mode(&dest, entry.mode)?;
            continue;
        }

        if dest.exists() && index.get(&entry.path).is_some_and(|e| e.preserve) {
            info!("Keeping preserved file {}", entry.path);
            continue;
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PackError::io(parent, e))?;
        }
        std::fs::write(&dest, &entry.bytes).map_err(|e| PackError::io(&dest, e))?;
        apply_mode(&dest, entry.mode)?;

        index.refresh_file(&entry.path)?;
        copied += 1;
    }

    if copied > 0 {
        info!("Copied {} override files", copied);
    }
    Ok(copied)
}

/// Apply the permission bits recorded in the archive. No-op off unix.
fn apply_mode(dest: &Path, mode: Option<u32>) -> PackResult<()> {
    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(mode & 0o7777);
        std::fs::set_permissions(dest, permissions).map_err(|e| PackError::io(dest, e))?;
    }
    #[cfg(not(unix))]
    let _ = (dest, mode);
    Ok(())
}
