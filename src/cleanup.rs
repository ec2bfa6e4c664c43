//! Removal of generated trees.

use std::io;
use std::path::Path;

use tracing::info;

/// Recursively removes `path`. Returns `Ok(false)` when nothing was there.
///
/// Symlinks inside the tree are removed, never followed. A symlink passed as
/// `path` is removed itself.
pub fn remove_tree(path: &Path) -> io::Result<bool> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if meta.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    info!("Removed {}", path.display());
    Ok(true)
}
