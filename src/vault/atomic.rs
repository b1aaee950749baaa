//! Owner-only directories and atomic file replacement.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::errors::{LockboxError, Result};

/// Create `dir` (and parents) if needed, restricting them to the owner.
///
/// An existing directory is left as it is.
pub fn ensure_private_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir).map_err(LockboxError::io(dir))?;

    tracing::debug!(dir = %dir.display(), "created store directory");
    Ok(())
}

/// Flush a directory entry change (create, rename) to disk.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Write `data` to `path` **atomically** with owner-only permissions.
///
/// 1. Write to a hidden temp file in the same directory (mode 0600).
/// 2. Flush it to disk.
/// 3. Rename it over the target path.
/// 4. Flush the directory so the rename itself is durable.
///
/// The rename ensures readers never see a half-written file.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    ensure_private_dir(parent)?;

    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let result = options
        .open(&tmp_path)
        .and_then(|mut file| {
            file.write_all(data)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp_path, path));

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(LockboxError::Io {
            path: path.to_path_buf(),
            source: e,
        });
    }

    sync_dir(parent).map_err(LockboxError::io(parent))
}
