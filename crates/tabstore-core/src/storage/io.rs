//! Synchronous filesystem helpers shared by the file-based backends.
//!
//! All writes go through write-then-rename so a reader never observes a
//! partially-written artifact; a drop guard removes the temporary file on
//! error paths. Reads classify "missing" separately from other I/O
//! failures so callers can surface [`StorageError::NotFound`] with the
//! artifact name rather than a raw OS error.

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use snafu::prelude::*;

use crate::storage::error::{AlreadyExistsSnafu, IoSnafu, NotFoundSnafu};
use crate::storage::StorageResult;

/// Create the parent directory of `path` if it is missing.
pub(crate) fn create_parent_dir(path: &Path) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context(IoSnafu {
            path: parent.display().to_string(),
        })?;
    }
    Ok(())
}

/// Guard that removes a temporary file on drop unless disarmed.
/// Used to ensure cleanup on error paths during atomic writes.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Disarm the guard so the file is NOT removed on drop.
    /// Call this after a successful rename.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            // Best-effort cleanup; we're likely already handling another error.
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Write `contents` to `path` atomically via write-then-rename.
///
/// Creates missing parent directories, writes to a temporary sibling,
/// syncs it, and renames it into place so the replacement is atomic from
/// a reader's perspective.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> StorageResult<()> {
    create_parent_dir(path)?;

    let tmp_path = path.with_extension("tmp");
    let mut guard = TempFileGuard::new(tmp_path.clone());

    {
        let mut file = fs::File::create(&tmp_path).context(IoSnafu {
            path: tmp_path.display().to_string(),
        })?;
        file.write_all(contents).context(IoSnafu {
            path: tmp_path.display().to_string(),
        })?;
        file.sync_all().context(IoSnafu {
            path: tmp_path.display().to_string(),
        })?;
    }

    fs::rename(&tmp_path, path).context(IoSnafu {
        path: path.display().to_string(),
    })?;

    // Success - don't remove the temp file (it's been renamed).
    guard.disarm();

    Ok(())
}

/// Create a *new* file at `path` and write `contents`, failing with
/// [`StorageError::AlreadyExists`] (carrying the artifact `name`) if the
/// file exists. Used for non-overwrite table writes so a lost existence
/// race still ends in the right error.
pub(crate) fn write_new(path: &Path, contents: &[u8], name: &str) -> StorageResult<()> {
    create_parent_dir(path)?;

    // Atomic "create only if not exists" on the target path.
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return AlreadyExistsSnafu { name }.fail();
        }
        Err(e) => {
            return Err(e).context(IoSnafu {
                path: path.display().to_string(),
            });
        }
    };

    file.write_all(contents).context(IoSnafu {
        path: path.display().to_string(),
    })?;
    file.sync_all().context(IoSnafu {
        path: path.display().to_string(),
    })
}

/// Read the full contents of `path`, mapping a missing or non-regular
/// file to [`StorageError::NotFound`] for artifact `name`.
pub(crate) fn read_bytes(path: &Path, name: &str) -> StorageResult<Vec<u8>> {
    match fs::metadata(path) {
        Ok(meta) if !meta.is_file() => {
            // Non-regular file: semantically "not found", no real OS error.
            return NotFoundSnafu { name }.fail();
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return NotFoundSnafu { name }.fail();
        }
        Err(e) => {
            return Err(e).context(IoSnafu {
                path: path.display().to_string(),
            });
        }
    }

    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => NotFoundSnafu { name }.fail(),
        Err(e) => Err(e).context(IoSnafu {
            path: path.display().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn write_atomic_creates_file_with_contents() -> TestResult {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("test.txt");

        write_atomic(&path, b"hello world")?;

        assert_eq!(fs::read_to_string(&path)?, "hello world");
        Ok(())
    }

    #[test]
    fn write_atomic_creates_parent_directories() -> TestResult {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("nested/deep/dir/file.txt");

        write_atomic(&path, b"nested content")?;

        assert!(path.exists());
        assert_eq!(fs::read_to_string(&path)?, "nested content");
        Ok(())
    }

    #[test]
    fn write_atomic_overwrites_existing_file() -> TestResult {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("overwrite.txt");

        write_atomic(&path, b"original")?;
        write_atomic(&path, b"updated")?;

        assert_eq!(fs::read_to_string(&path)?, "updated");
        Ok(())
    }

    #[test]
    fn write_atomic_no_leftover_tmp_file() -> TestResult {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("clean.txt");

        write_atomic(&path, b"data")?;

        assert!(!tmp.path().join("clean.tmp").exists());
        Ok(())
    }

    #[test]
    fn write_new_fails_if_file_exists() -> TestResult {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("existing.txt");

        write_new(&path, b"first", "existing")?;
        let err = write_new(&path, b"second", "existing").expect_err("expected AlreadyExists");

        assert!(matches!(err, StorageError::AlreadyExists { name, .. } if name == "existing"));
        assert_eq!(fs::read_to_string(&path)?, "first");
        Ok(())
    }

    #[test]
    fn read_bytes_maps_missing_file_to_not_found() -> TestResult {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("absent.bin");

        let err = read_bytes(&path, "absent").expect_err("expected NotFound");
        assert!(matches!(err, StorageError::NotFound { name, .. } if name == "absent"));
        Ok(())
    }

    #[test]
    fn read_bytes_treats_directory_as_not_found() -> TestResult {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("dir.arrow");
        fs::create_dir(&path)?;

        let err = read_bytes(&path, "dir").expect_err("expected NotFound");
        assert!(matches!(err, StorageError::NotFound { .. }));
        Ok(())
    }
}
