use anyhow::{Context, Result};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

use tempfile::TempDir;

use crate::paths;

/// Scoped acquisition of temporary storage for intermediate build
/// artifacts, with guaranteed release on all exit paths unless the caller
/// explicitly asks to preserve the contents for postmortem inspection.
pub struct FilePool {
    #[allow(dead_code)]
    temp_dir: Option<tempfile::TempDir>,
    path: PathBuf,
    serial_sequence: AtomicUsize,
}

const DEFAULT_NAME_PREFIX: &str = "skybuild_pool_";

impl FilePool {
    pub fn new(preserve_contents: bool, name_prefix: Option<&str>) -> Result<Self> {
        let pool_root = paths::skybuild_pool_dir();
        std::fs::create_dir_all(&pool_root)
            .with_context(|| format!("creating file pool root {}", pool_root.display()))?;
        let prefix = name_prefix
            .map(|prefix| DEFAULT_NAME_PREFIX.to_string() + prefix + "_")
            .unwrap_or_else(|| DEFAULT_NAME_PREFIX.to_string());
        let underlying: TempDir = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(&pool_root)
            .context("creating a temporary directory to house the file pool")?;

        let path = underlying.path().to_owned();
        let temp_dir: Option<TempDir> = if preserve_contents {
            // Preserve the contents by dropping and recreating the directory
            // before the TempDir guard would otherwise remove it.
            drop(underlying);
            fs::create_dir_all(&path).context("recreating the directory")?;
            info!(?path, "created file pool, contents will not be cleaned up at exit");
            Self::create_latest_symlink(&path, &pool_root, &prefix);
            None
        } else {
            Some(underlying)
        };

        Ok(Self {
            temp_dir,
            path,
            serial_sequence: AtomicUsize::new(0),
        })
    }

    fn latest_symlink_path(pool_root: impl AsRef<Path>, prefix: &str) -> PathBuf {
        let mut prefix = prefix.to_owned();
        if prefix.ends_with('_') {
            prefix.pop();
        }
        pool_root.as_ref().join(&prefix).with_extension("latest")
    }

    #[cfg(not(target_os = "windows"))]
    fn create_latest_symlink(path: impl AsRef<Path>, root: impl AsRef<Path>, prefix: &str) {
        let link_path = Self::latest_symlink_path(root, prefix);
        if link_path.is_symlink() {
            let _ = std::fs::remove_file(&link_path);
        }
        if let Err(e) = std::os::unix::fs::symlink(path, link_path) {
            warn!(?e, "failed to create symlink to latest file pool");
        }
    }

    #[cfg(target_os = "windows")]
    fn create_latest_symlink(path: impl AsRef<Path>, root: impl AsRef<Path>, prefix: &str) {
        let link_path = Self::latest_symlink_path(root, prefix);
        if link_path.is_symlink() {
            let _ = std::fs::remove_file(&link_path);
        }
        if let Err(e) = std::os::windows::fs::symlink_dir(path, link_path) {
            warn!(?e, "failed to create symlink to latest file pool");
        }
    }

    /// Create a fresh, uniquely-named file under the pool.
    pub fn create_file(
        &self,
        prefix: Option<&str>,
        extension: Option<&str>,
        serial: Option<usize>,
    ) -> Result<(File, PathBuf, usize)> {
        let parent = self.path.to_owned();
        let mut path = PathBuf::new();
        let serial: usize =
            serial.unwrap_or_else(|| self.serial_sequence.fetch_add(1, Ordering::SeqCst));
        let name = format!("{}-{:09}", prefix.unwrap_or("unknown"), serial);
        path.set_file_name(name);
        if let Some(extension) = extension {
            path.set_extension(extension);
        }
        let qualified_path = parent.join(path);
        let file = File::create(qualified_path.as_path()).context("creating a temporary file")?;

        Ok((file, qualified_path, serial))
    }

    pub fn create_subdirectory(&self, prefix: &str) -> Result<PathBuf> {
        let parent = self.path.to_owned();
        let serial: usize = self.serial_sequence.fetch_add(1, Ordering::SeqCst);
        let name = format!("{}-{:09}", prefix, serial);
        let qualified_path = parent.join(name);
        std::fs::create_dir(qualified_path.as_path())
            .context("creating file pool subdirectory failed")?;
        Ok(qualified_path)
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }
}

impl Clone for FilePool {
    fn clone(&self) -> Self {
        let serial: usize = self.serial_sequence.fetch_add(1, Ordering::SeqCst);
        let label = format!("sub-pool-{}", serial);
        let path = self.path.join(label);
        if let Err(_e) = std::fs::create_dir(path.as_path()) {
            panic!(
                "creating directory for cloned file pool ({}) failed",
                &path.display()
            );
        }

        Self {
            temp_dir: None,
            path,
            serial_sequence: AtomicUsize::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use std::ffi::OsStr;
    use std::fs;

    #[test]
    fn pool_deletion() -> Result<()> {
        let path = {
            let pool = FilePool::new(false, None)?;
            pool.path().to_owned()
        };
        assert!(fs::metadata(path).is_err());
        Ok(())
    }

    #[test]
    fn pool_preservation() -> Result<()> {
        let pool = FilePool::new(true, None)?;
        let path = pool.path().to_owned();
        drop(pool);
        assert!(fs::metadata(&path)?.is_dir());

        let latest_link_path = {
            let parent = path.parent().unwrap();
            parent.join("skybuild_pool.latest")
        };
        let metadata = std::fs::symlink_metadata(&latest_link_path)?;
        assert!(metadata.is_symlink());
        fs::remove_file(&latest_link_path)?;
        fs::remove_dir_all(&path)?;

        Ok(())
    }

    #[test]
    fn name_prefix_is_present() -> Result<()> {
        let unnamed_pool = FilePool::new(false, None)?;
        assert!(unnamed_pool
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(DEFAULT_NAME_PREFIX));

        let named_pool = FilePool::new(false, Some("test"))?;
        assert!(named_pool
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(DEFAULT_NAME_PREFIX));

        Ok(())
    }

    #[test]
    fn file_naming() -> Result<()> {
        let pool = FilePool::new(true, None)?;
        match pool.create_file(Some("hello"), Some("txt"), None) {
            Ok((_, path, ser)) => {
                assert_eq!(ser, 0);
                let expected = OsStr::new(&format!("hello-{:09}.txt", ser));
                assert_eq!(&path.file_name().unwrap(), &expected);
            }
            _ => bail!("expected a file"),
        }
        match pool.create_file(None, Some("txt"), None) {
            Ok((_, path, ser)) => {
                assert_eq!(ser, 1);
                let expected = OsStr::new(&format!("unknown-{:09}.txt", ser));
                assert_eq!(&path.file_name().unwrap(), &expected);
            }
            _ => bail!("expected a file"),
        }
        Ok(())
    }
}
