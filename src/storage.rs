//! File access for vault exports and decrypted output.

use anyhow::{Context, Result, bail};
use getrandom::fill;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Largest vault file `load` accepts.
pub const MAX_VAULT_SIZE: u64 = 64 * 1024 * 1024;

/// A file on disk holding either a vault export or decrypted output.
#[derive(Clone, Debug)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    /// Creates a new Storage instance with the given path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Returns `true` if the file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the entire file into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is larger than
    /// [`MAX_VAULT_SIZE`].
    pub fn load(&self) -> Result<Vec<u8>> {
        let size = fs::metadata(&self.path)
            .with_context(|| format!("cannot read {}", self.path.display()))?
            .len();
        if size > MAX_VAULT_SIZE {
            bail!("{} is too large to be a vault ({size} bytes)", self.path.display());
        }

        fs::read(&self.path).with_context(|| format!("cannot read {}", self.path.display()))
    }

    /// Saves data using an atomic write.
    ///
    /// Data goes to a randomly named temporary file next to the target, is
    /// synced, then renamed over the target and the directory is synced.
    /// A crash leaves either the old or the new file, never a partial write.
    ///
    /// Creates parent directories if they don't exist. On Unix the file is
    /// readable by its owner only.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, data: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.random_tmp_path()?;

        let mut tmp_file = owner_only(OpenOptions::new().write(true).create_new(true))
            .open(&tmp_path)
            .context("failed to create temporary file")?;

        tmp_file.write_all(data)?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        if let Err(e) = self.atomic_replace(&tmp_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                let dir = File::open(parent)?;
                dir.sync_all()?;
            }
        }

        Ok(())
    }

    /// Returns the path of the file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Generates a unique temporary file path in the same directory.
    ///
    /// Format: `filename.tmp.<randomhex>`
    fn random_tmp_path(&self) -> Result<PathBuf> {
        let mut buf = [0u8; 8];
        fill(&mut buf).map_err(|e| anyhow::anyhow!("OS random generator unavailable: {e}"))?;

        let file_name = self
            .path
            .file_name()
            .context("output path has no file name")?
            .to_string_lossy();

        let tmp_name = format!("{}.tmp.{}", file_name, hex::encode(buf));

        Ok(self.path.with_file_name(tmp_name))
    }

    /// Atomically replaces the target file with the temporary file.
    ///
    /// Uses Windows `ReplaceFileW` API with `REPLACEFILE_WRITE_THROUGH` flag.
    /// `ReplaceFileW` needs an existing target, so a fresh target is renamed.
    #[cfg(target_os = "windows")]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;
        use windows_sys::Win32::Storage::FileSystem::{REPLACEFILE_WRITE_THROUGH, ReplaceFileW};

        if !self.path.exists() {
            fs::rename(tmp_path, &self.path)?;
            return Ok(());
        }

        fn to_wide(s: &OsStr) -> Vec<u16> {
            s.encode_wide().chain(std::iter::once(0)).collect()
        }

        let target_w = to_wide(self.path.as_os_str());
        let tmp_w = to_wide(tmp_path.as_os_str());

        // SAFETY:
        // - Strings are valid UTF-16 and null-terminated
        // - Pointers remain valid during the call
        // - Windows does not retain the pointers after return
        let result = unsafe {
            ReplaceFileW(
                target_w.as_ptr(),
                tmp_w.as_ptr(),
                std::ptr::null(),
                REPLACEFILE_WRITE_THROUGH,
                std::ptr::null(),
                std::ptr::null(),
            )
        };

        if result == 0 {
            let err = std::io::Error::last_os_error();
            return Err(err).context("atomic replace failed");
        }

        Ok(())
    }

    /// On Unix, `rename()` is atomic when both paths are on the same filesystem.
    #[cfg(not(target_os = "windows"))]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn owner_only(options: &mut OpenOptions) -> &mut OpenOptions {
    use std::os::unix::fs::OpenOptionsExt;
    options.mode(0o600)
}

#[cfg(not(unix))]
fn owner_only(options: &mut OpenOptions) -> &mut OpenOptions {
    options
}
