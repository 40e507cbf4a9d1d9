//! On-disk counter state, persisted as JSON and flushed atomically via temp+rename.
//!
//! The counters are the only record of which keystream each sector was last
//! encrypted under; losing them makes the volume undecryptable.

use anyhow::{Context, Result};
use decvol_core::Geometry;
use decvol_crypto::CounterState;
use std::path::{Path, PathBuf};

pub struct CounterStore {
    path: PathBuf,
    state: CounterState,
    dirty: bool,
}

impl CounterStore {
    /// Load existing counters. A missing file is an error: counters are never implied.
    pub fn open(path: &Path) -> Result<Self> {
        let pending = pending_path(path);
        if pending.exists() {
            tracing::warn!(
                "staged counter state found: {} (an earlier rotation was interrupted; \
                 keep whichever counters decrypt the volume)",
                pending.display()
            );
        }
        let content = std::fs::read_to_string(path).with_context(|| {
            format!(
                "reading counter state: {} (run `decvol init` first)",
                path.display()
            )
        })?;
        let state = serde_json::from_str(&content)
            .with_context(|| format!("parsing counter state: {}", path.display()))?;

        Ok(CounterStore {
            path: path.to_path_buf(),
            state,
            dirty: false,
        })
    }

    /// Zeroed counters for `geometry`; written on the next flush.
    pub fn create(path: &Path, geometry: &Geometry) -> Self {
        CounterStore {
            path: path.to_path_buf(),
            state: CounterState::new(geometry),
            dirty: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &CounterState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut CounterState {
        self.dirty = true;
        &mut self.state
    }

    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let json =
            serde_json::to_string_pretty(&self.state).context("serializing counter state")?;
        write_atomic(&self.path, json.as_bytes())?;

        self.dirty = false;
        Ok(())
    }

    /// Write the counters to a sibling `.pending` file, leaving the live state untouched.
    ///
    /// Paired with [`CounterStore::commit`] once the data they describe is on disk.
    pub fn stage(&self) -> Result<PathBuf> {
        let pending = pending_path(&self.path);
        let json =
            serde_json::to_string_pretty(&self.state).context("serializing counter state")?;
        write_atomic(&pending, json.as_bytes())?;
        Ok(pending)
    }

    /// Move staged counters over the live state file.
    pub fn commit(&mut self, pending: &Path) -> Result<()> {
        std::fs::rename(pending, &self.path).with_context(|| {
            format!("renaming {} to {}", pending.display(), self.path.display())
        })?;
        self.dirty = false;
        Ok(())
    }
}

fn pending_path(path: &Path) -> PathBuf {
    path.with_extension("pending")
}

/// Write `bytes` to a sibling temp file, then rename it over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    write_atomic_with(path, bytes, false)
}

/// Like [`write_atomic`], but the temp file is created owner-only (0600 on Unix)
/// so the contents are never readable by others, not even before the rename.
pub fn write_atomic_private(path: &Path, bytes: &[u8]) -> Result<()> {
    write_atomic_with(path, bytes, true)
}

fn write_atomic_with(path: &Path, bytes: &[u8], private: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating dir: {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("tmp");
    write_temp(&tmp_path, bytes, private)
        .with_context(|| format!("writing temp file: {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {} to {}", tmp_path.display(), path.display()))?;
    Ok(())
}

#[cfg(unix)]
fn write_temp(tmp_path: &Path, bytes: &[u8], private: bool) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    if !private {
        return std::fs::write(tmp_path, bytes);
    }
    // create_new fails on a leftover temp file
    match std::fs::remove_file(tmp_path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_temp(tmp_path: &Path, bytes: &[u8], _private: bool) -> std::io::Result<()> {
    std::fs::write(tmp_path, bytes)
}
