use crate::foundation::error::{UpgradeError, UpgradeResult};
use crate::template::FormatTemplate;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Where format templates are listed, read from and written back to.
pub trait DocumentStore: Send + Sync {
    /// Template files directly inside `dir`, in a stable order.
    fn list_files(&self, dir: &Path) -> UpgradeResult<Vec<PathBuf>>;
    /// Read and parse one template.
    fn load(&self, path: &Path) -> UpgradeResult<FormatTemplate>;
    /// Replace the template stored at `path`.
    fn save(&self, path: &Path, document: &FormatTemplate) -> UpgradeResult<()>;
}

/// Filesystem-backed store. Every regular file in a directory is a template, whatever its
/// name; xyuv ships them without an extension (`px_fmt/NV12`).
///
/// Writes go to a temp file in the target's directory which is then renamed over the
/// original, so an interrupted run never leaves a half-written template. Symlinks are
/// followed on both read and write.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStore;

impl FsStore {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentStore for FsStore {
    fn list_files(&self, dir: &Path) -> UpgradeResult<Vec<PathBuf>> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| UpgradeError::storage(dir, format!("read directory: {e}")))?;

        let mut out = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| UpgradeError::storage(dir, format!("read directory: {e}")))?;
            let path = entry.path();
            // Follows symlinks. An entry that cannot be stat'ed (e.g. a dangling link) is
            // kept so that loading it reports the failure against that file.
            match std::fs::metadata(&path) {
                Ok(meta) if !meta.is_file() => {
                    tracing::debug!(path = %path.display(), "skipping non-file entry");
                }
                _ => out.push(path),
            }
        }
        out.sort();
        Ok(out)
    }

    fn load(&self, path: &Path) -> UpgradeResult<FormatTemplate> {
        let f = File::open(path).map_err(|e| UpgradeError::storage(path, format!("open: {e}")))?;
        FormatTemplate::from_reader(BufReader::new(f))
            .map_err(|e| UpgradeError::storage(path, e.to_string()))
    }

    fn save(&self, path: &Path, document: &FormatTemplate) -> UpgradeResult<()> {
        let json = document.to_json_pretty()?;
        let target = match std::fs::canonicalize(path) {
            Ok(resolved) => resolved,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => path.to_path_buf(),
            Err(e) => return Err(UpgradeError::storage(path, format!("resolve path: {e}"))),
        };
        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| UpgradeError::storage(path, format!("create temp file: {e}")))?;
        tmp.write_all(json.as_bytes())
            .and_then(|()| tmp.flush())
            .map_err(|e| UpgradeError::storage(path, format!("write temp file: {e}")))?;

        // Keep the original file's permissions; NamedTempFile defaults to 0600.
        if let Ok(meta) = std::fs::metadata(&target) {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .map_err(|e| UpgradeError::storage(path, format!("set permissions: {e}")))?;
        }

        tmp.persist(&target)
            .map_err(|e| UpgradeError::storage(path, format!("replace file: {}", e.error)))?;
        Ok(())
    }
}

/// In-memory store holding raw JSON text per path, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<PathBuf, String>>,
    saves: Mutex<Vec<PathBuf>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file's raw contents.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.lock_files().insert(path.into(), contents.into());
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        self.lock_files().get(path.as_ref()).cloned()
    }

    /// Paths passed to [`DocumentStore::save`], in call order.
    pub fn saved_paths(&self) -> Vec<PathBuf> {
        self.saves
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_files(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, String>> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DocumentStore for MemoryStore {
    fn list_files(&self, dir: &Path) -> UpgradeResult<Vec<PathBuf>> {
        Ok(self
            .lock_files()
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect())
    }

    fn load(&self, path: &Path) -> UpgradeResult<FormatTemplate> {
        let text = self
            .contents(path)
            .ok_or_else(|| UpgradeError::storage(path, "no such file"))?;
        FormatTemplate::from_json_str(&text).map_err(|e| UpgradeError::storage(path, e.to_string()))
    }

    fn save(&self, path: &Path, document: &FormatTemplate) -> UpgradeResult<()> {
        let json = document.to_json_pretty()?;
        self.lock_files().insert(path.to_path_buf(), json);
        self.saves
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(path.to_path_buf());
        Ok(())
    }
}
