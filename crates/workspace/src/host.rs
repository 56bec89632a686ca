//! I/O boundary used by the reader and writer.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Minimal file access needed to load and persist a workspace.
/// 讀寫工作區所需的最小檔案存取介面。
pub trait WorkspaceHost {
    fn read_file(&self, path: &Path) -> io::Result<String>;
    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()>;
    fn is_file(&self, path: &Path) -> bool;
    fn is_directory(&self, path: &Path) -> bool;
}

impl<H: WorkspaceHost + ?Sized> WorkspaceHost for &H {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        (**self).read_file(path)
    }

    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        (**self).write_file(path, contents)
    }

    fn is_file(&self, path: &Path) -> bool {
        (**self).is_file(path)
    }

    fn is_directory(&self, path: &Path) -> bool {
        (**self).is_directory(path)
    }
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsHost;

impl WorkspaceHost for FsHost {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        write_atomic(path, contents.as_bytes())
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_directory(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// Writes data atomically by using a temporary sibling file followed by rename.
/// 以臨時檔案搭配 rename 實現原子寫入。
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path
        .file_name()
        .map(OsString::from)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, data)?;
    fs::rename(&tmp_path, path)?;
    debug!(path = %path.display(), bytes = data.len(), "wrote workspace file");
    Ok(())
}

/// In-memory files for tests and embedding. Parent directories of every file
/// exist implicitly.
#[derive(Debug, Default)]
pub struct MemoryHost {
    files: RefCell<BTreeMap<PathBuf, String>>,
    directories: RefCell<BTreeSet<PathBuf>>,
    writes: Cell<usize>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.insert_file(path, contents);
        self
    }

    /// Seeds a file without counting it as a write.
    pub fn insert_file(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files.borrow_mut().insert(path.into(), contents.into());
    }

    pub fn add_directory(&self, path: impl Into<PathBuf>) {
        self.directories.borrow_mut().insert(path.into());
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.borrow().get(path.as_ref()).cloned()
    }

    /// Number of `write_file` calls served so far.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }
}

impl WorkspaceHost for MemoryHost {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        self.file(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )
        })
    }

    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        if self.is_directory(path) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is a directory", path.display()),
            ));
        }
        self.writes.set(self.writes.get() + 1);
        self.insert_file(path, contents);
        Ok(())
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn is_directory(&self, path: &Path) -> bool {
        if self.directories.borrow().contains(path) {
            return true;
        }
        self.files
            .borrow()
            .keys()
            .any(|file| file.ancestors().skip(1).any(|ancestor| ancestor == path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_host_counts_writes_and_knows_parents() {
        let host = MemoryHost::new().with_file("/repo/workspace.json", "{}");
        assert!(host.is_file(Path::new("/repo/workspace.json")));
        assert!(host.is_directory(Path::new("/repo")));
        assert!(host.is_directory(Path::new("/")));
        assert!(!host.is_directory(Path::new("/repo/workspace.json")));
        assert_eq!(host.write_count(), 0);

        host.write_file(Path::new("/repo/workspace.json"), "{\"a\":1}")
            .unwrap();
        assert_eq!(host.write_count(), 1);
        assert_eq!(host.file("/repo/workspace.json").unwrap(), "{\"a\":1}");

        let err = host.read_file(Path::new("/missing.json")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn fs_host_writes_atomically_and_creates_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("workspace.json");
        FsHost.write_file(&path, "{\"version\": 1}\n").unwrap();

        assert!(FsHost.is_file(&path));
        assert!(FsHost.is_directory(&dir.path().join("nested")));
        assert_eq!(FsHost.read_file(&path).unwrap(), "{\"version\": 1}\n");
        assert!(!dir.path().join("nested").join("workspace.json.tmp").exists());
    }
}
