use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::format::WorkspaceFormat;
use crate::journal::ChangeJournal;

/// What the reader remembers about the text a workspace came from.
/// 讀取來源文件的中繼資料，只供寫入器使用。
#[derive(Debug)]
pub(crate) struct DocumentMetadata {
    file_path: PathBuf,
    format: WorkspaceFormat,
    raw: String,
    has_legacy_targets_name: bool,
    journal: Rc<RefCell<ChangeJournal>>,
}

impl DocumentMetadata {
    pub(crate) fn new(
        file_path: PathBuf,
        format: WorkspaceFormat,
        raw: String,
        has_legacy_targets_name: bool,
    ) -> Self {
        Self {
            file_path,
            format,
            raw,
            has_legacy_targets_name,
            journal: Rc::new(RefCell::new(ChangeJournal::new())),
        }
    }

    pub(crate) fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub(crate) fn format(&self) -> WorkspaceFormat {
        self.format
    }

    pub(crate) fn raw(&self) -> &str {
        &self.raw
    }

    pub(crate) fn has_legacy_targets_name(&self) -> bool {
        self.has_legacy_targets_name
    }

    pub(crate) fn journal(&self) -> &Rc<RefCell<ChangeJournal>> {
        &self.journal
    }
}
