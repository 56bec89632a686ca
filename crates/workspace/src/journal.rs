//! Coalescing log of logical changes made to a loaded document.
//!
//! Entries are keyed by [`JsonPath`]. The journal never holds two entries where
//! one path is a strict prefix of the other: an ancestor write discards its
//! descendants, and a descendant write is folded into the ancestor's value.

use serde_json::Value;
use tracing::trace;
use wsconf_jsonc::JsonPath;

use crate::value_path;

/// Distinguishes how a journal value is turned back into document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Value,
    Project,
    Target,
    ProjectCollection,
    TargetCollection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub path: JsonPath,
    /// `None` records a removal.
    pub value: Option<Value>,
    pub kind: ChangeKind,
}

#[derive(Debug, Default)]
pub struct ChangeJournal {
    entries: Vec<JournalEntry>,
}

impl ChangeJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: JsonPath, value: Option<Value>, kind: ChangeKind) {
        if let Some(ancestor) = self
            .entries
            .iter_mut()
            .find(|entry| path.is_descendant_of(&entry.path))
        {
            let relative = &path.segments()[ancestor.path.len()..];
            trace!(%path, ancestor = %ancestor.path, "folding change into ancestor entry");
            match value {
                Some(value) => {
                    let target = ancestor.value.get_or_insert_with(|| Value::Object(Default::default()));
                    value_path::set(target, relative, value);
                }
                None => {
                    if let Some(target) = ancestor.value.as_mut() {
                        value_path::remove(target, relative);
                    }
                }
            }
            return;
        }

        if let Some(existing) = self.entries.iter_mut().find(|entry| entry.path == path) {
            trace!(%path, ?kind, "replacing journal entry");
            existing.value = value;
            existing.kind = kind;
            return;
        }

        let before = self.entries.len();
        self.entries.retain(|entry| !entry.path.is_descendant_of(&path));
        trace!(
            %path,
            ?kind,
            superseded = before - self.entries.len(),
            "recording journal entry"
        );
        self.entries.push(JournalEntry { path, value, kind });
    }

    pub fn has_changes(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter()
    }

    pub fn find(&self, path: &JsonPath) -> Option<&JournalEntry> {
        self.entries.iter().find(|entry| &entry.path == path)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(keys: &[&str]) -> JsonPath {
        JsonPath::from(keys)
    }

    #[test]
    fn ancestor_write_supersedes_descendants() {
        let mut journal = ChangeJournal::new();
        journal.record(path(&["a", "b", "c"]), Some(json!(1)), ChangeKind::Value);
        journal.record(path(&["a", "x"]), Some(json!(2)), ChangeKind::Value);
        journal.record(path(&["other"]), Some(json!(3)), ChangeKind::Value);
        journal.record(path(&["a"]), Some(json!({"fresh": true})), ChangeKind::Value);

        let paths: Vec<String> = journal.iter().map(|entry| entry.path.to_string()).collect();
        assert_eq!(paths, vec!["/other", "/a"]);
    }

    #[test]
    fn descendant_write_folds_into_ancestor() {
        let mut journal = ChangeJournal::new();
        journal.record(
            path(&["projects", "app"]),
            Some(json!({"root": "app"})),
            ChangeKind::Project,
        );
        journal.record(
            path(&["projects", "app", "prefix"]),
            Some(json!("ui")),
            ChangeKind::Value,
        );
        journal.record(path(&["projects", "app", "root"]), None, ChangeKind::Value);

        assert_eq!(journal.len(), 1);
        let entry = journal.find(&path(&["projects", "app"])).unwrap();
        assert_eq!(entry.kind, ChangeKind::Project);
        assert_eq!(entry.value, Some(json!({"prefix": "ui"})));
    }

    #[test]
    fn same_path_updates_in_place() {
        let mut journal = ChangeJournal::new();
        journal.record(path(&["a"]), Some(json!(1)), ChangeKind::Value);
        journal.record(path(&["b"]), Some(json!(2)), ChangeKind::Value);
        journal.record(path(&["a"]), None, ChangeKind::Value);

        let entries: Vec<_> = journal.iter().cloned().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, path(&["a"]));
        assert_eq!(entries[0].value, None);
        assert_eq!(entries[1].path, path(&["b"]));
    }

    #[test]
    fn sibling_prefixes_do_not_overlap() {
        let mut journal = ChangeJournal::new();
        journal.record(path(&["ab"]), Some(json!(1)), ChangeKind::Value);
        journal.record(path(&["a"]), Some(json!(2)), ChangeKind::Value);
        assert_eq!(journal.len(), 2);
        assert!(journal.has_changes());
        journal.clear();
        assert!(!journal.has_changes());
    }
}
