//! Path-tagged views that report every successful mutation to the journal.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::{Map, Value};
use wsconf_jsonc::{JsonPath, Segment};

use crate::error::WorkspaceError;
use crate::journal::{ChangeJournal, ChangeKind};
use crate::value_path;

/// Non-owning link from a view to the journal of the workspace that owns it.
/// 指向所屬工作區變更紀錄的弱參考。
///
/// A detached recorder (the default) drops every report, which is what
/// programmatically built workspaces use.
#[derive(Clone, Default)]
pub struct ChangeRecorder {
    journal: Weak<RefCell<ChangeJournal>>,
    base: JsonPath,
}

impl ChangeRecorder {
    pub(crate) fn new(journal: &Rc<RefCell<ChangeJournal>>, base: JsonPath) -> Self {
        Self {
            journal: Rc::downgrade(journal),
            base,
        }
    }

    pub fn detached() -> Self {
        Self::default()
    }

    pub fn path(&self) -> &JsonPath {
        &self.base
    }

    pub fn is_attached(&self) -> bool {
        self.journal.strong_count() > 0
    }

    pub(crate) fn child(&self, segment: impl Into<Segment>) -> Self {
        Self {
            journal: self.journal.clone(),
            base: self.base.child(segment),
        }
    }

    pub(crate) fn record(&self, relative: &[Segment], value: Option<Value>, kind: ChangeKind) {
        if let Some(journal) = self.journal.upgrade() {
            journal
                .borrow_mut()
                .record(self.base.join(relative), value, kind);
        }
    }
}

impl fmt::Debug for ChangeRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeRecorder")
            .field("path", &self.base.to_string())
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Which keys of the underlying object a view exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyFilter {
    #[default]
    All,
    Include(&'static [&'static str]),
    Exclude(&'static [&'static str]),
}

impl KeyFilter {
    pub fn allows(&self, key: &str) -> bool {
        match self {
            KeyFilter::All => true,
            KeyFilter::Include(keys) => keys.contains(&key),
            KeyFilter::Exclude(keys) => !keys.contains(&key),
        }
    }
}

/// A JSON object whose writes are reported as changes at its document path.
/// 會將寫入動作回報到變更紀錄的 JSON 物件檢視。
///
/// Hidden keys (per [`KeyFilter`]) read as absent and refuse writes. Writes
/// that leave the value deep-equal to what was there are not reported, and a
/// write below an array is reported as a replacement of the whole array.
#[derive(Debug, Default)]
pub struct TrackedObject {
    value: Map<String, Value>,
    filter: KeyFilter,
    recorder: ChangeRecorder,
}

impl TrackedObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: KeyFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Builds a view over `map`, dropping keys the filter hides.
    pub fn from_map(mut map: Map<String, Value>, filter: KeyFilter) -> Self {
        map.retain(|key, _| filter.allows(key));
        Self {
            value: map,
            filter,
            recorder: ChangeRecorder::detached(),
        }
    }

    pub fn filter(&self) -> KeyFilter {
        self.filter
    }

    pub fn path(&self) -> &JsonPath {
        self.recorder.path()
    }

    pub(crate) fn bind(&mut self, recorder: ChangeRecorder) {
        self.recorder = recorder;
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        if !self.filter.allows(key) {
            return None;
        }
        self.value.get(key)
    }

    pub fn get_path(&self, path: &[Segment]) -> Option<&Value> {
        let key = path.first()?.as_key()?;
        if !self.filter.allows(key) {
            return None;
        }
        value_path::get_in(&self.value, path)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.value.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.value.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.value
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.value.clone())
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: Value,
    ) -> Result<Option<Value>, WorkspaceError> {
        self.set(key, Some(value))
    }

    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, WorkspaceError> {
        self.set(key, None)
    }

    /// Sets (`Some`) or deletes (`None`) a top-level key, returning the old value.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: Option<Value>,
    ) -> Result<Option<Value>, WorkspaceError> {
        let key = key.into();
        self.ensure_visible(&key)?;
        let old = self.value.get(&key).cloned();
        self.write_path(&[Segment::Key(key)], value);
        Ok(old)
    }

    /// Deep write below a top-level key; missing intermediate objects are created.
    pub fn set_path(
        &mut self,
        path: &[Segment],
        value: Option<Value>,
    ) -> Result<(), WorkspaceError> {
        match path.first() {
            Some(Segment::Key(key)) => self.ensure_visible(key)?,
            _ => {
                return Err(WorkspaceError::InvalidName {
                    name: JsonPath::from_segments(path.to_vec()).to_string(),
                    reason: "tracked paths must start with an object key".to_string(),
                })
            }
        }
        self.write_path(path, value);
        Ok(())
    }

    /// Edits the value under `key` in place; the result is reported as one write.
    pub fn update<F>(&mut self, key: &str, op: F) -> Result<(), WorkspaceError>
    where
        F: FnOnce(&mut Value),
    {
        self.ensure_visible(key)?;
        let mut current = self.value.get(key).cloned().unwrap_or(Value::Null);
        op(&mut current);
        self.write_path(&[Segment::key(key)], Some(current));
        Ok(())
    }

    /// Write used by typed setters whose keys are always visible.
    pub(crate) fn write(&mut self, key: &str, value: Option<Value>) {
        self.write_path(&[Segment::key(key)], value);
    }

    pub(crate) fn write_path(&mut self, path: &[Segment], value: Option<Value>) {
        if path.is_empty() {
            return;
        }
        let old = value_path::get_in(&self.value, path);
        if old == value.as_ref() {
            return;
        }
        let replaced = self.replaced_prefix(path);
        match value {
            Some(value) => value_path::set_in(&mut self.value, path, value),
            None => {
                value_path::remove_in(&mut self.value, path);
            }
        }

        let mut reported = self.reported_prefix(path);
        if let Some(replaced) = replaced {
            if replaced.len() < reported.len() {
                reported = replaced;
            }
        }
        let current = value_path::get_in(&self.value, reported).cloned();
        self.recorder.record(reported, current, ChangeKind::Value);
    }

    /// Truncates `path` at the first array it passes through.
    fn reported_prefix<'p>(&self, path: &'p [Segment]) -> &'p [Segment] {
        for end in 1..path.len() {
            if matches!(value_path::get_in(&self.value, &path[..end]), Some(Value::Array(_))) {
                return &path[..end];
            }
        }
        path
    }

    /// Shortest prefix holding a value that cannot contain the next segment.
    /// A deep write replaces that value wholesale, so it is reported there.
    fn replaced_prefix<'p>(&self, path: &'p [Segment]) -> Option<&'p [Segment]> {
        (1..path.len()).map(|end| &path[..end]).find(|prefix| {
            match (value_path::get_in(&self.value, prefix), &path[prefix.len()]) {
                (None, _) => false,
                (Some(Value::Object(_)), Segment::Key(_)) => false,
                (Some(Value::Array(_)), Segment::Index(_)) => false,
                _ => true,
            }
        })
    }

    fn ensure_visible(&self, key: &str) -> Result<(), WorkspaceError> {
        if self.filter.allows(key) {
            Ok(())
        } else {
            Err(WorkspaceError::InvalidName {
                name: key.to_string(),
                reason: "the key is reserved and cannot be accessed here".to_string(),
            })
        }
    }
}

/// Clones are detached: edits to the copy are not reported anywhere.
impl Clone for TrackedObject {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            filter: self.filter,
            recorder: ChangeRecorder::detached(),
        }
    }
}

impl PartialEq for TrackedObject {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}
