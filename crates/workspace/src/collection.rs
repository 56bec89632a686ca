//! Named collections of projects and targets with change notification.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use wsconf_jsonc::Segment;

use crate::error::WorkspaceError;
use crate::journal::ChangeKind;
use crate::tracking::ChangeRecorder;

/// An entity that can live inside a [`DefinitionCollection`].
pub trait Definition: Sized + 'static {
    /// Human readable kind used in error messages.
    const KIND: &'static str;
    /// Journal kind recorded for single-entity writes.
    const CHANGE_KIND: ChangeKind;
    /// Journal kind recorded when a whole collection is replaced.
    const COLLECTION_CHANGE_KIND: ChangeKind;

    fn validate_name(name: &str) -> Result<(), WorkspaceError>;

    fn to_json(&self) -> Value;

    /// Points the entity's views at `recorder`'s document path.
    #[doc(hidden)]
    fn bind(&mut self, recorder: ChangeRecorder);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Add,
    Remove,
    Replace,
}

/// Notification delivered synchronously after each collection mutation.
pub struct CollectionChange<'a, T: Definition> {
    pub key: &'a str,
    pub action: ChangeAction,
    pub new_value: Option<&'a T>,
    pub old_value: Option<&'a T>,
    pub collection: &'a DefinitionCollection<T>,
}

pub type CollectionListener<T> = Rc<dyn Fn(&CollectionChange<'_, T>)>;

/// Insertion-ordered mapping from name to entity.
/// 以名稱索引、保留插入順序的定義集合。
pub struct DefinitionCollection<T: Definition> {
    entries: IndexMap<String, T>,
    recorder: ChangeRecorder,
    listener: Option<CollectionListener<T>>,
}

impl<T: Definition> DefinitionCollection<T> {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            recorder: ChangeRecorder::detached(),
            listener: None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        self.entries.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut T)> {
        self.entries
            .iter_mut()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Inserts a new entity; fails when the name is taken or invalid.
    pub fn add(&mut self, name: impl Into<String>, value: T) -> Result<&mut T, WorkspaceError> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(WorkspaceError::AlreadyExists {
                kind: T::KIND,
                name,
            });
        }
        T::validate_name(&name)?;
        let (index, _) = self.insert_entry(name, value);
        Ok(&mut self.entries[index])
    }

    /// Inserts or replaces an entity, returning the previous one.
    pub fn set(&mut self, name: impl Into<String>, value: T) -> Result<Option<T>, WorkspaceError> {
        let name = name.into();
        T::validate_name(&name)?;
        let (_, old) = self.insert_entry(name, value);
        Ok(old)
    }

    /// Removes an entity; its sub-collections go with it.
    pub fn delete(&mut self, name: &str) -> Option<T> {
        let mut old = self.entries.shift_remove(name)?;
        old.bind(ChangeRecorder::detached());
        if self.entries.is_empty() {
            // Writers drop empty collections, so the member goes away with its last entry.
            self.recorder
                .record(&[], Some(Value::Object(Map::new())), T::COLLECTION_CHANGE_KIND);
        } else {
            self.recorder
                .record(&[Segment::key(name)], None, T::CHANGE_KIND);
        }
        self.notify(name, ChangeAction::Remove, Some(&old));
        Some(old)
    }

    /// Registers the observer notified after every mutation, replacing any previous one.
    pub fn set_listener<F>(&mut self, listener: F)
    where
        F: Fn(&CollectionChange<'_, T>) + 'static,
    {
        self.listener = Some(Rc::new(listener));
    }

    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (name, value) in &self.entries {
            map.insert(name.clone(), value.to_json());
        }
        Value::Object(map)
    }

    /// Inserts an entity read from a document: no validation, no journal entry.
    pub(crate) fn insert_loaded(&mut self, name: String, value: T) {
        self.entries.insert(name, value);
    }

    pub(crate) fn bind(&mut self, recorder: ChangeRecorder) {
        for (name, value) in self.entries.iter_mut() {
            value.bind(recorder.child(name.as_str()));
        }
        self.recorder = recorder;
    }

    fn insert_entry(&mut self, name: String, mut value: T) -> (usize, Option<T>) {
        value.bind(self.recorder.child(name.as_str()));
        let snapshot = value.to_json();
        let (index, old) = self.entries.insert_full(name.clone(), value);
        let mut old = old;
        if let Some(previous) = old.as_mut() {
            previous.bind(ChangeRecorder::detached());
        }

        let unchanged = old
            .as_ref()
            .is_some_and(|previous| previous.to_json() == snapshot);
        if !unchanged {
            self.recorder
                .record(&[Segment::key(name.as_str())], Some(snapshot), T::CHANGE_KIND);
        }
        let action = if old.is_some() {
            ChangeAction::Replace
        } else {
            ChangeAction::Add
        };
        self.notify(&name, action, old.as_ref());
        (index, old)
    }

    fn notify(&self, key: &str, action: ChangeAction, old_value: Option<&T>) {
        let Some(listener) = self.listener.clone() else {
            return;
        };
        let change = CollectionChange {
            key,
            action,
            new_value: self.entries.get(key),
            old_value,
            collection: self,
        };
        listener(&change);
    }
}

impl<T: Definition> Default for DefinitionCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Clones are detached and carry no listener.
impl<T: Definition + Clone> Clone for DefinitionCollection<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            recorder: ChangeRecorder::detached(),
            listener: None,
        }
    }
}

impl<T: Definition + fmt::Debug> fmt::Debug for DefinitionCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefinitionCollection")
            .field("entries", &self.entries)
            .field("path", &self.recorder.path().to_string())
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl<T: Definition + PartialEq> PartialEq for DefinitionCollection<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{ProjectCollection, ProjectDefinition, TargetCollection, TargetDefinition};
    use std::cell::RefCell;

    #[test]
    fn add_rejects_duplicates_and_invalid_names() {
        let mut projects = ProjectCollection::new();
        let err = projects
            .add("1bad", ProjectDefinition::new("x"))
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidName { .. }));

        projects.add("ok-name", ProjectDefinition::new("x")).unwrap();
        let err = projects
            .add("ok-name", ProjectDefinition::new("y"))
            .unwrap_err();
        assert!(matches!(
            err,
            WorkspaceError::AlreadyExists { kind: "project", .. }
        ));
        assert_eq!(projects.get("ok-name").unwrap().root(), "x");
    }

    #[test]
    fn scoped_project_names_are_accepted() {
        let mut projects = ProjectCollection::new();
        projects.add("@scope/lib.core", ProjectDefinition::new("libs/core")).unwrap();
        projects.add("app_2", ProjectDefinition::new("apps/app2")).unwrap();
        assert!(projects.set("-leading", ProjectDefinition::new("x")).is_err());
        assert!(projects.set("@/missing", ProjectDefinition::new("x")).is_err());
        assert_eq!(projects.len(), 2);
    }

    #[test]
    fn listener_sees_every_mutation() {
        let seen: Rc<RefCell<Vec<(String, ChangeAction, bool, bool, usize)>>> = Rc::default();
        let sink = Rc::clone(&seen);
        let mut targets = TargetCollection::new();
        targets.set_listener(move |change: &CollectionChange<'_, TargetDefinition>| {
            sink.borrow_mut().push((
                change.key.to_string(),
                change.action,
                change.new_value.is_some(),
                change.old_value.is_some(),
                change.collection.len(),
            ));
        });

        targets.add("build", TargetDefinition::new("tool:build")).unwrap();
        targets.set("build", TargetDefinition::new("tool:build2")).unwrap();
        targets.delete("build");
        assert!(targets.delete("build").is_none());

        let seen = seen.borrow();
        assert_eq!(
            *seen,
            vec![
                ("build".to_string(), ChangeAction::Add, true, false, 1),
                ("build".to_string(), ChangeAction::Replace, true, true, 1),
                ("build".to_string(), ChangeAction::Remove, false, true, 0),
            ]
        );
    }

    #[test]
    fn empty_target_names_are_rejected() {
        let mut targets = TargetCollection::new();
        assert!(matches!(
            targets.add("", TargetDefinition::new("tool:x")),
            Err(WorkspaceError::InvalidName { .. })
        ));
        targets.add("any name / goes", TargetDefinition::new("tool:x")).unwrap();
    }
}
