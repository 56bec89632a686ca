//! Typed workspace, project and target definitions.

use std::cell::Ref;
use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use wsconf_jsonc::{JsonPath, Segment};

use crate::collection::{Definition, DefinitionCollection};
use crate::error::WorkspaceError;
use crate::journal::{ChangeJournal, ChangeKind};
use crate::metadata::DocumentMetadata;
use crate::tracking::{ChangeRecorder, KeyFilter, TrackedObject};

pub const PROJECTS_KEY: &str = "projects";
pub const TARGETS_KEY: &str = "targets";
/// Older documents store a project's targets under this key.
pub const LEGACY_TARGETS_KEY: &str = "architect";

pub(crate) const WORKSPACE_RESERVED: &[&str] = &["$schema", "version", PROJECTS_KEY];
pub(crate) const PROJECT_FIELDS: &[&str] = &["root", "sourceRoot", "prefix"];
pub(crate) const PROJECT_RESERVED: &[&str] = &[
    "root",
    "sourceRoot",
    "prefix",
    TARGETS_KEY,
    LEGACY_TARGETS_KEY,
];
pub(crate) const TARGET_FIELDS: &[&str] = &[
    "builder",
    "options",
    "configurations",
    "defaultConfiguration",
];

static PROJECT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:@[\w.-]+/)?\w[\w.-]*$").expect("project name pattern is valid")
});

pub type ProjectCollection = DefinitionCollection<ProjectDefinition>;
pub type TargetCollection = DefinitionCollection<TargetDefinition>;

/// Root of the object graph: workspace extensions plus the project collection.
/// 工作區根節點：擴充欄位與專案集合。
pub struct WorkspaceDefinition {
    extensions: TrackedObject,
    projects: ProjectCollection,
    recorder: ChangeRecorder,
    metadata: Option<DocumentMetadata>,
}

impl WorkspaceDefinition {
    /// Creates an empty, untracked workspace.
    pub fn new() -> Self {
        Self {
            extensions: TrackedObject::with_filter(KeyFilter::Exclude(WORKSPACE_RESERVED)),
            projects: ProjectCollection::new(),
            recorder: ChangeRecorder::detached(),
            metadata: None,
        }
    }

    pub(crate) fn from_parts(extensions: Map<String, Value>, projects: ProjectCollection) -> Self {
        Self {
            extensions: TrackedObject::from_map(extensions, KeyFilter::Exclude(WORKSPACE_RESERVED)),
            projects,
            recorder: ChangeRecorder::detached(),
            metadata: None,
        }
    }

    /// Binds every view to the journal owned by `metadata`. Nothing is recorded.
    pub(crate) fn attach(&mut self, metadata: DocumentMetadata) {
        self.recorder = ChangeRecorder::new(metadata.journal(), JsonPath::root());
        self.extensions.bind(self.recorder.clone());
        self.projects.bind(self.recorder.child(PROJECTS_KEY));
        self.metadata = Some(metadata);
    }

    pub(crate) fn metadata(&self) -> Option<&DocumentMetadata> {
        self.metadata.as_ref()
    }

    pub fn extensions(&self) -> &TrackedObject {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut TrackedObject {
        &mut self.extensions
    }

    pub fn projects(&self) -> &ProjectCollection {
        &self.projects
    }

    pub fn projects_mut(&mut self) -> &mut ProjectCollection {
        &mut self.projects
    }

    /// Replaces the whole project collection, returning the previous one.
    pub fn set_projects(&mut self, mut projects: ProjectCollection) -> ProjectCollection {
        let path = self.recorder.child(PROJECTS_KEY);
        projects.bind(path.clone());
        let snapshot = projects.to_json();
        let mut old = std::mem::replace(&mut self.projects, projects);
        old.bind(ChangeRecorder::detached());
        if old.to_json() != snapshot {
            path.record(&[], Some(snapshot), ChangeKind::ProjectCollection);
        }
        old
    }

    /// Whether the document loaded from disk has pending changes.
    pub fn has_changes(&self) -> bool {
        self.journal().is_some_and(|journal| journal.has_changes())
    }

    pub fn change_count(&self) -> usize {
        self.journal().map_or(0, |journal| journal.len())
    }

    /// The change journal, present only for workspaces produced by the reader.
    pub fn journal(&self) -> Option<Ref<'_, ChangeJournal>> {
        self.metadata.as_ref().map(|metadata| metadata.journal().borrow())
    }

    /// The file the workspace was read from.
    pub fn file_path(&self) -> Option<&Path> {
        self.metadata.as_ref().map(|metadata| metadata.file_path())
    }
}

impl Default for WorkspaceDefinition {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WorkspaceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceDefinition")
            .field("extensions", &self.extensions)
            .field("projects", &self.projects)
            .field("file_path", &self.file_path())
            .field("changes", &self.change_count())
            .finish()
    }
}

/// A named project: root directory, optional source root and prefix, targets.
/// 專案定義。
pub struct ProjectDefinition {
    fields: TrackedObject,
    extensions: TrackedObject,
    targets: TargetCollection,
    recorder: ChangeRecorder,
}

impl ProjectDefinition {
    pub fn new(root: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("root".to_string(), Value::String(root.into()));
        Self::from_parts(fields, Map::new(), TargetCollection::new())
    }

    pub(crate) fn from_parts(
        fields: Map<String, Value>,
        extensions: Map<String, Value>,
        targets: TargetCollection,
    ) -> Self {
        Self {
            fields: TrackedObject::from_map(fields, KeyFilter::Include(PROJECT_FIELDS)),
            extensions: TrackedObject::from_map(extensions, KeyFilter::Exclude(PROJECT_RESERVED)),
            targets,
            recorder: ChangeRecorder::detached(),
        }
    }

    pub fn root(&self) -> &str {
        self.field_str("root").unwrap_or_default()
    }

    pub fn set_root(&mut self, root: impl Into<String>) {
        self.fields.write("root", Some(Value::String(root.into())));
    }

    pub fn source_root(&self) -> Option<&str> {
        self.field_str("sourceRoot")
    }

    pub fn set_source_root(&mut self, source_root: Option<&str>) {
        self.fields
            .write("sourceRoot", source_root.map(|value| Value::String(value.to_string())));
    }

    pub fn prefix(&self) -> Option<&str> {
        self.field_str("prefix")
    }

    pub fn set_prefix(&mut self, prefix: Option<&str>) {
        self.fields
            .write("prefix", prefix.map(|value| Value::String(value.to_string())));
    }

    pub fn targets(&self) -> &TargetCollection {
        &self.targets
    }

    pub fn targets_mut(&mut self) -> &mut TargetCollection {
        &mut self.targets
    }

    /// Replaces the whole target collection, returning the previous one.
    pub fn set_targets(&mut self, mut targets: TargetCollection) -> TargetCollection {
        let path = self.recorder.child(TARGETS_KEY);
        targets.bind(path.clone());
        let snapshot = targets.to_json();
        let mut old = std::mem::replace(&mut self.targets, targets);
        old.bind(ChangeRecorder::detached());
        if old.to_json() != snapshot {
            path.record(&[], Some(snapshot), ChangeKind::TargetCollection);
        }
        old
    }

    pub fn extensions(&self) -> &TrackedObject {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut TrackedObject {
        &mut self.extensions
    }

    fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

impl Definition for ProjectDefinition {
    const KIND: &'static str = "project";
    const CHANGE_KIND: ChangeKind = ChangeKind::Project;
    const COLLECTION_CHANGE_KIND: ChangeKind = ChangeKind::ProjectCollection;

    fn validate_name(name: &str) -> Result<(), WorkspaceError> {
        if !PROJECT_NAME.is_match(name) {
            return Err(WorkspaceError::InvalidName {
                name: name.to_string(),
                reason: "project names must look like package names (e.g. 'app' or '@scope/app')"
                    .to_string(),
            });
        }
        let unscoped = name.rsplit('/').next().unwrap_or(name);
        if unscoped.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(WorkspaceError::InvalidName {
                name: name.to_string(),
                reason: "project names cannot start with a digit".to_string(),
            });
        }
        Ok(())
    }

    /// `root`, `sourceRoot`, `prefix`, extensions, then `targets` when non-empty.
    fn to_json(&self) -> Value {
        let mut map = Map::new();
        for key in PROJECT_FIELDS {
            if let Some(value) = self.fields.get(key) {
                map.insert((*key).to_string(), value.clone());
            }
        }
        for (key, value) in self.extensions.iter() {
            map.insert(key.to_string(), value.clone());
        }
        if !self.targets.is_empty() {
            map.insert(TARGETS_KEY.to_string(), self.targets.to_json());
        }
        Value::Object(map)
    }

    fn bind(&mut self, recorder: ChangeRecorder) {
        self.fields.bind(recorder.clone());
        self.extensions.bind(recorder.clone());
        self.targets.bind(recorder.child(TARGETS_KEY));
        self.recorder = recorder;
    }
}

/// Copies are detached from any journal.
impl Clone for ProjectDefinition {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
            extensions: self.extensions.clone(),
            targets: self.targets.clone(),
            recorder: ChangeRecorder::detached(),
        }
    }
}

impl PartialEq for ProjectDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.to_json() == other.to_json()
    }
}

impl fmt::Debug for ProjectDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectDefinition")
            .field("root", &self.root())
            .field("source_root", &self.source_root())
            .field("prefix", &self.prefix())
            .field("extensions", self.extensions.as_map())
            .field("targets", &self.targets)
            .field("path", &self.recorder.path().to_string())
            .finish()
    }
}

/// A named build target.
/// 建置目標定義。
pub struct TargetDefinition {
    fields: TrackedObject,
    recorder: ChangeRecorder,
}

impl TargetDefinition {
    pub fn new(builder: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("builder".to_string(), Value::String(builder.into()));
        Self::from_map(fields)
    }

    pub(crate) fn from_map(fields: Map<String, Value>) -> Self {
        Self {
            fields: TrackedObject::from_map(fields, KeyFilter::Include(TARGET_FIELDS)),
            recorder: ChangeRecorder::detached(),
        }
    }

    pub fn builder(&self) -> &str {
        self.fields
            .get("builder")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn set_builder(&mut self, builder: impl Into<String>) {
        self.fields
            .write("builder", Some(Value::String(builder.into())));
    }

    pub fn options(&self) -> Option<&Map<String, Value>> {
        self.fields.get("options").and_then(Value::as_object)
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options()?.get(key)
    }

    pub fn set_option(&mut self, key: &str, value: Option<Value>) {
        self.fields
            .write_path(&[Segment::key("options"), Segment::key(key)], value);
    }

    pub fn set_options(&mut self, options: Option<Map<String, Value>>) {
        self.fields.write("options", options.map(Value::Object));
    }

    pub fn configurations(&self) -> Option<&Map<String, Value>> {
        self.fields.get("configurations").and_then(Value::as_object)
    }

    pub fn configuration(&self, name: &str) -> Option<&Map<String, Value>> {
        self.configurations()?.get(name)?.as_object()
    }

    pub fn set_configuration(&mut self, name: &str, overrides: Option<Map<String, Value>>) {
        self.fields.write_path(
            &[Segment::key("configurations"), Segment::key(name)],
            overrides.map(Value::Object),
        );
    }

    /// Sets one option override inside the named configuration, creating it if needed.
    pub fn set_configuration_option(&mut self, name: &str, key: &str, value: Option<Value>) {
        self.fields.write_path(
            &[
                Segment::key("configurations"),
                Segment::key(name),
                Segment::key(key),
            ],
            value,
        );
    }

    pub fn default_configuration(&self) -> Option<&str> {
        self.fields
            .get("defaultConfiguration")
            .and_then(Value::as_str)
    }

    pub fn set_default_configuration(&mut self, name: Option<&str>) {
        self.fields.write(
            "defaultConfiguration",
            name.map(|value| Value::String(value.to_string())),
        );
    }
}

impl Definition for TargetDefinition {
    const KIND: &'static str = "target";
    const CHANGE_KIND: ChangeKind = ChangeKind::Target;
    const COLLECTION_CHANGE_KIND: ChangeKind = ChangeKind::TargetCollection;

    fn validate_name(name: &str) -> Result<(), WorkspaceError> {
        if name.is_empty() {
            return Err(WorkspaceError::InvalidName {
                name: String::new(),
                reason: "target names cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// `builder`, `defaultConfiguration`, `options`, `configurations`.
    fn to_json(&self) -> Value {
        let mut map = Map::new();
        for key in ["builder", "defaultConfiguration", "options", "configurations"] {
            if let Some(value) = self.fields.get(key) {
                map.insert(key.to_string(), value.clone());
            }
        }
        Value::Object(map)
    }

    fn bind(&mut self, recorder: ChangeRecorder) {
        self.fields.bind(recorder.clone());
        self.recorder = recorder;
    }
}

impl Clone for TargetDefinition {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
            recorder: ChangeRecorder::detached(),
        }
    }
}

impl PartialEq for TargetDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl fmt::Debug for TargetDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetDefinition")
            .field("builder", &self.builder())
            .field("default_configuration", &self.default_configuration())
            .field("options", &self.options())
            .field("configurations", &self.configurations())
            .field("path", &self.recorder.path().to_string())
            .finish()
    }
}

/// Plain description of a project to insert.
///
/// ```
/// use wsconf_workspace::{ProjectDraft, TargetDraft};
///
/// let project = ProjectDraft::new("apps/web")
///     .prefix("web")
///     .target("build", TargetDraft::new("tool:build"))
///     .build()
///     .unwrap();
/// assert_eq!(project.prefix(), Some("web"));
/// assert!(project.targets().contains("build"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectDraft {
    pub root: String,
    pub source_root: Option<String>,
    pub prefix: Option<String>,
    pub targets: IndexMap<String, TargetDraft>,
    pub extensions: Map<String, Value>,
}

impl ProjectDraft {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn source_root(mut self, source_root: impl Into<String>) -> Self {
        self.source_root = Some(source_root.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn target(mut self, name: impl Into<String>, target: TargetDraft) -> Self {
        self.targets.insert(name.into(), target);
        self
    }

    pub fn extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    /// Fails when an extension uses a reserved key or a target name is empty.
    pub fn build(self) -> Result<ProjectDefinition, WorkspaceError> {
        let mut project = ProjectDefinition::new(self.root);
        project.set_source_root(self.source_root.as_deref());
        project.set_prefix(self.prefix.as_deref());
        for (key, value) in self.extensions {
            project.extensions.insert(key, value)?;
        }
        for (name, target) in self.targets {
            project.targets.add(name, target.build())?;
        }
        Ok(project)
    }
}

/// Plain description of a target to insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetDraft {
    pub builder: String,
    pub options: Option<Map<String, Value>>,
    pub configurations: IndexMap<String, Map<String, Value>>,
    pub default_configuration: Option<String>,
}

impl TargetDraft {
    pub fn new(builder: impl Into<String>) -> Self {
        Self {
            builder: builder.into(),
            ..Self::default()
        }
    }

    pub fn option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    pub fn configuration(mut self, name: impl Into<String>, overrides: Map<String, Value>) -> Self {
        self.configurations.insert(name.into(), overrides);
        self
    }

    pub fn default_configuration(mut self, name: impl Into<String>) -> Self {
        self.default_configuration = Some(name.into());
        self
    }

    pub fn build(self) -> TargetDefinition {
        let mut target = TargetDefinition::new(self.builder);
        target.set_default_configuration(self.default_configuration.as_deref());
        target.set_options(self.options);
        for (name, overrides) in self.configurations {
            target.set_configuration(&name, Some(overrides));
        }
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn project_serializes_fields_before_extensions_and_targets() {
        let mut project = ProjectDefinition::new("apps/web");
        project.extensions_mut().insert("projectType", json!("application")).unwrap();
        project.set_prefix(Some("web"));
        project.set_source_root(Some("apps/web/src"));
        project
            .targets_mut()
            .add("build", TargetDefinition::new("tool:build"))
            .unwrap();

        let value = project.to_json();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["root", "sourceRoot", "prefix", "projectType", "targets"]);
    }

    #[test]
    fn empty_targets_are_omitted() {
        let project = ProjectDefinition::new("libs/core");
        assert_eq!(project.to_json(), json!({"root": "libs/core"}));
    }

    #[test]
    fn project_extensions_refuse_reserved_keys() {
        let mut project = ProjectDefinition::new("x");
        for key in ["root", "targets", "architect", "prefix"] {
            assert!(project.extensions_mut().insert(key, json!(1)).is_err(), "{key}");
        }
        assert_eq!(project.root(), "x");
    }

    #[test]
    fn target_option_setters_nest_values() {
        let mut target = TargetDefinition::new("tool:build");
        target.set_option("outputPath", Some(json!("dist")));
        target.set_configuration_option("production", "optimize", Some(json!(true)));
        target.set_default_configuration(Some("production"));

        assert_eq!(target.option("outputPath"), Some(&json!("dist")));
        assert_eq!(
            target.configuration("production").unwrap().get("optimize"),
            Some(&json!(true))
        );
        assert_eq!(
            target.to_json(),
            json!({
                "builder": "tool:build",
                "defaultConfiguration": "production",
                "options": {"outputPath": "dist"},
                "configurations": {"production": {"optimize": true}}
            })
        );
    }

    #[test]
    fn clones_are_detached_copies() {
        let mut projects = ProjectCollection::new();
        projects.add("web", ProjectDefinition::new("apps/web")).unwrap();
        let copy = projects.get("web").unwrap().clone();
        assert!(!copy.recorder.is_attached());
        assert_eq!(&copy, projects.get("web").unwrap());
    }

    #[test]
    fn drafts_build_complete_projects() {
        let project = ProjectDraft::new("apps/api")
            .source_root("apps/api/src")
            .extension("i18n", json!({"sourceLocale": "en"}))
            .target(
                "serve",
                TargetDraft::new("tool:serve")
                    .option("port", json!(4200))
                    .default_configuration("dev"),
            )
            .build()
            .unwrap();
        assert_eq!(project.source_root(), Some("apps/api/src"));
        let serve = project.targets().get("serve").unwrap();
        assert_eq!(serve.option("port"), Some(&json!(4200)));
        assert_eq!(serve.default_configuration(), Some("dev"));

        let err = ProjectDraft::new("x")
            .extension("sourceRoot", json!("y"))
            .build()
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidName { .. }));
    }

    #[test]
    fn fresh_workspace_has_no_journal() {
        let mut workspace = WorkspaceDefinition::new();
        workspace.extensions_mut().insert("cli", json!({})).unwrap();
        assert!(workspace.journal().is_none());
        assert!(!workspace.has_changes());
        assert_eq!(workspace.change_count(), 0);
        assert!(workspace.extensions_mut().insert("version", json!(2)).is_err());
    }
}
