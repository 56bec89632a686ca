//! Persists a [`WorkspaceDefinition`], patching the original text when there is one.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, trace};
use wsconf_jsonc::{parse_tree, patch, FormattingOptions, JsonPath, Node, Segment};

use crate::definitions::{WorkspaceDefinition, LEGACY_TARGETS_KEY, PROJECTS_KEY, TARGETS_KEY};
use crate::error::WorkspaceError;
use crate::format::WorkspaceFormat;
use crate::host::WorkspaceHost;
use crate::journal::{ChangeKind, JournalEntry};
use crate::metadata::DocumentMetadata;

/// `$schema` written into freshly serialized documents unless overridden.
pub const DEFAULT_SCHEMA: &str = "./node_modules/wsconf/schema.json";

/// Configurable writer.
///
/// ```
/// use wsconf_workspace::{MemoryHost, ProjectDefinition, WorkspaceDefinition, WorkspaceWriter};
///
/// let mut workspace = WorkspaceDefinition::new();
/// workspace.projects_mut().add("web", ProjectDefinition::new("apps/web")).unwrap();
///
/// let host = MemoryHost::new();
/// WorkspaceWriter::new(&host)
///     .path("/repo/workspace.json")
///     .write(&workspace)
///     .unwrap();
/// assert!(host.file("/repo/workspace.json").unwrap().contains("\"web\""));
/// ```
pub struct WorkspaceWriter<H: WorkspaceHost> {
    host: H,
    path: Option<PathBuf>,
    format: Option<WorkspaceFormat>,
    schema: Option<String>,
}

impl<H: WorkspaceHost> WorkspaceWriter<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            path: None,
            format: None,
            schema: None,
        }
    }

    /// Destination; defaults to the file the workspace was read from.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn format(mut self, format: WorkspaceFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// `$schema` for freshly serialized documents. Patched documents keep theirs.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn write(&self, workspace: &WorkspaceDefinition) -> Result<(), WorkspaceError> {
        let metadata = workspace.metadata();
        let path = match (&self.path, metadata) {
            (Some(path), _) => path.clone(),
            (None, Some(metadata)) => metadata.file_path().to_path_buf(),
            (None, None) => return Err(WorkspaceError::PathRequired),
        };
        let same_file = metadata.is_some_and(|metadata| metadata.file_path() == path);
        if self.format.is_none() && !same_file {
            WorkspaceFormat::detect(&path)?;
        }

        match metadata {
            Some(metadata) => self.write_patched(metadata, &path),
            None => self.write_fresh(workspace, &path),
        }
    }

    fn write_patched(
        &self,
        metadata: &DocumentMetadata,
        path: &Path,
    ) -> Result<(), WorkspaceError> {
        let journal = metadata.journal().borrow();
        if journal.is_empty() && metadata.file_path() == path {
            debug!(path = %path.display(), "workspace unchanged; nothing to write");
            return Ok(());
        }

        let mut text = metadata.raw().to_string();
        let options = FormattingOptions::detect(&text);
        let legacy = metadata.has_legacy_targets_name();
        debug!(
            path = %path.display(),
            format = %metadata.format(),
            changes = journal.len(),
            legacy_targets = legacy,
            "patching workspace"
        );
        for entry in journal.iter() {
            let tree = parse_tree(&text).map_err(|err| {
                WorkspaceError::malformed(format!("patched text no longer parses: {err}"))
            })?;
            let (target, value) = resolve_entry(&tree, entry, legacy);
            trace!(path = %target, kind = ?entry.kind, removal = value.is_none(), "applying change");
            text = patch(&text, &target, value.as_ref(), &options).map_err(|err| {
                WorkspaceError::malformed(format!("cannot apply change at {target}: {err}"))
            })?;
        }
        self.host.write_file(path, &text)?;
        Ok(())
    }

    fn write_fresh(&self, workspace: &WorkspaceDefinition, path: &Path) -> Result<(), WorkspaceError> {
        let document = Value::Object(serialize(workspace, self.schema.as_deref()));
        let mut text = serde_json::to_string_pretty(&document)
            .map_err(|err| WorkspaceError::malformed(err.to_string()))?;
        text.push('\n');
        debug!(
            path = %path.display(),
            projects = workspace.projects().len(),
            "writing new workspace"
        );
        self.host.write_file(path, &text)?;
        Ok(())
    }
}

/// Writes `workspace` to `path`, or back to the file it was read from.
pub fn write_workspace<H: WorkspaceHost>(
    workspace: &WorkspaceDefinition,
    host: H,
    path: Option<&Path>,
) -> Result<(), WorkspaceError> {
    let mut writer = WorkspaceWriter::new(host);
    if let Some(path) = path {
        writer = writer.path(path);
    }
    writer.write(workspace)
}

/// Plain JSON for the whole workspace: `$schema`, `version`, extensions, then `projects`.
pub fn serialize(workspace: &WorkspaceDefinition, schema: Option<&str>) -> Map<String, Value> {
    let mut document = Map::new();
    document.insert(
        "$schema".to_string(),
        Value::String(schema.unwrap_or(DEFAULT_SCHEMA).to_string()),
    );
    document.insert("version".to_string(), Value::from(1));
    for (key, value) in workspace.extensions().iter() {
        document.insert(key.to_string(), value.clone());
    }
    if !workspace.projects().is_empty() {
        document.insert(PROJECTS_KEY.to_string(), workspace.projects().to_json());
    }
    document
}

/// Maps a journal entry onto the current document: the real path and the value to write.
fn resolve_entry(tree: &Node, entry: &JournalEntry, legacy: bool) -> (JsonPath, Option<Value>) {
    let mut path = entry.path.clone();
    let project = project_of(&path).map(str::to_string);
    if let Some(project) = project.as_deref() {
        if path.len() >= 3 && path.segments()[2].as_key() == Some(TARGETS_KEY) {
            path.segments_mut()[2] = Segment::key(targets_key(tree, project, legacy));
        }
    }

    let value = match (entry.kind, entry.value.clone()) {
        (_, None) => None,
        (ChangeKind::Value | ChangeKind::Target, value) => value,
        (ChangeKind::TargetCollection, Some(value)) => non_empty(value),
        (ChangeKind::Project, Some(value)) => {
            let key = project.as_deref().map_or(
                legacy_key(legacy),
                |name| targets_key(tree, name, legacy),
            );
            Some(project_value(value, key))
        }
        (ChangeKind::ProjectCollection, Some(value)) => non_empty(value).map(|value| match value {
            Value::Object(projects) => Value::Object(
                projects
                    .into_iter()
                    .map(|(name, project)| {
                        let key = targets_key(tree, &name, legacy);
                        (name, project_value(project, key))
                    })
                    .collect(),
            ),
            other => other,
        }),
    };
    (path, value)
}

/// Project name for paths under `/projects/<name>`.
fn project_of(path: &JsonPath) -> Option<&str> {
    match path.segments() {
        [Segment::Key(first), Segment::Key(name), ..] if first == PROJECTS_KEY => Some(name),
        _ => None,
    }
}

/// The key a project's targets live under in the current text.
fn targets_key(tree: &Node, project: &str, legacy: bool) -> &'static str {
    let node = tree
        .member(PROJECTS_KEY)
        .and_then(|projects| projects.value.member(project));
    match node {
        Some(member) if member.value.member(TARGETS_KEY).is_some() => TARGETS_KEY,
        Some(member) if member.value.member(LEGACY_TARGETS_KEY).is_some() => LEGACY_TARGETS_KEY,
        _ => legacy_key(legacy),
    }
}

fn legacy_key(legacy: bool) -> &'static str {
    if legacy {
        LEGACY_TARGETS_KEY
    } else {
        TARGETS_KEY
    }
}

fn non_empty(value: Value) -> Option<Value> {
    match &value {
        Value::Object(map) if map.is_empty() => None,
        _ => Some(value),
    }
}

/// Drops an empty `targets` member and renames it to `key`, keeping member order.
fn project_value(value: Value, key: &str) -> Value {
    let map = match value {
        Value::Object(map) => map,
        other => return other,
    };
    let project = map
        .into_iter()
        .filter_map(|(name, value)| {
            if name != TARGETS_KEY {
                return Some((name, value));
            }
            non_empty(value).map(|targets| (key.to_string(), targets))
        })
        .collect();
    Value::Object(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn project_values_drop_empty_targets_and_rename_legacy_key() {
        let value = json!({"root": "a", "targets": {}, "prefix": "p"});
        assert_eq!(project_value(value, TARGETS_KEY), json!({"root": "a", "prefix": "p"}));

        let value = json!({"root": "a", "targets": {"b": {"builder": "x"}}, "z": 1});
        let renamed = project_value(value, LEGACY_TARGETS_KEY);
        let keys: Vec<_> = renamed.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["root", "architect", "z"]);
    }

    #[test]
    fn target_paths_follow_the_key_used_by_the_project() {
        let tree = parse_tree(
            r#"{"projects": {"old": {"root": "o", "architect": {}}, "new": {"root": "n", "targets": {}}}}"#,
        )
        .unwrap();
        assert_eq!(targets_key(&tree, "old", false), LEGACY_TARGETS_KEY);
        assert_eq!(targets_key(&tree, "new", true), TARGETS_KEY);
        assert_eq!(targets_key(&tree, "missing", true), LEGACY_TARGETS_KEY);
        assert_eq!(targets_key(&tree, "missing", false), TARGETS_KEY);

        let entry = JournalEntry {
            path: JsonPath::from(["projects", "old", "targets", "build"]),
            value: Some(json!({"builder": "x"})),
            kind: ChangeKind::Target,
        };
        let (path, value) = resolve_entry(&tree, &entry, false);
        assert_eq!(path.to_string(), "/projects/old/architect/build");
        assert_eq!(value, Some(json!({"builder": "x"})));
    }

    #[test]
    fn empty_collections_become_removals() {
        let tree = parse_tree("{}").unwrap();
        let entry = JournalEntry {
            path: JsonPath::from(["projects"]),
            value: Some(json!({})),
            kind: ChangeKind::ProjectCollection,
        };
        assert_eq!(resolve_entry(&tree, &entry, false).1, None);
    }
}
