//! Loads a workspace file into a tracked [`WorkspaceDefinition`].

use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use wsconf_jsonc::{parse_tree, JsonPath};

use crate::definitions::{
    ProjectCollection, ProjectDefinition, TargetCollection, TargetDefinition, WorkspaceDefinition,
    LEGACY_TARGETS_KEY, PROJECTS_KEY, TARGETS_KEY,
};
use crate::error::WorkspaceError;
use crate::format::{WorkspaceFormat, WORKSPACE_FILE_NAMES};
use crate::host::WorkspaceHost;
use crate::metadata::DocumentMetadata;

const SUPPORTED_VERSION: f64 = 1.0;

const WORKSPACE_EXTENSIONS: &[&str] = &["cli", "defaultProject", "newProjectRoot", "schematics"];
const PROJECT_EXTENSIONS: &[&str] = &["cli", "schematics", "projectType", "i18n"];

static VENDOR_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{1,3}-.*").expect("vendor prefix pattern is valid"));

/// A non-fatal finding produced while reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadWarning {
    pub location: JsonPath,
    pub message: String,
}

impl fmt::Display for ReadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

type WarningSink<'a> = Box<dyn FnMut(&ReadWarning) + 'a>;

/// Configurable reader.
///
/// ```
/// use wsconf_workspace::{MemoryHost, WorkspaceReader};
///
/// let host = MemoryHost::new().with_file("/repo/workspace.json", r#"{"version": 1}"#);
/// let mut warnings = Vec::new();
/// let workspace = WorkspaceReader::new(&host)
///     .on_warning(|warning| warnings.push(warning.clone()))
///     .read("/repo")
///     .unwrap();
/// assert!(workspace.projects().is_empty());
/// ```
pub struct WorkspaceReader<'a, H: WorkspaceHost> {
    host: H,
    format: Option<WorkspaceFormat>,
    on_warning: Option<WarningSink<'a>>,
}

impl<'a, H: WorkspaceHost> WorkspaceReader<'a, H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            format: None,
            on_warning: None,
        }
    }

    /// Overrides format detection.
    pub fn format(mut self, format: WorkspaceFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Routes unknown-key warnings to `sink` instead of the log.
    pub fn on_warning<F>(mut self, sink: F) -> Self
    where
        F: FnMut(&ReadWarning) + 'a,
    {
        self.on_warning = Some(Box::new(sink));
        self
    }

    /// Reads the workspace at `path`, which may be a file or a directory holding one.
    pub fn read(mut self, path: impl AsRef<Path>) -> Result<WorkspaceDefinition, WorkspaceError> {
        let file_path = self.locate(path.as_ref())?;
        let format = match self.format {
            Some(format) => format,
            None => WorkspaceFormat::detect(&file_path)?,
        };
        let raw = self.host.read_file(&file_path)?;
        debug!(path = %file_path.display(), %format, bytes = raw.len(), "reading workspace");

        let root = parse_tree(&raw)
            .map_err(|err| {
                WorkspaceError::malformed(format!("{}: {err}", file_path.display()))
            })?
            .to_value();
        let Value::Object(root) = root else {
            return Err(WorkspaceError::malformed(format!(
                "{}: the document root must be an object",
                file_path.display()
            )));
        };

        let version = root.get("version");
        if version.and_then(Value::as_f64) != Some(SUPPORTED_VERSION) {
            return Err(WorkspaceError::UnsupportedVersion {
                found: version.cloned(),
            });
        }

        let mut extensions = Map::new();
        let mut projects = ProjectCollection::new();
        let mut has_legacy_targets_name = false;
        for (key, value) in root {
            match key.as_str() {
                "$schema" | "version" => {}
                PROJECTS_KEY => {
                    let location = JsonPath::root().key(PROJECTS_KEY);
                    let entries = match value {
                        Value::Object(entries) => entries,
                        other => return Err(type_error(&location, "an object", &other)),
                    };
                    for (name, project) in entries {
                        let location = location.child(name.as_str());
                        let (project, legacy) = self.read_project(&location, project)?;
                        has_legacy_targets_name |= legacy;
                        projects.insert_loaded(name, project);
                    }
                }
                _ => {
                    self.check_extension(&JsonPath::root(), &key, WORKSPACE_EXTENSIONS);
                    extensions.insert(key, value);
                }
            }
        }

        debug!(
            path = %file_path.display(),
            projects = projects.len(),
            legacy_targets = has_legacy_targets_name,
            "loaded workspace"
        );
        let mut workspace = WorkspaceDefinition::from_parts(extensions, projects);
        workspace.attach(DocumentMetadata::new(
            file_path,
            format,
            raw,
            has_legacy_targets_name,
        ));
        Ok(workspace)
    }

    fn locate(&self, path: &Path) -> Result<PathBuf, WorkspaceError> {
        if !self.host.is_directory(path) {
            return Ok(path.to_path_buf());
        }
        WORKSPACE_FILE_NAMES
            .iter()
            .map(|name| path.join(name))
            .find(|candidate| self.host.is_file(candidate))
            .ok_or_else(|| WorkspaceError::WorkspaceFileNotFound {
                directory: path.to_path_buf(),
            })
    }

    fn read_project(
        &mut self,
        location: &JsonPath,
        value: Value,
    ) -> Result<(ProjectDefinition, bool), WorkspaceError> {
        let entries = match value {
            Value::Object(entries) => entries,
            other => return Err(type_error(location, "an object", &other)),
        };
        if entries.contains_key(TARGETS_KEY) && entries.contains_key(LEGACY_TARGETS_KEY) {
            return Err(WorkspaceError::malformed(format!(
                "{location}: '{TARGETS_KEY}' and '{LEGACY_TARGETS_KEY}' cannot both be present"
            )));
        }

        let mut fields = Map::new();
        let mut extensions = Map::new();
        let mut targets = TargetCollection::new();
        let mut legacy = false;
        for (key, value) in entries {
            match key.as_str() {
                "root" | "sourceRoot" | "prefix" => {
                    if !value.is_string() {
                        return Err(type_error(&location.child(key.as_str()), "a string", &value));
                    }
                    fields.insert(key, value);
                }
                TARGETS_KEY | LEGACY_TARGETS_KEY => {
                    legacy = key == LEGACY_TARGETS_KEY;
                    let location = location.child(key.as_str());
                    let entries = match value {
                        Value::Object(entries) => entries,
                        other => return Err(type_error(&location, "an object", &other)),
                    };
                    for (name, target) in entries {
                        let target = read_target(&location.child(name.as_str()), target)?;
                        targets.insert_loaded(name, target);
                    }
                }
                _ => {
                    self.check_extension(location, &key, PROJECT_EXTENSIONS);
                    extensions.insert(key, value);
                }
            }
        }
        if !fields.contains_key("root") {
            return Err(WorkspaceError::MissingRequiredField {
                field: "root",
                location: location.clone(),
            });
        }

        Ok((
            ProjectDefinition::from_parts(fields, extensions, targets),
            legacy,
        ))
    }

    fn check_extension(&mut self, location: &JsonPath, key: &str, allowed: &[&str]) {
        if allowed.contains(&key) || VENDOR_PREFIX.is_match(key) {
            return;
        }
        let warning = ReadWarning {
            location: location.child(key),
            message: format!(
                "unknown extension '{key}'; vendor extensions should use a short prefix such as 'my-'"
            ),
        };
        match self.on_warning.as_mut() {
            Some(sink) => sink(&warning),
            None => warn!(location = %warning.location, "{}", warning.message),
        }
    }
}

fn read_target(location: &JsonPath, value: Value) -> Result<TargetDefinition, WorkspaceError> {
    let entries = match value {
        Value::Object(entries) => entries,
        other => return Err(type_error(location, "an object", &other)),
    };
    let mut fields = Map::new();
    for (key, value) in entries {
        let field = location.child(key.as_str());
        match key.as_str() {
            "builder" | "defaultConfiguration" => {
                if !value.is_string() {
                    return Err(type_error(&field, "a string", &value));
                }
            }
            "options" => {
                if !value.is_object() {
                    return Err(type_error(&field, "an object", &value));
                }
            }
            "configurations" => {
                let Some(configurations) = value.as_object() else {
                    return Err(type_error(&field, "an object", &value));
                };
                for (name, overrides) in configurations {
                    if !overrides.is_object() {
                        return Err(type_error(&field.child(name.as_str()), "an object", overrides));
                    }
                }
            }
            _ => {
                debug!(location = %field, "ignoring unknown target field");
                continue;
            }
        }
        fields.insert(key, value);
    }
    if !fields.contains_key("builder") {
        return Err(WorkspaceError::MissingRequiredField {
            field: "builder",
            location: location.clone(),
        });
    }
    Ok(TargetDefinition::from_map(fields))
}

fn type_error(location: &JsonPath, expected: &str, found: &Value) -> WorkspaceError {
    let found = match found {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    WorkspaceError::malformed(format!("{location}: expected {expected}, found {found}"))
}

/// Reads a workspace with default settings.
pub fn read_workspace<H: WorkspaceHost>(
    path: impl AsRef<Path>,
    host: H,
) -> Result<WorkspaceDefinition, WorkspaceError> {
    WorkspaceReader::new(host).read(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    fn read(text: &str) -> Result<WorkspaceDefinition, WorkspaceError> {
        let host = MemoryHost::new().with_file("/w/workspace.json", text);
        read_workspace("/w/workspace.json", &host)
    }

    #[test]
    fn vendor_prefix_pattern() {
        assert!(VENDOR_PREFIX.is_match("nx-cloud"));
        assert!(VENDOR_PREFIX.is_match("abc-"));
        assert!(!VENDOR_PREFIX.is_match("abcd-x"));
        assert!(!VENDOR_PREFIX.is_match("Ab-x"));
        assert!(!VENDOR_PREFIX.is_match("custom"));
    }

    #[test]
    fn structural_types_are_checked() {
        for text in [
            r#"{"version": 1, "projects": []}"#,
            r#"{"version": 1, "projects": {"a": "x"}}"#,
            r#"{"version": 1, "projects": {"a": {"root": 3}}}"#,
            r#"{"version": 1, "projects": {"a": {"root": "a", "targets": {"b": {"builder": "x", "options": 1}}}}}"#,
            r#"{"version": 1, "projects": {"a": {"root": "a", "targets": {"b": {"builder": "x", "configurations": {"c": 1}}}}}}"#,
            r#"{"version": 1, "projects": {"a": {"root": "a", "targets": {}, "architect": {}}}}"#,
            r#"[1, 2]"#,
            r#"{"version": 1"#,
        ] {
            assert!(
                matches!(read(text), Err(WorkspaceError::MalformedDocument { .. })),
                "{text}"
            );
        }
    }

    #[test]
    fn missing_builder_is_reported_with_location() {
        let err = read(r#"{"version": 1, "projects": {"a": {"root": "a", "targets": {"t": {}}}}}"#)
            .unwrap_err();
        match err {
            WorkspaceError::MissingRequiredField { field, location } => {
                assert_eq!(field, "builder");
                assert_eq!(location.to_string(), "/projects/a/targets/t");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn version_must_be_exactly_one() {
        for text in [r#"{}"#, r#"{"version": "1"}"#, r#"{"version": 1.5}"#, r#"{"version": 0}"#] {
            assert!(
                matches!(read(text), Err(WorkspaceError::UnsupportedVersion { .. })),
                "{text}"
            );
        }
        assert!(read(r#"{"version": 1.0}"#).is_ok());
    }
}
