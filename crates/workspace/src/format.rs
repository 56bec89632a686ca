use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::WorkspaceError;

/// File names probed, in order, when the reader is pointed at a directory.
pub const WORKSPACE_FILE_NAMES: &[&str] = &["workspace.json", ".workspace.json"];

/// On-disk dialect of a workspace file. Only JSON with comments is supported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkspaceFormat {
    #[default]
    Json,
}

impl WorkspaceFormat {
    /// Picks the format from the file name or extension.
    pub fn detect(path: &Path) -> Result<Self, WorkspaceError> {
        let file_name = path.file_name().and_then(|name| name.to_str());
        if file_name.is_some_and(|name| WORKSPACE_FILE_NAMES.contains(&name)) {
            return Ok(WorkspaceFormat::Json);
        }
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => ext.parse(),
            None => Err(WorkspaceError::UnsupportedFormat {
                format: file_name.unwrap_or_default().to_string(),
            }),
        }
    }
}

impl FromStr for WorkspaceFormat {
    type Err = WorkspaceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "json" | "jsonc" => Ok(WorkspaceFormat::Json),
            _ => Err(WorkspaceError::UnsupportedFormat {
                format: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for WorkspaceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkspaceFormat::Json => f.write_str("json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_json_by_extension_or_name() {
        assert_eq!(
            WorkspaceFormat::detect(Path::new("/repo/custom.json")).unwrap(),
            WorkspaceFormat::Json
        );
        assert_eq!(
            WorkspaceFormat::detect(Path::new(".workspace.json")).unwrap(),
            WorkspaceFormat::Json
        );
        assert_eq!("JSONC".parse::<WorkspaceFormat>().unwrap(), WorkspaceFormat::Json);
    }

    #[test]
    fn rejects_other_formats() {
        let err = WorkspaceFormat::detect(Path::new("workspace.yaml")).unwrap_err();
        assert!(matches!(err, WorkspaceError::UnsupportedFormat { format } if format == "yaml"));
        assert!(WorkspaceFormat::detect(Path::new("Makefile")).is_err());
    }
}
