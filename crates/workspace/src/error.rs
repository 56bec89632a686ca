use std::io;
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;
use wsconf_jsonc::JsonPath;

/// Errors raised while loading, mutating, or persisting a workspace document.
/// 載入、修改或儲存工作區文件時的錯誤。
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("malformed workspace document: {message}")]
    MalformedDocument { message: String },
    #[error("unsupported workspace version: {}", describe_version(.found))]
    UnsupportedVersion { found: Option<Value> },
    #[error("missing required field '{field}' at {location}")]
    MissingRequiredField {
        field: &'static str,
        location: JsonPath,
    },
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: &'static str, name: String },
    #[error("unsupported workspace format '{format}'")]
    UnsupportedFormat { format: String },
    #[error("a path is required to write a workspace that was not loaded from disk")]
    PathRequired,
    #[error("no workspace file found in {}", .directory.display())]
    WorkspaceFileNotFound { directory: PathBuf },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl WorkspaceError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        WorkspaceError::MalformedDocument {
            message: message.into(),
        }
    }
}

fn describe_version(found: &Option<Value>) -> String {
    match found {
        Some(value) => format!("found {value}, expected 1"),
        None => "missing 'version' field".to_string(),
    }
}
