//! Typed, change-tracking model of a `workspace.json` document.
//!
//! [`read_workspace`] turns a JSON-with-comments file into a
//! [`WorkspaceDefinition`]. Mutations made through the typed API are recorded
//! in a coalescing [`ChangeJournal`], and [`write_workspace`] replays that
//! journal as minimal text edits so comments and formatting survive.
//!
//! ```
//! use wsconf_workspace::{read_workspace, write_workspace, MemoryHost};
//!
//! let host = MemoryHost::new().with_file(
//!     "/repo/workspace.json",
//!     "{\n  // apps\n  \"version\": 1,\n  \"projects\": {\"web\": {\"root\": \"apps/web\"}}\n}\n",
//! );
//! let mut workspace = read_workspace("/repo", &host).unwrap();
//! workspace
//!     .projects_mut()
//!     .get_mut("web")
//!     .unwrap()
//!     .set_prefix(Some("web"));
//! write_workspace(&workspace, &host, None).unwrap();
//!
//! let text = host.file("/repo/workspace.json").unwrap();
//! assert!(text.contains("// apps"));
//! assert!(text.contains("\"prefix\": \"web\""));
//! ```

mod collection;
mod definitions;
mod error;
mod format;
mod host;
mod journal;
mod metadata;
mod reader;
mod tracking;
mod value_path;
mod writer;

pub use collection::{
    ChangeAction, CollectionChange, CollectionListener, Definition, DefinitionCollection,
};
pub use definitions::{
    ProjectCollection, ProjectDefinition, ProjectDraft, TargetCollection, TargetDefinition,
    TargetDraft, WorkspaceDefinition, LEGACY_TARGETS_KEY, PROJECTS_KEY, TARGETS_KEY,
};
pub use error::WorkspaceError;
pub use format::{WorkspaceFormat, WORKSPACE_FILE_NAMES};
pub use host::{write_atomic, FsHost, MemoryHost, WorkspaceHost};
pub use journal::{ChangeJournal, ChangeKind, JournalEntry};
pub use reader::{read_workspace, ReadWarning, WorkspaceReader};
pub use tracking::{ChangeRecorder, KeyFilter, TrackedObject};
pub use writer::{serialize, write_workspace, WorkspaceWriter, DEFAULT_SCHEMA};
pub use wsconf_jsonc::{JsonPath, Segment};
