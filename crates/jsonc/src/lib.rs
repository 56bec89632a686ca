//! JSON-with-comments parsing and surgical text patching for wsconf.
//!
//! The parser keeps byte spans for every node so that callers can resolve a
//! [`JsonPath`] back to its location in the source, and [`edit::modify`] uses
//! those spans to rewrite a single value without disturbing the rest of the
//! document.

pub mod edit;
mod parser;
mod path;

pub use edit::{apply_edits, modify, patch, Edit, EditError, FormattingOptions};
pub use parser::{
    parse, parse_tree, Member, Node, NodeKind, ParseError, ParseErrorKind, MAX_DEPTH,
};
pub use path::{JsonPath, Segment};
