//! Minimal textual edits against JSON-with-comments documents.
//!
//! [`modify`] computes the edits that set or remove the value at a path while
//! leaving every byte outside the touched span alone, so comments, key order
//! and formatting elsewhere survive.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::parser::{parse_tree, Node, NodeKind, ParseError};
use crate::path::{JsonPath, Segment};

/// Replace `length` bytes at `offset` with `content`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub offset: usize,
    pub length: usize,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattingOptions {
    pub tab_size: usize,
    pub insert_spaces: bool,
    pub eol: String,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            tab_size: 2,
            insert_spaces: true,
            eol: "\n".to_string(),
        }
    }
}

impl FormattingOptions {
    /// Infers the indentation unit and line ending already used by `text`.
    pub fn detect(text: &str) -> Self {
        let mut options = Self::default();
        if text.contains("\r\n") {
            options.eol = "\r\n".to_string();
        }
        let indented = text.lines().find_map(|line| {
            let content = line.trim_start_matches([' ', '\t']);
            let indent = &line[..line.len() - content.len()];
            (!indent.is_empty() && !content.trim().is_empty()).then_some(indent)
        });
        if let Some(indent) = indented {
            if indent.starts_with('\t') {
                options.insert_spaces = false;
                options.tab_size = 1;
            } else {
                options.tab_size = indent.len();
            }
        }
        options
    }

    fn indent_unit(&self) -> String {
        if self.insert_spaces {
            " ".repeat(self.tab_size)
        } else {
            "\t".to_string()
        }
    }
}

#[derive(Debug, Error)]
pub enum EditError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("cannot modify {path}: expected {expected} but found {found}")]
    InvalidParent {
        path: JsonPath,
        expected: &'static str,
        found: &'static str,
    },
    #[error("the document root cannot be removed")]
    RootRemoval,
}

/// Computes the edits that set (`Some`) or remove (`None`) the value at `path`.
///
/// Missing intermediate objects are created. Removing a path that does not
/// exist yields no edits.
pub fn modify(
    text: &str,
    path: &JsonPath,
    value: Option<&Value>,
    options: &FormattingOptions,
) -> Result<Vec<Edit>, EditError> {
    let root = parse_tree(text)?;
    let segments = path.segments();
    let Some((last, parents)) = segments.split_last() else {
        return match value {
            Some(value) => Ok(vec![replace_node(text, &root, value, options)]),
            None => Err(EditError::RootRemoval),
        };
    };

    let mut parent = &root;
    for (depth, segment) in parents.iter().enumerate() {
        match parent.child(segment) {
            Some(child) => parent = child,
            None => {
                let Some(value) = value else {
                    return Ok(Vec::new());
                };
                let nested = nest(&segments[depth + 1..], value.clone());
                let at = JsonPath::from_segments(segments[..=depth].to_vec());
                return set_child(text, parent, segment, &nested, &at, options);
            }
        }
    }

    match value {
        Some(value) => set_child(text, parent, last, value, path, options),
        None => Ok(remove_child(parent, last)),
    }
}

/// Applies edits to `text`; edits must not overlap.
pub fn apply_edits(text: &str, edits: &[Edit]) -> String {
    let mut sorted: Vec<&Edit> = edits.iter().collect();
    sorted.sort_by(|a, b| b.offset.cmp(&a.offset));
    let mut result = text.to_string();
    for edit in sorted {
        result.replace_range(edit.offset..edit.offset + edit.length, &edit.content);
    }
    result
}

/// [`modify`] followed by [`apply_edits`].
pub fn patch(
    text: &str,
    path: &JsonPath,
    value: Option<&Value>,
    options: &FormattingOptions,
) -> Result<String, EditError> {
    let edits = modify(text, path, value, options)?;
    Ok(apply_edits(text, &edits))
}

fn nest(rest: &[Segment], value: Value) -> Value {
    rest.iter().rev().fold(value, |inner, segment| match segment {
        Segment::Key(key) => {
            let mut map = Map::new();
            map.insert(key.clone(), inner);
            Value::Object(map)
        }
        Segment::Index(_) => Value::Array(vec![inner]),
    })
}

fn set_child(
    text: &str,
    parent: &Node,
    segment: &Segment,
    value: &Value,
    path: &JsonPath,
    options: &FormattingOptions,
) -> Result<Vec<Edit>, EditError> {
    match (&parent.kind, segment) {
        (NodeKind::Object(members), Segment::Key(key)) => {
            if let Some(member) = members.iter().rev().find(|member| &member.key == key) {
                return Ok(vec![replace_node(text, &member.value, value, options)]);
            }
            let entry_key = serde_json::to_string(key).unwrap_or_else(|_| format!("\"{key}\""));
            let anchors: Vec<(usize, usize)> = members
                .iter()
                .map(|member| (member.key_offset, member.end()))
                .collect();
            Ok(vec![insert_entry(
                text,
                parent,
                &anchors,
                |indent, inline| {
                    if inline {
                        format!("{entry_key}: {}", compact(value))
                    } else {
                        format!("{entry_key}: {}", pretty(value, indent, options))
                    }
                },
                options,
            )])
        }
        (NodeKind::Array(items), Segment::Index(index)) => {
            if let Some(item) = items.get(*index) {
                return Ok(vec![replace_node(text, item, value, options)]);
            }
            let anchors: Vec<(usize, usize)> =
                items.iter().map(|item| (item.offset, item.end())).collect();
            Ok(vec![insert_entry(
                text,
                parent,
                &anchors,
                |indent, inline| {
                    if inline {
                        compact(value)
                    } else {
                        pretty(value, indent, options)
                    }
                },
                options,
            )])
        }
        (_, Segment::Key(_)) => Err(EditError::InvalidParent {
            path: path.clone(),
            expected: "object",
            found: parent.type_name(),
        }),
        (_, Segment::Index(_)) => Err(EditError::InvalidParent {
            path: path.clone(),
            expected: "array",
            found: parent.type_name(),
        }),
    }
}

/// Appends an entry after the last existing one, or fills an empty container.
fn insert_entry(
    text: &str,
    container: &Node,
    anchors: &[(usize, usize)],
    render: impl Fn(&str, bool) -> String,
    options: &FormattingOptions,
) -> Edit {
    let eol = &options.eol;
    match anchors.last() {
        Some(&(last_start, last_end)) => {
            if !text[container.offset..last_start].contains('\n') {
                Edit {
                    offset: last_end,
                    length: 0,
                    content: format!(", {}", render("", true)),
                }
            } else {
                let indent = line_indent(text, last_start);
                Edit {
                    offset: last_end,
                    length: 0,
                    content: format!(",{eol}{indent}{}", render(indent, false)),
                }
            }
        }
        None => {
            let outer = line_indent(text, container.offset);
            let inner = format!("{outer}{}", options.indent_unit());
            let body_start = container.offset + 1;
            let body_end = container.end() - 1;
            let body = &text[body_start..body_end];
            if body.trim().is_empty() {
                Edit {
                    offset: body_start,
                    length: body.len(),
                    content: format!("{eol}{inner}{}{eol}{outer}", render(&inner, false)),
                }
            } else {
                // keep comments living inside the empty container
                Edit {
                    offset: body_start,
                    length: 0,
                    content: format!("{eol}{inner}{}", render(&inner, false)),
                }
            }
        }
    }
}

fn remove_child(parent: &Node, segment: &Segment) -> Vec<Edit> {
    let spans: Vec<(usize, usize)> = match (&parent.kind, segment) {
        (NodeKind::Object(members), Segment::Key(_)) => members
            .iter()
            .map(|member| (member.key_offset, member.end()))
            .collect(),
        (NodeKind::Array(items), Segment::Index(_)) => {
            items.iter().map(|item| (item.offset, item.end())).collect()
        }
        _ => return Vec::new(),
    };
    let position = match (&parent.kind, segment) {
        (NodeKind::Object(members), Segment::Key(key)) => {
            members.iter().rposition(|member| &member.key == key)
        }
        (NodeKind::Array(items), Segment::Index(index)) => (*index < items.len()).then_some(*index),
        _ => None,
    };
    let Some(index) = position else {
        return Vec::new();
    };

    let (start, end) = if spans.len() == 1 {
        spans[0]
    } else if index > 0 {
        (spans[index - 1].1, spans[index].1)
    } else {
        (spans[0].0, spans[1].0)
    };
    vec![Edit {
        offset: start,
        length: end - start,
        content: String::new(),
    }]
}

fn replace_node(text: &str, node: &Node, value: &Value, options: &FormattingOptions) -> Edit {
    let indent = line_indent(text, node.offset);
    Edit {
        offset: node.offset,
        length: node.length,
        content: pretty(value, indent, options),
    }
}

/// Leading whitespace of the line containing `offset`.
fn line_indent(text: &str, offset: usize) -> &str {
    let line_start = text[..offset].rfind('\n').map(|idx| idx + 1).unwrap_or(0);
    let line = &text[line_start..offset];
    let content = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - content.len()]
}

fn compact(value: &Value) -> String {
    value.to_string()
}

fn pretty(value: &Value, base_indent: &str, options: &FormattingOptions) -> String {
    let unit = options.indent_unit();
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(unit.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    if value.serialize(&mut serializer).is_err() {
        return compact(value);
    }
    let rendered = String::from_utf8(buf).unwrap_or_else(|_| compact(value));
    rendered.replace('\n', &format!("{}{base_indent}", options.eol))
}
