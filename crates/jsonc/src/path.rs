//! Paths into a JSON document.
//!
//! A path is a sequence of segments from the document root; each segment is
//! either an object key or an array index.

use std::fmt;

/// A single step in a [`JsonPath`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    pub fn key(key: impl Into<String>) -> Self {
        Segment::Key(key.into())
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            Segment::Key(key) => Some(key),
            Segment::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Key(_) => None,
            Segment::Index(index) => Some(*index),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => f.write_str(&key.replace('~', "~0").replace('/', "~1")),
            Segment::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Segment::Key(key.to_owned())
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        Segment::Key(key)
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

/// A location inside a JSON document, rendered as a JSON pointer (`/projects/app/root`).
///
/// ```
/// use wsconf_jsonc::JsonPath;
///
/// let path = JsonPath::root().key("projects").key("app").key("root");
/// assert_eq!(path.len(), 3);
/// assert_eq!(path.to_string(), "/projects/app/root");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JsonPath(Vec<Segment>);

impl JsonPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    /// Appends a key segment (builder style).
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.0.push(Segment::Key(key.into()));
        self
    }

    /// Appends an index segment (builder style).
    pub fn index(mut self, index: usize) -> Self {
        self.0.push(Segment::Index(index));
        self
    }

    pub fn push(&mut self, segment: impl Into<Segment>) {
        self.0.push(segment.into());
    }

    pub fn pop(&mut self) -> Option<Segment> {
        self.0.pop()
    }

    /// Returns a new path extended by one segment.
    pub fn child(&self, segment: impl Into<Segment>) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend_from_slice(&self.0);
        segments.push(segment.into());
        Self(segments)
    }

    /// Returns a new path extended by all segments of `relative`.
    pub fn join(&self, relative: &[Segment]) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + relative.len());
        segments.extend_from_slice(&self.0);
        segments.extend_from_slice(relative);
        Self(segments)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn segments_mut(&mut self) -> &mut Vec<Segment> {
        &mut self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    pub fn parent(&self) -> Option<JsonPath> {
        self.0
            .split_last()
            .map(|(_, parent)| JsonPath(parent.to_vec()))
    }

    /// True when `self` equals `other` or lies underneath it.
    pub fn starts_with(&self, other: &JsonPath) -> bool {
        self.0.starts_with(&other.0)
    }

    /// True when `self` lies strictly underneath `other`.
    pub fn is_descendant_of(&self, other: &JsonPath) -> bool {
        self.0.len() > other.0.len() && self.starts_with(other)
    }

    /// Segments of `self` below `prefix`, when `prefix` is an ancestor or equal.
    pub fn strip_prefix(&self, prefix: &JsonPath) -> Option<&[Segment]> {
        self.0.strip_prefix(prefix.0.as_slice())
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl From<Vec<Segment>> for JsonPath {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

impl From<&[&str]> for JsonPath {
    fn from(keys: &[&str]) -> Self {
        Self(keys.iter().map(|key| Segment::from(*key)).collect())
    }
}

impl<const N: usize> From<[&str; N]> for JsonPath {
    fn from(keys: [&str; N]) -> Self {
        Self(keys.iter().map(|key| Segment::from(*key)).collect())
    }
}

impl<'a> IntoIterator for &'a JsonPath {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_escapes_pointer_characters() {
        let path = JsonPath::root().key("a/b").key("c~d").index(2);
        assert_eq!(path.to_string(), "/a~1b/c~0d/2");
        assert_eq!(JsonPath::root().to_string(), "/");
    }

    #[test]
    fn ancestry_checks() {
        let parent = JsonPath::from(["projects", "app"]);
        let child = parent.child("root");
        assert!(child.is_descendant_of(&parent));
        assert!(!parent.is_descendant_of(&parent));
        assert!(parent.starts_with(&parent));
        assert_eq!(child.strip_prefix(&parent), Some(&[Segment::from("root")][..]));
        assert_eq!(child.parent(), Some(parent));
    }
}
