use std::str::FromStr;

use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::path::Segment;

/// Deepest array/object nesting accepted before parsing gives up.
pub const MAX_DEPTH: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("invalid number literal")]
    InvalidNumber,
    #[error("invalid escape sequence")]
    InvalidEscape,
    #[error("control character in string literal")]
    ControlCharacter,
    #[error("unterminated block comment")]
    UnterminatedComment,
    #[error("expected {0}")]
    Expected(&'static str),
    #[error("nesting deeper than {MAX_DEPTH} levels")]
    NestingTooDeep,
}

/// Parse failure with the byte offset and 1-based line/column of the culprit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at line {line}, column {column}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    fn at(input: &str, offset: usize, kind: ParseErrorKind) -> Self {
        let before = &input[..offset.min(input.len())];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|idx| idx + 1).unwrap_or(0);
        let column = before[line_start..].chars().count() + 1;
        Self {
            kind,
            offset,
            line,
            column,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Node>),
    Object(Vec<Member>),
}

/// A parsed value together with the byte span it occupies in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub offset: usize,
    pub length: usize,
}

/// One `"key": value` pair of an object node.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub key: String,
    pub key_offset: usize,
    pub key_length: usize,
    pub value: Node,
}

impl Member {
    pub fn offset(&self) -> usize {
        self.key_offset
    }

    pub fn end(&self) -> usize {
        self.value.end()
    }
}

impl Node {
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Null => "null",
            NodeKind::Bool(_) => "boolean",
            NodeKind::Number(_) => "number",
            NodeKind::String(_) => "string",
            NodeKind::Array(_) => "array",
            NodeKind::Object(_) => "object",
        }
    }

    pub fn members(&self) -> Option<&[Member]> {
        match &self.kind {
            NodeKind::Object(members) => Some(members),
            _ => None,
        }
    }

    pub fn items(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Looks up an object member; when a key repeats, the last one wins.
    pub fn member(&self, key: &str) -> Option<&Member> {
        self.members()?.iter().rev().find(|member| member.key == key)
    }

    pub fn child(&self, segment: &Segment) -> Option<&Node> {
        match segment {
            Segment::Key(key) => self.member(key).map(|member| &member.value),
            Segment::Index(index) => self.items()?.get(*index),
        }
    }

    /// Resolves a path to the structural node it names.
    pub fn find(&self, path: &[Segment]) -> Option<&Node> {
        path.iter()
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// Materializes the node into a plain value, keeping source key order.
    pub fn to_value(&self) -> Value {
        match &self.kind {
            NodeKind::Null => Value::Null,
            NodeKind::Bool(value) => Value::Bool(*value),
            NodeKind::Number(number) => Value::Number(number.clone()),
            NodeKind::String(text) => Value::String(text.clone()),
            NodeKind::Array(items) => Value::Array(items.iter().map(Node::to_value).collect()),
            NodeKind::Object(members) => {
                let mut map = Map::new();
                for member in members {
                    map.insert(member.key.clone(), member.value.to_value());
                }
                Value::Object(map)
            }
        }
    }
}

/// Parses JSON-with-comments text into a position-aware tree.
pub fn parse_tree(input: &str) -> Result<Node, ParseError> {
    let mut parser = Parser::new(input);
    parser.skip_bom();
    let node = parser.parse_value()?;
    parser.skip_trivia()?;
    if let Some(ch) = parser.peek() {
        return Err(parser.error(ParseErrorKind::UnexpectedCharacter(ch)));
    }
    Ok(node)
}

/// Parses JSON-with-comments text straight into a plain value.
pub fn parse(input: &str) -> Result<Value, ParseError> {
    parse_tree(input).map(|node| node.to_value())
}

struct Parser<'a> {
    input: &'a str,
    position: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            depth: 0,
        }
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::at(self.input, self.position, kind)
    }

    fn skip_bom(&mut self) {
        if self.peek() == Some('\u{feff}') {
            self.position += '\u{feff}'.len_utf8();
        }
    }

    fn parse_value(&mut self) -> Result<Node, ParseError> {
        self.skip_trivia()?;
        let start = self.position;
        let kind = match self.peek() {
            Some('n') => self.parse_literal("null", NodeKind::Null)?,
            Some('t') => self.parse_literal("true", NodeKind::Bool(true))?,
            Some('f') => self.parse_literal("false", NodeKind::Bool(false))?,
            Some('"') => NodeKind::String(self.parse_string()?),
            Some('[') => self.nested(Self::parse_array)?,
            Some('{') => self.nested(Self::parse_object)?,
            Some('-') | Some('0'..='9') => self.parse_number()?,
            Some(ch) => return Err(self.error(ParseErrorKind::UnexpectedCharacter(ch))),
            None => return Err(self.error(ParseErrorKind::UnexpectedEnd)),
        };
        Ok(Node {
            kind,
            offset: start,
            length: self.position - start,
        })
    }

    fn nested(
        &mut self,
        parse: fn(&mut Self) -> Result<NodeKind, ParseError>,
    ) -> Result<NodeKind, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(ParseErrorKind::NestingTooDeep));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_literal(
        &mut self,
        expected: &'static str,
        kind: NodeKind,
    ) -> Result<NodeKind, ParseError> {
        if self.input[self.position..].starts_with(expected) {
            self.position += expected.len();
            Ok(kind)
        } else {
            Err(self.error(ParseErrorKind::Expected(expected)))
        }
    }

    fn parse_string(&mut self) -> Result<String, ParseError> {
        self.expect('"')?;
        let mut result = String::new();
        loop {
            let ch = self
                .next_char()
                .ok_or_else(|| self.error(ParseErrorKind::UnexpectedEnd))?;
            match ch {
                '"' => return Ok(result),
                '\\' => {
                    let escaped = self
                        .next_char()
                        .ok_or_else(|| self.error(ParseErrorKind::InvalidEscape))?;
                    let translated = match escaped {
                        '"' => '"',
                        '\\' => '\\',
                        '/' => '/',
                        'b' => '\u{0008}',
                        'f' => '\u{000C}',
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        'u' => self.parse_unicode_escape()?,
                        _ => return Err(self.error(ParseErrorKind::InvalidEscape)),
                    };
                    result.push(translated);
                }
                ch if (ch as u32) < 0x20 => {
                    return Err(self.error(ParseErrorKind::ControlCharacter));
                }
                other => result.push(other),
            }
        }
    }

    fn parse_unicode_escape(&mut self) -> Result<char, ParseError> {
        let high = self.parse_hex4()?;
        if (0xD800..0xDC00).contains(&high) {
            if !self.input[self.position..].starts_with("\\u") {
                return Err(self.error(ParseErrorKind::InvalidEscape));
            }
            self.position += 2;
            let low = self.parse_hex4()?;
            if !(0xDC00..0xE000).contains(&low) {
                return Err(self.error(ParseErrorKind::InvalidEscape));
            }
            let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
            return char::from_u32(code).ok_or_else(|| self.error(ParseErrorKind::InvalidEscape));
        }
        char::from_u32(high).ok_or_else(|| self.error(ParseErrorKind::InvalidEscape))
    }

    fn parse_hex4(&mut self) -> Result<u32, ParseError> {
        let digits = self
            .input
            .get(self.position..self.position + 4)
            .filter(|digits| digits.bytes().all(|byte| byte.is_ascii_hexdigit()))
            .ok_or_else(|| self.error(ParseErrorKind::InvalidEscape))?;
        let value = u32::from_str_radix(digits, 16)
            .map_err(|_| self.error(ParseErrorKind::InvalidEscape))?;
        self.position += 4;
        Ok(value)
    }

    fn parse_array(&mut self) -> Result<NodeKind, ParseError> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.peek() == Some(']') {
                self.position += 1;
                break;
            }
            items.push(self.parse_value()?);
            self.skip_trivia()?;
            match self.peek() {
                Some(',') => self.position += 1,
                Some(']') => {
                    self.position += 1;
                    break;
                }
                Some(ch) => return Err(self.error(ParseErrorKind::UnexpectedCharacter(ch))),
                None => return Err(self.error(ParseErrorKind::UnexpectedEnd)),
            }
        }
        Ok(NodeKind::Array(items))
    }

    fn parse_object(&mut self) -> Result<NodeKind, ParseError> {
        self.expect('{')?;
        let mut members = Vec::new();
        loop {
            self.skip_trivia()?;
            match self.peek() {
                Some('}') => {
                    self.position += 1;
                    break;
                }
                Some('"') => {}
                Some(_) => return Err(self.error(ParseErrorKind::Expected("property name"))),
                None => return Err(self.error(ParseErrorKind::UnexpectedEnd)),
            }
            let key_offset = self.position;
            let key = self.parse_string()?;
            let key_length = self.position - key_offset;
            self.skip_trivia()?;
            self.expect(':')?;
            let value = self.parse_value()?;
            members.push(Member {
                key,
                key_offset,
                key_length,
                value,
            });
            self.skip_trivia()?;
            match self.peek() {
                Some(',') => self.position += 1,
                Some('}') => {
                    self.position += 1;
                    break;
                }
                Some(ch) => return Err(self.error(ParseErrorKind::UnexpectedCharacter(ch))),
                None => return Err(self.error(ParseErrorKind::UnexpectedEnd)),
            }
        }
        Ok(NodeKind::Object(members))
    }

    fn parse_number(&mut self) -> Result<NodeKind, ParseError> {
        let start = self.position;
        if self.peek() == Some('-') {
            self.position += 1;
        }
        if self.consume_digits() == 0 {
            return Err(self.error(ParseErrorKind::InvalidNumber));
        }
        if self.peek() == Some('.') {
            self.position += 1;
            if self.consume_digits() == 0 {
                return Err(self.error(ParseErrorKind::InvalidNumber));
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            self.position += 1;
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.position += 1;
            }
            if self.consume_digits() == 0 {
                return Err(self.error(ParseErrorKind::InvalidNumber));
            }
        }
        let text = &self.input[start..self.position];
        Number::from_str(text)
            .map(NodeKind::Number)
            .map_err(|_| ParseError::at(self.input, start, ParseErrorKind::InvalidNumber))
    }

    fn consume_digits(&mut self) -> usize {
        let start = self.position;
        while matches!(self.peek(), Some('0'..='9')) {
            self.position += 1;
        }
        self.position - start
    }

    /// Skips whitespace plus `//` and `/* */` comments.
    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            let rest = &self.input[self.position..];
            if rest.starts_with("//") {
                self.position += rest.find('\n').unwrap_or(rest.len());
            } else if rest.starts_with("/*") {
                match rest[2..].find("*/") {
                    Some(end) => self.position += end + 4,
                    None => return Err(self.error(ParseErrorKind::UnterminatedComment)),
                }
            } else if matches!(self.peek(), Some(' ' | '\n' | '\r' | '\t')) {
                self.position += 1;
            } else {
                return Ok(());
            }
        }
    }

    fn expect(&mut self, ch: char) -> Result<(), ParseError> {
        match self.peek() {
            Some(actual) if actual == ch => {
                self.position += ch.len_utf8();
                Ok(())
            }
            Some(actual) => Err(self.error(ParseErrorKind::UnexpectedCharacter(actual))),
            None => Err(self.error(ParseErrorKind::UnexpectedEnd)),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += ch.len_utf8();
        Some(ch)
    }
}
