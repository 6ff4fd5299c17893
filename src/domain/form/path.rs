//! Structured field addresses
//!
//! A [`FieldPath`] is an ordered list of segments locating one field inside a
//! form. The textual form (`stores[0].name`, `items[].qty`, `vehicle@1.wheels`)
//! only exists at the render/collect boundary; everything else works on
//! segments.
//!
//! Grammar of the textual form:
//!
//! - `name` / `.name` — object property (the first property has no leading dot)
//! - `[3]` — concrete array index
//! - `[]` — array item template (descriptor paths only, never a control)
//! - `@1` — union branch (does not address data)
//!
//! Property names escape `\`, `.`, `[`, `]` and `@` with a backslash so that
//! every path survives `parse(path.to_string())` unchanged.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const SPECIAL_CHARS: [char; 5] = ['\\', '.', '[', ']', '@'];

/// Segment of a field path
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    /// Object property access: `.fieldName`
    Field(String),
    /// Concrete array position: `[0]`, `[1]`, ...
    Index(usize),
    /// Array item template: `[]`
    Item,
    /// Union branch selection: `@0`, `@1`, ...
    Branch(usize),
}

/// Errors raised while parsing a textual address
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathParseError {
    #[error("empty property name at position {position}")]
    EmptyField { position: usize },

    #[error("unterminated index starting at position {position}")]
    UnterminatedIndex { position: usize },

    #[error("invalid index '{value}' at position {position}")]
    InvalidIndex { value: String, position: usize },

    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedChar { ch: char, position: usize },

    #[error("dangling escape at end of address")]
    DanglingEscape,
}

/// Address of a field relative to the form root
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Create a root path (empty)
    pub fn root() -> Self {
        Self { segments: vec![] }
    }

    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Extend with a property segment
    pub fn child(&self, name: &str) -> Self {
        self.with(PathSegment::Field(name.to_string()))
    }

    /// Extend with a concrete array index
    pub fn index(&self, idx: usize) -> Self {
        self.with(PathSegment::Index(idx))
    }

    /// Extend with the array item template segment
    pub fn item(&self) -> Self {
        self.with(PathSegment::Item)
    }

    /// Extend with a union branch segment
    pub fn branch(&self, idx: usize) -> Self {
        self.with(PathSegment::Branch(idx))
    }

    pub fn with(&self, segment: PathSegment) -> Self {
        let mut new = self.clone();
        new.segments.push(segment);
        new
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Parent path (without the last segment)
    pub fn parent(&self) -> Self {
        let mut new = self.clone();
        new.segments.pop();
        new
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// True when `self` is a proper prefix of `other`
    pub fn is_strict_prefix_of(&self, other: &FieldPath) -> bool {
        self.segments.len() < other.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// True when `self` equals `other` or is a prefix of it
    pub fn contains(&self, other: &FieldPath) -> bool {
        self == other || self.is_strict_prefix_of(other)
    }

    /// True when the path still carries an item template segment
    pub fn is_template(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, PathSegment::Item))
    }

    /// Replace every concrete index with the item template segment
    pub fn to_template(&self) -> Self {
        Self {
            segments: self
                .segments
                .iter()
                .map(|s| match s {
                    PathSegment::Index(_) => PathSegment::Item,
                    other => other.clone(),
                })
                .collect(),
        }
    }

    /// Segments that address data, i.e. without union branch markers
    pub fn data_segments(&self) -> impl Iterator<Item = &PathSegment> {
        self.segments
            .iter()
            .filter(|s| !matches!(s, PathSegment::Branch(_)))
    }

    /// Union branches selected along this path, as (union path, branch index)
    pub fn branch_choices(&self) -> Vec<(FieldPath, usize)> {
        let mut choices = Vec::new();
        for (i, seg) in self.segments.iter().enumerate() {
            if let PathSegment::Branch(b) = seg {
                choices.push((
                    FieldPath {
                        segments: self.segments[..i].to_vec(),
                    },
                    *b,
                ));
            }
        }
        choices
    }

    /// Parse a textual address
    pub fn parse(s: &str) -> Result<Self, PathParseError> {
        let chars: Vec<char> = s.chars().collect();
        let mut segments = Vec::new();
        let mut pos = 0;

        while pos < chars.len() {
            match chars[pos] {
                '.' => {
                    if segments.is_empty() {
                        return Err(PathParseError::UnexpectedChar { ch: '.', position: pos });
                    }
                    let (name, next) = read_field(&chars, pos + 1)?;
                    segments.push(PathSegment::Field(name));
                    pos = next;
                }
                '[' => {
                    let start = pos;
                    let mut digits = String::new();
                    pos += 1;
                    loop {
                        match chars.get(pos) {
                            Some(']') => break,
                            Some(c) => {
                                digits.push(*c);
                                pos += 1;
                            }
                            None => return Err(PathParseError::UnterminatedIndex { position: start }),
                        }
                    }
                    pos += 1;
                    if digits.is_empty() {
                        segments.push(PathSegment::Item);
                    } else {
                        segments.push(PathSegment::Index(parse_number(&digits, start)?));
                    }
                }
                '@' => {
                    let start = pos;
                    let mut digits = String::new();
                    pos += 1;
                    while let Some(c) = chars.get(pos).filter(|c| c.is_ascii_digit()) {
                        digits.push(*c);
                        pos += 1;
                    }
                    segments.push(PathSegment::Branch(parse_number(&digits, start)?));
                }
                ']' => return Err(PathParseError::UnexpectedChar { ch: ']', position: pos }),
                _ => {
                    if !segments.is_empty() {
                        return Err(PathParseError::UnexpectedChar {
                            ch: chars[pos],
                            position: pos,
                        });
                    }
                    let (name, next) = read_field(&chars, pos)?;
                    segments.push(PathSegment::Field(name));
                    pos = next;
                }
            }
        }

        Ok(Self { segments })
    }
}

fn read_field(chars: &[char], start: usize) -> Result<(String, usize), PathParseError> {
    let mut name = String::new();
    let mut pos = start;
    while let Some(&c) = chars.get(pos) {
        match c {
            '\\' => {
                let escaped = chars.get(pos + 1).ok_or(PathParseError::DanglingEscape)?;
                name.push(*escaped);
                pos += 2;
            }
            '.' | '[' | '@' => break,
            ']' => return Err(PathParseError::UnexpectedChar { ch: ']', position: pos }),
            _ => {
                name.push(c);
                pos += 1;
            }
        }
    }
    if name.is_empty() {
        return Err(PathParseError::EmptyField { position: start });
    }
    Ok((name, pos))
}

/// Canonical decimal only: leading zeros would break the text round trip
fn parse_number(digits: &str, position: usize) -> Result<usize, PathParseError> {
    let canonical = !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'));
    if !canonical {
        return Err(PathParseError::InvalidIndex {
            value: digits.to_string(),
            position,
        });
    }
    digits.parse::<usize>().map_err(|_| PathParseError::InvalidIndex {
        value: digits.to_string(),
        position,
    })
}

fn escape_field(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if SPECIAL_CHARS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                PathSegment::Field(name) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(&escape_field(name))?;
                }
                PathSegment::Index(idx) => write!(f, "[{}]", idx)?,
                PathSegment::Item => f.write_str("[]")?,
                PathSegment::Branch(idx) => write!(f, "@{}", idx)?,
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for FieldPath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FieldPath::parse(&s).map_err(serde::de::Error::custom)
    }
}
