// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paths addressing values inside nested containers.
//!
//! A [`PropertyPath`] is a sequence of [`PathPart`]s. Its text form joins
//! member names with `.` and writes list indices and map keys in brackets:
//!
//! ```text
//! Nested.Doubles[2]
//! Lookup["first"].Values[0]
//! ```
//!
//! A path never starts with an index or key; those always qualify a named
//! collection. Inside a quoted key, `\"` and `\\` stand for a quote and a
//! backslash.

use core::fmt;
use core::ops::Index;
use core::str::FromStr;

use smallvec::SmallVec;
use thiserror::Error;

/// One step of a [`PropertyPath`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathPart {
    /// A member of a container.
    Name(String),
    /// An element of a list or array.
    Index(usize),
    /// An entry of a map or set, by the text form of its key.
    Key(String),
}

impl PathPart {
    /// Returns `true` for [`PathPart::Name`].
    #[must_use]
    pub fn is_name(&self) -> bool {
        matches!(self, Self::Name(_))
    }

    /// Returns `true` for [`PathPart::Index`].
    #[must_use]
    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }

    /// Returns `true` for [`PathPart::Key`].
    #[must_use]
    pub fn is_key(&self) -> bool {
        matches!(self, Self::Key(_))
    }

    /// The member name, if this is a name part.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            _ => None,
        }
    }

    /// The index, if this is an index part.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            _ => None,
        }
    }

    /// The key text, if this is a key part.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Key(key) => Some(key),
            _ => None,
        }
    }
}

impl fmt::Display for PathPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "[{index}]"),
            Self::Key(key) => {
                f.write_str("[\"")?;
                for c in key.chars() {
                    if matches!(c, '"' | '\\') {
                        f.write_str("\\")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str("\"]")
            }
        }
    }
}

/// Why a path string or edit was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PathParseError {
    /// An index or key appeared before any member name.
    #[error("a path cannot start with an index or key")]
    RootIndex,
    /// Two separators with nothing between them, or a trailing separator.
    #[error("empty member name at byte {position}")]
    EmptyName {
        /// Byte offset in the source text.
        position: usize,
    },
    /// A bracketed index was negative.
    #[error("negative index `{text}`")]
    NegativeIndex {
        /// The bracket contents.
        text: String,
    },
    /// A bracketed index was neither a number nor a quoted key.
    #[error("invalid index `{text}`")]
    InvalidIndex {
        /// The bracket contents.
        text: String,
    },
    /// A bracket or quoted key was never closed.
    #[error("unterminated bracket starting at byte {position}")]
    Unterminated {
        /// Byte offset of the opening bracket.
        position: usize,
    },
    /// A character that cannot follow the previous part.
    #[error("unexpected `{character}` at byte {position}")]
    UnexpectedCharacter {
        /// Byte offset in the source text.
        position: usize,
        /// The offending character.
        character: char,
    },
}

/// A parsed path into nested containers.
///
/// Editing methods come in two flavors: `push_*`/`pop` change the path in
/// place, while `append_*`/`popped`/`combine` return a new path and leave the
/// receiver untouched.
///
/// ```rust
/// use understory_properties::{PathPart, PropertyPath};
///
/// let path: PropertyPath = "Nested.Doubles[2]".parse().unwrap();
/// assert_eq!(path.len(), 3);
/// assert_eq!(path[2], PathPart::Index(2));
/// assert_eq!(path.to_string(), "Nested.Doubles[2]");
///
/// let parent = path.popped();
/// assert_eq!(parent.to_string(), "Nested.Doubles");
/// assert_eq!(parent.append_index(0).unwrap().to_string(), "Nested.Doubles[0]");
///
/// assert!("[0]".parse::<PropertyPath>().is_err());
/// assert!("Foo[-1]".parse::<PropertyPath>().is_err());
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    parts: SmallVec<[PathPart; 4]>,
}

impl PropertyPath {
    /// The empty path, which addresses the root container itself.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A path with a single name part.
    #[must_use]
    pub fn from_name(name: impl Into<String>) -> Self {
        let mut path = Self::new();
        path.push_name(name);
        path
    }

    /// Parses the text form. The empty string is the empty path.
    pub fn parse(text: &str) -> Result<Self, PathParseError> {
        let mut path = Self::new();
        if text.is_empty() {
            return Ok(path);
        }
        let bytes = text.as_bytes();
        let mut pos = 0;
        loop {
            let start = pos;
            while pos < bytes.len() && !matches!(bytes[pos], b'.' | b'[' | b']') {
                pos += 1;
            }
            if pos == start {
                return Err(match bytes.get(pos) {
                    Some(b'[') if path.is_empty() => PathParseError::RootIndex,
                    Some(b']') => PathParseError::UnexpectedCharacter {
                        position: pos,
                        character: ']',
                    },
                    _ => PathParseError::EmptyName { position: pos },
                });
            }
            path.push_name(&text[start..pos]);

            while bytes.get(pos) == Some(&b'[') {
                let open = pos;
                pos += 1;
                let rest = &text[pos..];
                if let Some(quoted) = rest.strip_prefix('"') {
                    let (key, consumed) = parse_key(quoted)
                        .ok_or(PathParseError::Unterminated { position: open })?;
                    path.parts.push(PathPart::Key(key));
                    pos += 1 + consumed;
                } else {
                    let end = rest
                        .find(']')
                        .ok_or(PathParseError::Unterminated { position: open })?;
                    path.parts.push(PathPart::Index(parse_index(&rest[..end])?));
                    pos += end + 1;
                }
            }

            match text[pos..].chars().next() {
                None => return Ok(path),
                Some('.') => pos += 1,
                Some(character) => {
                    return Err(PathParseError::UnexpectedCharacter {
                        position: pos,
                        character,
                    });
                }
            }
        }
    }

    /// Number of parts.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns `true` for the root path.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// All parts in order.
    #[must_use]
    pub fn parts(&self) -> &[PathPart] {
        &self.parts
    }

    /// Part `index`, if in range.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&PathPart> {
        self.parts.get(index)
    }

    /// The final part.
    #[must_use]
    pub fn last(&self) -> Option<&PathPart> {
        self.parts.last()
    }

    /// Iterates over the parts.
    pub fn iter(&self) -> core::slice::Iter<'_, PathPart> {
        self.parts.iter()
    }

    /// Appends a member name.
    pub fn push_name(&mut self, name: impl Into<String>) {
        self.parts.push(PathPart::Name(name.into()));
    }

    /// Appends a list index.
    pub fn push_index(&mut self, index: usize) -> Result<(), PathParseError> {
        self.push_part(PathPart::Index(index))
    }

    /// Appends a map key.
    pub fn push_key(&mut self, key: impl Into<String>) -> Result<(), PathParseError> {
        self.push_part(PathPart::Key(key.into()))
    }

    /// Appends any part, rejecting an index or key on the empty path.
    pub fn push_part(&mut self, part: PathPart) -> Result<(), PathParseError> {
        if self.is_empty() && !part.is_name() {
            return Err(PathParseError::RootIndex);
        }
        self.parts.push(part);
        Ok(())
    }

    /// Removes and returns the final part.
    pub fn pop(&mut self) -> Option<PathPart> {
        self.parts.pop()
    }

    /// Drops every part.
    pub fn clear(&mut self) {
        self.parts.clear();
    }

    /// A copy with a member name appended.
    #[must_use]
    pub fn append_name(&self, name: impl Into<String>) -> Self {
        let mut path = self.clone();
        path.push_name(name);
        path
    }

    /// A copy with a list index appended.
    pub fn append_index(&self, index: usize) -> Result<Self, PathParseError> {
        let mut path = self.clone();
        path.push_index(index)?;
        Ok(path)
    }

    /// A copy with a map key appended.
    pub fn append_key(&self, key: impl Into<String>) -> Result<Self, PathParseError> {
        let mut path = self.clone();
        path.push_key(key)?;
        Ok(path)
    }

    /// A copy without the final part.
    #[must_use]
    pub fn popped(&self) -> Self {
        self.truncated(self.len().saturating_sub(1))
    }

    /// A copy keeping only the first `len` parts.
    #[must_use]
    pub fn truncated(&self, len: usize) -> Self {
        Self {
            parts: self.parts.iter().take(len).cloned().collect(),
        }
    }

    /// `self` followed by `other`.
    ///
    /// Both operands are valid paths, so the result is too.
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        let mut path = self.clone();
        path.parts.extend(other.parts.iter().cloned());
        path
    }
}

/// Reads a quoted key up to its closing `"]`, returning the unescaped key and
/// the number of bytes consumed.
fn parse_key(quoted: &str) -> Option<(String, usize)> {
    let mut key = String::new();
    let mut chars = quoted.char_indices();
    while let Some((at, c)) = chars.next() {
        match c {
            '\\' => key.push(chars.next()?.1),
            '"' if quoted[at + 1..].starts_with(']') => return Some((key, at + 2)),
            c => key.push(c),
        }
    }
    None
}

fn parse_index(text: &str) -> Result<usize, PathParseError> {
    if let Some(digits) = text.strip_prefix('-') {
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PathParseError::NegativeIndex { text: text.into() });
        }
    }
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PathParseError::InvalidIndex { text: text.into() });
    }
    text.parse()
        .map_err(|_| PathParseError::InvalidIndex { text: text.into() })
}

impl FromStr for PropertyPath {
    type Err = PathParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl TryFrom<&str> for PropertyPath {
    type Error = PathParseError;

    fn try_from(text: &str) -> Result<Self, Self::Error> {
        Self::parse(text)
    }
}

impl Index<usize> for PropertyPath {
    type Output = PathPart;

    fn index(&self, index: usize) -> &PathPart {
        &self.parts[index]
    }
}

impl<'a> IntoIterator for &'a PropertyPath {
    type Item = &'a PathPart;
    type IntoIter = core::slice::Iter<'a, PathPart>;

    fn into_iter(self) -> Self::IntoIter {
        self.parts.iter()
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 && part.is_name() {
                f.write_str(".")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyPath({self})")
    }
}
