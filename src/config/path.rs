//! Key paths into a configuration tree.
//!
//! Syntax: dot-separated keys with bracketed indexes, e.g. `server.ports[0]`.
//! Keys containing dots or brackets can be quoted: `aliases["v1.2"].target`.
//! Parsing never fails; whitespace around segments is trimmed and empty
//! segments are skipped, so `.a..b ` and `a.b` name the same node.

use std::fmt;

/// One step of a [`ConfigPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A normalized sequence of path segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConfigPath {
    segments: Vec<PathSegment>,
}

impl ConfigPath {
    /// The empty path (the tree root).
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> Self {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = input.chars();

        while let Some(c) = chars.next() {
            match c {
                '.' => flush_key(&mut current, &mut segments),
                '[' => {
                    flush_key(&mut current, &mut segments);
                    let mut inner = String::new();
                    let mut quote: Option<char> = None;
                    let mut quoted = false;
                    for c in chars.by_ref() {
                        match (quote, c) {
                            (None, ']') => break,
                            (None, '"' | '\'') if !quoted && inner.trim().is_empty() => {
                                inner.clear();
                                quote = Some(c);
                                quoted = true;
                            }
                            (Some(q), c) if c == q => quote = None,
                            (None, _) if quoted => {}
                            _ => inner.push(c),
                        }
                    }
                    push_bracketed(inner, quoted, &mut segments);
                }
                _ => current.push(c),
            }
        }
        flush_key(&mut current, &mut segments);

        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Extend with a key segment.
    pub fn join_key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Key(key.into()));
        Self { segments }
    }

    /// Extend with an index segment.
    pub fn join_index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Index(index));
        Self { segments }
    }
}

fn flush_key(current: &mut String, segments: &mut Vec<PathSegment>) {
    let key = current.trim();
    if !key.is_empty() {
        segments.push(PathSegment::Key(key.to_string()));
    }
    current.clear();
}

// Quoted keys keep their exact text; bare bracket contents are trimmed.
fn push_bracketed(inner: String, quoted: bool, segments: &mut Vec<PathSegment>) {
    if quoted {
        if !inner.is_empty() {
            segments.push(PathSegment::Key(inner));
        }
        return;
    }
    let trimmed = inner.trim();
    if let Ok(index) = trimmed.parse::<usize>() {
        segments.push(PathSegment::Index(index));
    } else if !trimmed.is_empty() {
        segments.push(PathSegment::Key(trimmed.to_string()));
    }
}

impl From<&str> for ConfigPath {
    fn from(input: &str) -> Self {
        Self::parse(input)
    }
}

impl FromIterator<PathSegment> for ConfigPath {
    fn from_iter<T: IntoIterator<Item = PathSegment>>(iter: T) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
                PathSegment::Key(key) if needs_quoting(key) => write!(f, "[\"{}\"]", key)?,
                PathSegment::Key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
            }
        }
        Ok(())
    }
}

fn needs_quoting(key: &str) -> bool {
    key.contains(['.', '[', ']'])
        || key.trim().len() != key.len()
        || key.parse::<usize>().is_ok()
}
