//! Path Normalizer - Converts raw admin/agent paths to canonical policy keys
//! Core Principle: Two spellings of the same path must land on the same key

use std::fmt;

use serde::{Serialize, Serializer};

/// Root of a path without a drive prefix
const UNIX_ROOT: &str = "/";

/// Normalized path key used for every policy lookup.
///
/// Always starts with `/` or a drive root such as `c:/`, uses single forward
/// slashes, and never ends with a slash unless it is a root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalPath(String);

impl CanonicalPath {
    /// The filesystem root `/`
    pub fn root() -> Self {
        CanonicalPath(UNIX_ROOT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length of the root prefix (`/` or `x:/`)
    fn root_len(&self) -> usize {
        if self.0.starts_with('/') {
            1
        } else {
            // "x:/" - the normalizer never emits anything else
            3
        }
    }

    /// Is this `/` or a drive root like `c:/`?
    pub fn is_root(&self) -> bool {
        self.0.len() == self.root_len()
    }

    /// Immediate parent, `None` for a root
    pub fn parent(&self) -> Option<CanonicalPath> {
        if self.is_root() {
            return None;
        }

        let cut = self.0.rfind('/')?;
        let root_len = self.root_len();
        if cut < root_len {
            Some(CanonicalPath(self.0[..root_len].to_string()))
        } else {
            Some(CanonicalPath(self.0[..cut].to_string()))
        }
    }

    /// Walk from this path up to (and including) its root, most specific first
    pub fn ancestors(&self) -> Ancestors {
        Ancestors {
            next: Some(self.clone()),
        }
    }

    /// Number of segments below the root
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0[self.root_len()..].split('/').count()
        }
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for CanonicalPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Iterator returned by [`CanonicalPath::ancestors`]
pub struct Ancestors {
    next: Option<CanonicalPath>,
}

impl Iterator for Ancestors {
    type Item = CanonicalPath;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = current.parent();
        Some(current)
    }
}

/// Turns raw path strings (Windows or Unix spelling) into [`CanonicalPath`]s.
///
/// Pure and total: malformed or blank input degrades to `/`, and applying the
/// normalizer to its own output is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathNormalizer {
    case_sensitive: bool,
}

impl PathNormalizer {
    pub fn new(case_sensitive: bool) -> Self {
        PathNormalizer { case_sensitive }
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Normalize a raw path into its canonical key.
    ///
    /// Only whitespace around the whole input is trimmed; whitespace inside a
    /// segment is part of the name.
    pub fn normalize(&self, raw: &str) -> CanonicalPath {
        if raw.trim().is_empty() {
            return CanonicalPath::root();
        }

        let unified = raw.trim().replace('\\', "/");
        let (drive, rest) = split_drive(&unified);

        let rest = if self.case_sensitive {
            rest.to_string()
        } else {
            rest.to_lowercase()
        };

        let mut segments: Vec<&str> = Vec::new();
        for segment in rest.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    // Never climb above the root
                    segments.pop();
                }
                name => segments.push(name),
            }
        }

        let mut normalized = match drive {
            Some(letter) => format!("{}:/", letter),
            None => UNIX_ROOT.to_string(),
        };
        normalized.push_str(&segments.join("/"));

        // Dropping `.` or `..` can leave a segment with trailing whitespace last
        if normalized.ends_with(char::is_whitespace) {
            return self.normalize(&normalized);
        }
        CanonicalPath(normalized)
    }
}

/// Split a leading `X:` drive prefix off, returning the lower-cased letter
fn split_drive(path: &str) -> (Option<char>, &str) {
    let mut chars = path.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic() => {
            (Some(letter.to_ascii_lowercase()), &path[2..])
        }
        _ => (None, path),
    }
}

/// Normalize with the default (case-folding) normalizer
pub fn normalize_path(raw: &str) -> CanonicalPath {
    PathNormalizer::default().normalize(raw)
}
