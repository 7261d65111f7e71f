//! Collision-free cache keys

use std::fmt;

/// An opaque cache key.
///
/// Composite keys are built from parts with [`CacheKey::compose`]. Each part
/// is escaped before joining, so no two distinct part lists produce the same
/// key:
///
/// ```
/// use backoffice_lib::cache::CacheKey;
///
/// let a = CacheKey::compose(["a:b", "c"]);
/// let b = CacheKey::compose(["a", "b:c"]);
/// assert_ne!(a, b);
/// assert_eq!(a.as_str(), r"a\:b:c");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Separator between composed parts.
    pub const SEPARATOR: char = ':';
    const ESCAPE: char = '\\';

    /// Wraps a string as-is. The string is treated as a single opaque key.
    pub fn raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Builds a key from parts, escaping each one.
    pub fn compose<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let mut key = String::new();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                key.push(Self::SEPARATOR);
            }
            push_escaped(&mut key, part.as_ref());
        }
        Self(key)
    }

    /// Returns a new key with `part` appended.
    pub fn child(&self, part: impl AsRef<str>) -> Self {
        let mut key = self.0.clone();
        key.push(Self::SEPARATOR);
        push_escaped(&mut key, part.as_ref());
        Self(key)
    }

    /// Returns `true` if this key was composed with `namespace` as its first part.
    pub fn is_within(&self, namespace: &str) -> bool {
        in_namespace(&self.0, namespace)
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the key is empty (and therefore unusable).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub(crate) fn in_namespace(key: &str, namespace: &str) -> bool {
    let prefix = escape_part(namespace);
    match key.strip_prefix(prefix.as_str()) {
        Some(rest) => rest.is_empty() || rest.starts_with(CacheKey::SEPARATOR),
        None => false,
    }
}

pub(crate) fn escape_part(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    push_escaped(&mut out, part);
    out
}

fn push_escaped(out: &mut String, part: &str) {
    for ch in part.chars() {
        if ch == CacheKey::SEPARATOR || ch == CacheKey::ESCAPE {
            out.push(CacheKey::ESCAPE);
        }
        out.push(ch);
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
