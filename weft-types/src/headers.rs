//! Insertion-ordered, case-insensitive header storage.
//!
//! Headers are stored as `(name, value)` pairs in a `SmallVec` so that
//! typical requests (a handful of fields) never touch the heap. Serialization
//! always walks the vector in insertion order, which is what lets the HTTP/1.1
//! writer and the HTTP/2 HEADERS encoder reproduce field order faithfully.

use smallvec::SmallVec;
use std::fmt;

/// Number of header fields kept inline before spilling to the heap.
pub const INLINE_HEADERS: usize = 12;

/// A single header field as stored in a [`HeaderMap`].
///
/// `name` preserves the case it was inserted with (so HTTP/1.1 serialization
/// round-trips the wire case); lookups are always case-insensitive.
#[derive(Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: String,
}

impl Field {
    #[inline]
    fn name_eq(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// An insertion-ordered, case-insensitive-keyed header map.
///
/// `add` on an existing key folds the new value onto the old one as
/// `old + ", " + new` (per RFC 7230 §3.2.2), except for names a caller has
/// opted to keep as a repeatable list (see [`HeaderMap::add_multi`]) — used
/// for `Set-Cookie`, which must not be folded.
#[derive(Clone, Default)]
pub struct HeaderMap {
    inner: SmallVec<[Field; INLINE_HEADERS]>,
}

impl HeaderMap {
    #[inline]
    pub fn new() -> Self {
        Self {
            inner: SmallVec::new(),
        }
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: SmallVec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// `has-key` primitive: case-insensitive membership test.
    #[inline]
    pub fn has_key(&self, name: &str) -> bool {
        self.inner.iter().any(|f| f.name_eq(name))
    }

    /// `get-value` primitive: first value stored under `name`.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|f| f.name_eq(name))
            .map(|f| f.value.as_str())
    }

    /// All values stored under `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.inner
            .iter()
            .filter(move |f| f.name_eq(name))
            .map(|f| f.value.as_str())
    }

    /// `add` primitive: insert, folding onto an existing value with `", "`.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(field) = self.inner.iter_mut().find(|f| f.name_eq(&name)) {
            field.value.reserve(value.len() + 2);
            field.value.push_str(", ");
            field.value.push_str(&value);
            return;
        }
        self.inner.push(Field { name, value });
    }

    /// `add-if-not-exists` primitive: no-op when `name` is already present.
    pub fn add_if_not_exists(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if self.has_key(&name) {
            return;
        }
        self.inner.push(Field {
            name,
            value: value.into(),
        });
    }

    /// Appends a repeatable field without folding (`Set-Cookie` and friends).
    pub fn add_multi(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push(Field {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Overwrites every occurrence of `name` with a single new value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.inner.push(Field {
            name,
            value: value.into(),
        });
    }

    /// `remove` primitive: drop every field matching `name`.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.inner.len();
        self.inner.retain(|f| !f.name_eq(name));
        before - self.inner.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|f| (f.name.as_str(), f.value.as_str()))
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

impl fmt::Debug for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.iter()).finish()
    }
}

/// Names for which `add` must behave as [`HeaderMap::add_multi`] rather than
/// fold: folding `Set-Cookie` with `", "` produces a value no cookie parser
/// can split back apart.
pub const NEVER_FOLD: &[&str] = &["set-cookie"];

impl HeaderMap {
    /// Insert the way an HTTP/1.1 field line is added while parsing: folds
    /// unless `name` is in [`NEVER_FOLD`].
    pub fn add_parsed(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if NEVER_FOLD.iter().any(|n| name.eq_ignore_ascii_case(n)) {
            self.add_multi(name, value);
        } else {
            self.add(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_folds_duplicate_values() {
        let mut h = HeaderMap::new();
        h.add("X-Trace", "a");
        h.add("x-trace", "b");
        assert_eq!(h.get("X-TRACE"), Some("a, b"));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn add_if_not_exists_is_noop_on_existing() {
        let mut h = HeaderMap::new();
        h.add("Host", "a");
        h.add_if_not_exists("Host", "b");
        assert_eq!(h.get("Host"), Some("a"));
    }

    #[test]
    fn set_cookie_is_never_folded() {
        let mut h = HeaderMap::new();
        h.add_parsed("Set-Cookie", "a=1");
        h.add_parsed("Set-Cookie", "b=2");
        let all: Vec<_> = h.get_all("set-cookie").collect();
        assert_eq!(all, vec!["a=1", "b=2"]);
    }

    #[test]
    fn serialization_order_is_insertion_order() {
        let mut h = HeaderMap::new();
        h.add("Host", "x");
        h.add("Content-Type", "text/plain");
        h.add("Accept", "*/*");
        let names: Vec<_> = h.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Host", "Content-Type", "Accept"]);
    }
}
