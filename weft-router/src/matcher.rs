//! The minimal route matcher (spec §4.9): literal segments, `{name}`
//! single-segment captures, and a terminal `*` greedy capture. Grounded in
//! `armature-core/src/routing.rs`'s `Router`/`match_path` shape, but
//! reworked per spec §4.9's explicit invariant that matching never
//! allocates a temporary segment vector — both the pattern and the
//! candidate path are walked with cursor indices instead of being
//! collected into `Vec<&str>` first, the way `route_params.rs`'s
//! `CompiledPattern::match_path` does it.

use smallvec::SmallVec;
use weft_types::Method;

/// One resolved path parameter: a `{name}` capture or the terminal `*`
/// (whose name is always `"*"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

/// Captures produced by a successful match. Inlined up to 8 parameters,
/// matching the typical route depth seen in practice.
#[derive(Debug, Clone, Default)]
pub struct Params<'a> {
    entries: SmallVec<[Param<'a>; 8]>,
}

impl<'a> Params<'a> {
    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.entries.iter().find(|p| p.name == name).map(|p| p.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = Param<'a>> + '_ {
        self.entries.iter().copied()
    }

    fn push(&mut self, name: &'a str, value: &'a str) {
        self.entries.push(Param { name, value });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
    /// Terminal greedy capture; must be the pattern's last segment.
    Wildcard,
}

/// A single compiled route pattern, owned so it can outlive the request
/// that gets matched against it.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parses `raw` into segments. Panics only on a malformed `{` capture
    /// (unterminated or empty), since patterns are registered once at
    /// startup by the embedding application, not from untrusted input.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let mut segments = Vec::new();
        let mut rest = raw.as_str();
        while let Some((part, tail)) = next_segment(rest) {
            rest = tail;
            if part == "*" {
                segments.push(Segment::Wildcard);
                break;
            } else if let Some(name) = part.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                assert!(!name.is_empty(), "empty route parameter name in {raw:?}");
                segments.push(Segment::Param(name.to_string()));
            } else {
                segments.push(Segment::Static(part.to_string()));
            }
        }
        Self { raw, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn is_static(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Static(_)))
    }

    /// Walks `path` against this pattern's segments using cursor indices
    /// on both sides — no intermediate `Vec<&str>` of path segments is
    /// ever built.
    fn match_path<'p>(&self, path: &'p str) -> Option<Params<'p>> {
        let mut params = Params::default();
        let mut cursor = path;

        for segment in self.segments.iter() {
            if let Segment::Wildcard = segment {
                let tail = cursor.trim_start_matches('/');
                if tail.is_empty() {
                    return None;
                }
                params.push("*", tail);
                return Some(params);
            }

            let (part, tail) = next_segment(cursor)?;
            cursor = tail;
            match segment {
                Segment::Static(literal) => {
                    if part != literal {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.push(name.as_str(), part);
                }
                Segment::Wildcard => unreachable!("handled above"),
            }
        }

        // All pattern segments consumed; the path must be exhausted too
        // (no catch-all present) for a match.
        if next_segment(cursor).is_some() {
            None
        } else {
            Some(params)
        }
    }
}

/// Splits off the next non-empty path segment starting at `s`, skipping
/// any leading `/`. Returns `(segment, remainder)`, or `None` once
/// nothing but slashes remain.
fn next_segment(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start_matches('/');
    if s.is_empty() {
        return None;
    }
    match s.find('/') {
        Some(idx) => Some((&s[..idx], &s[idx..])),
        None => Some((s, "")),
    }
}

/// Collapses repeated/leading/trailing slashes so `"/health"` and
/// `"/health/"` land on the same exact-match table entry.
fn canonicalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    let mut rest = path;
    while let Some((part, tail)) = next_segment(rest) {
        out.push('/');
        out.push_str(part);
        rest = tail;
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Routes a `(method, path)` pair to the handler registered for it.
///
/// Exact literal routes are probed first via a lookup table (spec §4.9:
/// "constant-time per method"); template routes (anything containing a
/// `{param}` or `*`) are then scanned in registration order and the first
/// match wins.
pub struct Router<T> {
    exact: std::collections::HashMap<(Method, String), T>,
    templates: Vec<(Method, Pattern, T)>,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self {
            exact: std::collections::HashMap::new(),
            templates: Vec::new(),
        }
    }
}

impl<T> Router<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, method: Method, pattern: impl Into<String>, handler: T) {
        let pattern = Pattern::new(pattern);
        if pattern.is_static() {
            self.exact.insert((method, canonicalize(&pattern.raw)), handler);
        } else {
            self.templates.push((method, pattern, handler));
        }
    }

    /// Returns the matched handler and its captured parameters, or
    /// `None` if nothing registered for `method` matches `path`.
    pub fn route<'p>(&self, method: Method, path: &'p str) -> Option<(&T, Params<'p>)> {
        let path = path.split_once('?').map(|(p, _)| p).unwrap_or(path);

        if let Some(handler) = self.exact.get(&(method, canonicalize(path))) {
            return Some((handler, Params::default()));
        }

        for (route_method, pattern, handler) in &self.templates {
            if *route_method != method {
                continue;
            }
            if let Some(params) = pattern.match_path(path) {
                return Some((handler, params));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_literal_matches() {
        let mut router = Router::new();
        router.register(Method::Get, "/health", 1u32);
        let (handler, params) = router.route(Method::Get, "/health").unwrap();
        assert_eq!(*handler, 1);
        assert_eq!(params.get("anything"), None);
    }

    #[test]
    fn named_param_captures_single_segment() {
        let mut router = Router::new();
        router.register(Method::Get, "/users/{id}", 1u32);
        let (_, params) = router.route(Method::Get, "/users/42").unwrap();
        assert_eq!(params.get("id"), Some("42"));
    }

    #[test]
    fn multiple_named_params() {
        let mut router = Router::new();
        router.register(Method::Get, "/users/{user_id}/posts/{post_id}", 1u32);
        let (_, params) = router
            .route(Method::Get, "/users/7/posts/99")
            .unwrap();
        assert_eq!(params.get("user_id"), Some("7"));
        assert_eq!(params.get("post_id"), Some("99"));
    }

    #[test]
    fn terminal_wildcard_captures_remaining_segments() {
        let mut router = Router::new();
        router.register(Method::Get, "/static/*", 1u32);
        let (_, params) = router
            .route(Method::Get, "/static/css/app.css")
            .unwrap();
        assert_eq!(params.get("*"), Some("css/app.css"));
    }

    #[test]
    fn wildcard_requires_at_least_one_segment() {
        let mut router = Router::new();
        router.register(Method::Get, "/static/*", 1u32);
        assert!(router.route(Method::Get, "/static").is_none());
        assert!(router.route(Method::Get, "/static/").is_none());
    }

    #[test]
    fn method_mismatch_does_not_match() {
        let mut router = Router::new();
        router.register(Method::Get, "/users/{id}", 1u32);
        assert!(router.route(Method::Post, "/users/42").is_none());
    }

    #[test]
    fn exact_table_is_probed_before_templates() {
        let mut router = Router::new();
        router.register(Method::Get, "/users/{id}", 1u32);
        router.register(Method::Get, "/users/me", 2u32);
        let (handler, params) = router.route(Method::Get, "/users/me").unwrap();
        assert_eq!(*handler, 2, "literal /users/me should win over {{id}}");
        assert!(params.get("id").is_none());
    }

    #[test]
    fn query_string_is_stripped_before_matching() {
        let mut router = Router::new();
        router.register(Method::Get, "/search/{q}", 1u32);
        let (_, params) = router.route(Method::Get, "/search/rust?page=2").unwrap();
        assert_eq!(params.get("q"), Some("rust"));
    }

    #[test]
    fn unmatched_path_returns_none() {
        let router: Router<u32> = Router::new();
        assert!(router.route(Method::Get, "/missing").is_none());
    }

    #[test]
    fn trailing_slash_is_ignored_like_leading() {
        let mut router = Router::new();
        router.register(Method::Get, "/health", 1u32);
        assert!(router.route(Method::Get, "/health/").is_some());
    }
}
