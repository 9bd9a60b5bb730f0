use crate::headers::HeaderMap;
use crate::method::Method;
use crate::version::Version;
use std::collections::BTreeMap;

/// The request line plus headers plus the parsed query-argument mapping.
///
/// `target` is the raw request-target as it appeared on the wire (so proxies
/// and loggers see it unmodified); `path` and `query` are derived from it.
#[derive(Debug, Clone)]
pub struct RequestHeader {
    pub method: Method,
    pub target: String,
    pub path: String,
    pub version: Version,
    pub args: BTreeMap<String, String>,
    pub fields: HeaderMap,
}

impl RequestHeader {
    pub fn new(method: Method, target: impl Into<String>, version: Version) -> Self {
        let target = target.into();
        let (path, args) = split_target(&target);
        Self {
            method,
            target,
            path,
            version,
            args,
            fields: HeaderMap::new(),
        }
    }
}

/// Splits `/a/b?x=1&y=2` into `("/a/b", {"x": "1", "y": "2"})`, percent-decoding
/// both the argument keys and values.
fn split_target(target: &str) -> (String, BTreeMap<String, String>) {
    let mut args = BTreeMap::new();
    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (target, None),
    };
    if let Some(query) = query {
        for pair in query.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let k = percent_decode(k);
            let v = percent_decode(v);
            args.insert(k, v);
        }
    }
    (path.to_owned(), args)
}

fn percent_decode(s: &str) -> String {
    percent_encoding::percent_decode_str(s)
        .decode_utf8_lossy()
        .into_owned()
}

/// The status line plus headers of an outbound response.
#[derive(Debug, Clone)]
pub struct ResponseHeader {
    pub version: Version,
    pub status: crate::status::StatusCode,
    pub fields: HeaderMap,
}

impl ResponseHeader {
    pub fn new(version: Version, status: crate::status::StatusCode) -> Self {
        Self {
            version,
            status,
            fields: HeaderMap::new(),
        }
    }
}

/// A complete header-plus-body message. `body` is empty for the streaming
/// chunked/HTTP2-DATA cases, where the caller reads the body separately.
#[derive(Debug, Clone)]
pub struct Message<H> {
    pub header: H,
    pub body: Vec<u8>,
}

pub type Request = Message<RequestHeader>;
pub type Response = Message<ResponseHeader>;

impl<H> Message<H> {
    pub fn new(header: H, body: Vec<u8>) -> Self {
        Self { header, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_decodes_query_args() {
        let (path, args) = split_target("/a?x=1&name=space%20bar");
        assert_eq!(path, "/a");
        assert_eq!(args.get("x").unwrap(), "1");
        assert_eq!(args.get("name").unwrap(), "space bar");
    }

    #[test]
    fn target_without_query_has_no_args() {
        let (path, args) = split_target("/a/b");
        assert_eq!(path, "/a/b");
        assert!(args.is_empty());
    }
}
