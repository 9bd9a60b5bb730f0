//! RFC 7541 Appendix A static table, verbatim, 1-indexed in the wire
//! protocol but stored 0-indexed here.
//!
//! Grounded in `galay-http/protoc/http2/Http2HpackTable.cc`'s
//! `STATIC_TABLE`/`get`/`findExactMatch`/`findNameMatch` triad; the lookup
//! functions below mirror that same three-way split (indexed get, exact
//! name+value match, name-only match) used by the encoder to decide between
//! an indexed, name-indexed, or fully-literal representation.

pub(crate) const STATIC_TABLE: [(&str, &str); 61] = [
    (":authority", ""),
    (":method", "GET"),
    (":method", "POST"),
    (":path", "/"),
    (":path", "/index.html"),
    (":scheme", "http"),
    (":scheme", "https"),
    (":status", "200"),
    (":status", "204"),
    (":status", "206"),
    (":status", "304"),
    (":status", "400"),
    (":status", "404"),
    (":status", "500"),
    ("accept-charset", ""),
    ("accept-encoding", "gzip, deflate"),
    ("accept-language", ""),
    ("accept-ranges", ""),
    ("accept", ""),
    ("access-control-allow-origin", ""),
    ("age", ""),
    ("allow", ""),
    ("authorization", ""),
    ("cache-control", ""),
    ("content-disposition", ""),
    ("content-encoding", ""),
    ("content-language", ""),
    ("content-length", ""),
    ("content-location", ""),
    ("content-range", ""),
    ("content-type", ""),
    ("cookie", ""),
    ("date", ""),
    ("etag", ""),
    ("expect", ""),
    ("expires", ""),
    ("from", ""),
    ("host", ""),
    ("if-match", ""),
    ("if-modified-since", ""),
    ("if-none-match", ""),
    ("if-range", ""),
    ("if-unmodified-since", ""),
    ("last-modified", ""),
    ("link", ""),
    ("location", ""),
    ("max-forwards", ""),
    ("proxy-authenticate", ""),
    ("proxy-authorization", ""),
    ("range", ""),
    ("referer", ""),
    ("refresh", ""),
    ("retry-after", ""),
    ("server", ""),
    ("set-cookie", ""),
    ("strict-transport-security", ""),
    ("transfer-encoding", ""),
    ("user-agent", ""),
    ("vary", ""),
    ("via", ""),
    ("www-authenticate", ""),
];

/// Number of entries in the static table (RFC 7541 Appendix A); dynamic
/// table indices on the wire start right after this.
pub(crate) const STATIC_TABLE_LEN: usize = STATIC_TABLE.len();

/// Wire index is 1-based; `0` and anything past 61 is not a valid static
/// table reference.
pub(crate) fn get(index: usize) -> Option<(&'static str, &'static str)> {
    if index == 0 || index > STATIC_TABLE.len() {
        return None;
    }
    Some(STATIC_TABLE[index - 1])
}

/// Returns the 1-based wire index of the first entry whose name and value
/// both match, if any.
pub(crate) fn find_exact_match(name: &str, value: &str) -> Option<usize> {
    STATIC_TABLE
        .iter()
        .position(|&(n, v)| n == name && v == value)
        .map(|i| i + 1)
}

/// Returns the 1-based wire index of the first entry whose name matches,
/// regardless of value.
pub(crate) fn find_name_match(name: &str) -> Option<usize> {
    STATIC_TABLE.iter().position(|&(n, _)| n == name).map(|i| i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_are_1_based_rfc_appendix_a() {
        assert_eq!(get(1), Some((":authority", "")));
        assert_eq!(get(8), Some((":status", "200")));
        assert_eq!(get(61), Some(("www-authenticate", "")));
        assert_eq!(get(0), None);
        assert_eq!(get(62), None);
    }

    #[test]
    fn exact_and_name_match() {
        assert_eq!(find_exact_match(":method", "GET"), Some(2));
        assert_eq!(find_exact_match(":method", "PATCH"), None);
        assert_eq!(find_name_match(":method"), Some(2));
        assert_eq!(find_name_match("nonexistent-header"), None);
    }
}
