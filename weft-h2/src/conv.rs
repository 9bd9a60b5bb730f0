//! Converts between a reassembled HPACK header block and weft's generic
//! `RequestHeader`/`ResponseHeader` types, handling the pseudo-header
//! ordering and sensitive-header indexing rules from spec §4.5.

use weft_hpack::{Decoder, DecoderError, Encoder, Header, Indexing};
use weft_types::{HeaderMap, Method, RequestHeader, ResponseHeader, StatusCode, Version};

/// Header names that must never be added to the dynamic table (spec §4.5
/// step 2): sent as `Literal Never Indexed`.
const SENSITIVE_NAMES: &[&str] = &["authorization", "cookie", "set-cookie", "proxy-authorization"];

fn indexing_for(name: &str) -> Indexing {
    if SENSITIVE_NAMES.contains(&name) {
        Indexing::NeverIndexed
    } else {
        Indexing::Indexed
    }
}

/// Decodes a request header block: pseudo-headers (`:method`, `:scheme`,
/// `:authority`, `:path`) plus a regular `HeaderMap`.
pub fn decode_request(decoder: &mut Decoder, block: &[u8]) -> Result<RequestHeader, DecoderError> {
    let mut fields = Vec::new();
    decoder.decode_block(block, &mut fields)?;

    let mut method = None;
    let mut path = None;
    let mut authority = None;
    let mut scheme = None;
    let mut header_map = HeaderMap::new();

    for h in fields {
        match h.name.as_str() {
            ":method" => method = Some(Method::parse(&h.value)),
            ":path" => path = Some(h.value),
            ":authority" => authority = Some(h.value),
            ":scheme" => scheme = Some(h.value),
            _ => header_map.add(&h.name, &h.value),
        }
    }

    if let Some(authority) = authority {
        header_map.add_if_not_exists("host", &authority);
    }
    let _ = scheme;

    let mut req = RequestHeader::new(
        method.unwrap_or(Method::Get),
        path.unwrap_or_else(|| "/".to_string()),
        Version::Http2,
    );
    req.fields = header_map;
    Ok(req)
}

/// Encodes a request with correct pseudo-header ordering (`:method`,
/// `:scheme`, `:authority`, `:path` precede regular fields, per spec §4.5).
pub fn encode_request(encoder: &mut Encoder, req: &RequestHeader, scheme: &str, out: &mut Vec<u8>) {
    let mut headers = Vec::with_capacity(4 + req.fields.iter().count());
    headers.push(Header::new(":method", req.method.as_str(), Indexing::Indexed));
    headers.push(Header::new(":scheme", scheme, Indexing::Indexed));
    if let Some(authority) = req.fields.get("host") {
        headers.push(Header::new(":authority", authority, Indexing::Indexed));
    }
    headers.push(Header::new(":path", &req.target, Indexing::Indexed));
    for field in req.fields.iter() {
        if field.name.eq_ignore_ascii_case("host") {
            continue;
        }
        headers.push(Header::new(&field.name, &field.value, indexing_for(&field.name)));
    }
    encoder.encode_block(&headers, out);
}

/// Decodes a response header block: `:status` plus regular headers.
pub fn decode_response(decoder: &mut Decoder, block: &[u8]) -> Result<ResponseHeader, DecoderError> {
    let mut fields = Vec::new();
    decoder.decode_block(block, &mut fields)?;

    let mut status = StatusCode::OK;
    let mut header_map = HeaderMap::new();
    for h in fields {
        if h.name == ":status" {
            if let Ok(code) = h.value.parse::<u16>() {
                status = StatusCode(code);
            }
        } else {
            header_map.add(&h.name, &h.value);
        }
    }

    let mut resp = ResponseHeader::new(Version::Http2, status);
    resp.fields = header_map;
    Ok(resp)
}

/// Encodes a response with `:status` first, per spec §4.5's pseudo-header
/// ordering rule.
pub fn encode_response(encoder: &mut Encoder, resp: &ResponseHeader, out: &mut Vec<u8>) {
    let mut headers = Vec::with_capacity(1 + resp.fields.iter().count());
    headers.push(Header::new(":status", resp.status.0.to_string(), Indexing::Indexed));
    for field in resp.fields.iter() {
        headers.push(Header::new(&field.name, &field.value, indexing_for(&field.name)));
    }
    encoder.encode_block(&headers, out);
}
