//! The static-file serving primitive (spec §4.9a), grounded in
//! `armature-core/src/static_assets.rs::StaticAssetServer`: resolve a
//! request path under a root directory, reject traversal, honor
//! conditional (`If-None-Match`/`If-Modified-Since`) and `Range` requests,
//! and hand the result to a [`weft_h1::Writer`] via `sendfile` or
//! chunked transfer. Compression is out of scope here (unlike the
//! teacher) — see `DESIGN.md`.

use std::path::{Path, PathBuf};

use weft_core::io::AsyncIo;
use weft_h1::Writer;
use weft_types::{Method, Request, ResponseHeader, StatusCode, Version, WeftError};

/// Fixed extension → MIME type table (spec §4.9a: "naive MIME detection
/// by extension", a full `mime_guess`-style crate being out of scope).
const MIME_TABLE: &[(&str, &str)] = &[
    ("html", "text/html; charset=utf-8"),
    ("htm", "text/html; charset=utf-8"),
    ("css", "text/css; charset=utf-8"),
    ("js", "text/javascript; charset=utf-8"),
    ("mjs", "text/javascript; charset=utf-8"),
    ("json", "application/json"),
    ("txt", "text/plain; charset=utf-8"),
    ("xml", "application/xml"),
    ("svg", "image/svg+xml"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("ico", "image/x-icon"),
    ("webp", "image/webp"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("wasm", "application/wasm"),
    ("pdf", "application/pdf"),
];

fn mime_for(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| {
            MIME_TABLE
                .iter()
                .find(|(candidate, _)| candidate.eq_ignore_ascii_case(ext))
                .map(|(_, mime)| *mime)
        })
        .unwrap_or("application/octet-stream")
}

#[derive(Clone)]
pub struct StaticFileConfig {
    pub root_dir: PathBuf,
    pub index_files: Vec<String>,
    pub support_range: bool,
    pub use_sendfile: bool,
    pub chunk_buffer_size: usize,
}

impl StaticFileConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            index_files: vec!["index.html".to_string()],
            support_range: true,
            use_sendfile: true,
            chunk_buffer_size: 65536,
        }
    }
}

/// Resolves `tail` (the path captured by a trailing `*` route) against
/// `root`, rejecting any path that escapes it.
///
/// Guards component-wise, before any filesystem access: a `..` or a
/// rooted/absolute component anywhere in `tail` is rejected outright, so
/// a non-existent-but-escaping path (which `canonicalize` can't check,
/// since it requires the target to exist) is still caught.
fn resolve_under_root(root: &Path, tail: &str) -> Result<PathBuf, WeftError> {
    let mut resolved = root.to_path_buf();
    for component in Path::new(tail).components() {
        use std::path::Component;
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(WeftError::Forbidden)
            }
        }
    }
    Ok(resolved)
}

fn weak_etag(len: u64, modified: std::time::SystemTime) -> String {
    let secs = modified
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("W/\"{len:x}-{secs:x}\"")
}

struct Range {
    start: u64,
    end: u64,
}

/// Parses a single `bytes=start-end` range (spec §4.9a supports one
/// range, not the multipart/byteranges form).
fn parse_range(header: &str, file_len: u64) -> Option<Range> {
    let spec = header.strip_prefix("bytes=")?;
    let (start_s, end_s) = spec.split_once('-')?;
    if file_len == 0 {
        return None;
    }
    let (start, end) = if start_s.is_empty() {
        // Suffix range: last `end_s` bytes.
        let suffix_len: u64 = end_s.parse().ok()?;
        let start = file_len.saturating_sub(suffix_len);
        (start, file_len - 1)
    } else {
        let start: u64 = start_s.parse().ok()?;
        let end = if end_s.is_empty() {
            file_len - 1
        } else {
            end_s.parse().ok()?
        };
        (start, end)
    };
    if start > end || end >= file_len {
        return None;
    }
    Some(Range { start, end })
}

/// What [`serve`] decided to do with the request; the caller drives it
/// through a [`Writer`] via [`Outcome::send`].
pub enum Outcome {
    NotModified(ResponseHeader),
    Forbidden,
    NotFound,
    RangeNotSatisfiable(u64),
    File {
        header: ResponseHeader,
        path: PathBuf,
        start: u64,
        len: u64,
    },
}

fn io_err(e: std::io::Error) -> WeftError {
    WeftError::InternalServerError(e.to_string())
}

impl Outcome {
    /// Drives the decision through `writer`: whole-body replies for the
    /// non-2xx outcomes, and for `File` either `sendfile` (with an exact
    /// `Content-Length`) or buffered chunked transfer, per
    /// `config.use_sendfile`.
    pub async fn send<IO: AsyncIo>(
        self,
        writer: &mut Writer<IO>,
        chunk_buffer_size: usize,
        use_sendfile: bool,
    ) -> Result<(), WeftError> {
        match self {
            Outcome::NotModified(header) => {
                writer
                    .reply(&weft_types::Message::new(header, Vec::new()))
                    .await
            }
            Outcome::Forbidden => {
                let header = ResponseHeader::new(Version::Http11, StatusCode::FORBIDDEN);
                writer.reply(&weft_types::Message::new(header, Vec::new())).await
            }
            Outcome::NotFound => {
                let header = ResponseHeader::new(Version::Http11, StatusCode::NOT_FOUND);
                writer.reply(&weft_types::Message::new(header, Vec::new())).await
            }
            Outcome::RangeNotSatisfiable(len) => {
                let mut header = ResponseHeader::new(Version::Http11, StatusCode::RANGE_NOT_SATISFIABLE);
                header.fields.add("Content-Range", format!("bytes */{len}"));
                writer.reply(&weft_types::Message::new(header, Vec::new())).await
            }
            Outcome::File { mut header, path, start, len } => {
                let mut file = tokio::fs::File::open(&path).await.map_err(io_err)?;
                if start > 0 {
                    use tokio::io::{AsyncSeekExt, SeekFrom};
                    file.seek(SeekFrom::Start(start)).await.map_err(io_err)?;
                }

                if use_sendfile {
                    header.fields.add("Content-Length", len.to_string());
                    writer.reply_header(&header).await?;
                    writer.sendfile(&mut file, len).await?;
                    Ok(())
                } else {
                    writer.reply_chunk_header(&mut header).await?;
                    let mut remaining = len;
                    let mut buf = vec![0u8; chunk_buffer_size.max(1)];
                    use tokio::io::AsyncReadExt;
                    while remaining > 0 {
                        let want = remaining.min(buf.len() as u64) as usize;
                        let n = file.read(&mut buf[..want]).await.map_err(io_err)?;
                        if n == 0 {
                            break;
                        }
                        remaining -= n as u64;
                        writer.reply_chunk_data(&buf[..n], remaining == 0).await?;
                    }
                    Ok(())
                }
            }
        }
    }
}

/// Serves the file at `tail` under `config.root_dir`, honoring
/// conditional requests and a single `Range` header.
pub async fn serve(
    config: &StaticFileConfig,
    tail: &str,
    request: &Request,
) -> Result<Outcome, WeftError> {
    if !matches!(request.header.method, Method::Get | Method::Head) {
        return Ok(Outcome::NotFound);
    }

    let mut path = match resolve_under_root(&config.root_dir, tail) {
        Ok(p) => p,
        Err(_) => return Ok(Outcome::Forbidden),
    };

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(m) => m,
        Err(_) => return Ok(Outcome::NotFound),
    };

    if metadata.is_dir() {
        let mut found = None;
        for index in &config.index_files {
            let candidate = path.join(index);
            if tokio::fs::metadata(&candidate)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false)
            {
                found = Some(candidate);
                break;
            }
        }
        match found {
            Some(candidate) => path = candidate,
            None => return Ok(Outcome::Forbidden),
        }
    }

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(m) => m,
        Err(_) => return Ok(Outcome::NotFound),
    };
    let file_len = metadata.len();
    let modified = metadata.modified().ok();
    let etag = modified.map(|m| weak_etag(file_len, m));

    let fields = &request.header.fields;
    if let (Some(etag), Some(if_none_match)) = (&etag, fields.get("if-none-match")) {
        if if_none_match == etag {
            return Ok(Outcome::NotModified(not_modified_header(etag)));
        }
    }
    if let (Some(modified), Some(if_modified_since)) = (modified, fields.get("if-modified-since")) {
        if let Ok(since) = httpdate::parse_http_date(if_modified_since) {
            if modified <= since {
                return Ok(Outcome::NotModified(not_modified_header(
                    etag.as_deref().unwrap_or(""),
                )));
            }
        }
    }

    let mime = mime_for(&path).to_string();
    let mut header = ResponseHeader::new(Version::Http11, StatusCode::OK);
    header.fields.add("Content-Type", mime);
    if let Some(e) = &etag {
        header.fields.add("ETag", e.clone());
    }
    if let Some(m) = modified {
        header.fields.add("Last-Modified", httpdate::fmt_http_date(m));
    }
    if config.support_range {
        header.fields.add("Accept-Ranges", "bytes");
    }

    if config.support_range {
        if let Some(range_header) = fields.get("range") {
            return match parse_range(range_header, file_len) {
                Some(range) => {
                    header.status = StatusCode::PARTIAL_CONTENT;
                    header.fields.add(
                        "Content-Range",
                        format!("bytes {}-{}/{}", range.start, range.end, file_len),
                    );
                    Ok(Outcome::File {
                        header,
                        path,
                        start: range.start,
                        len: range.end - range.start + 1,
                    })
                }
                None => Ok(Outcome::RangeNotSatisfiable(file_len)),
            };
        }
    }

    Ok(Outcome::File {
        header,
        path,
        start: 0,
        len: file_len,
    })
}

fn not_modified_header(etag: &str) -> ResponseHeader {
    let mut header = ResponseHeader::new(Version::Http11, StatusCode::NOT_MODIFIED);
    if !etag.is_empty() {
        header.fields.add("ETag", etag.to_string());
    }
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_with_parent_dir_is_rejected() {
        let root = Path::new("/srv/www");
        assert!(resolve_under_root(root, "../../etc/passwd").is_err());
    }

    #[test]
    fn traversal_with_absolute_component_is_rejected() {
        let root = Path::new("/srv/www");
        assert!(resolve_under_root(root, "/etc/passwd").is_err());
    }

    #[test]
    fn plain_relative_path_resolves_under_root() {
        let root = Path::new("/srv/www");
        let resolved = resolve_under_root(root, "css/app.css").unwrap();
        assert_eq!(resolved, Path::new("/srv/www/css/app.css"));
    }

    #[test]
    fn mime_table_knows_common_types() {
        assert_eq!(mime_for(Path::new("app.js")), "text/javascript; charset=utf-8");
        assert_eq!(mime_for(Path::new("style.CSS")), "text/css; charset=utf-8");
        assert_eq!(mime_for(Path::new("data.bin")), "application/octet-stream");
    }

    #[test]
    fn range_header_parses_closed_range() {
        let range = parse_range("bytes=0-99", 1000).unwrap();
        assert_eq!(range.start, 0);
        assert_eq!(range.end, 99);
    }

    #[test]
    fn range_header_parses_suffix_range() {
        let range = parse_range("bytes=-500", 1000).unwrap();
        assert_eq!(range.start, 500);
        assert_eq!(range.end, 999);
    }

    #[test]
    fn range_header_rejects_out_of_bounds() {
        assert!(parse_range("bytes=900-1000", 1000).is_none());
    }

    #[test]
    fn range_header_rejects_inverted_range() {
        assert!(parse_range("bytes=500-100", 1000).is_none());
    }
}
