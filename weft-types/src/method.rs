use std::fmt;

/// HTTP request method.
///
/// Kept as an enum with an `Extension` escape hatch (rather than a bare
/// `String`) so that the hot-path methods (`GET`, `POST`, ...) compare by
/// discriminant instead of string content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
    Pri,
    Extension(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Connect => "CONNECT",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
            Self::Patch => "PATCH",
            Self::Pri => "PRI",
            Self::Extension(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "GET" => Self::Get,
            "HEAD" => Self::Head,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "CONNECT" => Self::Connect,
            "OPTIONS" => Self::Options,
            "TRACE" => Self::Trace,
            "PATCH" => Self::Patch,
            "PRI" => Self::Pri,
            other => Self::Extension(other.to_owned()),
        }
    }

    /// Methods for which a missing `Content-Length` means an empty body,
    /// rather than `ContentLengthNotContained`.
    pub fn allows_absent_body_length(&self) -> bool {
        matches!(
            self,
            Self::Get | Self::Head | Self::Options | Self::Delete | Self::Connect
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
