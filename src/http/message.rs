//! HTTP message types
//!
//! This module defines the core types for requests and for the status codes
//! handlers answer with.

use super::Headers;
use std::collections::HashMap;
use std::fmt;

/// HTTP methods
///
/// The request parser accepts any all-uppercase alphabetic token, so methods
/// outside the well-known set are kept as [`Method::Extension`]. Use
/// [`Method::from`] to build one; it never yields `Extension` for a
/// well-known name.
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
    Extension(String),
}

impl Method {
    /// Convert method to string
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Patch => "PATCH",
            Method::Extension(s) => s,
        }
    }
}

impl From<&str> for Method {
    fn from(s: &str) -> Self {
        match s {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "CONNECT" => Method::Connect,
            "OPTIONS" => Method::Options,
            "TRACE" => Method::Trace,
            "PATCH" => Method::Patch,
            other => Method::Extension(other.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);

    pub const fn new(code: u16) -> Self {
        StatusCode(code)
    }

    /// Get the numeric code
    pub fn code(&self) -> u16 {
        self.0
    }

    /// Reason phrase written on the status line
    ///
    /// Only the codes this server synthesizes itself carry a phrase; every
    /// other code goes on the wire as a bare number.
    pub fn reason_phrase(&self) -> Option<&'static str> {
        match self.0 {
            200 => Some("OK"),
            204 => Some("No Content"),
            400 => Some("Bad Request"),
            500 => Some("Internal Server Error"),
            _ => None,
        }
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason_phrase() {
            Some(reason) => write!(f, "{} {}", self.0, reason),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Error returned by application handlers
///
/// The server answers with `status` and `message` as a plain-text body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    pub status: StatusCode,
    pub message: String,
}

impl HandlerError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        HandlerError {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<super::Error> for HandlerError {
    fn from(err: super::Error) -> Self {
        HandlerError::internal(err.to_string())
    }
}

/// Parsed request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: Method,
    pub target: String,
    pub version: String,
}

impl Default for RequestLine {
    fn default() -> Self {
        RequestLine {
            method: Method::Get,
            target: String::new(),
            version: String::new(),
        }
    }
}

/// Progress of a request through the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ParseState {
    #[default]
    ReadingRequestLine,
    ReadingHeaders,
    ReadingBody,
    Done,
}

/// HTTP request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub(crate) request_line: RequestLine,
    pub(crate) headers: Headers,
    pub(crate) body: Vec<u8>,
    pub(crate) path_params: HashMap<String, String>,
    pub(crate) query_params: HashMap<String, String>,
    pub(crate) state: ParseState,
}

impl Request {
    /// Create an empty request awaiting its request line
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_line(&self) -> &RequestLine {
        &self.request_line
    }

    /// Get the request method
    pub fn method(&self) -> &Method {
        &self.request_line.method
    }

    /// Get the raw request target, query string included
    pub fn target(&self) -> &str {
        &self.request_line.target
    }

    /// Get the request target without its query string
    pub fn path(&self) -> &str {
        let target = &self.request_line.target;
        target.split_once('?').map_or(target.as_str(), |(path, _)| path)
    }

    /// Get the headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Get mutable headers
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Get the body
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Parameters bound by the router, keyed by lowercase parameter name
    pub fn path_params(&self) -> &HashMap<String, String> {
        &self.path_params
    }

    /// Look up a single path parameter
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    pub(crate) fn set_path_params(&mut self, params: HashMap<String, String>) {
        self.path_params = params;
    }

    /// Decoded query string parameters; the last occurrence of a key wins
    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    pub fn state(&self) -> ParseState {
        self.state
    }
}
