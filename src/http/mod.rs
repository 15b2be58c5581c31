//! HTTP/1.1 wire layer
//!
//! This module turns raw transport bytes into requests and requests' answers
//! back into bytes. Nothing in here knows about routing; handlers only ever
//! see a [`Request`] and a [`ResponseWriter`].
//!
//! # Architecture
//!
//! - [`Headers`] is the case-insensitive header store plus the single-line
//!   header parser shared by the request parser
//! - [`RequestParser`] is a state machine fed from a growable buffer, so a
//!   request fragmented across any number of reads parses identically
//! - [`ResponseWriter`] frames status line, headers, plain or chunked bodies
//!   and trailers onto any `std::io::Write`
//!
//! # Examples
//!
//! ```
//! use rawhttp::http::{request_from_reader, ResponseWriter, StatusCode, Headers};
//!
//! let raw = b"GET /hello?name=ferris HTTP/1.1\r\nHost: localhost\r\n\r\n";
//! let request = request_from_reader(&raw[..], 1024).unwrap();
//! assert_eq!(request.path(), "/hello");
//! assert_eq!(request.query_params().get("name").map(String::as_str), Some("ferris"));
//!
//! let mut out = Vec::new();
//! let mut writer = ResponseWriter::new(&mut out);
//! let mut headers = Headers::new();
//! headers.add("Content-Length", "2");
//! writer.write_status_line(StatusCode::OK).unwrap();
//! writer.write_headers(&headers).unwrap();
//! writer.write_body(b"hi").unwrap();
//! writer.finish().unwrap();
//! assert_eq!(out, b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nhi");
//! ```

pub mod chunked;
pub mod headers;
pub mod message;
pub mod parser;
pub mod response;

pub use headers::Headers;
pub use message::{HandlerError, Method, ParseState, Request, RequestLine, StatusCode};
pub use parser::{request_from_reader, RequestParser};
pub use response::ResponseWriter;

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed request line: {0}")]
    MalformedRequestLine(String),

    #[error("Unsupported HTTP version: {0}")]
    UnsupportedVersion(String),

    #[error("Invalid header: {0}")]
    HeaderSyntax(String),

    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    #[error("Body overrun: declared {declared} bytes, received {received}")]
    BodyOverrun { declared: usize, received: usize },

    #[error("Connection ended with incomplete {0}")]
    IncompleteAtEof(&'static str),

    #[error("Routing conflict for {path}: parameter {{{requested}}} clashes with {{{existing}}}")]
    RoutingConflict {
        path: String,
        existing: String,
        requested: String,
    },

    #[error("Failed to write {context}: {source}")]
    Write {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// CRLF line ending
pub const CRLF: &str = "\r\n";

/// The only protocol version accepted on a request line
pub const HTTP_VERSION: &str = "HTTP/1.1";
