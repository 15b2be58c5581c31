//! HTTP request parsing
//!
//! [`RequestParser`] is an incremental state machine: bytes are appended to
//! one growable buffer as they arrive and [`RequestParser::advance`] consumes
//! as much as the buffer currently supports. Because every stage only acts
//! on complete lines (or, for the body, on whatever is buffered), the result
//! does not depend on how the input was fragmented across reads.

use super::headers::find_crlf;
use super::{Error, Method, ParseState, Request, RequestLine, Result, CRLF, HTTP_VERSION};
use bytes::{Buf, BytesMut};
use std::collections::HashMap;
use std::io::{ErrorKind, Read};

/// Default size of a single transport read
pub const DEFAULT_READ_SIZE: usize = 1024;

/// Parse an HTTP request line
///
/// Format: METHOD SP TARGET SP HTTP/1.1
/// Example: GET /index.html HTTP/1.1
pub fn parse_request_line(line: &str) -> Result<RequestLine> {
    let parts: Vec<&str> = line.split(' ').collect();

    let [method, target, version] = parts[..] else {
        return Err(Error::MalformedRequestLine(format!(
            "expected 3 parts, got {}: {}",
            parts.len(),
            line
        )));
    };

    if method.is_empty() || !method.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(Error::MalformedRequestLine(format!(
            "method contains non-letters: {method}"
        )));
    }
    if method != method.to_ascii_uppercase() {
        return Err(Error::MalformedRequestLine(format!(
            "method contains lowercase letters: {method}"
        )));
    }
    if version != HTTP_VERSION {
        return Err(Error::UnsupportedVersion(version.to_string()));
    }

    Ok(RequestLine {
        method: Method::from(method),
        target: target.to_string(),
        version: version.to_string(),
    })
}

fn parse_query(target: &str) -> HashMap<String, String> {
    match target.split_once('?') {
        Some((_, query)) => url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect(),
        None => HashMap::new(),
    }
}

fn stage(state: ParseState) -> &'static str {
    match state {
        ParseState::ReadingRequestLine => "request line",
        ParseState::ReadingHeaders => "headers",
        ParseState::ReadingBody => "body",
        ParseState::Done => "request",
    }
}

/// HTTP request parser
#[derive(Debug, Default)]
pub struct RequestParser {
    buffer: BytesMut,
    request: Request,
}

impl RequestParser {
    /// Create a new request parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Current parser state
    pub fn state(&self) -> ParseState {
        self.request.state
    }

    /// Check if a complete request has been parsed
    pub fn is_done(&self) -> bool {
        self.request.state == ParseState::Done
    }

    /// Number of received bytes not yet consumed
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Append received bytes to the accumulation buffer
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Parse as far as the buffered bytes allow
    ///
    /// `eof` tells the parser no more bytes will arrive, which turns a stage
    /// that is still waiting for data into an [`Error::IncompleteAtEof`].
    /// Returns whether any progress was made.
    pub fn advance(&mut self, eof: bool) -> Result<bool> {
        let mut progressed = false;

        while self.request.state != ParseState::Done {
            let before = self.request.state;
            let consumed = self.step(eof)?;

            if consumed == 0 && self.request.state == before {
                break;
            }

            self.buffer.advance(consumed);
            progressed = true;
        }

        Ok(progressed)
    }

    /// Take the parsed request, if parsing has finished
    pub fn into_request(self) -> Option<Request> {
        self.is_done().then_some(self.request)
    }

    fn step(&mut self, eof: bool) -> Result<usize> {
        match self.request.state {
            ParseState::ReadingRequestLine => self.parse_request_line(eof),
            ParseState::ReadingHeaders => self.parse_headers(eof),
            ParseState::ReadingBody => self.parse_body(eof),
            ParseState::Done => Ok(0),
        }
    }

    fn parse_request_line(&mut self, eof: bool) -> Result<usize> {
        let Some(crlf_pos) = find_crlf(&self.buffer) else {
            if eof {
                return Err(Error::IncompleteAtEof("request line"));
            }
            return Ok(0);
        };

        let line = std::str::from_utf8(&self.buffer[..crlf_pos])
            .map_err(|_| Error::MalformedRequestLine("request line is not UTF-8".to_string()))?;
        let request_line = parse_request_line(line)?;

        self.request.query_params = parse_query(&request_line.target);
        self.request.request_line = request_line;
        self.request.state = ParseState::ReadingHeaders;

        Ok(crlf_pos + CRLF.len())
    }

    fn parse_headers(&mut self, eof: bool) -> Result<usize> {
        let (consumed, terminator) = self.request.headers.parse_header_line(&self.buffer)?;

        if terminator {
            self.request.state = if self.request.headers.contains("content-length") {
                ParseState::ReadingBody
            } else {
                ParseState::Done
            };
            return Ok(consumed);
        }

        if consumed == 0 && eof {
            return Err(Error::IncompleteAtEof("headers"));
        }

        Ok(consumed)
    }

    fn parse_body(&mut self, eof: bool) -> Result<usize> {
        let raw = self.request.headers.get("content-length");
        let declared = raw
            .trim()
            .parse::<usize>()
            .map_err(|_| Error::InvalidContentLength(raw.to_string()))?;

        let consumed = self.buffer.len();
        self.request.body.extend_from_slice(&self.buffer);

        let received = self.request.body.len();
        if received > declared {
            return Err(Error::BodyOverrun { declared, received });
        }
        if received == declared {
            self.request.state = ParseState::Done;
            return Ok(consumed);
        }

        if consumed == 0 && eof {
            return Err(Error::IncompleteAtEof("body"));
        }

        Ok(consumed)
    }
}

/// Read and parse exactly one request from `reader`
///
/// Reads `read_size` bytes at a time. The first end-of-stream is handed to
/// the parser so a stage stuck waiting for data can report what it was
/// missing; a second end-of-stream without progress is terminal.
pub fn request_from_reader<R: Read>(mut reader: R, read_size: usize) -> Result<Request> {
    let mut parser = RequestParser::new();
    let mut chunk = vec![0u8; read_size.max(1)];
    let mut eof = false;

    loop {
        parser.advance(eof)?;
        if parser.is_done() {
            break;
        }

        let n = match reader.read(&mut chunk) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        };

        if n == 0 {
            if eof {
                return Err(Error::IncompleteAtEof(stage(parser.state())));
            }
            eof = true;
            continue;
        }

        parser.feed(&chunk[..n]);
    }

    parser
        .into_request()
        .ok_or(Error::IncompleteAtEof("request"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    /// Reader that hands out at most `per_read` bytes per call, simulating
    /// a network connection delivering data in arbitrary fragments.
    struct ChunkReader {
        data: Vec<u8>,
        per_read: usize,
        pos: usize,
    }

    impl ChunkReader {
        fn new(data: impl AsRef<[u8]>, per_read: usize) -> Self {
            ChunkReader {
                data: data.as_ref().to_vec(),
                per_read,
                pos: 0,
            }
        }
    }

    impl Read for ChunkReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let end = (self.pos + self.per_read).min(self.data.len());
            let n = (end - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    const SIMPLE_GET: &str =
        "GET / HTTP/1.1\r\nHost: localhost:42069\r\nUser-Agent: curl/7.81.0\r\nAccept: */*\r\n\r\n";

    #[test]
    fn test_parse_request_line() {
        let line = parse_request_line("GET /index.html HTTP/1.1").unwrap();
        assert_eq!(line.method, Method::Get);
        assert_eq!(line.target, "/index.html");
        assert_eq!(line.version, "HTTP/1.1");
    }

    #[test]
    fn test_good_get_request() {
        let req = request_from_reader(ChunkReader::new(SIMPLE_GET, 3), 1024).unwrap();

        assert_eq!(req.method(), &Method::Get);
        assert_eq!(req.target(), "/");
        assert_eq!(req.headers().get("Host"), "localhost:42069");
        assert_eq!(req.headers().get("User-Agent"), "curl/7.81.0");
        assert_eq!(req.headers().get("Accept"), "*/*");
        assert_eq!(req.headers().len(), 3);
        assert_eq!(req.state(), ParseState::Done);
        assert!(req.body().is_empty());
    }

    #[test]
    fn test_fragmentation_invariance() {
        let raw = "GET / HTTP/1.1\r\nHost: a\r\n\r\n";

        let byte_at_a_time = request_from_reader(ChunkReader::new(raw, 1), 1024).unwrap();
        let single_chunk = request_from_reader(raw.as_bytes(), 1024).unwrap();
        let tiny_reads = request_from_reader(raw.as_bytes(), 1).unwrap();

        assert_eq!(byte_at_a_time, single_chunk);
        assert_eq!(tiny_reads, single_chunk);
    }

    #[test]
    fn test_fragmentation_invariance_with_body() {
        let raw = "POST /submit HTTP/1.1\r\nContent-Length: 13\r\n\r\nhello world!\n";
        let expected = request_from_reader(raw.as_bytes(), 4096).unwrap();

        for per_read in 1..raw.len() {
            let req = request_from_reader(ChunkReader::new(raw, per_read), 1024).unwrap();
            assert_eq!(req, expected, "per_read = {per_read}");
        }
        assert_eq!(expected.body(), b"hello world!\n");
    }

    #[test]
    fn test_body_exact_length() {
        let raw = "POST /submit HTTP/1.1\r\nHost: localhost:42069\r\nContent-Length: 13\r\n\r\nhello world!\n";
        let req = request_from_reader(ChunkReader::new(raw, 3), 1024).unwrap();
        assert_eq!(req.body(), b"hello world!\n");
    }

    #[test]
    fn test_body_shorter_than_content_length() {
        let raw = "POST /submit HTTP/1.1\r\nHost: localhost:42069\r\nContent-Length: 20\r\n\r\npartial content";
        let err = request_from_reader(ChunkReader::new(raw, 3), 1024).unwrap_err();
        assert!(matches!(err, Error::IncompleteAtEof("body")));
    }

    #[test]
    fn test_body_longer_than_content_length() {
        let raw = "POST /submit HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello!";
        let err = request_from_reader(raw.as_bytes(), 1024).unwrap_err();
        assert!(matches!(
            err,
            Error::BodyOverrun {
                declared: 5,
                received: 6
            }
        ));
    }

    #[test]
    fn test_zero_content_length() {
        let raw = "POST /empty HTTP/1.1\r\nContent-Length: 0\r\n\r\n";
        let req = request_from_reader(raw.as_bytes(), 1024).unwrap();
        assert!(req.body().is_empty());
        assert_eq!(req.state(), ParseState::Done);
    }

    #[test]
    fn test_invalid_content_length() {
        let raw = "POST / HTTP/1.1\r\nContent-Length: lots\r\n\r\nabc";
        let err = request_from_reader(raw.as_bytes(), 1024).unwrap_err();
        assert!(matches!(err, Error::InvalidContentLength(_)));
    }

    #[test]
    fn test_missing_method_token() {
        let raw = "/coffee HTTP/1.1\r\nHost: localhost:42069\r\nUser-Agent: curl/7.81.0\r\nAccept: */*\r\n\r\n";
        let err = request_from_reader(raw.as_bytes(), 1024).unwrap_err();
        assert!(matches!(err, Error::MalformedRequestLine(_)));
    }

    #[test]
    fn test_method_validation() {
        assert!(matches!(
            parse_request_line("get / HTTP/1.1"),
            Err(Error::MalformedRequestLine(_))
        ));
        assert!(matches!(
            parse_request_line("G3T / HTTP/1.1"),
            Err(Error::MalformedRequestLine(_))
        ));
        assert!(matches!(
            parse_request_line("GET  / HTTP/1.1"),
            Err(Error::MalformedRequestLine(_))
        ));
        assert_eq!(
            parse_request_line("BREW /pot HTTP/1.1").unwrap().method,
            Method::Extension("BREW".to_string())
        );
    }

    #[test]
    fn test_unsupported_version() {
        let err = request_from_reader(&b"GET / HTTP/1.0\r\n\r\n"[..], 1024).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(v) if v == "HTTP/1.0"));
    }

    #[test]
    fn test_malformed_header() {
        let raw = "GET / HTTP/1.1\r\nHost localhost:42069\r\n\r\n";
        let err = request_from_reader(ChunkReader::new(raw, 3), 1024).unwrap_err();
        assert!(matches!(err, Error::HeaderSyntax(_)));
    }

    #[test]
    fn test_incomplete_request_line() {
        let err = request_from_reader(&b"GET / HTT"[..], 1024).unwrap_err();
        assert!(matches!(err, Error::IncompleteAtEof("request line")));
    }

    #[test]
    fn test_incomplete_headers() {
        let err = request_from_reader(&b"GET / HTTP/1.1\r\nHost: a\r\n"[..], 1024).unwrap_err();
        assert!(matches!(err, Error::IncompleteAtEof("headers")));
    }

    #[test]
    fn test_repeated_headers_fold() {
        let raw = "GET / HTTP/1.1\r\nAccept: text/html\r\naccept: application/json\r\n\r\n";
        let req = request_from_reader(raw.as_bytes(), 1024).unwrap();
        assert_eq!(req.headers().get("Accept"), "text/html, application/json");
    }

    #[test]
    fn test_query_params() {
        let raw = "GET /search?q=rust+lang&page=2&q2=%2Fetc HTTP/1.1\r\n\r\n";
        let req = request_from_reader(raw.as_bytes(), 1024).unwrap();

        assert_eq!(req.path(), "/search");
        assert_eq!(req.query_params().get("q").unwrap(), "rust lang");
        assert_eq!(req.query_params().get("page").unwrap(), "2");
        assert_eq!(req.query_params().get("q2").unwrap(), "/etc");
    }

    #[test]
    fn test_push_style_parsing() {
        let mut parser = RequestParser::new();

        parser.feed(b"GET /a HT");
        assert!(!parser.advance(false).unwrap());
        assert_eq!(parser.state(), ParseState::ReadingRequestLine);

        parser.feed(b"TP/1.1\r\nHost: x\r\n");
        assert!(parser.advance(false).unwrap());
        assert_eq!(parser.state(), ParseState::ReadingHeaders);
        assert_eq!(parser.buffered(), 0);

        parser.feed(b"Content-Length: 2\r\n\r\no");
        parser.advance(false).unwrap();
        assert_eq!(parser.state(), ParseState::ReadingBody);

        parser.feed(b"k");
        parser.advance(false).unwrap();
        assert!(parser.is_done());

        let req = parser.into_request().unwrap();
        assert_eq!(req.body(), b"ok");
    }

    #[test]
    fn test_into_request_before_done() {
        let mut parser = RequestParser::new();
        parser.feed(b"GET / HTTP/1.1\r\n");
        parser.advance(false).unwrap();
        assert!(parser.into_request().is_none());
    }

    #[test]
    fn test_interrupted_reads_are_retried() {
        struct Flaky {
            inner: ChunkReader,
            interrupted: bool,
        }

        impl Read for Flaky {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                self.interrupted = !self.interrupted;
                if self.interrupted {
                    return Err(io::Error::from(ErrorKind::Interrupted));
                }
                self.inner.read(buf)
            }
        }

        let reader = Flaky {
            inner: ChunkReader::new(SIMPLE_GET, 5),
            interrupted: false,
        };
        let req = request_from_reader(reader, 1024).unwrap();
        assert_eq!(req.headers().get("host"), "localhost:42069");
    }

    #[test]
    fn test_read_errors_propagate() {
        struct Broken;

        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::from(ErrorKind::ConnectionReset))
            }
        }

        let err = request_from_reader(Broken, 1024).unwrap_err();
        assert!(matches!(err, Error::Io(e) if e.kind() == ErrorKind::ConnectionReset));
    }
}
