//! HTTP response framing
//!
//! [`ResponseWriter`] writes a response piece by piece onto any byte sink:
//! status line, header block, then either a plain body or a sequence of
//! chunks optionally followed by trailers. It tracks just enough state to
//! refuse trailers the header block never announced.

use super::chunked::ChunkedEncoder;
use super::{Error, HandlerError, Headers, Result, StatusCode, CRLF, HTTP_VERSION};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    StatusLine,
    Headers,
    Body,
    ChunksDone,
    Complete,
}

/// Writes one HTTP/1.1 response onto an outbound byte stream
pub struct ResponseWriter<'a> {
    out: &'a mut dyn Write,
    headers: Headers,
    declared_trailers: Vec<String>,
    phase: Phase,
}

impl<'a> ResponseWriter<'a> {
    /// Create a writer over `out`
    pub fn new(out: &'a mut dyn Write) -> Self {
        ResponseWriter {
            out,
            headers: Headers::new(),
            declared_trailers: Vec::new(),
            phase: Phase::StatusLine,
        }
    }

    /// Headers staged for the response
    ///
    /// Middleware adds to these before the handler runs; they are emitted
    /// together with whatever the handler passes to [`write_headers`].
    ///
    /// [`write_headers`]: ResponseWriter::write_headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Get mutable staged headers
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    fn emit(&mut self, bytes: &[u8], context: &'static str) -> Result<()> {
        self.out
            .write_all(bytes)
            .map_err(|source| Error::Write { context, source })
    }

    /// Write the status line
    ///
    /// 200, 204, 400 and 500 carry their reason phrase; any other code is
    /// written as a bare number.
    pub fn write_status_line(&mut self, status: StatusCode) -> Result<()> {
        let line = format!("{} {}{}", HTTP_VERSION, status, CRLF);
        self.emit(line.as_bytes(), "status line")?;
        self.phase = Phase::Headers;
        Ok(())
    }

    /// Write the header block
    ///
    /// `headers` is folded into the staged headers and the result is written
    /// as `name: value` lines followed by the blank line that ends the block.
    /// A `Trailer` header here declares which trailers may follow a chunked
    /// body.
    pub fn write_headers(&mut self, headers: &Headers) -> Result<()> {
        for (name, value) in headers.iter() {
            self.headers.add(name, value);
        }

        let mut block = self.headers.to_string();
        block.push_str(CRLF);
        self.emit(block.as_bytes(), "headers")?;

        self.declared_trailers = self
            .headers
            .get("trailer")
            .split(',')
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        self.phase = Phase::Body;
        Ok(())
    }

    /// Write raw body bytes
    pub fn write_body(&mut self, body: &[u8]) -> Result<()> {
        self.emit(body, "body")
    }

    /// Write one chunk of a chunked body
    ///
    /// Can be called any number of times. Empty input writes nothing.
    pub fn write_chunked_body(&mut self, data: &[u8]) -> Result<()> {
        ChunkedEncoder::new(&mut *self.out)
            .write_chunk(data)
            .map_err(|source| Error::Write {
                context: "chunked body",
                source,
            })
    }

    /// Write the zero-length chunk that ends a chunked body
    ///
    /// Only the `0\r\n` line is written here. The blank line that closes the
    /// message comes from [`write_trailers`] or, without trailers, from
    /// [`finish`].
    ///
    /// [`write_trailers`]: ResponseWriter::write_trailers
    /// [`finish`]: ResponseWriter::finish
    pub fn write_chunked_body_done(&mut self) -> Result<()> {
        ChunkedEncoder::new(&mut *self.out)
            .write_last_chunk()
            .map_err(|source| Error::Write {
                context: "last chunk",
                source,
            })?;
        self.phase = Phase::ChunksDone;
        Ok(())
    }

    /// Write trailers after a completed chunked body
    pub fn write_trailers(&mut self, trailers: &Headers) -> Result<()> {
        if self.phase != Phase::ChunksDone {
            return Err(Error::Protocol(
                "trailers written before the chunked body was completed".to_string(),
            ));
        }

        if let Some((name, _)) = trailers
            .iter()
            .find(|(name, _)| !self.declared_trailers.iter().any(|d| d == name))
        {
            return Err(Error::Protocol(format!(
                "trailer {name} was not declared in a Trailer header"
            )));
        }

        let mut block = trailers.to_string();
        block.push_str(CRLF);
        self.emit(block.as_bytes(), "trailers")?;
        self.phase = Phase::Complete;
        Ok(())
    }

    /// Answer with a handler's error as a plain-text response
    pub fn respond_with_handler_error(&mut self, err: &HandlerError) -> Result<()> {
        let body = err.message.as_bytes();

        self.write_status_line(err.status)?;
        self.write_headers(&Headers::default_headers(body.len()))?;
        self.write_body(body)
    }

    /// Complete the response and flush it
    ///
    /// Closes a chunked body that ended without trailers.
    pub fn finish(&mut self) -> Result<()> {
        if self.phase == Phase::ChunksDone {
            self.emit(CRLF.as_bytes(), "end of chunked body")?;
        }
        self.phase = Phase::Complete;
        self.out.flush().map_err(|source| Error::Write {
            context: "response",
            source,
        })
    }

    /// Check whether a status line has been written
    pub fn is_started(&self) -> bool {
        self.phase != Phase::StatusLine
    }
}
