//! HTTP headers handling
//!
//! This module provides a case-insensitive header store. Names are
//! normalized to lowercase on the way in, and adding a name twice folds the
//! values into one comma-separated value instead of keeping duplicates.

use super::{Error, Result, CRLF};
use std::fmt;

/// HTTP headers collection
///
/// Headers are stored in insertion order and support:
/// - Case-insensitive header name lookups
/// - Folding of repeated names into one `", "`-joined value
/// - Iteration over all headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: Vec<(String, String)>,
}

impl Headers {
    /// Create a new empty headers collection
    pub fn new() -> Self {
        Headers {
            headers: Vec::new(),
        }
    }

    /// Add a header value
    ///
    /// If a header with the same name (case-insensitive) already exists,
    /// the new value is appended to it, separated by `", "`.
    pub fn add(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) {
        let name = name.as_ref().to_ascii_lowercase();
        let value = value.as_ref();

        match self.position(&name) {
            Some(idx) if !self.headers[idx].1.is_empty() => {
                let existing = &mut self.headers[idx].1;
                existing.push_str(", ");
                existing.push_str(value);
            }
            Some(idx) => self.headers[idx].1 = value.to_string(),
            None => self.headers.push((name, value.to_string())),
        }
    }

    /// Replace the value of a header, adding it if absent
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = name.as_ref().to_ascii_lowercase();
        let value = value.into();

        match self.position(&name) {
            Some(idx) => self.headers[idx].1 = value,
            None => self.headers.push((name, value)),
        }
    }

    /// Get the value for a header (case-insensitive), or `""` if absent
    pub fn get(&self, name: &str) -> &str {
        self.get_opt(name).unwrap_or("")
    }

    /// Get the value for a header (case-insensitive)
    pub fn get_opt(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Check if a header exists
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Remove a header (case-insensitive), returning its value
    pub fn del(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|idx| self.headers.remove(idx).1)
    }

    /// Get the number of distinct header names
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Check if there are no headers
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Iterate over all headers as `(lowercase name, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Parse one header line from the front of `buf` into this collection
    ///
    /// Returns `(bytes_consumed, is_terminator)`:
    /// - `(0, false)` when no complete line is buffered yet
    /// - `(2, true)` for the empty line that ends a header block
    /// - `(line_len + 2, false)` after adding a parsed header
    pub fn parse_header_line(&mut self, buf: &[u8]) -> Result<(usize, bool)> {
        let Some(crlf_pos) = find_crlf(buf) else {
            return Ok((0, false));
        };

        if crlf_pos == 0 {
            return Ok((CRLF.len(), true));
        }

        let line = std::str::from_utf8(&buf[..crlf_pos])
            .map_err(|_| Error::HeaderSyntax("header line is not UTF-8".to_string()))?;
        let Some(colon_pos) = line.find(':') else {
            return Err(Error::HeaderSyntax(format!("no colon in header: {line}")));
        };

        let name = &line[..colon_pos];
        let value = line[colon_pos + 1..].trim();

        if name.contains(' ') {
            return Err(Error::HeaderSyntax(format!(
                "invalid spacing in header name: {line}"
            )));
        }
        if name.is_empty() || !name.bytes().all(is_token_byte) {
            return Err(Error::HeaderSyntax(format!(
                "invalid character in header name: {line}"
            )));
        }

        self.add(name, value);
        Ok((crlf_pos + CRLF.len(), false))
    }

    /// Minimal header set for synthesized plain-text responses
    pub fn default_headers(content_length: usize) -> Self {
        let mut headers = Headers::new();
        headers.add("Content-Length", content_length.to_string());
        headers.add("Connection", "close");
        headers.add("Content-Type", "text/plain");
        headers
    }
}

/// Bytes allowed in a header name (RFC 9110 `tchar`)
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_'
                | b'`' | b'|' | b'~'
        )
}

/// Find the next CRLF in a buffer
pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF.as_bytes())
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.headers {
            write!(f, "{}: {}{}", name, value, CRLF)?;
        }
        Ok(())
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.add(name, value);
        }
        headers
    }
}
