//! Chunked transfer encoding support
//!
//! [`ChunkedEncoder`] frames body pieces as `<hex-len>\r\n<data>\r\n`;
//! [`ChunkedDecoder`] reverses that incrementally, keeping chunk boundaries
//! and collecting any trailers that follow the last chunk.

use super::headers::find_crlf;
use super::{Error, Headers, Result, CRLF};
use std::io::{self, Write};

/// The zero-length chunk line that ends a chunked body
pub const LAST_CHUNK: &[u8] = b"0\r\n";

/// Chunked encoder
///
/// Encodes data in HTTP chunked transfer encoding format
pub struct ChunkedEncoder<W: Write> {
    writer: W,
}

impl<W: Write> ChunkedEncoder<W> {
    /// Create a new chunked encoder
    pub fn new(writer: W) -> Self {
        ChunkedEncoder { writer }
    }

    /// Write a chunk of data
    ///
    /// Empty input writes nothing, since a zero-length chunk would end the
    /// body early.
    pub fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        write!(self.writer, "{:x}{}", data.len(), CRLF)?;
        self.writer.write_all(data)?;
        self.writer.write_all(CRLF.as_bytes())
    }

    /// Write the last-chunk line
    ///
    /// Trailers, if any, and the final CRLF are up to the caller.
    pub fn write_last_chunk(&mut self) -> io::Result<()> {
        self.writer.write_all(LAST_CHUNK)
    }

    /// Consume the encoder and return the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Chunked decoder
///
/// Decodes HTTP chunked transfer encoding format
#[derive(Debug, Default)]
pub struct ChunkedDecoder {
    state: DecoderState,
    chunk_size: usize,
    chunk_read: usize,
    chunks: Vec<Vec<u8>>,
    trailers: Headers,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum DecoderState {
    #[default]
    ChunkSize,
    ChunkData,
    ChunkEnd,
    Trailer,
    Complete,
}

impl ChunkedDecoder {
    /// Create a new chunked decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `input` as possible
    ///
    /// Returns the number of bytes consumed. Unconsumed bytes must be offered
    /// again, together with more data, on the next call.
    pub fn decode(&mut self, input: &[u8]) -> Result<usize> {
        let mut pos = 0;

        loop {
            let rest = &input[pos..];

            match self.state {
                DecoderState::ChunkSize => {
                    let Some(crlf_pos) = find_crlf(rest) else {
                        break;
                    };

                    let line = String::from_utf8_lossy(&rest[..crlf_pos]);
                    // Chunk extensions (after ';') are ignored
                    let size_str = line.split(';').next().unwrap_or_default().trim();
                    self.chunk_size = usize::from_str_radix(size_str, 16)
                        .map_err(|_| Error::InvalidChunkSize(size_str.to_string()))?;
                    self.chunk_read = 0;
                    pos += crlf_pos + CRLF.len();

                    if self.chunk_size == 0 {
                        self.state = DecoderState::Trailer;
                    } else {
                        // Grows with the bytes received, never with the declared size
                        self.chunks.push(Vec::new());
                        self.state = DecoderState::ChunkData;
                    }
                }

                DecoderState::ChunkData => {
                    let to_copy = (self.chunk_size - self.chunk_read).min(rest.len());
                    if to_copy == 0 {
                        break;
                    }

                    if let Some(chunk) = self.chunks.last_mut() {
                        chunk.extend_from_slice(&rest[..to_copy]);
                    }
                    pos += to_copy;
                    self.chunk_read += to_copy;

                    if self.chunk_read == self.chunk_size {
                        self.state = DecoderState::ChunkEnd;
                    }
                }

                DecoderState::ChunkEnd => {
                    if rest.len() < CRLF.len() {
                        break;
                    }
                    if &rest[..2] != CRLF.as_bytes() {
                        return Err(Error::Protocol("expected CRLF after chunk".to_string()));
                    }
                    pos += CRLF.len();
                    self.state = DecoderState::ChunkSize;
                }

                DecoderState::Trailer => {
                    let (consumed, done) = self.trailers.parse_header_line(rest)?;
                    if consumed == 0 {
                        break;
                    }
                    pos += consumed;
                    if done {
                        self.state = DecoderState::Complete;
                    }
                }

                DecoderState::Complete => break,
            }
        }

        Ok(pos)
    }

    /// Check if decoding is complete
    pub fn is_complete(&self) -> bool {
        self.state == DecoderState::Complete
    }

    /// Chunks decoded so far, split as they were on the wire
    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    /// Trailers received after the last chunk
    pub fn trailers(&self) -> &Headers {
        &self.trailers
    }

    /// Consume the decoder, returning the chunks and trailers
    pub fn into_parts(self) -> (Vec<Vec<u8>>, Headers) {
        (self.chunks, self.trailers)
    }
}

/// Decode a complete chunked body
///
/// Fails with [`Error::Protocol`] if `input` carries bytes past the end of
/// the body, and with [`Error::IncompleteAtEof`] if the body never ends.
pub fn decode_chunked_body(input: &[u8]) -> Result<(Vec<Vec<u8>>, Headers)> {
    let mut decoder = ChunkedDecoder::new();
    let consumed = decoder.decode(input)?;

    if !decoder.is_complete() {
        return Err(Error::IncompleteAtEof("chunked body"));
    }
    if consumed != input.len() {
        return Err(Error::Protocol(format!(
            "{} bytes after end of chunked body",
            input.len() - consumed
        )));
    }

    Ok(decoder.into_parts())
}
