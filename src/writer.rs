use bytes::{Bytes, BytesMut};

use crate::constants;
use crate::headers::HeaderFields;
use crate::helpers;
use crate::part::Part;

/// An incremental multipart byte sink.
///
/// Implementors supply only the primitive [`write`](MultipartWriter::write)
/// and the configured [`boundary`](MultipartWriter::boundary); every
/// part-writing helper is a provided method built purely on those two, so
/// any sink gets full part-writing behavior for free.
///
/// A whole message is `write_part` for each part followed by one
/// [`finish`](MultipartWriter::finish). The pieces can also be written
/// individually; a part written that way is the boundary line, the header
/// block, the body bytes, then the CRLF that separates the body from the
/// next boundary line (which `write_part` emits itself).
pub trait MultipartWriter {
    /// Appends raw bytes to the sink.
    fn write(&mut self, bytes: &[u8]);

    /// The boundary this writer delimits parts with.
    fn boundary(&self) -> &str;

    /// Writes a boundary line: `--boundary CRLF`.
    fn write_boundary(&mut self) {
        let mut line = Vec::with_capacity(self.boundary().len() + 4);
        line.extend_from_slice(constants::BOUNDARY_EXT);
        line.extend_from_slice(self.boundary().as_bytes());
        line.extend_from_slice(constants::CRLF);
        self.write(&line);
    }

    /// Writes a header block: one `name: value CRLF` line per field,
    /// terminated by a blank CRLF line.
    fn write_headers(&mut self, fields: &HeaderFields) {
        let mut block = Vec::new();
        for (name, value) in fields.iter() {
            block.extend_from_slice(name.as_bytes());
            block.extend_from_slice(b": ");
            block.extend_from_slice(value.as_bytes());
            block.extend_from_slice(constants::CRLF);
        }
        block.extend_from_slice(constants::CRLF);
        self.write(&block);
    }

    /// Writes body bytes verbatim.
    fn write_body_chunk(&mut self, bytes: &[u8]) {
        self.write(bytes);
    }

    /// Writes one complete part: boundary line, header block, body, and the
    /// CRLF that closes the body.
    fn write_part(&mut self, part: &Part) {
        self.write_boundary();
        self.write_headers(part.headers());
        self.write_body_chunk(part.body());
        self.write(constants::CRLF);
    }

    /// Writes the terminating boundary line: `--boundary-- CRLF`.
    fn finish(&mut self) {
        let mut line = Vec::with_capacity(self.boundary().len() + 6);
        line.extend_from_slice(constants::BOUNDARY_EXT);
        line.extend_from_slice(self.boundary().as_bytes());
        line.extend_from_slice(constants::BOUNDARY_EXT);
        line.extend_from_slice(constants::CRLF);
        self.write(&line);
    }
}

/// A [`MultipartWriter`] accumulating everything in memory.
#[derive(Debug)]
pub struct MemoryWriter {
    boundary: String,
    buf: BytesMut,
}

impl MemoryWriter {
    pub fn new<B: Into<String>>(boundary: B) -> crate::Result<MemoryWriter> {
        let boundary = boundary.into();
        helpers::validate_boundary(&boundary)?;

        Ok(MemoryWriter {
            boundary,
            buf: BytesMut::new(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

impl MultipartWriter for MemoryWriter {
    fn write(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn boundary(&self) -> &str {
        &self.boundary
    }
}

/// A size-bounded buffering [`MultipartWriter`].
///
/// Writes are retained in an internal buffer while it stays at or below
/// `capacity`. A write that takes the buffer past capacity flushes
/// everything buffered so far — including that write — to the inner writer:
/// capacity is a flush trigger, not a hard limit on what reaches the inner
/// sink in one call.
#[derive(Debug)]
pub struct FlushingWriter<W> {
    inner: W,
    buf: BytesMut,
    capacity: usize,
}

impl<W: MultipartWriter> FlushingWriter<W> {
    pub fn new(inner: W, capacity: usize) -> FlushingWriter<W> {
        FlushingWriter {
            inner,
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Bytes currently buffered and not yet flushed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Flushes everything buffered to the inner writer.
    pub fn flush(&mut self) {
        if !self.buf.is_empty() {
            let buffered = self.buf.split();
            self.inner.write(&buffered);
        }
    }

    /// Flushes and returns the inner writer.
    pub fn into_inner(mut self) -> W {
        self.flush();
        self.inner
    }
}

impl<W: MultipartWriter> MultipartWriter for FlushingWriter<W> {
    fn write(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > self.capacity {
            self.flush();
        }
    }

    fn boundary(&self) -> &str {
        self.inner.boundary()
    }
}
