#![cfg_attr(nightly, feature(doc_cfg))]
//! An incremental parser and serializer for `multipart` byte streams
//! (RFC 2046 / RFC 7578).
//!
//! Input may arrive in arbitrarily-sized chunks that split a boundary
//! marker, a header field or a body byte anywhere; the parser reconstructs
//! exact message semantics without buffering the whole stream, and the
//! serializer produces byte-identical wire output from the same structural
//! representation.
//!
//! The crate is layered:
//!
//! - [`Parser`] and [`Serializer`] are synchronous sans-io state machines
//!   exchanging [`StructuralEvent`]s (boundary / header field / body chunk).
//! - [`EventStream`], [`SerializeStream`] and [`Multipart`] are pull-based
//!   async adapters driving those machines from a chunk or event source,
//!   suspending only when the source has nothing ready.
//! - [`Multipart`] additionally collates events into complete [`Part`]
//!   values under configurable [`SizeLimit`]s.
//! - [`MultipartWriter`] is the sink-side capability with part-writing
//!   helpers derived from a single `write` primitive.
//!
//! For callers that already hold the whole message in memory there are the
//! synchronous [`parse`] and [`serialize`] conveniences.
//!
//! # Examples
//!
//! ```
//! # fn run() -> partwise::Result<()> {
//! let parts = partwise::parse("--123\r\n\r\nfoo\r\n--123--\r\n", "123")?;
//!
//! assert_eq!(parts.len(), 1);
//! assert!(parts[0].headers().is_empty());
//! assert_eq!(&parts[0].body()[..], b"foo");
//!
//! let wire = partwise::serialize(&parts, "123")?;
//! assert_eq!(&wire[..], b"--123\r\n\r\nfoo\r\n--123--\r\n");
//! # Ok(())
//! # }
//! # run().unwrap();
//! ```

#[cfg(feature = "log")]
macro_rules! trace {
    ($($arg:tt)*) => {
        ::log::trace!($($arg)*)
    };
}

#[cfg(not(feature = "log"))]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

pub use bytes;

pub use error::Error;
pub use event::StructuralEvent;
pub use headers::HeaderFields;
pub use multipart::Multipart;
pub use parser::{Parser, ReadResult};
pub use part::Part;
pub use serializer::{Serializer, WriteResult};
pub use size_limit::SizeLimit;
pub use stream::{EventStream, SerializeStream};
pub use writer::{FlushingWriter, MemoryWriter, MultipartWriter};

mod buffer;
mod constants;
mod error;
mod event;
mod headers;
mod helpers;
mod matcher;
mod multipart;
mod parser;
mod part;
mod scanner;
mod serializer;
mod size_limit;
mod state;
mod stream;
mod writer;

/// A Result type often returned from methods that can have `partwise`
/// errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Parses the `Content-Type` header to extract the boundary value.
pub fn parse_boundary<T: AsRef<str>>(content_type: T) -> crate::Result<String> {
    let m = content_type
        .as_ref()
        .parse::<mime::Mime>()
        .map_err(Error::DecodeContentType)?;

    if !(m.type_() == mime::MULTIPART_FORM_DATA.type_()
        && m.subtype() == mime::MULTIPART_FORM_DATA.subtype())
    {
        return Err(Error::NoMultipart);
    }

    m.get_param(mime::BOUNDARY)
        .map(|name| name.as_str().to_owned())
        .ok_or(Error::NoBoundary)
}

/// Parses a complete in-memory message into its [`Part`]s by driving the
/// streaming [`Parser`] to completion without suspension.
pub fn parse<B: AsRef<[u8]>>(data: B, boundary: &str) -> crate::Result<Vec<Part>> {
    let mut parser = Parser::new(boundary)?;
    parser.append(data);
    parser.finish();

    let mut accumulator = part::PartAccumulator::new(u64::MAX);
    let mut parts = Vec::new();

    loop {
        match parser.read()? {
            ReadResult::Event(event) => {
                if let Some(part) = accumulator.push(event)? {
                    parts.push(part);
                }
            }
            ReadResult::Finished => return Ok(parts),
            ReadResult::NeedMoreData => unreachable!("parser starved after finish"),
        }
    }
}

/// Serializes [`Part`]s into a complete wire message, the mirror of
/// [`parse`].
pub fn serialize(parts: &[Part], boundary: &str) -> crate::Result<bytes::Bytes> {
    let mut writer = MemoryWriter::new(boundary)?;
    for part in parts {
        writer.write_part(part);
    }
    writer.finish();
    Ok(writer.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_boundary() {
        let content_type = "multipart/form-data; boundary=ABCDEFG";
        assert_eq!(parse_boundary(content_type), Ok("ABCDEFG".to_owned()));

        let content_type = "multipart/form-data; boundary=------ABCDEFG";
        assert_eq!(parse_boundary(content_type), Ok("------ABCDEFG".to_owned()));

        let content_type = "boundary=------ABCDEFG";
        assert!(parse_boundary(content_type).is_err());

        let content_type = "text/plain";
        assert!(parse_boundary(content_type).is_err());

        let content_type = "text/plain; boundary=------ABCDEFG";
        assert!(parse_boundary(content_type).is_err());
    }

    #[test]
    fn test_parse_serialize_round_trip() {
        let mut fields = HeaderFields::new();
        fields.append("Content-Disposition", "form-data; name=\"a\"");
        let parts = vec![
            Part::new(fields, &b"first"[..]),
            Part::new(HeaderFields::new(), &b"second\r\nwith line breaks"[..]),
        ];

        let wire = serialize(&parts, "simple boundary").unwrap();
        let reparsed = parse(&wire, "simple boundary").unwrap();
        assert_eq!(reparsed, parts);

        let rewire = serialize(&reparsed, "simple boundary").unwrap();
        assert_eq!(rewire, wire);
    }

    #[test]
    fn test_parse_rejects_truncation() {
        assert_eq!(
            parse(b"--b\r\n\r\nfoo", "b").unwrap_err(),
            Error::UnexpectedEof
        );
    }
}
