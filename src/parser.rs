use std::mem;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::Error;
use crate::event::StructuralEvent;
use crate::helpers;
use crate::matcher::{Advance, BoundaryMatcher};
use crate::scanner::{HeaderScanner, Scanned};
use crate::state::{Stage, TailSeen};

/// Outcome of a single [`Parser::read`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult {
    /// One structural event is ready.
    Event(StructuralEvent),
    /// The buffered bytes are exhausted mid-match; call
    /// [`append`](Parser::append) (or [`finish`](Parser::finish)) and read
    /// again.
    NeedMoreData,
    /// The final boundary was crossed and the backing source is exhausted.
    Finished,
}

/// Incremental multipart parser.
///
/// The parser is a synchronous state machine: [`append`](Parser::append)
/// buffers bytes from anywhere, [`read`](Parser::read) advances as far as
/// the buffered bytes allow and surfaces exactly one structural event at a
/// time. Input may be split at any byte position, including inside the
/// boundary marker itself; no body byte is ever emitted while it could
/// still turn out to belong to a boundary, and none is dropped or emitted
/// twice when a partial boundary match turns out to be plain body data.
///
/// Preamble bytes (before the first boundary) and epilogue bytes (after the
/// final one) are discarded. A source that ends anywhere else produces
/// [`Error::UnexpectedEof`].
///
/// # Examples
///
/// ```
/// use partwise::{Parser, ReadResult, StructuralEvent};
///
/// # fn run() -> partwise::Result<()> {
/// let mut parser = Parser::new("123")?;
/// parser.append("--123\r\n\r\nfoo\r\n--123--\r\n");
/// parser.finish();
///
/// let mut bodies = Vec::new();
/// loop {
///     match parser.read()? {
///         ReadResult::Event(StructuralEvent::BodyChunk(bytes)) => bodies.push(bytes),
///         ReadResult::Event(_) => {}
///         ReadResult::NeedMoreData => unreachable!(),
///         ReadResult::Finished => break,
///     }
/// }
/// assert_eq!(&bodies[0][..], b"foo");
/// # Ok(())
/// # }
/// # run().unwrap();
/// ```
#[derive(Debug)]
pub struct Parser {
    buf: BytesMut,
    matcher: BoundaryMatcher,
    scanner: HeaderScanner,
    stage: Stage,
    /// Bytes of `buf` already scanned while in the body stage.
    body_scanned: usize,
    /// Index into `buf` where the current speculative boundary match began.
    body_match_start: Option<usize>,
    /// Matched pattern bytes held back until the boundary tail resolves.
    tail_held: BytesMut,
    tail_seen: TailSeen,
    tail_from_body: bool,
    eof: bool,
}

impl Parser {
    /// Creates a parser for a message delimited by `boundary`.
    ///
    /// The boundary must be non-empty and free of CR/LF.
    pub fn new<B: AsRef<str>>(boundary: B) -> crate::Result<Parser> {
        let boundary = boundary.as_ref();
        helpers::validate_boundary(boundary)?;

        Ok(Parser {
            buf: BytesMut::new(),
            matcher: BoundaryMatcher::new(boundary),
            scanner: HeaderScanner::new(),
            stage: Stage::Preamble,
            body_scanned: 0,
            body_match_start: None,
            tail_held: BytesMut::new(),
            tail_seen: TailSeen::Nothing,
            tail_from_body: false,
            eof: false,
        })
    }

    /// Appends more input. Never blocks, never fails.
    pub fn append<B: AsRef<[u8]>>(&mut self, bytes: B) {
        self.buf.extend_from_slice(bytes.as_ref());
    }

    /// Marks the backing source as exhausted. After this, `read` reports
    /// [`ReadResult::Finished`] from the epilogue and
    /// [`Error::UnexpectedEof`] from anywhere else.
    pub fn finish(&mut self) {
        self.eof = true;
    }

    /// Advances the state machine as far as the buffered bytes allow and
    /// returns one structural event, a need-more-data signal, or the
    /// finished signal.
    pub fn read(&mut self) -> crate::Result<ReadResult> {
        'read: loop {
            match self.stage {
                Stage::Preamble => {
                    while !self.buf.is_empty() {
                        if self.matcher.is_idle() {
                            // Nothing can start a match except CR or `-`.
                            match memchr::memchr2(b'\r', b'-', &self.buf) {
                                Some(at) if at > 0 => self.buf.advance(at),
                                Some(_) => {}
                                None => {
                                    self.buf.clear();
                                    break;
                                }
                            }
                        }
                        let byte = self.buf[0];
                        self.buf.advance(1);
                        if let Advance::Complete = self.matcher.advance(byte) {
                            self.tail_held.clear();
                            self.tail_seen = TailSeen::Nothing;
                            self.tail_from_body = false;
                            self.stage = Stage::BoundaryTail;
                            continue 'read;
                        }
                    }
                    return self.starved();
                }

                Stage::BoundaryTail => {
                    while !self.buf.is_empty() {
                        let byte = self.buf[0];
                        match (self.tail_seen, byte) {
                            (TailSeen::Nothing, b'\r') => {
                                self.buf.advance(1);
                                self.tail_held.put_u8(byte);
                                self.tail_seen = TailSeen::Cr;
                            }
                            (TailSeen::Nothing, b'-') => {
                                self.buf.advance(1);
                                self.tail_held.put_u8(byte);
                                self.tail_seen = TailSeen::Dash;
                            }
                            (TailSeen::Cr, b'\n') => {
                                self.buf.advance(1);
                                self.tail_held.clear();
                                self.scanner.reset();
                                self.stage = Stage::ReadingHeaders;
                                trace!("boundary crossed, reading part headers");
                                return Ok(ReadResult::Event(StructuralEvent::Boundary {
                                    is_final: false,
                                }));
                            }
                            (TailSeen::Dash, b'-') => {
                                self.buf.advance(1);
                                self.tail_held.clear();
                                self.stage = Stage::Epilogue;
                                trace!("final boundary crossed");
                                return Ok(ReadResult::Event(StructuralEvent::Boundary {
                                    is_final: true,
                                }));
                            }
                            _ => {
                                // Not a boundary after all. The held bytes
                                // are data; the offending byte stays in the
                                // buffer and may start a new match.
                                if self.tail_from_body {
                                    let body = mem::take(&mut self.tail_held).freeze();
                                    self.stage = Stage::ReadingBody;
                                    self.body_scanned = 0;
                                    self.body_match_start = None;
                                    return Ok(ReadResult::Event(StructuralEvent::BodyChunk(
                                        body,
                                    )));
                                }
                                self.tail_held.clear();
                                self.stage = Stage::Preamble;
                                continue 'read;
                            }
                        }
                    }
                    return self.starved();
                }

                Stage::ReadingHeaders => {
                    while !self.buf.is_empty() {
                        let byte = self.buf[0];
                        self.buf.advance(1);
                        match self.scanner.advance(byte)? {
                            Scanned::Continue => {}
                            Scanned::Field { name, value } => {
                                return Ok(ReadResult::Event(StructuralEvent::HeaderField {
                                    name,
                                    value,
                                }));
                            }
                            Scanned::EndOfBlock => {
                                debug_assert!(self.matcher.is_idle());
                                self.stage = Stage::ReadingBody;
                                self.body_scanned = 0;
                                self.body_match_start = None;
                                trace!("headers complete, reading part body");
                                continue 'read;
                            }
                        }
                    }
                    return self.starved();
                }

                Stage::ReadingBody => {
                    let mut pos = self.body_scanned;
                    let mut pattern_end = None;

                    while pos < self.buf.len() {
                        if self.matcher.is_idle() {
                            // Skip straight to the next possible match entry.
                            match memchr::memchr2(b'\r', b'-', &self.buf[pos..]) {
                                Some(rel) => pos += rel,
                                None => {
                                    pos = self.buf.len();
                                    break;
                                }
                            }
                        }
                        let byte = self.buf[pos];
                        match self.matcher.advance(byte) {
                            Advance::Matched => {
                                if self.body_match_start.is_none() {
                                    self.body_match_start = Some(pos);
                                }
                            }
                            Advance::Restarted => self.body_match_start = Some(pos),
                            Advance::Rejected => self.body_match_start = None,
                            Advance::Complete => {
                                pos += 1;
                                pattern_end = Some(pos);
                                break;
                            }
                        }
                        pos += 1;
                    }

                    if let Some(end) = pattern_end {
                        let start = match self.body_match_start.take() {
                            Some(start) => start,
                            None => unreachable!("boundary completed without a match start"),
                        };
                        let body = self.buf.split_to(start).freeze();
                        self.tail_held = self.buf.split_to(end - start);
                        self.body_scanned = 0;
                        self.tail_seen = TailSeen::Nothing;
                        self.tail_from_body = true;
                        self.stage = Stage::BoundaryTail;
                        if !body.is_empty() {
                            return Ok(ReadResult::Event(StructuralEvent::BodyChunk(body)));
                        }
                        continue 'read;
                    }

                    // Buffer exhausted; release everything confirmed to be
                    // body, keep any partial match held.
                    self.body_scanned = pos;
                    let confirmed = self.body_match_start.unwrap_or(pos);
                    if confirmed > 0 {
                        let body = self.buf.split_to(confirmed).freeze();
                        self.body_scanned -= confirmed;
                        if self.body_match_start.is_some() {
                            self.body_match_start = Some(0);
                        }
                        return Ok(ReadResult::Event(StructuralEvent::BodyChunk(body)));
                    }
                    return self.starved();
                }

                Stage::Epilogue => {
                    self.buf.clear();
                    return if self.eof {
                        Ok(ReadResult::Finished)
                    } else {
                        Ok(ReadResult::NeedMoreData)
                    };
                }
            }
        }
    }

    fn starved(&self) -> crate::Result<ReadResult> {
        if self.eof {
            Err(Error::UnexpectedEof)
        } else {
            Ok(ReadResult::NeedMoreData)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events_of(data: &[u8], boundary: &str) -> crate::Result<Vec<StructuralEvent>> {
        let mut parser = Parser::new(boundary)?;
        parser.append(data);
        parser.finish();
        collect(&mut parser)
    }

    fn collect(parser: &mut Parser) -> crate::Result<Vec<StructuralEvent>> {
        let mut events = Vec::new();
        loop {
            match parser.read()? {
                ReadResult::Event(ev) => events.push(ev),
                ReadResult::NeedMoreData => unreachable!("starved after finish"),
                ReadResult::Finished => return Ok(events),
            }
        }
    }

    fn body_of(events: &[StructuralEvent]) -> Vec<u8> {
        let mut body = Vec::new();
        for ev in events {
            if let StructuralEvent::BodyChunk(bytes) = ev {
                body.extend_from_slice(bytes);
            }
        }
        body
    }

    #[test]
    fn test_single_part_no_headers() {
        let events = events_of(b"--123\r\n\r\nfoo\r\n--123--\r\n", "123").unwrap();
        assert_eq!(events[0], StructuralEvent::Boundary { is_final: false });
        assert_eq!(body_of(&events), b"foo");
        assert_eq!(
            events.last(),
            Some(&StructuralEvent::Boundary { is_final: true })
        );
        assert!(!events
            .iter()
            .any(|ev| matches!(ev, StructuralEvent::HeaderField { .. })));
    }

    #[test]
    fn test_headers_surfaced_in_order() {
        let data = b"--b\r\nContent-Type: text/plain\r\nX-One: 1\r\n\r\nhi\r\n--b--\r\n";
        let events = events_of(data, "b").unwrap();
        assert_eq!(
            events[1],
            StructuralEvent::HeaderField {
                name: "Content-Type".to_owned(),
                value: "text/plain".to_owned()
            }
        );
        assert_eq!(
            events[2],
            StructuralEvent::HeaderField {
                name: "X-One".to_owned(),
                value: "1".to_owned()
            }
        );
        assert_eq!(body_of(&events), b"hi");
    }

    #[test]
    fn test_preamble_and_epilogue_discarded() {
        let data = b"ignore this\r\n--b\r\n\r\nx\r\n--b--\r\ntrailing junk";
        let events = events_of(data, "b").unwrap();
        assert_eq!(events[0], StructuralEvent::Boundary { is_final: false });
        assert_eq!(body_of(&events), b"x");
    }

    #[test]
    fn test_invalid_header_name() {
        let data = "--b\r\nna€me: v\r\n\r\nx\r\n--b--\r\n";
        let err = events_of(data.as_bytes(), "b").unwrap_err();
        assert_eq!(err, Error::invalid_header("invalid header name"));
    }

    #[test]
    fn test_truncated_mid_body() {
        let err = events_of(b"--123\r\n\r\nfoo", "123").unwrap_err();
        assert_eq!(err, Error::UnexpectedEof);
    }

    #[test]
    fn test_truncated_mid_headers() {
        let err = events_of(b"--123\r\nContent-Typ", "123").unwrap_err();
        assert_eq!(err, Error::UnexpectedEof);
    }

    #[test]
    fn test_missing_any_boundary() {
        let err = events_of(b"no boundary here at all", "123").unwrap_err();
        assert_eq!(err, Error::UnexpectedEof);
    }

    #[test]
    fn test_empty_boundary_rejected() {
        assert_eq!(Parser::new("").unwrap_err(), Error::InvalidBoundary);
        assert_eq!(Parser::new("a\r\nb").unwrap_err(), Error::InvalidBoundary);
    }

    #[test]
    fn test_false_start_released_once() {
        // "\r\n--12x" matches a boundary prefix, then fails; every held byte
        // must come back out exactly once.
        let data = b"--123\r\n\r\na\r\n--12x tail\r\n--123--\r\n";
        let events = events_of(data, "123").unwrap();
        assert_eq!(body_of(&events), b"a\r\n--12x tail");
    }

    #[test]
    fn test_two_crs_in_body() {
        let data = b"--123\r\n\r\nx\r\r\n--123--\r\n";
        let events = events_of(data, "123").unwrap();
        assert_eq!(body_of(&events), b"x\r");
    }

    #[test]
    fn test_boundary_tail_false_start() {
        // A full pattern match whose tail is neither CRLF nor `--` is body.
        let data = b"--123\r\n\r\na\r\n--123junk\r\n--123--\r\n";
        let events = events_of(data, "123").unwrap();
        assert_eq!(body_of(&events), b"a\r\n--123junk");
    }

    #[test]
    fn test_split_at_every_offset() {
        let data: &[u8] = b"--123\r\nA: 1\r\n\r\nhello\r\n--123\r\n\r\nworld\r\n--123--\r\n";
        let whole = events_of(data, "123").unwrap();

        for cut in 0..=data.len() {
            let mut parser = Parser::new("123").unwrap();
            let mut events = Vec::new();
            for piece in &[&data[..cut], &data[cut..]] {
                parser.append(piece);
                loop {
                    match parser.read().unwrap() {
                        ReadResult::Event(ev) => events.push(ev),
                        ReadResult::NeedMoreData => break,
                        ReadResult::Finished => break,
                    }
                }
            }
            parser.finish();
            events.extend(collect(&mut parser).unwrap());

            assert_eq!(body_of(&events), body_of(&whole), "cut at {}", cut);
            assert_eq!(
                events.iter().filter(|e| matches!(e, StructuralEvent::Boundary { .. })).count(),
                3,
                "cut at {}",
                cut
            );
        }
    }

    #[test]
    fn test_epilogue_waits_for_eof() {
        let mut parser = Parser::new("b").unwrap();
        parser.append("--b\r\n\r\nx\r\n--b--\r\n");
        loop {
            match parser.read().unwrap() {
                ReadResult::Event(_) => {}
                ReadResult::NeedMoreData => break,
                ReadResult::Finished => panic!("finished before the source was exhausted"),
            }
        }
        parser.finish();
        assert_eq!(parser.read().unwrap(), ReadResult::Finished);
    }
}
