use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

use crate::constants;
use crate::error::Error;
use crate::event::StructuralEvent;
use crate::helpers;
use crate::scanner;

/// Outcome of a single [`Serializer::write`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// One stage of output was rendered.
    Serialized(Bytes),
    /// No events are queued; append more and write again.
    NeedMoreData,
    /// The final boundary has been rendered; the serializer is done.
    Finished,
}

/// Which piece of the current part is flushed next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartStage {
    Header,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    Serializing(PartStage),
    Finished,
}

/// Incremental multipart serializer: the mirror of [`Parser`].
///
/// [`append`](Serializer::append) enqueues structural events;
/// [`write`](Serializer::write) dequeues and renders exactly one stage of
/// wire output per call — a boundary line, the currently-queued header
/// fields as one block, or the currently-queued body chunks as one run.
/// Feeding the events produced by a [`Parser`] back through a `Serializer`
/// reproduces the original wire bytes.
///
/// Events must follow the per-part order `Boundary` → `HeaderField`* →
/// `BodyChunk`*. An out-of-order queue is a programming error and panics;
/// header fields whose name or value cannot appear on the wire surface as
/// [`Error::InvalidHeader`].
///
/// [`Parser`]: crate::Parser
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use partwise::{Serializer, StructuralEvent, WriteResult};
///
/// # fn run() -> partwise::Result<()> {
/// let mut serializer = Serializer::new("123")?;
/// serializer.append(StructuralEvent::Boundary { is_final: false });
/// serializer.append(StructuralEvent::BodyChunk(Bytes::from_static(b"foo")));
/// serializer.append(StructuralEvent::Boundary { is_final: true });
///
/// let mut wire = Vec::new();
/// while let WriteResult::Serialized(bytes) = serializer.write()? {
///     wire.extend_from_slice(&bytes);
/// }
/// assert_eq!(wire, b"--123\r\n\r\nfoo\r\n--123--\r\n");
/// # Ok(())
/// # }
/// # run().unwrap();
/// ```
#[derive(Debug)]
pub struct Serializer {
    boundary: String,
    queue: VecDeque<StructuralEvent>,
    state: State,
}

impl Serializer {
    /// Creates a serializer emitting parts delimited by `boundary`.
    ///
    /// The boundary must be non-empty and free of CR/LF.
    pub fn new<B: Into<String>>(boundary: B) -> crate::Result<Serializer> {
        let boundary = boundary.into();
        helpers::validate_boundary(&boundary)?;

        Ok(Serializer {
            boundary,
            queue: VecDeque::new(),
            state: State::Initial,
        })
    }

    /// Enqueues one structural event.
    ///
    /// # Panics
    ///
    /// Panics if called after the final boundary event has been rendered.
    pub fn append(&mut self, event: StructuralEvent) {
        assert!(
            self.state != State::Finished,
            "event appended after the final boundary was serialized"
        );
        self.queue.push_back(event);
    }

    /// The final boundary has been rendered.
    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    /// Renders one stage of output from the queued events.
    ///
    /// Consecutive events of the same kind are coalesced into a single
    /// rendered stage.
    ///
    /// # Panics
    ///
    /// Panics on a stage mismatch in the queue: a header field or body chunk
    /// before any boundary, or a header field after the current part's body
    /// began.
    pub fn write(&mut self) -> crate::Result<WriteResult> {
        let event = match self.queue.pop_front() {
            Some(event) => event,
            None => {
                return Ok(match self.state {
                    State::Finished => WriteResult::Finished,
                    _ => WriteResult::NeedMoreData,
                });
            }
        };

        let mut out = BytesMut::new();

        match event {
            StructuralEvent::Boundary { is_final } => {
                match self.state {
                    State::Initial => {}
                    State::Serializing(PartStage::Header) => {
                        // Terminate the header block, then the delimiter's
                        // own leading CRLF.
                        out.extend_from_slice(b"\r\n\r\n");
                    }
                    State::Serializing(PartStage::Body) => out.extend_from_slice(constants::CRLF),
                    State::Finished => {
                        unreachable!("event queued after the final boundary")
                    }
                }
                out.extend_from_slice(constants::BOUNDARY_EXT);
                out.extend_from_slice(self.boundary.as_bytes());
                if is_final {
                    out.extend_from_slice(constants::BOUNDARY_EXT);
                }
                out.extend_from_slice(constants::CRLF);

                if is_final {
                    trace!("final boundary serialized");
                    self.state = State::Finished;
                } else {
                    self.state = State::Serializing(PartStage::Header);
                }
            }

            StructuralEvent::HeaderField { name, value } => {
                match self.state {
                    State::Serializing(PartStage::Header) => {}
                    State::Initial => panic!("header field serialized before any boundary"),
                    _ => panic!("header field serialized after the part body began"),
                }
                render_header_field(&mut out, &name, &value)?;
                while let Some(StructuralEvent::HeaderField { .. }) = self.queue.front() {
                    match self.queue.pop_front() {
                        Some(StructuralEvent::HeaderField { name, value }) => {
                            render_header_field(&mut out, &name, &value)?;
                        }
                        _ => unreachable!(),
                    }
                }
            }

            StructuralEvent::BodyChunk(bytes) => {
                match self.state {
                    State::Serializing(PartStage::Header) => {
                        // Blank line closing the (possibly empty) header
                        // block.
                        out.extend_from_slice(constants::CRLF);
                        self.state = State::Serializing(PartStage::Body);
                    }
                    State::Serializing(PartStage::Body) => {}
                    State::Initial => panic!("body chunk serialized before any boundary"),
                    State::Finished => unreachable!("event queued after the final boundary"),
                }
                out.extend_from_slice(&bytes);
                while let Some(StructuralEvent::BodyChunk(_)) = self.queue.front() {
                    match self.queue.pop_front() {
                        Some(StructuralEvent::BodyChunk(bytes)) => out.extend_from_slice(&bytes),
                        _ => unreachable!(),
                    }
                }
            }
        }

        Ok(WriteResult::Serialized(out.freeze()))
    }
}

fn render_header_field(out: &mut BytesMut, name: &str, value: &str) -> crate::Result<()> {
    if name.is_empty() || !name.bytes().all(scanner::is_token) {
        return Err(Error::invalid_header("invalid header name"));
    }
    if value.bytes().any(|b| b == b'\r' || b == b'\n') {
        return Err(Error::invalid_header("header value contains CR or LF"));
    }

    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value.as_bytes());
    out.extend_from_slice(b"\r\n");
    Ok(())
}
