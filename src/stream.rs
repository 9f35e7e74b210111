use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::stream::{Stream, TryStreamExt};

use crate::buffer::StreamFeed;
use crate::error::{BoxError, Error};
use crate::event::StructuralEvent;
use crate::parser::{Parser, ReadResult};
use crate::serializer::{Serializer, WriteResult};

/// A pull-based stream of [`StructuralEvent`]s parsed from a chunk source.
///
/// This is the event-level adapter under [`Multipart`](crate::Multipart):
/// use it when the consumer wants boundary/header/body events instead of
/// collated parts. It is a single-consumer iterator; the parser instance is
/// exclusively owned by it.
pub struct EventStream {
    parser: Parser,
    feed: StreamFeed,
    done: bool,
}

impl EventStream {
    /// Creates an event stream over the given chunk source and boundary.
    pub fn new<S, O, E, B>(stream: S, boundary: B) -> crate::Result<EventStream>
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<BoxError> + 'static,
        B: AsRef<str>,
    {
        Ok(EventStream {
            parser: Parser::new(boundary)?,
            feed: StreamFeed::new(stream, u64::MAX),
            done: false,
        })
    }

    /// Yields the next structural event, or `None` at the end of the
    /// message.
    pub async fn next_event(&mut self) -> crate::Result<Option<StructuralEvent>> {
        self.try_next().await
    }
}

impl Stream for EventStream {
    type Item = crate::Result<StructuralEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.done {
            return Poll::Ready(None);
        }

        loop {
            match this.parser.read() {
                Ok(ReadResult::Event(event)) => return Poll::Ready(Some(Ok(event))),
                Ok(ReadResult::NeedMoreData) => {
                    match this.feed.poll_feed(cx, &mut this.parser) {
                        Poll::Ready(Ok(())) => {}
                        Poll::Ready(Err(err)) => {
                            this.done = true;
                            return Poll::Ready(Some(Err(err)));
                        }
                        Poll::Pending => return Poll::Pending,
                    }
                }
                Ok(ReadResult::Finished) => {
                    this.done = true;
                    return Poll::Ready(None);
                }
                Err(err) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(err)));
                }
            }
        }
    }
}

/// A pull-based stream of serialized output chunks driven from a
/// [`StructuralEvent`] source: the mirror of [`EventStream`].
///
/// Ends after the final boundary event is rendered. An event source that
/// ends before supplying one fails with
/// [`Error::UnexpectedEof`](crate::Error::UnexpectedEof).
pub struct SerializeStream {
    events: Pin<Box<dyn Stream<Item = crate::Result<StructuralEvent>> + Send>>,
    serializer: Serializer,
    done: bool,
}

impl SerializeStream {
    /// Creates a serializing stream over the given event source and
    /// boundary.
    pub fn new<S, E, B>(events: S, boundary: B) -> crate::Result<SerializeStream>
    where
        S: Stream<Item = Result<StructuralEvent, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
        B: Into<String>,
    {
        let events = events.map_err(|err| Error::StreamReadFailed(err.into()));

        Ok(SerializeStream {
            events: Box::pin(events),
            serializer: Serializer::new(boundary)?,
            done: false,
        })
    }

    /// Yields the next chunk of wire output, or `None` once the final
    /// boundary has been rendered.
    pub async fn next_chunk(&mut self) -> crate::Result<Option<Bytes>> {
        self.try_next().await
    }
}

impl Stream for SerializeStream {
    type Item = crate::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.done {
            return Poll::Ready(None);
        }

        loop {
            match this.serializer.write() {
                Ok(WriteResult::Serialized(bytes)) => return Poll::Ready(Some(Ok(bytes))),
                Ok(WriteResult::NeedMoreData) => match this.events.as_mut().poll_next(cx) {
                    Poll::Ready(Some(Ok(event))) => this.serializer.append(event),
                    Poll::Ready(Some(Err(err))) => {
                        this.done = true;
                        return Poll::Ready(Some(Err(err)));
                    }
                    Poll::Ready(None) => {
                        // The source ended without a final boundary.
                        this.done = true;
                        return Poll::Ready(Some(Err(Error::UnexpectedEof)));
                    }
                    Poll::Pending => return Poll::Pending,
                },
                Ok(WriteResult::Finished) => {
                    this.done = true;
                    return Poll::Ready(None);
                }
                Err(err) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(err)));
                }
            }
        }
    }
}
