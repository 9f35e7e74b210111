use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::stream::{Stream, TryStreamExt};
#[cfg(feature = "tokio-io")]
use tokio::io::AsyncRead;
#[cfg(feature = "tokio-io")]
use tokio_util::io::ReaderStream;

use crate::buffer::StreamFeed;
use crate::error::BoxError;
use crate::parser::{Parser, ReadResult};
use crate::part::{Part, PartAccumulator};
use crate::size_limit::SizeLimit;

/// The collating adapter over a `multipart`-encoded chunk stream.
///
/// Drives the streaming [`Parser`](crate::Parser) from any chunk source and
/// reassembles the structural events into complete [`Part`] values, under
/// the caps configured by [`SizeLimit`]. The source may deliver the message
/// split at any byte position — a boundary, header or body byte divided
/// across chunks parses identically to the whole buffer.
///
/// `Multipart` is a single-consumer stream; the parser instance is
/// exclusively owned by it.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use futures_util::stream::once;
/// use partwise::Multipart;
/// use std::convert::Infallible;
///
/// # async fn run() -> partwise::Result<()> {
/// let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"my_text_field\"\r\n\r\nabcd\r\n--X-BOUNDARY--\r\n";
/// let stream = once(async move { Result::<Bytes, Infallible>::Ok(Bytes::from(data)) });
/// let mut multipart = Multipart::new(stream, "X-BOUNDARY")?;
///
/// while let Some(part) = multipart.next_part().await? {
///     println!("part body: {:?}", part.text());
/// }
/// # Ok(())
/// # }
/// # tokio::runtime::Runtime::new().unwrap().block_on(run()).unwrap();
/// ```
pub struct Multipart {
    parser: Parser,
    feed: StreamFeed,
    accumulator: PartAccumulator,
    parts_yielded: usize,
    done: bool,
}

impl Multipart {
    /// Constructs a `Multipart` over the given chunk stream and boundary,
    /// with default (unbounded) size limits.
    pub fn new<S, O, E, B>(stream: S, boundary: B) -> crate::Result<Multipart>
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<BoxError> + 'static,
        B: AsRef<str>,
    {
        Multipart::with_size_limit(stream, boundary, SizeLimit::default())
    }

    /// Constructs a `Multipart` with explicit size limits.
    pub fn with_size_limit<S, O, E, B>(
        stream: S,
        boundary: B,
        limit: SizeLimit,
    ) -> crate::Result<Multipart>
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<BoxError> + 'static,
        B: AsRef<str>,
    {
        Ok(Multipart {
            parser: Parser::new(boundary)?,
            feed: StreamFeed::new(stream, limit.whole_stream),
            accumulator: PartAccumulator::new(limit.per_part),
            parts_yielded: 0,
            done: false,
        })
    }

    /// Constructs a `Multipart` over an [`AsyncRead`] reader.
    ///
    /// # Optional
    ///
    /// This requires the optional `tokio-io` feature to be enabled.
    #[cfg(feature = "tokio-io")]
    #[cfg_attr(nightly, doc(cfg(feature = "tokio-io")))]
    pub fn with_reader<R, B>(reader: R, boundary: B) -> crate::Result<Multipart>
    where
        R: AsyncRead + Send + 'static,
        B: AsRef<str>,
    {
        Multipart::new(ReaderStream::new(reader), boundary)
    }

    /// Constructs a `Multipart` over an [`AsyncRead`] reader with explicit
    /// size limits.
    ///
    /// # Optional
    ///
    /// This requires the optional `tokio-io` feature to be enabled.
    #[cfg(feature = "tokio-io")]
    #[cfg_attr(nightly, doc(cfg(feature = "tokio-io")))]
    pub fn with_reader_with_size_limit<R, B>(
        reader: R,
        boundary: B,
        limit: SizeLimit,
    ) -> crate::Result<Multipart>
    where
        R: AsyncRead + Send + 'static,
        B: AsRef<str>,
    {
        Multipart::with_size_limit(ReaderStream::new(reader), boundary, limit)
    }

    /// Yields the next [`Part`] if available.
    pub async fn next_part(&mut self) -> crate::Result<Option<Part>> {
        self.try_next().await
    }

    /// Yields the next [`Part`] together with its positional index.
    pub async fn next_part_with_idx(&mut self) -> crate::Result<Option<(usize, Part)>> {
        let part = self.next_part().await?;
        Ok(part.map(|part| (self.parts_yielded - 1, part)))
    }
}

impl Stream for Multipart {
    type Item = crate::Result<Part>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.done {
            return Poll::Ready(None);
        }

        loop {
            match this.parser.read() {
                Ok(ReadResult::Event(event)) => match this.accumulator.push(event) {
                    Ok(Some(part)) => {
                        this.parts_yielded += 1;
                        return Poll::Ready(Some(Ok(part)));
                    }
                    Ok(None) => {}
                    Err(err) => {
                        this.done = true;
                        return Poll::Ready(Some(Err(err)));
                    }
                },
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
