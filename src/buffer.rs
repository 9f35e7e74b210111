use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::stream::{Stream, TryStreamExt};

use crate::error::{BoxError, Error};
use crate::parser::Parser;

/// The chunk-feeding half of the pull-based adapters.
///
/// Polls the backing source only when the parser reports starvation, drains
/// whatever is ready into [`Parser::append`], and signals exhaustion via
/// [`Parser::finish`]. This is the only place parsing ever suspends.
pub(crate) struct StreamFeed {
    stream: Pin<Box<dyn Stream<Item = crate::Result<Bytes>> + Send>>,
    read: u64,
    limit: u64,
    eof: bool,
}

impl StreamFeed {
    pub fn new<S, O, E>(stream: S, limit: u64) -> StreamFeed
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<BoxError> + 'static,
    {
        let stream = stream
            .map_ok(|chunk| chunk.into())
            .map_err(|err| Error::StreamReadFailed(err.into()));

        StreamFeed {
            stream: Box::pin(stream),
            read: 0,
            limit,
            eof: false,
        }
    }

    /// Feeds every chunk the source has ready into the parser.
    ///
    /// Resolves once at least one chunk was fed or the source is exhausted;
    /// pends only when the source has nothing at all.
    pub fn poll_feed(&mut self, cx: &mut Context<'_>, parser: &mut Parser) -> Poll<crate::Result<()>> {
        if self.eof {
            parser.finish();
            return Poll::Ready(Ok(()));
        }

        let mut fed = false;
        loop {
            match self.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    self.read += chunk.len() as u64;
                    if self.read > self.limit {
                        return Poll::Ready(Err(Error::StreamSizeExceeded { limit: self.limit }));
                    }
                    parser.append(&chunk);
                    fed = true;
                }
                Poll::Ready(Some(Err(err))) => return Poll::Ready(Err(err)),
                Poll::Ready(None) => {
                    self.eof = true;
                    parser.finish();
                    return Poll::Ready(Ok(()));
                }
                Poll::Pending => {
                    return if fed { Poll::Ready(Ok(())) } else { Poll::Pending };
                }
            }
        }
    }
}
