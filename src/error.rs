use std::fmt::{self, Debug, Display, Formatter};

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A set of errors that can occur while parsing or serializing a multipart
/// stream and in other operations.
///
/// Every variant is terminal for the operation in progress: the parser or
/// serializer that produced it must be discarded, there is no automatic
/// retry.
#[non_exhaustive]
pub enum Error {
    /// The boundary is empty or contains bytes that can never appear in a
    /// boundary line (CR or LF).
    InvalidBoundary,

    /// A header field was malformed: an illegal header-name byte, a CR not
    /// followed by LF, or a header value that is not valid UTF-8.
    InvalidHeader { reason: &'static str },

    /// A collated part body exceeded the configured size limit.
    InvalidBody { limit: u64 },

    /// The backing source was exhausted while still inside headers or a
    /// body, before the final boundary was reached.
    UnexpectedEof,

    /// The incoming stream size exceeded the maximum limit.
    StreamSizeExceeded { limit: u64 },

    /// The backing chunk or event source itself failed.
    StreamReadFailed(BoxError),

    /// Failed to convert a raw header name to [`http::header::HeaderName`].
    DecodeHeaderName { name: String, cause: BoxError },

    /// Failed to convert a raw header value to a string.
    DecodeHeaderValue { value: Vec<u8>, cause: BoxError },

    /// The `Content-Type` header is not `multipart/form-data`.
    NoMultipart,

    /// Failed to parse the `Content-Type` header as a [`mime::Mime`] value.
    DecodeContentType(mime::FromStrError),

    /// No boundary parameter found in the `Content-Type` header.
    NoBoundary,

    /// Failed to decode a part body as JSON in [`json()`](crate::Part::json).
    #[cfg(feature = "json")]
    #[cfg_attr(nightly, doc(cfg(feature = "json")))]
    DecodeJson(serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_header(reason: &'static str) -> Error {
        Error::InvalidHeader { reason }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidBoundary => write!(f, "invalid boundary"),
            Error::InvalidHeader { reason } => write!(f, "invalid header: {}", reason),
            Error::InvalidBody { limit } => {
                write!(f, "part body exceeded the maximum size limit: {} bytes", limit)
            }
            Error::UnexpectedEof => write!(f, "unexpected end of multipart stream"),
            Error::StreamSizeExceeded { limit } => {
                write!(f, "stream size exceeded the maximum limit: {} bytes", limit)
            }
            Error::StreamReadFailed(err) => write!(f, "stream read failed: {}", err),
            Error::DecodeHeaderName { name, cause } => {
                write!(f, "failed to decode header name {:?}: {}", name, cause)
            }
            Error::DecodeHeaderValue { cause, .. } => {
                write!(f, "failed to decode header value: {}", cause)
            }
            Error::NoMultipart => write!(f, "Content-Type is not multipart/form-data"),
            Error::DecodeContentType(err) => {
                write!(f, "failed to parse Content-Type as a mime type: {}", err)
            }
            Error::NoBoundary => write!(f, "multipart boundary not found in Content-Type"),
            #[cfg(feature = "json")]
            Error::DecodeJson(err) => write!(f, "failed to decode part body as JSON: {}", err),
        }
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl std::error::Error for Error {}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string().eq(&other.to_string())
    }
}

impl Eq for Error {}
