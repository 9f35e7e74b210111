use std::borrow::Cow;

use bytes::{Bytes, BytesMut};
use encoding_rs::{Encoding, UTF_8};
#[cfg(feature = "json")]
use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::event::StructuralEvent;
use crate::headers::HeaderFields;

/// One fully-materialized part of a multipart message: its header fields
/// and its body bytes.
///
/// A `Part` is an independent value; it holds no reference into the stream
/// it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    header_fields: HeaderFields,
    body: Bytes,
}

impl Part {
    pub fn new<B: Into<Bytes>>(header_fields: HeaderFields, body: B) -> Part {
        Part {
            header_fields,
            body: body.into(),
        }
    }

    pub fn headers(&self) -> &HeaderFields {
        &self.header_fields
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// The part's `Content-Type` header parsed as a mime type, if present
    /// and well-formed.
    pub fn content_type(&self) -> Option<mime::Mime> {
        self.header_fields
            .get("content-type")
            .and_then(|value| value.parse::<mime::Mime>().ok())
    }

    /// Decodes the body as text, honoring the `charset` parameter of the
    /// part's `Content-Type` and defaulting to UTF-8.
    pub fn text(&self) -> String {
        self.text_with_charset("utf-8")
    }

    /// Decodes the body as text with the given default charset, used when
    /// the part does not name one.
    pub fn text_with_charset(&self, default_encoding: &str) -> String {
        let content_type = self.content_type();
        let encoding_name = content_type
            .as_ref()
            .and_then(|mime| mime.get_param(mime::CHARSET))
            .map(|charset| charset.as_str())
            .unwrap_or(default_encoding);

        let encoding = Encoding::for_label(encoding_name.as_bytes()).unwrap_or(UTF_8);

        let (text, _, _) = encoding.decode(&self.body);

        match text {
            Cow::Owned(s) => s,
            Cow::Borrowed(s) => String::from(s),
        }
    }

    /// Decodes the body as JSON.
    ///
    /// # Optional
    ///
    /// This requires the optional `json` feature to be enabled.
    #[cfg(feature = "json")]
    #[cfg_attr(nightly, doc(cfg(feature = "json")))]
    pub fn json<T: DeserializeOwned>(&self) -> crate::Result<T> {
        serde_json::from_slice(&self.body).map_err(Error::DecodeJson)
    }
}

/// Folds a structural-event stream into [`Part`] values.
///
/// Header fields and body chunks accumulate until the next boundary event
/// closes the part. The accumulated body is capped: growing past the limit
/// fails with [`Error::InvalidBody`] and yields nothing, so a corrupt or
/// adversarial stream cannot grow memory without bound.
#[derive(Debug)]
pub(crate) struct PartAccumulator {
    header_fields: HeaderFields,
    body: BytesMut,
    body_limit: u64,
    in_part: bool,
}

impl PartAccumulator {
    pub fn new(body_limit: u64) -> PartAccumulator {
        PartAccumulator {
            header_fields: HeaderFields::new(),
            body: BytesMut::new(),
            body_limit,
            in_part: false,
        }
    }

    /// Feeds one event; returns the completed part on a boundary crossing.
    pub fn push(&mut self, event: StructuralEvent) -> crate::Result<Option<Part>> {
        match event {
            StructuralEvent::Boundary { is_final } => {
                let part = if self.in_part {
                    Some(Part::new(
                        std::mem::take(&mut self.header_fields),
                        self.body.split().freeze(),
                    ))
                } else {
                    None
                };
                self.in_part = !is_final;
                Ok(part)
            }
            StructuralEvent::HeaderField { name, value } => {
                debug_assert!(self.in_part, "header field outside a part");
                self.header_fields.append(name, value);
                Ok(None)
            }
            StructuralEvent::BodyChunk(bytes) => {
                debug_assert!(self.in_part, "body chunk outside a part");
                if self.body.len() as u64 + bytes.len() as u64 > self.body_limit {
                    return Err(Error::InvalidBody {
                        limit: self.body_limit,
                    });
                }
                self.body.extend_from_slice(&bytes);
                Ok(None)
            }
        }
    }
}
