use bytes::Bytes;

/// A structural event: the atomic unit exchanged between the [`Parser`],
/// the [`Serializer`] and their consumers.
///
/// Events for a single part always appear in the order
/// `Boundary` → `HeaderField`* → `BodyChunk`*, with the part terminated by
/// the next `Boundary` event (or end of stream after the final boundary).
/// A `BodyChunk` never contains bytes that could still turn out to belong to
/// a boundary marker.
///
/// [`Parser`]: crate::Parser
/// [`Serializer`]: crate::Serializer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralEvent {
    /// A boundary line was crossed. `is_final` marks the terminating
    /// `--boundary--` form.
    Boundary { is_final: bool },

    /// One complete header field belonging to the current part.
    HeaderField { name: String, value: String },

    /// A contiguous run of body bytes.
    BodyChunk(Bytes),
}
