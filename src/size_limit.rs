use crate::constants;

/// Size limits applied while collating parts, to keep adversarial or
/// corrupt streams from growing memory without bound.
///
/// Both limits default to `u64::MAX`.
///
/// # Examples
///
/// ```
/// use partwise::SizeLimit;
///
/// let limit = SizeLimit::new()
///     .whole_stream(64 * 1024 * 1024)
///     .per_part(2 * 1024 * 1024);
/// # let _ = limit;
/// ```
#[derive(Debug, Clone)]
pub struct SizeLimit {
    pub(crate) whole_stream: u64,
    pub(crate) per_part: u64,
}

impl SizeLimit {
    pub fn new() -> SizeLimit {
        SizeLimit::default()
    }

    /// Caps the total number of bytes read from the backing stream;
    /// exceeding it fails with
    /// [`Error::StreamSizeExceeded`](crate::Error::StreamSizeExceeded).
    pub fn whole_stream(mut self, limit: u64) -> SizeLimit {
        self.whole_stream = limit;
        self
    }

    /// Caps the accumulated body size of a single part; exceeding it fails
    /// with [`Error::InvalidBody`](crate::Error::InvalidBody).
    pub fn per_part(mut self, limit: u64) -> SizeLimit {
        self.per_part = limit;
        self
    }
}

impl Default for SizeLimit {
    fn default() -> Self {
        SizeLimit {
            whole_stream: constants::DEFAULT_WHOLE_STREAM_SIZE_LIMIT,
            per_part: constants::DEFAULT_PER_PART_SIZE_LIMIT,
        }
    }
}
