use serde::{Deserialize, Serialize};

use crate::{ByteRange, RangeNotSatisfiable};

const BYTES_UNIT: &str = "bytes=";

/// How a start-anchored range without an end (`bytes=N-`) is served.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenEnded {
    /// At most one chunk from the requested start.
    #[default]
    Chunked,
    /// Everything from the requested start to the end of the resource.
    Remainder,
}

/// Resolves a raw `Range` header against the size of a resource.
///
/// Only a single `bytes` range is understood. A header with any other unit,
/// or no header at all, resolves to the full resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeResolver {
    default_chunk_size: u64,
    open_ended: OpenEnded,
}

impl Default for RangeResolver {
    fn default() -> Self {
        RangeResolver::new(RangeResolver::DEFAULT_CHUNK_SIZE)
    }
}

impl RangeResolver {
    /// Chunk served for open-ended ranges unless configured otherwise (1 MiB).
    pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

    /// A chunk size of zero is treated as one byte.
    pub fn new(default_chunk_size: u64) -> Self {
        RangeResolver {
            default_chunk_size: default_chunk_size.max(1),
            open_ended: OpenEnded::Chunked,
        }
    }

    pub fn with_open_ended(mut self, open_ended: OpenEnded) -> Self {
        self.open_ended = open_ended;
        self
    }

    pub fn default_chunk_size(&self) -> u64 {
        self.default_chunk_size
    }

    pub fn open_ended(&self) -> OpenEnded {
        self.open_ended
    }

    /// Resolves `raw_header` against a resource of `total_size` bytes.
    ///
    /// Never fails for headers it does not recognize; those yield the full
    /// resource. A recognized `bytes=` header that is malformed or out of
    /// bounds yields [`RangeNotSatisfiable`].
    pub fn resolve(&self, raw_header: Option<&str>, total_size: u64) -> Result<ByteRange, RangeNotSatisfiable> {
        let spec = match raw_header.and_then(|header| header.strip_prefix(BYTES_UNIT)) {
            Some(spec) => spec,
            None => return Ok(ByteRange::full(total_size)),
        };

        let unsatisfiable = || {
            tracing::debug!(header = spec, total_size, "range not satisfiable");
            RangeNotSatisfiable { total_size }
        };

        let (first, second) = match spec.split_once('-') {
            Some((first, second)) => (first, Some(second)),
            None => (spec, None),
        };

        let (start, end) = if first.trim().is_empty() {
            // bytes=-N, the last N bytes
            let suffix_len = second.and_then(parse_position).ok_or_else(unsatisfiable)?;
            if suffix_len == 0 || total_size == 0 {
                return Err(unsatisfiable());
            }
            (total_size.saturating_sub(suffix_len), total_size - 1)
        } else {
            let start = parse_position(first).ok_or_else(unsatisfiable)?;
            if start >= total_size {
                return Err(unsatisfiable());
            }
            let end = match second.filter(|end| !end.trim().is_empty()) {
                Some(end) => parse_position(end).ok_or_else(unsatisfiable)?,
                None => self.open_end(start, total_size),
            };
            (start, end)
        };

        if end >= total_size || start > end {
            return Err(unsatisfiable());
        }

        Ok(ByteRange::partial(start, end))
    }

    fn open_end(&self, start: u64, total_size: u64) -> u64 {
        let last = total_size - 1;
        match self.open_ended {
            OpenEnded::Chunked => start.saturating_add(self.default_chunk_size - 1).min(last),
            OpenEnded::Remainder => last,
        }
    }
}

fn parse_position(value: &str) -> Option<u64> {
    value.parse::<u64>().ok()
}
