use bytes::{Bytes, BytesMut};
use futures::future;
use tracing::debug;

use crate::fetch::RangeFetcher;
use crate::Result;

/// Fetches a contiguous byte range, splitting it across parallel sub-range
/// requests when it is large enough to be worth it.
pub(crate) struct RangeDispatcher {
    fetcher: RangeFetcher,
    bytes_per_thread: u64,
    max_threads: usize,
}

impl RangeDispatcher {
    pub(crate) fn new(fetcher: RangeFetcher, bytes_per_thread: u64, max_threads: usize) -> Self {
        Self {
            fetcher,
            bytes_per_thread: bytes_per_thread.max(1),
            max_threads: max_threads.max(1),
        }
    }

    /// Fetch bytes `[start, end]` (inclusive), reassembled in byte order.
    pub(crate) async fn fetch_range(&self, start: u64, end: u64) -> Result<Bytes> {
        let total = end - start + 1;
        if total < 2 * self.bytes_per_thread {
            return self.fetcher.fetch(start, end).await;
        }

        let parts = partition(start, end, self.bytes_per_thread, self.max_threads);
        debug!(bytes = total, parts = parts.len(), "splitting range fetch");

        let pieces = future::try_join_all(
            parts
                .iter()
                .map(|&(sub_start, sub_end)| self.fetcher.fetch(sub_start, sub_end)),
        )
        .await?;

        let mut buf = BytesMut::with_capacity(total as usize);
        for piece in pieces {
            buf.extend_from_slice(&piece);
        }
        Ok(buf.freeze())
    }
}

/// Split `[start, end]` into `min(total / bytes_per_thread, max_threads)`
/// contiguous sub-ranges of equal length, remainder on the last one.
fn partition(start: u64, end: u64, bytes_per_thread: u64, max_threads: usize) -> Vec<(u64, u64)> {
    let total = end - start + 1;
    let count = ((total / bytes_per_thread) as usize).clamp(1, max_threads);
    let share = total / count as u64;

    let mut parts = Vec::with_capacity(count);
    let mut sub_start = start;
    for i in 0..count {
        let sub_end = if i == count - 1 {
            end
        } else {
            sub_start + share - 1
        };
        parts.push((sub_start, sub_end));
        sub_start = sub_end + 1;
    }
    parts
}
