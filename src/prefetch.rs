/// Detects sequential chunk access and sizes the next prefetch accordingly.
///
/// The state is deliberately tiny: the index of the last chunk supplied and
/// the number of chunks to fetch on the next miss. Container readers produce
/// monotone runs punctuated by seeks, so a single frontier counter captures
/// the pattern.
pub(crate) struct Prefetcher {
    /// Last chunk index supplied, either by a fetch or a cache hit.
    frontier: Option<u64>,
    /// Chunks to request on the next miss.
    window: u64,
    increment_factor: f64,
    max_window: u64,
}

impl Prefetcher {
    pub(crate) fn new(increment_factor: f64, max_window: u64) -> Self {
        Self {
            frontier: None,
            window: 1,
            increment_factor,
            max_window: max_window.max(1),
        }
    }

    /// A chunk was served from cache. Keeps the frontier current so that a
    /// run of hits followed by a miss still counts as sequential.
    pub(crate) fn record_hit(&mut self, index: u64) {
        self.frontier = Some(index);
    }

    /// Size the window for a miss at `index`.
    ///
    /// A miss immediately past the frontier grows the window by the
    /// increment factor (capped at `max_window`); any other miss resets it
    /// to one chunk. The window is then truncated at the first chunk
    /// `is_cached` reports, so a prefetch never overlaps cached data.
    pub(crate) fn next_window(&mut self, index: u64, is_cached: impl Fn(u64) -> bool) -> u64 {
        if self.frontier.map(|f| f + 1) == Some(index) {
            let grown = (self.window as f64 * self.increment_factor + 0.5).ceil() as u64;
            self.window = grown.min(self.max_window);
        } else {
            self.window = 1;
        }
        for j in 1..self.window {
            if is_cached(index + j) {
                self.window = j;
                break;
            }
        }
        self.window
    }

    /// A fetch of `count` chunks starting at `index` completed.
    pub(crate) fn record_fetch(&mut self, index: u64, count: u64) {
        self.frontier = Some(index + count - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::Prefetcher;

    const NEVER_CACHED: fn(u64) -> bool = |_| false;

    #[test]
    fn cold_start_is_a_single_chunk() {
        let mut p = Prefetcher::new(1.7, 1024);
        assert_eq!(p.next_window(0, NEVER_CACHED), 1);
    }

    #[test]
    fn sequential_misses_grow_geometrically() {
        let mut p = Prefetcher::new(1.7, 1024);
        let mut index = 0;
        let mut windows = Vec::new();
        for _ in 0..5 {
            let w = p.next_window(index, NEVER_CACHED);
            p.record_fetch(index, w);
            windows.push(w);
            index += w;
        }
        // ceil(1*1.7 + 0.5) = 3, ceil(3*1.7 + 0.5) = 6, ...
        assert_eq!(windows, vec![1, 3, 6, 11, 20]);
    }

    #[test]
    fn growth_is_capped_at_max_window() {
        let mut p = Prefetcher::new(1.7, 8);
        let mut index = 0;
        for _ in 0..6 {
            let w = p.next_window(index, NEVER_CACHED);
            assert!(w <= 8);
            p.record_fetch(index, w);
            index += w;
        }
        assert_eq!(p.next_window(index, NEVER_CACHED), 8);
    }

    #[test]
    fn non_sequential_miss_resets_the_window() {
        let mut p = Prefetcher::new(1.7, 1024);
        p.next_window(0, NEVER_CACHED);
        p.record_fetch(0, 1);
        let w = p.next_window(1, NEVER_CACHED);
        p.record_fetch(1, w);
        assert_eq!(w, 3);

        assert_eq!(p.next_window(50, NEVER_CACHED), 1);
    }

    #[test]
    fn hits_keep_the_run_sequential() {
        let mut p = Prefetcher::new(1.7, 1024);
        p.next_window(0, NEVER_CACHED);
        p.record_fetch(0, 1);
        // chunks 1..=3 come out of the cache
        for i in 1..=3 {
            p.record_hit(i);
        }
        // the miss at 4 follows the hit run, so the window still grows
        assert_eq!(p.next_window(4, NEVER_CACHED), 3);
    }

    #[test]
    fn window_truncates_before_cached_chunks() {
        let mut p = Prefetcher::new(1.7, 1024);
        p.next_window(0, NEVER_CACHED);
        p.record_fetch(0, 1);
        // would grow to 3, but chunk 3 is already cached
        assert_eq!(p.next_window(1, |i| i == 3), 2);
    }
}
