use std::io;
use std::io::SeekFrom;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::ChunkCache;
use crate::disk_cache::DiskCache;
use crate::dispatch::RangeDispatcher;
use crate::fetch::{self, RangeFetcher};
use crate::prefetch::Prefetcher;
use crate::{Error, Result};

const DEFAULT_MIN_CHUNK_SIZE: u64 = 100 * 1024;
const DEFAULT_MAX_CACHE_SIZE: u64 = 100_000_000;
const DEFAULT_CHUNK_INCREMENT_FACTOR: f64 = 1.7;
const DEFAULT_BYTES_PER_THREAD: u64 = 4 << 20; // 4 MiB
const DEFAULT_MAX_THREADS: usize = 3;
const DEFAULT_MAX_CHUNK_SIZE: u64 = 100 << 20; // 100 MiB

pub struct RemoteFileBuilder {
    url: String,
    user_agent: String,
    verbose: bool,
    disk_cache: Option<Arc<DiskCache>>,
    min_chunk_size: u64,
    max_cache_size: u64,
    chunk_increment_factor: f64,
    bytes_per_thread: u64,
    max_threads: usize,
    max_chunk_size: u64,
    impose_request_failures_for_testing: bool,
}

impl RemoteFileBuilder {
    pub fn new<U: Into<String>>(url: U) -> Self {
        Self {
            url: url.into(),
            user_agent: format!("{}/{}", env!("CARGO_CRATE_NAME"), env!("CARGO_PKG_VERSION")),
            verbose: false,
            disk_cache: None,
            min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            chunk_increment_factor: DEFAULT_CHUNK_INCREMENT_FACTOR,
            bytes_per_thread: DEFAULT_BYTES_PER_THREAD,
            max_threads: DEFAULT_MAX_THREADS,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            impose_request_failures_for_testing: false,
        }
    }

    pub fn user_agent<T: Into<String>>(mut self, user_agent: T) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Log prefetch decisions at `info` level instead of `debug`.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Persistent chunk store consulted before the network. May be shared by
    /// several streams.
    pub fn disk_cache(mut self, disk_cache: Arc<DiskCache>) -> Self {
        self.disk_cache = Some(disk_cache);
        self
    }

    /// Unit of caching and the granularity of range requests.
    pub fn min_chunk_size(mut self, min_chunk_size: u64) -> Self {
        self.min_chunk_size = min_chunk_size;
        self
    }

    /// Bound on in-memory cache bytes; the cache holds up to
    /// `max_cache_size / min_chunk_size` chunks.
    pub fn max_cache_size(mut self, max_cache_size: u64) -> Self {
        self.max_cache_size = max_cache_size;
        self
    }

    /// Growth factor for the prefetch window on sequential access.
    pub fn chunk_increment_factor(mut self, chunk_increment_factor: f64) -> Self {
        self.chunk_increment_factor = chunk_increment_factor;
        self
    }

    /// Threshold below which a range is fetched in a single request.
    pub fn bytes_per_thread(mut self, bytes_per_thread: u64) -> Self {
        self.bytes_per_thread = bytes_per_thread;
        self
    }

    /// Upper bound on parallel sub-range requests per fetch.
    pub fn max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Upper bound on the byte size of one prefetched range.
    pub fn max_chunk_size(mut self, max_chunk_size: u64) -> Self {
        self.max_chunk_size = max_chunk_size;
        self
    }

    /// Make the first attempt of every range request fail, exercising the
    /// retry path.
    pub fn impose_request_failures_for_testing(mut self, impose: bool) -> Self {
        self.impose_request_failures_for_testing = impose;
        self
    }

    /// Probe the remote object with a HEAD request and return the opened
    /// stream.
    pub fn open(self) -> Result<RemoteFile> {
        let url = Url::parse(&self.url)?;
        let client = fetch::build_client(&self.user_agent)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let fetcher = RangeFetcher::new(
            client,
            url.clone(),
            self.impose_request_failures_for_testing,
        );
        let length = runtime.block_on(fetcher.head())?;
        debug!(url = %url, length, "opened remote file");

        let min_chunk_size = self.min_chunk_size.max(1);
        let capacity = (self.max_cache_size / min_chunk_size) as usize;
        let max_window = self.max_chunk_size / min_chunk_size;

        Ok(RemoteFile {
            dispatcher: RangeDispatcher::new(fetcher, self.bytes_per_thread, self.max_threads),
            runtime,
            url,
            length,
            position: 0,
            min_chunk_size,
            cache: ChunkCache::new(capacity),
            prefetcher: Prefetcher::new(self.chunk_increment_factor, max_window),
            disk_cache: self.disk_cache,
            verbose: self.verbose,
        })
    }
}

/// A seekable, read-only view of a remote file served over HTTP(S) with
/// byte-range support.
///
/// Reads are satisfied from an in-memory chunk cache (and optionally a
/// persistent [`DiskCache`]); misses are fetched with adaptively sized range
/// requests, split across parallel sub-requests when large. The handle is
/// blocking and single-caller; it also implements [`std::io::Read`] and
/// [`std::io::Seek`] for consumers that expect a file-like object.
pub struct RemoteFile {
    runtime: tokio::runtime::Runtime,
    dispatcher: RangeDispatcher,
    url: Url,
    length: u64,
    position: u64,
    min_chunk_size: u64,
    cache: ChunkCache,
    prefetcher: Prefetcher,
    disk_cache: Option<Arc<DiskCache>>,
    verbose: bool,
}

impl RemoteFile {
    /// Open `url` with default options.
    pub fn open<U: Into<String>>(url: U) -> Result<Self> {
        Self::builder(url).open()
    }

    pub fn builder<U: Into<String>>(url: U) -> RemoteFileBuilder {
        RemoteFileBuilder::new(url)
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Total length of the remote object in bytes, as reported at open time.
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Current read position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Number of chunks currently held in the in-memory cache.
    pub fn cached_chunk_count(&self) -> usize {
        self.cache.len()
    }

    /// Read exactly `size` bytes from the current position.
    ///
    /// The whole range `[position, position + size)` must lie within the
    /// file; reads extending past the end fail with
    /// [`Error::ReadBeyondEnd`] without fetching anything. The position
    /// advances only on success.
    pub fn read(&mut self, size: u64) -> Result<Bytes> {
        if size == 0 {
            return Err(Error::ZeroSizeRead);
        }
        let end_pos = self
            .position
            .checked_add(size)
            .filter(|&end| end <= self.length)
            .ok_or(Error::ReadBeyondEnd {
                position: self.position,
                size,
                length: self.length,
            })?;

        let first = self.position / self.min_chunk_size;
        let last = (end_pos - 1) / self.min_chunk_size;
        for index in first..=last {
            self.ensure_chunk(index)?;
        }

        let output = self.assemble(first, last, size as usize);
        self.position = end_pos;

        let evicted = self.cache.evict();
        if evicted > 0 {
            debug!(evicted, cached = self.cache.len(), "evicted oldest chunks");
        }
        Ok(output)
    }

    /// Move the read position. Seeking past the end is allowed; reads there
    /// fail. Seeking before byte 0 is an error and leaves the position
    /// unchanged.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let (base, offset) = match pos {
            SeekFrom::Start(offset) => {
                self.position = offset;
                return Ok(offset);
            }
            SeekFrom::End(offset) => (self.length, offset),
            SeekFrom::Current(offset) => (self.position, offset),
        };
        let new_pos = if offset >= 0 {
            base.checked_add(offset as u64)
        } else {
            base.checked_sub(offset.unsigned_abs())
        };
        match new_pos {
            Some(position) => {
                self.position = position;
                Ok(position)
            }
            None => Err(Error::SeekOutOfRange { base, offset }),
        }
    }

    /// Release in-memory resources. The persistent store, if any, is left
    /// untouched. Dropping the handle has the same effect.
    pub fn close(self) {}

    /// Make chunk `index` resident in the in-memory cache.
    fn ensure_chunk(&mut self, index: u64) -> Result<()> {
        if self.cache.contains(index) {
            self.prefetcher.record_hit(index);
            return Ok(());
        }

        if let Some(disk) = &self.disk_cache {
            let key = disk_cache_key(&self.url, self.min_chunk_size, index);
            match disk.get(&key) {
                Ok(Some(bytes)) => {
                    self.cache.insert(index, Bytes::from(bytes));
                    self.prefetcher.record_hit(index);
                    return Ok(());
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(chunk = index, error = %err, "disk cache read failed, fetching from remote");
                }
            }
        }

        let total_chunks = (self.length + self.min_chunk_size - 1) / self.min_chunk_size;
        let cache = &self.cache;
        let window = self
            .prefetcher
            .next_window(index, |i| cache.contains(i))
            .min(total_chunks - index);

        let start = index * self.min_chunk_size;
        let end = (start + self.min_chunk_size * window).min(self.length) - 1;
        if self.verbose {
            info!(first_chunk = index, chunks = window, bytes = end - start + 1, "loading chunks");
        } else {
            debug!(first_chunk = index, chunks = window, bytes = end - start + 1, "loading chunks");
        }

        let fetched = self.runtime.block_on(self.dispatcher.fetch_range(start, end))?;
        for i in 0..window {
            let lo = (i * self.min_chunk_size) as usize;
            let hi = (((i + 1) * self.min_chunk_size) as usize).min(fetched.len());
            let chunk = fetched.slice(lo..hi);
            if let Some(disk) = &self.disk_cache {
                let key = disk_cache_key(&self.url, self.min_chunk_size, index + i);
                if let Err(err) = disk.put(&key, &chunk) {
                    warn!(chunk = index + i, error = %err, "disk cache write failed");
                }
            }
            self.cache.insert(index + i, chunk);
        }
        self.prefetcher.record_fetch(index, window);
        Ok(())
    }

    /// Concatenate `size` bytes starting at the current position out of the
    /// cached chunks `first..=last`.
    fn assemble(&self, first: u64, last: u64, size: usize) -> Bytes {
        let offset = (self.position % self.min_chunk_size) as usize;
        let first_chunk = self.chunk(first);
        if first == last {
            return first_chunk.slice(offset..offset + size);
        }

        let mut buf = BytesMut::with_capacity(size);
        buf.extend_from_slice(&first_chunk[offset..]);
        for index in first + 1..last {
            buf.extend_from_slice(self.chunk(index));
        }
        let rest = size - buf.len();
        buf.extend_from_slice(&self.chunk(last)[..rest]);
        buf.freeze()
    }

    fn chunk(&self, index: u64) -> &Bytes {
        self.cache
            .get(index)
            .expect("chunk absent from cache after load")
    }
}

impl io::Read for RemoteFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.length.saturating_sub(self.position);
        let wanted = (buf.len() as u64).min(remaining);
        if wanted == 0 {
            return Ok(0);
        }
        let bytes = RemoteFile::read(self, wanted)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }
}

impl io::Seek for RemoteFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        RemoteFile::seek(self, pos).map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))
    }
}

fn disk_cache_key(url: &Url, min_chunk_size: u64, chunk_index: u64) -> String {
    format!("{url}|{min_chunk_size}|{chunk_index}")
}
