//! Seekable, cached, read-only access to remote files over HTTP range
//! requests.
//!
//! [`RemoteFile`] presents a file-like view of an object served by an
//! HTTP(S) endpoint that honors `Range` headers. It is built for consumers
//! that issue many small, seek-heavy reads against large files (HDF5-style
//! container readers): chunks are cached in memory, sequential access grows
//! an adaptive prefetch window, large ranges are fetched in parallel
//! sub-requests, and an optional [`DiskCache`] persists chunks across
//! sessions.
//!
//! ```no_run
//! use std::io::SeekFrom;
//!
//! use rangefile::RemoteFile;
//!
//! # fn main() -> rangefile::Result<()> {
//! let mut file = RemoteFile::open("https://example.com/data.h5")?;
//! file.seek(SeekFrom::Start(1024))?;
//! let header = file.read(512)?;
//! # let _ = header;
//! # Ok(())
//! # }
//! ```

mod cache;
mod disk_cache;
mod dispatch;
mod fetch;
mod file;
mod prefetch;
mod result;

pub use disk_cache::DiskCache;
pub use file::{RemoteFile, RemoteFileBuilder};
pub use result::{Error, Result};
