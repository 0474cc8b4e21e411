use std::fs;
use std::io::Write as _;
use std::path::PathBuf;

use sha1::{Digest, Sha1};
use tempfile::NamedTempFile;

use crate::Result;

/// A content-addressed on-disk chunk store.
///
/// Keys are opaque strings; values land at
/// `<root>/<h0h1>/<h2h3>/<h4h5>/<hex-sha1-of-key>` so no single directory
/// grows beyond a few thousand entries. Writes go to a temporary file first
/// and are renamed into place, so a store shared by several streams or
/// processes never exposes partial values: a key is either absent or holds
/// complete bytes.
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Look up the bytes stored for `key`, if any.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Store `bytes` under `key`. Writing the same key twice is harmless.
    pub fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(bytes)?;
        file.persist(&path).map_err(|err| err.error)?;
        Ok(())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha1::digest(key.as_bytes()));
        self.root
            .join(&digest[0..2])
            .join(&digest[2..4])
            .join(&digest[4..6])
            .join(&digest)
    }
}
