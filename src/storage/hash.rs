//! Content hashing for change-aware writes.
//!
//! The store hashes the encoded bytes of a record and compares the digest
//! against the file already on disk, so re-saving an unchanged record never
//! touches the filesystem. The file on disk is hashed in chunks rather than
//! read whole.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

const CHUNK_SIZE: usize = 8 * 1024;

/// Compute a SHA256 hash of encoded record bytes.
///
/// # Example
///
/// ```ignore
/// let hash = content_hash(b"{\"itemid\": 1}\n");
/// // hash is something like "a1b2c3d4..."
/// ```
#[must_use]
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// SHA256 hash of a file's content, `None` if the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn file_hash(path: &Path) -> io::Result<Option<String>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(Some(format!("{:x}", hasher.finalize())))
}
