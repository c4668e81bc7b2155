//! Bounded content fingerprinting.
//!
//! Hashes only the first and last [`FINGERPRINT_WINDOW`] bytes of a file so
//! fingerprinting stays cheap on multi-gigabyte logs. Equal fingerprints are
//! treated as "unchanged" for shipping purposes; this is a probabilistic
//! shortcut for change detection, not an integrity check.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use sha2::{Digest, Sha256};

/// 128-bit content fingerprint (truncated SHA-256).
pub type Fingerprint = [u8; 16];

/// Bytes hashed from each end of the file.
pub const FINGERPRINT_WINDOW: u64 = 64 * 1024;

/// Fingerprints a byte slice (used when the content is already in memory).
pub fn fingerprint_bytes(data: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    if data.len() as u64 <= FINGERPRINT_WINDOW {
        hasher.update(data);
    } else {
        let window = FINGERPRINT_WINDOW as usize;
        hasher.update(&data[..window]);
        hasher.update(&data[data.len() - window..]);
    }
    truncate(hasher)
}

/// Fingerprints a file by reading at most two windows from disk.
///
/// Files no larger than one window are hashed whole.
pub fn fingerprint_file(path: &Path) -> io::Result<Fingerprint> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let mut hasher = Sha256::new();

    if len <= FINGERPRINT_WINDOW {
        let mut buf = Vec::with_capacity(len as usize);
        file.read_to_end(&mut buf)?;
        hasher.update(&buf);
    } else {
        let mut head = vec![0u8; FINGERPRINT_WINDOW as usize];
        file.read_exact(&mut head)?;
        hasher.update(&head);

        file.seek(SeekFrom::End(-(FINGERPRINT_WINDOW as i64)))?;
        let mut tail = vec![0u8; FINGERPRINT_WINDOW as usize];
        file.read_exact(&mut tail)?;
        hasher.update(&tail);
    }

    Ok(truncate(hasher))
}

fn truncate(hasher: Sha256) -> Fingerprint {
    let digest = hasher.finalize();
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[..16]);
    out
}
