//! Byte-offset cursor over a single growing or rotating log file.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::fingerprint::{Fingerprint, fingerprint_file};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Result of one [`FileCursor::advance`] call.
#[derive(Debug, Default)]
pub struct Advance {
    /// Newly observed text. After a rotation this is the entire current
    /// content of the replacement file.
    pub text: String,
    /// Whether the file shrank since the last call (replaced or truncated).
    pub rotated: bool,
}

/// Tracks a read position plus a content fingerprint for one file.
///
/// The offset never exceeds the current file size: a size smaller than the
/// remembered offset means the file was rotated or truncated, and the cursor
/// restarts from the beginning of the new content.
#[derive(Debug)]
pub struct FileCursor {
    path: PathBuf,
    offset: u64,
    fingerprint: Fingerprint,
}

impl FileCursor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            fingerprint: Fingerprint::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current read position in bytes.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Fingerprint of the content as of the last non-empty read.
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Reads everything appended since the last call.
    ///
    /// A missing file yields an empty, non-rotated result so the caller can
    /// keep polling. If the file shrank, the offset resets and the entire
    /// current content is returned with `rotated = true`. Content is decoded
    /// as UTF-8 with a leading BOM stripped and malformed sequences replaced;
    /// decoding never fails.
    pub fn advance(&mut self) -> io::Result<Advance> {
        let size = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Advance::default()),
            Err(e) => return Err(e),
        };

        let rotated = size < self.offset;
        if rotated {
            self.offset = 0;
        }

        if size == self.offset {
            return Ok(Advance {
                text: String::new(),
                rotated,
            });
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.offset))?;
        let mut bytes = Vec::with_capacity((size - self.offset) as usize);
        file.read_to_end(&mut bytes)?;

        let from_start = self.offset == 0;
        // Advance by what was actually consumed, not the size observed above;
        // the file may have grown between the stat and the read.
        self.offset += bytes.len() as u64;

        let content = if from_start && bytes.starts_with(UTF8_BOM) {
            &bytes[UTF8_BOM.len()..]
        } else {
            &bytes[..]
        };
        let text = String::from_utf8_lossy(content).into_owned();

        if !bytes.is_empty()
            && let Ok(fp) = fingerprint_file(&self.path)
        {
            self.fingerprint = fp;
        }

        Ok(Advance { text, rotated })
    }
}
