//! Whole-file change snapshots for the periodic shipper.
//!
//! Unlike [`FileCursor`](crate::FileCursor), which tracks a byte offset for
//! near-real-time tailing, this detector re-scans the file on every call. The
//! shipper polls on a cadence of minutes, so the full scan is affordable and
//! sidesteps offset bookkeeping across rotations.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::fingerprint::{Fingerprint, fingerprint_bytes};

const UTF8_BOM: char = '\u{FEFF}';

/// Last observed state of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSnapshot {
    pub line_count: u64,
    pub last_hash: Fingerprint,
}

/// Result of one [`DeltaDetector::observe`] call.
#[derive(Debug, Default)]
pub struct Delta {
    /// Whether the bounded fingerprint differs from the previous snapshot.
    pub changed: bool,
    /// Lines added since the previous snapshot, derived from line counts.
    ///
    /// Can be zero while `changed` is true: a rewritten final line keeps the
    /// count but moves the hash. The asymmetry is deliberate and covered by
    /// tests.
    pub added_count: u64,
    /// The added lines themselves; after a rotation, all current lines.
    pub added_lines: Vec<String>,
}

/// Detects "did anything change since the last observation" over a full file.
#[derive(Debug)]
pub struct DeltaDetector {
    path: PathBuf,
    snapshot: Option<LineSnapshot>,
}

impl DeltaDetector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            snapshot: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot from the last changed observation, if any.
    pub fn snapshot(&self) -> Option<&LineSnapshot> {
        self.snapshot.as_ref()
    }

    /// Scans the file and reports what changed since the previous call.
    ///
    /// The first call only seeds the baseline: it reports `changed = false`
    /// and no lines regardless of content. A shrinking line count is treated
    /// as rotation and every current line is reported as added. The snapshot
    /// is updated only when a change is reported.
    pub fn observe(&mut self) -> io::Result<Delta> {
        let (content, hash) = read_file(&self.path)?;
        let line_count = content.lines().count() as u64;

        let Some(prior) = self.snapshot else {
            self.snapshot = Some(LineSnapshot {
                line_count,
                last_hash: hash,
            });
            return Ok(Delta::default());
        };

        if line_count < prior.line_count {
            // Rotation: the old offsets mean nothing, resend everything.
            self.snapshot = Some(LineSnapshot {
                line_count,
                last_hash: hash,
            });
            return Ok(Delta {
                changed: true,
                added_count: line_count,
                added_lines: content.lines().map(str::to_string).collect(),
            });
        }

        let added_count = line_count - prior.line_count;
        let changed = hash != prior.last_hash;
        if !changed {
            return Ok(Delta::default());
        }

        self.snapshot = Some(LineSnapshot {
            line_count,
            last_hash: hash,
        });
        Ok(Delta {
            changed: true,
            added_count,
            added_lines: content
                .lines()
                .skip(prior.line_count as usize)
                .map(str::to_string)
                .collect(),
        })
    }
}

/// Reads and decodes the whole file, returning content plus its fingerprint.
fn read_file(path: &Path) -> io::Result<(String, Fingerprint)> {
    let mut file = std::fs::File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let hash = fingerprint_bytes(&bytes);
    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    if text.starts_with(UTF8_BOM) {
        text.remove(0);
    }
    Ok((text, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn append(path: &Path, data: &str) {
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(data.as_bytes()).unwrap();
    }

    #[test]
    fn first_observation_is_baseline_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "one\ntwo\nthree\n").unwrap();

        let mut detector = DeltaDetector::new(&path);
        let delta = detector.observe().unwrap();

        assert!(!delta.changed);
        assert!(delta.added_lines.is_empty());
        assert_eq!(detector.snapshot().unwrap().line_count, 3);
    }

    #[test]
    fn appended_lines_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "one\n").unwrap();

        let mut detector = DeltaDetector::new(&path);
        detector.observe().unwrap();

        append(&path, "two\nthree\n");
        let delta = detector.observe().unwrap();

        assert!(delta.changed);
        assert_eq!(delta.added_count, 2);
        assert_eq!(delta.added_lines, vec!["two", "three"]);
    }

    #[test]
    fn unchanged_file_reports_nothing_and_keeps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "one\n").unwrap();

        let mut detector = DeltaDetector::new(&path);
        detector.observe().unwrap();
        let before = *detector.snapshot().unwrap();

        let delta = detector.observe().unwrap();
        assert!(!delta.changed);
        assert_eq!(delta.added_count, 0);
        assert_eq!(*detector.snapshot().unwrap(), before);
    }

    #[test]
    fn shrinking_line_count_resends_all_current_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");

        let many: String = (0..100).map(|i| format!("line {i}\n")).collect();
        std::fs::write(&path, &many).unwrap();

        let mut detector = DeltaDetector::new(&path);
        detector.observe().unwrap();
        assert_eq!(detector.snapshot().unwrap().line_count, 100);

        let few: String = (0..10).map(|i| format!("new {i}\n")).collect();
        std::fs::write(&path, &few).unwrap();

        let delta = detector.observe().unwrap();
        assert!(delta.changed);
        assert_eq!(delta.added_count, 10);
        assert_eq!(delta.added_lines.len(), 10);
        assert_eq!(delta.added_lines[0], "new 0");
        assert_eq!(delta.added_lines[9], "new 9");
    }

    #[test]
    fn rewritten_last_line_changes_hash_but_not_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "one\nprogress: 10%").unwrap();

        let mut detector = DeltaDetector::new(&path);
        detector.observe().unwrap();

        // Same line count, different content.
        std::fs::write(&path, "one\nprogress: 99%").unwrap();
        let delta = detector.observe().unwrap();

        assert!(delta.changed);
        assert_eq!(delta.added_count, 0);
        assert!(delta.added_lines.is_empty());
    }

    #[test]
    fn missing_file_propagates_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut detector = DeltaDetector::new(dir.path().join("gone.log"));
        assert!(detector.observe().is_err());
        assert!(detector.snapshot().is_none());
    }
}
