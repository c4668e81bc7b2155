//! Log file tailing and change detection.
//!
//! Three layers, leaf to root: [`FileCursor`] remembers a byte offset into a
//! single file and turns "the file grew" into a decoded text delta,
//! [`TailReader`] drives a cursor from a polling task and streams new text to
//! a channel, and [`DeltaDetector`] takes whole-file snapshots (line count +
//! bounded fingerprint) for the periodic shipper to decide whether anything
//! changed since the last send.

mod cursor;
mod delta;
mod fingerprint;
mod reader;

pub use cursor::{Advance, FileCursor};
pub use delta::{Delta, DeltaDetector, LineSnapshot};
pub use fingerprint::{FINGERPRINT_WINDOW, Fingerprint, fingerprint_bytes, fingerprint_file};
pub use reader::{DEFAULT_POLL_INTERVAL, TailEvent, TailReader};
