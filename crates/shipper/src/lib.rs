//! Periodic log snapshot shipping.
//!
//! A timer loop observes the log file through
//! [`DeltaDetector`](logship_tail::DeltaDetector) and, when something
//! changed, hands the whole file to the delivery layer as a captioned
//! document upload. Delivery runs on its own task so the timer never blocks;
//! the shared cooldown gate and per-outcome wait hints keep the cadence
//! polite after failures.

mod caption;
mod config;
mod periodic;

pub use caption::build_caption;
pub use config::{ConfigError, MIN_INTERVAL_SECS, ShipperConfig};
pub use periodic::{Delivery, PeriodicShipper};
