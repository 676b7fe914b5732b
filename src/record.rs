//! Measurement records and their on-disk line format.
//!
//! One record per completed run, serialized as a single pipe-delimited line.
//! Records are append-only; nothing in this crate ever rewrites or deletes
//! a line once it is in the ledger.

use chrono::NaiveDateTime;
use serde::Serialize;

/// Throughput measured in megabits per second, rounded to one decimal place.
pub fn round_mbps(mbps: f64) -> f64 {
    (mbps * 10.0).round() / 10.0
}

/// A single completed measurement, tagged with time and origin.
#[derive(Debug, Clone, Serialize)]
pub struct MeasurementRecord {
    /// Local wall-clock time, second precision.
    pub timestamp: NaiveDateTime,
    /// Public address of the host running the test.
    pub ip: String,
    /// Coarse location descriptor ("city, org"); absent when geolocation
    /// is disabled.
    pub location: Option<String>,
    pub download_mbps: f64,
    pub upload_mbps: f64,
}

impl MeasurementRecord {
    /// Render the ledger line, including the trailing newline.
    ///
    /// Speeds always carry one decimal place, so integral values render as
    /// e.g. `100.0`. The location segment is only present when geolocation
    /// ran:
    /// `2024-01-01 12:00:00  |  203.0.113.5  |  Springfield, ExampleISP  |
    /// download = 93.4 Mbps  |  upload = 11.2 Mbps\n`
    pub fn to_line(&self) -> String {
        let ts = self.timestamp.format("%Y-%m-%d %H:%M:%S");
        let speeds = format!(
            "download = {:.1} Mbps  |  upload = {:.1} Mbps",
            self.download_mbps, self.upload_mbps
        );
        match &self.location {
            Some(loc) => format!("{ts}  |  {}  |  {loc}  |  {speeds}\n", self.ip),
            None => format!("{ts}  |  {}  |  {speeds}\n", self.ip),
        }
    }
}
