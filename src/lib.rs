//! speedledger -- gated internet speed measurements with a cloud-mirrored
//! ledger.
//!
//! Each invocation checks a remote kill-switch marker, measures download and
//! upload throughput, appends one timestamped record line to a local
//! append-only ledger, and mirrors the ledger plus the diagnostic log to a
//! remote object store. Scheduling is left to cron or a systemd timer.

pub mod config;
pub mod controller;
pub mod gate;
pub mod geo;
pub mod identity;
pub mod ledger;
pub mod logging;
pub mod measure;
pub mod record;
pub mod remote;
pub mod sync;
