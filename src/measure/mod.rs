//! Throughput measurement seam.
//!
//! The actual bandwidth test is an external collaborator behind
//! [`ThroughputProvider`]; this crate only consumes its normalized result.
//! Providers are long-running blocking calls (tens of seconds); no timeout
//! is imposed here beyond the provider's own, and failures are never
//! retried within a run.

use async_trait::async_trait;
use serde::Serialize;

pub mod ookla;

pub use ookla::OoklaCliProvider;

/// Normalized throughput result, Mbps rounded to one decimal place.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Throughput {
    pub download_mbps: f64,
    pub upload_mbps: f64,
}

#[async_trait]
pub trait ThroughputProvider: Send + Sync {
    async fn measure(&self) -> anyhow::Result<Throughput>;
}
