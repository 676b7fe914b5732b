//! Ookla speedtest CLI provider.
//!
//! Wraps the official `speedtest` binary: one JSON-mode invocation runs the
//! download and upload phases back to back. Bandwidth comes back in bytes
//! per second and is converted to Mbps (bits).

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{Throughput, ThroughputProvider};
use crate::record::round_mbps;

pub struct OoklaCliProvider {
    binary: String,
}

impl Default for OoklaCliProvider {
    fn default() -> Self {
        Self {
            binary: "speedtest".to_string(),
        }
    }
}

impl OoklaCliProvider {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

fn parse_summary(json: &serde_json::Value) -> Result<Throughput> {
    let bandwidth_mbps = |phase: &str| -> Result<f64> {
        let bytes_per_sec = json
            .get(phase)
            .and_then(|v| v.get("bandwidth"))
            .and_then(|v| v.as_f64())
            .with_context(|| format!("speedtest output missing {phase}.bandwidth"))?;
        Ok(round_mbps(bytes_per_sec * 8.0 / 1_000_000.0))
    };
    Ok(Throughput {
        download_mbps: bandwidth_mbps("download")?,
        upload_mbps: bandwidth_mbps("upload")?,
    })
}

#[async_trait]
impl ThroughputProvider for OoklaCliProvider {
    async fn measure(&self) -> Result<Throughput> {
        tracing::info!("running speed test (download + upload)...");
        let output = tokio::process::Command::new(&self.binary)
            .arg("--format=json")
            .arg("--accept-license")
            .arg("--accept-gdpr")
            .output()
            .await
            .with_context(|| format!("failed to launch {}", self.binary))?;

        if !output.status.success() {
            anyhow::bail!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let json: serde_json::Value =
            serde_json::from_slice(&output.stdout).context("speedtest output was not JSON")?;
        let result = parse_summary(&json)?;
        tracing::info!(
            download_mbps = result.download_mbps,
            upload_mbps = result.upload_mbps,
            "speed test complete"
        );
        Ok(result)
    }
}
