//! Run gate: a remote marker object whose mere presence permits execution.
//!
//! The policy is fail-closed. A genuinely missing marker and an unreachable
//! backend both stop the run, but through separately logged branches so an
//! operator reading the log can tell which happened. Stopping on ambiguous
//! errors prevents runaway background execution when the control channel is
//! down.

use crate::remote::RemoteStore;

/// Check the gate marker. `true` means the run may proceed.
pub async fn check(store: &dyn RemoteStore, gate_path: &str) -> bool {
    match store.exists(gate_path).await {
        Ok(true) => {
            tracing::info!(path = gate_path, "found run gate; will continue");
            true
        }
        Ok(false) => {
            tracing::info!(path = gate_path, "run gate absent; skipping this run");
            false
        }
        Err(e) => {
            tracing::error!(
                path = gate_path,
                error = %e,
                detail = ?e,
                "gate check failed; failing closed"
            );
            false
        }
    }
}
