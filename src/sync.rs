//! Remote mirror push: full-overwrite upload of the ledger and the
//! diagnostic log.
//!
//! The backend has no cheap append primitive, so reconciliation is
//! overwrite-with-full-content: read the entire local file, replace the
//! remote object. Temporary divergence after a failed push self-heals on
//! the next successful run. Failures here are logged but never propagate;
//! a run whose measurement landed in the local ledger has completed.

use std::path::Path;

use serde::Serialize;

use crate::remote::RemoteStore;

/// Per-file outcome of a sync pass.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SyncReport {
    pub ledger: bool,
    pub log: bool,
}

impl SyncReport {
    pub fn all_ok(&self) -> bool {
        self.ledger && self.log
    }
}

/// Remote object path for a local file under the remote root.
fn remote_path(root: &str, local: &Path) -> String {
    let name = local
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}/{}", root.trim_end_matches('/'), name)
}

async fn push_file(store: &dyn RemoteStore, local: &Path, remote: &str) -> bool {
    let body = match std::fs::read(local) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(
                local = %local.display(),
                error = %e,
                "could not read local file for upload"
            );
            return false;
        }
    };

    tracing::info!(
        local = %local.display(),
        remote,
        bytes = body.len(),
        "uploading to remote store"
    );
    match store.upload_overwrite(remote, body).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(remote, error = %e, detail = ?e, "upload failed");
            false
        }
    }
}

/// Push the ledger, then the diagnostic log, under `remote_root`.
///
/// Each file is pushed independently; a failed ledger push does not stop
/// the log push. No retries.
pub async fn push_all(
    store: &dyn RemoteStore,
    ledger_path: &Path,
    log_path: &Path,
    remote_root: &str,
) -> SyncReport {
    let ledger = push_file(store, ledger_path, &remote_path(remote_root, ledger_path)).await;
    let log = push_file(store, log_path, &remote_path(remote_root, log_path)).await;
    SyncReport { ledger, log }
}
