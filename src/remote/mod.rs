//! Remote object store abstraction.
//!
//! The store is used for two things: an existence check against the run-gate
//! marker, and full-overwrite uploads of the ledger and diagnostic log.
//! Only those two operations exist; there is no read path and no native
//! append on the backend.

use async_trait::async_trait;
use thiserror::Error;

pub mod dropbox;

pub use dropbox::DropboxStore;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The backend reported a "not found"-class error for the path.
    /// `exists` implementations map this to `Ok(false)`; it only escapes
    /// from operations where a missing object is a real failure.
    #[error("remote object not found")]
    NotFound,

    #[error("remote store authentication failed: {0}")]
    Auth(String),

    #[error("remote API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Whether an object exists at `path`.
    ///
    /// Returns `Ok(false)` when the backend reports the path as missing.
    /// Any other failure (auth, transport, quota) is an `Err` so callers
    /// can distinguish "genuinely absent" from "could not tell".
    async fn exists(&self, path: &str) -> Result<bool, RemoteError>;

    /// Upload `body` to `path`, replacing any existing object wholesale.
    async fn upload_overwrite(&self, path: &str, body: Vec<u8>) -> Result<(), RemoteError>;
}
