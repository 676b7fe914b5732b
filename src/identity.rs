//! Public-IP discovery.
//!
//! Two deployment variants: an HTTP echo service that returns the caller's
//! address as its response body, and a no-network fallback that reads the
//! address of the local interface the kernel would route outbound traffic
//! through. The variant is a configuration choice, not a separate build.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("IP echo request to {url} failed")]
    Echo {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("IP echo at {url} returned an empty body")]
    EmptyBody { url: String },

    #[error("could not determine a local interface address")]
    LocalInterface(#[source] std::io::Error),
}

/// Which discovery variant to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IpSourceKind {
    /// GET a plain-text echo endpoint; the trimmed body is the address.
    HttpEcho,
    /// No external call; the local routing address stands in for the
    /// public one (NAT-less deployments).
    LocalInterface,
}

#[async_trait]
pub trait IpResolver: Send + Sync {
    async fn public_ip(&self) -> Result<String, IdentityError>;
}

pub struct Identity {
    kind: IpSourceKind,
    echo_url: String,
    client: reqwest::Client,
}

impl Identity {
    pub fn new(kind: IpSourceKind, echo_url: impl Into<String>) -> Self {
        Self {
            kind,
            echo_url: echo_url.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    fn local_interface_ip() -> Result<String, IdentityError> {
        // Connecting a datagram socket picks a source address without
        // sending any packet.
        let probe = || -> std::io::Result<String> {
            let socket = std::net::UdpSocket::bind("0.0.0.0:0")?;
            socket.connect("8.8.8.8:53")?;
            Ok(socket.local_addr()?.ip().to_string())
        };
        probe().map_err(IdentityError::LocalInterface)
    }
}

#[async_trait]
impl IpResolver for Identity {
    async fn public_ip(&self) -> Result<String, IdentityError> {
        match self.kind {
            IpSourceKind::HttpEcho => {
                let body = self
                    .client
                    .get(&self.echo_url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|source| IdentityError::Echo {
                        url: self.echo_url.clone(),
                        source,
                    })?
                    .text()
                    .await
                    .map_err(|source| IdentityError::Echo {
                        url: self.echo_url.clone(),
                        source,
                    })?;

                let ip = body.trim().to_string();
                if ip.is_empty() {
                    return Err(IdentityError::EmptyBody {
                        url: self.echo_url.clone(),
                    });
                }
                tracing::debug!(%ip, "discovered public address via echo service");
                Ok(ip)
            }
            IpSourceKind::LocalInterface => {
                let ip = Self::local_interface_ip()?;
                tracing::debug!(%ip, "using local interface address");
                Ok(ip)
            }
        }
    }
}
