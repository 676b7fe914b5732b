//! Geolocation lookup: IP address to a coarse "city, organization" string.
//!
//! Optional capability; only wired up when the configuration carries an API
//! token. Uses an ipinfo.io-style endpoint: GET `{base}/{ip}?token={token}`
//! returning JSON with at least `city` and `org`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("geolocation lookup for {ip} failed")]
    Lookup {
        ip: String,
        #[source]
        source: reqwest::Error,
    },
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Resolve an IP address to a location descriptor ("city, org").
    async fn locate(&self, ip: &str) -> Result<String, GeoError>;
}

#[derive(Debug, Deserialize)]
struct IpInfoPayload {
    city: String,
    org: String,
}

pub struct IpInfoClient {
    client: reqwest::Client,
    api_base: String,
    token: String,
}

impl IpInfoClient {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .expect("Failed to build HTTP client"),
            api_base: api_base.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl LocationProvider for IpInfoClient {
    async fn locate(&self, ip: &str) -> Result<String, GeoError> {
        let url = format!("{}/{}", self.api_base.trim_end_matches('/'), ip);
        let wrap = |source: reqwest::Error| GeoError::Lookup {
            ip: ip.to_string(),
            source,
        };

        let payload: IpInfoPayload = self
            .client
            .get(&url)
            .query(&[("token", self.token.as_str())])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(wrap)?
            .json()
            .await
            .map_err(wrap)?;

        let location = format!("{}, {}", payload.city, payload.org);
        tracing::debug!(%ip, %location, "resolved location");
        Ok(location)
    }
}
