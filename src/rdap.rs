//! RDAP (Registration Data Access Protocol) transport
//!
//! Modern successor to WHOIS providing structured JSON responses.
//! Queries follow RFC 7482 path shapes: `{base}{ip|domain|autnum}/{target}`.

use crate::{config::Config, errors::LookupError};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const RDAP_CONTENT_TYPE: &str = "application/rdap+json";

const USER_AGENT: &str = concat!("rdap-service/", env!("CARGO_PKG_VERSION"));

pub fn build_http_client(config: &Config) -> Result<reqwest::Client, LookupError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.rdap_timeout_seconds))
        .user_agent(USER_AGENT)
        .gzip(true)
        .build()?;
    Ok(client)
}

/// Joins an endpoint base with the resource path, keeping any base path prefix
pub fn rdap_query_url(base: &str, segment: &str, target: &str) -> Result<Url, LookupError> {
    let base = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    };

    let base_url = Url::parse(&base)
        .map_err(|e| LookupError::UnsupportedEndpoint(format!("Invalid RDAP server URL '{}': {}", base, e)))?;

    base_url
        .join(&format!("{}/{}", segment, target))
        .map_err(|e| LookupError::Internal(format!("Failed to construct RDAP URL: {}", e)))
}

#[derive(Clone)]
pub struct RdapClient {
    client: reqwest::Client,
}

impl RdapClient {
    pub fn new(config: &Config) -> Result<Self, LookupError> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    /// Fetches one RDAP object. A non-2xx reply is "no data" (`Ok(None)`).
    pub async fn query(&self, base: &str, segment: &str, target: &str) -> Result<Option<Value>, LookupError> {
        let url = rdap_query_url(base, segment, target)?;
        debug!("Querying RDAP server: {}", url);

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, RDAP_CONTENT_TYPE)
            .send()
            .await?;

        if !response.status().is_success() {
            debug!("RDAP query returned status {}", response.status());
            return Ok(None);
        }

        let data: Value = response.json().await?;
        Ok(Some(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_url_keeps_base_path() {
        let url = rdap_query_url("https://rdap.verisign.com/com/v1/", "domain", "google.com").unwrap();
        assert_eq!(url.as_str(), "https://rdap.verisign.com/com/v1/domain/google.com");

        let url = rdap_query_url("https://rdap.arin.net/registry", "autnum", "13335").unwrap();
        assert_eq!(url.as_str(), "https://rdap.arin.net/registry/autnum/13335");
    }

    #[test]
    fn test_query_url_rejects_garbage() {
        assert!(matches!(
            rdap_query_url("not a url", "ip", "1.1.1.1"),
            Err(LookupError::UnsupportedEndpoint(_))
        ));
    }
}
