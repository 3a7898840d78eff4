use crate::{
    classifier::ClassifiedTarget,
    config::Config,
    domain::normalize_tld,
    errors::LookupError,
    rdap::RdapClient,
    resolver::Protocol,
    whois::WhoisClient,
};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Raw registry data, before any normalization
#[derive(Debug, Clone, PartialEq)]
pub enum RawData {
    Rdap(Value),
    Whois(String),
    /// Non-2xx RDAP reply
    Empty,
}

/// Picks the wire protocol from the endpoint scheme and fetches
#[derive(Clone)]
pub struct Dispatcher {
    rdap: RdapClient,
    whois: WhoisClient,
    http_allowlist: HashSet<String>,
}

impl Dispatcher {
    pub fn new(config: &Config) -> Result<Self, LookupError> {
        Ok(Self {
            rdap: RdapClient::new(config)?,
            whois: WhoisClient::new(config),
            http_allowlist: config.rdap_http_allowlist.iter().map(|t| normalize_tld(t)).collect(),
        })
    }

    fn allows_http(&self, target: &ClassifiedTarget) -> bool {
        [target.zone.as_deref(), target.tld.as_deref()]
            .into_iter()
            .flatten()
            .any(|label| self.http_allowlist.contains(label))
    }

    pub async fn fetch(&self, target: &ClassifiedTarget) -> Result<RawData, LookupError> {
        let endpoint = target
            .endpoint
            .as_ref()
            .ok_or_else(|| LookupError::InvalidRequest(format!("{} has no resolved server", target.raw_input)))?;

        let segment = target
            .kind
            .rdap_segment()
            .ok_or_else(|| LookupError::InvalidRequest(format!("{} is not a lookup target", target.raw_input)))?;

        match endpoint.protocol() {
            Protocol::Https => self.fetch_rdap(endpoint.as_str(), segment, &target.canonical).await,
            Protocol::Http if self.allows_http(target) => {
                debug!("Using plain-http RDAP for allow-listed {}", target.canonical);
                self.fetch_rdap(endpoint.as_str(), segment, &target.canonical).await
            }
            Protocol::Whois => {
                let text = self
                    .whois
                    .query(endpoint.as_str(), &target.canonical, target.tld.as_deref())
                    .await?;
                Ok(RawData::Whois(text))
            }
            Protocol::Http | Protocol::Unknown => {
                warn!("Refusing endpoint {} for {}", endpoint, target.canonical);
                Err(LookupError::UnsupportedEndpoint(endpoint.to_string()))
            }
        }
    }

    async fn fetch_rdap(&self, base: &str, segment: &str, target: &str) -> Result<RawData, LookupError> {
        Ok(match self.rdap.query(base, segment, target).await? {
            Some(value) => RawData::Rdap(value),
            None => RawData::Empty,
        })
    }
}
