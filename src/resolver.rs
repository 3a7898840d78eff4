use crate::{bootstrap::Registry, domain::DomainParts};
use serde::{Deserialize, Serialize};
use std::{fmt, net::IpAddr};

/// Transport implied by an endpoint's scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Https,
    Http,
    Whois,
    Unknown,
}

/// An authoritative server: `https://` (RDAP) or `whois://` (port 43)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn protocol(&self) -> Protocol {
        let lower = self.0.to_ascii_lowercase();
        if lower.starts_with("https://") {
            Protocol::Https
        } else if lower.starts_with("http://") {
            Protocol::Http
        } else if lower.starts_with("whois://") {
            Protocol::Whois
        } else {
            Protocol::Unknown
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Endpoint whose CIDR block contains `ip`. Overlapping blocks resolve to
/// the last match in feed order.
pub fn resolve_ip(registry: &Registry, ip: &IpAddr) -> Option<Endpoint> {
    let table = match ip {
        IpAddr::V4(_) => registry.ipv4_networks(),
        IpAddr::V6(_) => registry.ipv6_networks(),
    };

    table
        .iter()
        .filter(|(network, _)| network.contains(ip))
        .last()
        .map(|(_, endpoint)| Endpoint::new(endpoint.as_str()))
}

/// Endpoint whose `start-end` range covers `asn`, last match wins.
pub fn resolve_asn(registry: &Registry, asn: u32) -> Option<Endpoint> {
    registry
        .asn_ranges()
        .iter()
        .filter(|(range, _)| range.contains(asn))
        .last()
        .map(|(_, endpoint)| Endpoint::new(endpoint.as_str()))
}

/// A domain endpoint together with the suffix it was registered under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEndpoint {
    pub endpoint: Endpoint,
    pub zone: String,
}

/// Domain precedence, most specific suffix first. For each suffix:
/// RDAP bootstrap, then WHOIS directory, then the directory's RDAP fallback.
/// Plain-http RDAP endpoints count only for allow-listed suffixes.
pub fn resolve_domain(registry: &Registry, parts: &DomainParts) -> Option<DomainEndpoint> {
    let services = registry.services();

    for zone in parts.suffix_chain() {
        let rdap_usable = |url: &String| {
            let endpoint = Endpoint::new(url.as_str());
            match endpoint.protocol() {
                Protocol::Https => Some(endpoint),
                Protocol::Http if registry.allows_http(zone) => Some(endpoint),
                _ => None,
            }
        };

        let found = services
            .domains
            .get(zone)
            .and_then(rdap_usable)
            .or_else(|| {
                services
                    .whois_domains
                    .get(zone)
                    .map(|url| Endpoint::new(url.as_str()))
                    .filter(|endpoint| endpoint.protocol() == Protocol::Whois)
            })
            .or_else(|| services.rdap_fallback.get(zone).and_then(rdap_usable));

        if let Some(endpoint) = found {
            return Some(DomainEndpoint {
                endpoint,
                zone: zone.to_string(),
            });
        }
    }

    None
}
