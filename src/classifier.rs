use crate::{
    bootstrap::Registry,
    domain::{is_fqdn, DomainParts, SuffixList},
    resolver::{self, Endpoint},
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Resource kind of a query after server resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    Ip,
    Domain,
    Asn,
    Invalid,
    InvalidIp,
    InvalidAsn,
    InvalidDomain,
    UnsupportedDomain,
}

impl TargetKind {
    pub fn is_resource(&self) -> bool {
        matches!(self, TargetKind::Ip | TargetKind::Domain | TargetKind::Asn)
    }

    /// RDAP path segment; ASNs are `autnum` on the wire
    pub fn rdap_segment(&self) -> Option<&'static str> {
        match self {
            TargetKind::Ip => Some("ip"),
            TargetKind::Domain => Some("domain"),
            TargetKind::Asn => Some("autnum"),
            _ => None,
        }
    }

    fn cache_namespace(&self) -> Option<&'static str> {
        match self {
            TargetKind::Ip => Some("ip"),
            TargetKind::Domain => Some("domain"),
            TargetKind::Asn => Some("asn"),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Ip => "ip",
            TargetKind::Domain => "domain",
            TargetKind::Asn => "asn",
            TargetKind::Invalid => "invalid",
            TargetKind::InvalidIp => "invalid-ip",
            TargetKind::InvalidAsn => "invalid-asn",
            TargetKind::InvalidDomain => "invalid-domain",
            TargetKind::UnsupportedDomain => "unsupported-domain",
        }
    }
}

/// Syntactic classification, before any server is consulted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Ip(IpAddr),
    Asn(u32),
    Domain(DomainParts),
    /// All digits after the prefix, but out of 32-bit range
    InvalidAsn,
    /// Well-formed FQDN with no registrable part (a bare public suffix)
    InvalidDomain,
    Invalid,
}

/// Strips an optional case-insensitive `ASN`/`AS` prefix
fn strip_asn_prefix(input: &str) -> &str {
    let bytes = input.as_bytes();
    if bytes.len() >= 3 && bytes[..3].eq_ignore_ascii_case(b"asn") {
        &input[3..]
    } else if bytes.len() >= 2 && bytes[..2].eq_ignore_ascii_case(b"as") {
        &input[2..]
    } else {
        input
    }
}

pub fn classify(raw: &str, suffixes: &SuffixList) -> Classification {
    let input = raw.trim();

    if let Ok(ip) = input.parse::<IpAddr>() {
        return Classification::Ip(ip);
    }

    let number = strip_asn_prefix(input);
    if !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit()) {
        return match number.parse::<u32>() {
            Ok(asn) => Classification::Asn(asn),
            Err(_) => Classification::InvalidAsn,
        };
    }

    if is_fqdn(input) {
        let name = input.to_lowercase();
        return match suffixes.split(&name) {
            Some(parts) => Classification::Domain(parts),
            None => Classification::InvalidDomain,
        };
    }

    Classification::Invalid
}

/// A query classified and resolved against one registry snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedTarget {
    pub raw_input: String,
    pub kind: TargetKind,
    pub canonical: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
    /// Suffix the domain endpoint was found under
    #[serde(skip)]
    pub zone: Option<String>,
    /// Final label of a domain target
    #[serde(skip)]
    pub tld: Option<String>,
}

impl ClassifiedTarget {
    fn unresolved(raw_input: &str, kind: TargetKind, canonical: String) -> Self {
        Self {
            raw_input: raw_input.to_string(),
            kind,
            canonical,
            endpoint: None,
            zone: None,
            tld: None,
        }
    }

    fn resolved(raw_input: &str, kind: TargetKind, canonical: String, endpoint: Endpoint) -> Self {
        Self {
            raw_input: raw_input.to_string(),
            kind,
            canonical,
            endpoint: Some(endpoint),
            zone: None,
            tld: None,
        }
    }

    /// KV key for a successful result; invalid kinds have none
    pub fn cache_key(&self) -> Option<String> {
        self.kind
            .cache_namespace()
            .map(|namespace| format!("rdap:{}:{}", namespace, self.canonical))
    }
}

/// Classifies `raw` and resolves its endpoint in one pass. A missing
/// endpoint degrades the kind to the matching invalid variant.
pub fn classify_target(registry: &Registry, raw: &str) -> ClassifiedTarget {
    let input = raw.trim();

    match classify(input, registry.suffixes()) {
        Classification::Ip(ip) => match resolver::resolve_ip(registry, &ip) {
            Some(endpoint) => ClassifiedTarget::resolved(input, TargetKind::Ip, input.to_string(), endpoint),
            None => ClassifiedTarget::unresolved(input, TargetKind::InvalidIp, input.to_string()),
        },
        Classification::Asn(asn) => match resolver::resolve_asn(registry, asn) {
            Some(endpoint) => ClassifiedTarget::resolved(input, TargetKind::Asn, asn.to_string(), endpoint),
            None => ClassifiedTarget::unresolved(input, TargetKind::InvalidAsn, asn.to_string()),
        },
        Classification::Domain(parts) => match resolver::resolve_domain(registry, &parts) {
            Some(found) => {
                let mut target =
                    ClassifiedTarget::resolved(input, TargetKind::Domain, parts.registrable.clone(), found.endpoint);
                target.zone = Some(found.zone);
                target.tld = Some(parts.tld().to_string());
                target
            }
            None => ClassifiedTarget::unresolved(input, TargetKind::UnsupportedDomain, parts.registrable),
        },
        Classification::InvalidAsn => ClassifiedTarget::unresolved(input, TargetKind::InvalidAsn, input.to_string()),
        Classification::InvalidDomain => {
            ClassifiedTarget::unresolved(input, TargetKind::InvalidDomain, input.to_lowercase())
        }
        Classification::Invalid => ClassifiedTarget::unresolved(input, TargetKind::Invalid, input.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::ServiceMap;

    const FIXTURE_PSL: &str = "// ===BEGIN ICANN DOMAINS===\ncom\nuk\nco.uk\n// ===END ICANN DOMAINS===\n";

    fn registry() -> Registry {
        let mut services = ServiceMap::default();
        services.ipv4.insert("1.0.0.0/8".into(), "https://rdap.apnic.net/".into());
        services.asn.insert("13335-13335".into(), "https://rdap.arin.net/registry/".into());
        services.domains.insert("com".into(), "https://rdap.verisign.com/com/v1/".into());
        services.domains.insert("co.uk".into(), "https://rdap.nominet.uk/uk/".into());
        let suffixes = SuffixList::parse(FIXTURE_PSL).unwrap();
        Registry::new(services, suffixes, Vec::<String>::new())
    }

    #[test]
    fn test_asn_prefix_forms() {
        let suffixes = SuffixList::default();
        for input in ["13335", "AS13335", "ASN13335", "as13335", "asn13335", "As13335"] {
            assert_eq!(classify(input, &suffixes), Classification::Asn(13335), "{}", input);
        }
        assert_eq!(classify("AS99999999999", &suffixes), Classification::InvalidAsn);
        assert_eq!(classify("AS", &suffixes), Classification::Invalid);
    }

    #[test]
    fn test_ip_wins_over_other_kinds() {
        let suffixes = SuffixList::default();
        assert!(matches!(classify("1.1.1.1", &suffixes), Classification::Ip(_)));
        assert!(matches!(classify("::1", &suffixes), Classification::Ip(_)));
    }

    #[test]
    fn test_subdomains_are_discarded() {
        let target = classify_target(&registry(), "www.News.BBC.co.uk");
        assert_eq!(target.kind, TargetKind::Domain);
        assert_eq!(target.canonical, "bbc.co.uk");
        assert_eq!(target.zone.as_deref(), Some("co.uk"));
        assert_eq!(target.tld.as_deref(), Some("uk"));
        assert_eq!(target.cache_key().as_deref(), Some("rdap:domain:bbc.co.uk"));
    }

    #[test]
    fn test_degraded_kinds() {
        let reg = registry();
        assert_eq!(classify_target(&reg, "9.9.9.9").kind, TargetKind::InvalidIp);
        assert_eq!(classify_target(&reg, "AS1").kind, TargetKind::InvalidAsn);
        assert_eq!(classify_target(&reg, "co.uk").kind, TargetKind::InvalidDomain);
        assert_eq!(classify_target(&reg, "example.org").kind, TargetKind::UnsupportedDomain);
        assert_eq!(classify_target(&reg, "notadomain").kind, TargetKind::Invalid);

        let invalid = classify_target(&reg, "lololololol");
        assert!(invalid.endpoint.is_none());
        assert!(invalid.cache_key().is_none());
    }

    #[test]
    fn test_asn_canonical_and_segment() {
        let target = classify_target(&registry(), " asn13335 ");
        assert_eq!(target.raw_input, "asn13335");
        assert_eq!(target.canonical, "13335");
        assert_eq!(target.kind.rdap_segment(), Some("autnum"));
        assert_eq!(target.cache_key().as_deref(), Some("rdap:asn:13335"));
    }

    #[test]
    fn test_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&TargetKind::UnsupportedDomain).unwrap();
        assert_eq!(json, "\"unsupported-domain\"");
        assert_eq!(TargetKind::InvalidIp.as_str(), "invalid-ip");
    }
}
