//! Bootstrap registry loading.
//!
//! Authoritative-server directories come from several upstream sources: the
//! four IANA RDAP bootstrap files (ASN, DNS, IPv4, IPv6), a community WHOIS
//! server directory, and the Public Suffix List. They are fetched
//! concurrently, merged into a single [`ServiceMap`], cached in the key-value
//! store and compiled into an immutable [`Registry`] snapshot that is swapped
//! wholesale on refresh.

use crate::{
    cache::{CacheService, BOOTSTRAP_PSL_KEY, BOOTSTRAP_SERVICES_KEY},
    config::{Config, FeedUrls},
    domain::{normalize_tld, SuffixList},
    errors::LookupError,
    ranges::{parse_network, AsnRange},
    rdap::build_http_client,
};
use futures::future::join_all;
use indexmap::IndexMap;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Merged directory of authoritative endpoints, keyed by resource class.
/// Tables keep upstream feed order; range overlaps resolve to the later entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMap {
    #[serde(default)]
    pub asn: IndexMap<String, String>,
    #[serde(default)]
    pub domains: IndexMap<String, String>,
    #[serde(default)]
    pub ipv4: IndexMap<String, String>,
    #[serde(default)]
    pub ipv6: IndexMap<String, String>,
    #[serde(default)]
    pub whois_domains: IndexMap<String, String>,
    #[serde(default)]
    pub rdap_fallback: IndexMap<String, String>,
}

impl ServiceMap {
    pub fn is_empty(&self) -> bool {
        self.asn.is_empty()
            && self.domains.is_empty()
            && self.ipv4.is_empty()
            && self.ipv6.is_empty()
            && self.whois_domains.is_empty()
            && self.rdap_fallback.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResourceClass {
    Asn,
    Domains,
    Ipv4,
    Ipv6,
}

#[derive(Deserialize)]
struct RdapBootstrapFeed {
    services: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WhoisDirectoryEntry {
    #[serde(default)]
    whois_server: Vec<String>,
    #[serde(default)]
    rdap_servers: Vec<String>,
    #[serde(default)]
    sample_domains: Map<String, Value>,
}

/// First `https://` endpoint of a bootstrap entry, else its first endpoint
fn preferred_endpoint(endpoints: &[&str]) -> Option<String> {
    endpoints
        .iter()
        .find(|url| url.starts_with("https://"))
        .or_else(|| endpoints.first())
        .map(|url| url.to_string())
}

/// Flattens an IANA RDAP bootstrap document into identifier -> endpoint.
pub fn parse_rdap_feed(feed: Value) -> Result<IndexMap<String, String>, LookupError> {
    let feed: RdapBootstrapFeed = serde_json::from_value(feed)?;
    let mut map = IndexMap::new();

    for service in feed.services {
        if service.len() < 2 {
            continue;
        }
        let (Some(identifiers), Some(urls)) = (service[0].as_array(), service[1].as_array()) else {
            continue;
        };
        let urls: Vec<&str> = urls.iter().filter_map(Value::as_str).collect();
        let Some(endpoint) = preferred_endpoint(&urls) else {
            continue;
        };

        for identifier in identifiers.iter().filter_map(Value::as_str) {
            map.insert(identifier.trim().to_lowercase(), endpoint.clone());
        }
    }

    Ok(map)
}

/// Splits the WHOIS directory into (whois endpoints, RDAP fallback endpoints).
/// Registries are merged in document order, so a TLD claimed twice goes to
/// the later entry.
pub fn parse_whois_directory(
    directory: Value,
) -> Result<(IndexMap<String, String>, IndexMap<String, String>), LookupError> {
    let entries: Map<String, Value> = serde_json::from_value(directory)?;
    let mut whois = IndexMap::new();
    let mut fallback = IndexMap::new();

    for (registry, raw) in entries {
        let entry: WhoisDirectoryEntry = match serde_json::from_value(raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping WHOIS directory entry {}: {}", registry, e);
                continue;
            }
        };

        if let Some(rdap) = entry.rdap_servers.first() {
            for tld in entry.sample_domains.keys() {
                fallback.insert(normalize_tld(tld), rdap.clone());
            }
        }

        if entry.rdap_servers.is_empty() {
            if let Some(server) = entry.whois_server.first() {
                for tld in entry.sample_domains.keys() {
                    whois.insert(normalize_tld(tld), format!("whois://{}", server.trim()));
                }
            }
        }
    }

    Ok((whois, fallback))
}

/// Compiled, read-only view of a [`ServiceMap`] used for resolution
pub struct Registry {
    services: ServiceMap,
    ipv4: Vec<(IpNet, String)>,
    ipv6: Vec<(IpNet, String)>,
    asn: Vec<(AsnRange, String)>,
    suffixes: SuffixList,
    http_allowlist: HashSet<String>,
}

impl Registry {
    pub fn new<I>(services: ServiceMap, suffixes: SuffixList, http_allowlist: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let ipv4 = compile_networks(&services.ipv4);
        let ipv6 = compile_networks(&services.ipv6);
        let asn = services
            .asn
            .iter()
            .filter_map(|(range, endpoint)| match range.parse::<AsnRange>() {
                Ok(parsed) => Some((parsed, endpoint.clone())),
                Err(e) => {
                    debug!("Skipping ASN bootstrap entry: {}", e);
                    None
                }
            })
            .collect();

        Self {
            services,
            ipv4,
            ipv6,
            asn,
            suffixes,
            http_allowlist: http_allowlist.into_iter().map(|tld| normalize_tld(&tld)).collect(),
        }
    }

    pub fn services(&self) -> &ServiceMap {
        &self.services
    }

    pub fn ipv4_networks(&self) -> &[(IpNet, String)] {
        &self.ipv4
    }

    pub fn ipv6_networks(&self) -> &[(IpNet, String)] {
        &self.ipv6
    }

    pub fn asn_ranges(&self) -> &[(AsnRange, String)] {
        &self.asn
    }

    pub fn suffixes(&self) -> &SuffixList {
        &self.suffixes
    }

    pub fn allows_http(&self, tld: &str) -> bool {
        self.http_allowlist.contains(tld)
    }
}

fn compile_networks(table: &IndexMap<String, String>) -> Vec<(IpNet, String)> {
    table
        .iter()
        .filter_map(|(cidr, endpoint)| match parse_network(cidr) {
            Ok(network) => Some((network, endpoint.clone())),
            Err(e) => {
                debug!("Skipping IP bootstrap entry: {}", e);
                None
            }
        })
        .collect()
}

struct Snapshot {
    registry: Arc<Registry>,
    loaded_at: Instant,
}

pub struct BootstrapLoader {
    client: reqwest::Client,
    feeds: FeedUrls,
    cache: CacheService,
    ttl: Duration,
    http_allowlist: Vec<String>,
    snapshot: RwLock<Option<Snapshot>>,
    rebuild: Mutex<()>,
}

impl BootstrapLoader {
    pub fn new(config: Arc<Config>, cache: CacheService) -> Result<Self, LookupError> {
        Ok(Self {
            client: build_http_client(&config)?,
            feeds: config.feeds.clone(),
            cache,
            ttl: Duration::from_secs(config.bootstrap_ttl_seconds),
            http_allowlist: config.rdap_http_allowlist.clone(),
            snapshot: RwLock::new(None),
            rebuild: Mutex::new(()),
        })
    }

    /// Loader pre-seeded with a registry, e.g. for offline use
    pub fn with_registry(config: Arc<Config>, cache: CacheService, registry: Registry) -> Result<Self, LookupError> {
        let loader = Self::new(config, cache)?;
        *loader.snapshot.try_write().map_err(|e| LookupError::Internal(e.to_string()))? = Some(Snapshot {
            registry: Arc::new(registry),
            loaded_at: Instant::now(),
        });
        Ok(loader)
    }

    /// Current registry, loading or rebuilding it when missing or stale.
    /// A failed rebuild keeps serving the previous snapshot.
    /// Concurrent callers share one rebuild.
    pub async fn registry(&self) -> Result<Arc<Registry>, LookupError> {
        if let Some((registry, true)) = self.current().await {
            return Ok(registry);
        }

        let _rebuilding = self.rebuild.lock().await;

        // Another caller may have finished the rebuild while we waited
        match self.current().await {
            Some((registry, true)) => Ok(registry),
            Some((stale, false)) => match self.load(false).await {
                Ok(registry) => Ok(registry),
                Err(e) => {
                    warn!("Bootstrap rebuild failed, serving previous registry: {}", e);
                    Ok(stale)
                }
            },
            None => self.load(false).await,
        }
    }

    /// Rebuilds from upstream sources, ignoring cached copies
    pub async fn refresh(&self) -> Result<Arc<Registry>, LookupError> {
        let _rebuilding = self.rebuild.lock().await;
        self.load(true).await
    }

    async fn current(&self) -> Option<(Arc<Registry>, bool)> {
        let guard = self.snapshot.read().await;
        guard.as_ref().map(|s| (s.registry.clone(), s.loaded_at.elapsed() < self.ttl))
    }

    async fn load(&self, force_refresh: bool) -> Result<Arc<Registry>, LookupError> {
        let cached = if force_refresh { None } else { self.cached_services().await };

        let (services, psl) = match cached {
            Some(services) => {
                debug!("Using cached bootstrap service map");
                let psl = match self.cache.get_text(BOOTSTRAP_PSL_KEY).await {
                    Ok(Some(psl)) => Some(psl),
                    _ => self.fetch_public_suffixes().await,
                };
                (services, psl)
            }
            None => self.build_from_upstream().await?,
        };

        let registry = Arc::new(Registry::new(
            services,
            SuffixList::parse_or_default(psl.as_deref()),
            self.http_allowlist.iter().cloned(),
        ));

        let mut guard = self.snapshot.write().await;
        *guard = Some(Snapshot {
            registry: registry.clone(),
            loaded_at: Instant::now(),
        });

        Ok(registry)
    }

    async fn cached_services(&self) -> Option<ServiceMap> {
        match self.cache.get_json::<ServiceMap>(BOOTSTRAP_SERVICES_KEY).await {
            Ok(services) => services.filter(|s| !s.is_empty()),
            Err(e) => {
                warn!("Bootstrap cache read failed: {}", e);
                None
            }
        }
    }

    async fn build_from_upstream(&self) -> Result<(ServiceMap, Option<String>), LookupError> {
        info!("Fetching bootstrap registries from upstream sources");

        let rdap_feeds = [
            (ResourceClass::Asn, self.feeds.rdap_asn.as_str()),
            (ResourceClass::Domains, self.feeds.rdap_dns.as_str()),
            (ResourceClass::Ipv4, self.feeds.rdap_ipv4.as_str()),
            (ResourceClass::Ipv6, self.feeds.rdap_ipv6.as_str()),
        ];

        let rdap_requests = join_all(rdap_feeds.iter().map(|(class, url)| async move {
            let parsed = match self.fetch_json(url).await {
                Ok(feed) => parse_rdap_feed(feed),
                Err(e) => Err(e),
            };
            (*class, *url, parsed)
        }));

        let (rdap_results, whois_result, psl) = tokio::join!(
            rdap_requests,
            self.fetch_json(&self.feeds.whois_directory),
            self.fetch_public_suffixes()
        );

        let mut services = ServiceMap::default();
        let mut succeeded = 0;

        for (class, url, result) in rdap_results {
            match result {
                Ok(table) => {
                    succeeded += 1;
                    match class {
                        ResourceClass::Asn => services.asn = table,
                        ResourceClass::Domains => services.domains = table,
                        ResourceClass::Ipv4 => services.ipv4 = table,
                        ResourceClass::Ipv6 => services.ipv6 = table,
                    }
                }
                Err(e) => warn!("RDAP bootstrap source {} failed: {}", url, e),
            }
        }

        match whois_result.and_then(parse_whois_directory) {
            Ok((whois, fallback)) => {
                succeeded += 1;
                services.whois_domains = whois;
                services.rdap_fallback = fallback;
            }
            Err(e) => warn!("WHOIS directory source {} failed: {}", self.feeds.whois_directory, e),
        }

        if succeeded == 0 {
            return Err(LookupError::Bootstrap("all upstream bootstrap sources failed".to_string()));
        }

        info!(
            asn_entries = services.asn.len(),
            domain_entries = services.domains.len(),
            ipv4_entries = services.ipv4.len(),
            ipv6_entries = services.ipv6.len(),
            whois_entries = services.whois_domains.len(),
            fallback_entries = services.rdap_fallback.len(),
            "Bootstrap registry built from {} sources",
            succeeded
        );

        if let Err(e) = self.cache.put_json(BOOTSTRAP_SERVICES_KEY, &services, self.ttl).await {
            warn!("Failed to cache bootstrap service map: {}", e);
        }

        Ok((services, psl))
    }

    async fn fetch_public_suffixes(&self) -> Option<String> {
        match self.fetch_text(&self.feeds.public_suffix).await {
            Ok(text) => {
                if let Err(e) = self.cache.put_text(BOOTSTRAP_PSL_KEY, text.clone(), self.ttl).await {
                    warn!("Failed to cache public suffix list: {}", e);
                }
                Some(text)
            }
            Err(e) => {
                warn!("Public suffix source {} failed: {}", self.feeds.public_suffix, e);
                None
            }
        }
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, LookupError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(LookupError::Bootstrap(format!("{} returned status {}", url, response.status())));
        }
        Ok(response.json().await?)
    }

    async fn fetch_text(&self, url: &str) -> Result<String, LookupError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(LookupError::Bootstrap(format!("{} returned status {}", url, response.status())));
        }
        Ok(response.text().await?)
    }
}
