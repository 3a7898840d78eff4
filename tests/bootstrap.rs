mod common;

use common::{services_fixture, spawn_http, suffixes, Canned, FIXTURE_PSL};
use rdap_service::{
    bootstrap::{BootstrapLoader, Registry},
    cache::{BOOTSTRAP_PSL_KEY, BOOTSTRAP_SERVICES_KEY},
    config::FeedUrls,
    CacheService, Config, LookupError, ServiceMap,
};
use std::{collections::HashMap, net::SocketAddr, sync::Arc};
use tokio_test::{assert_err, assert_ok};

const ASN_FEED: &str = r#"{"version":"1.0","services":[[["13335-13335"],["https://rdap.arin.net/registry/"]]]}"#;
const IPV4_FEED: &str = r#"{"version":"1.0","services":[[["1.0.0.0/8"],["http://rdap.apnic.net/","https://rdap.apnic.net/"]]]}"#;
const IPV6_FEED: &str = r#"{"version":"1.0","services":[[["2a0e:1d47:d502:7400::/56"],["https://rdap.db.ripe.net/"]]]}"#;
const WHOIS_DIRECTORY: &str = r#"{
    "DENIC": {"whoisServer": ["whois.denic.de"], "rdapServers": [], "sampleDomains": {"de": "denic.de"}},
    "Nominet": {"whoisServer": ["whois.nic.uk"], "rdapServers": ["https://rdap.nominet.uk/uk/"], "sampleDomains": {"uk": "nic.uk"}}
}"#;

fn feeds(addr: SocketAddr) -> FeedUrls {
    FeedUrls {
        rdap_asn: format!("http://{}/asn.json", addr),
        rdap_dns: format!("http://{}/dns.json", addr),
        rdap_ipv4: format!("http://{}/ipv4.json", addr),
        rdap_ipv6: format!("http://{}/ipv6.json", addr),
        whois_directory: format!("http://{}/whoisservers.json", addr),
        public_suffix: format!("http://{}/public_suffix_list.dat", addr),
    }
}

fn loader_for(addr: SocketAddr) -> (BootstrapLoader, CacheService) {
    let config = Arc::new(Config {
        feeds: feeds(addr),
        ..Config::default()
    });
    let cache = CacheService::new(config.clone());
    let loader = BootstrapLoader::new(config, cache.clone()).unwrap();
    (loader, cache)
}

#[tokio::test]
async fn partial_upstream_failure_still_builds_registry() {
    let mut routes = HashMap::new();
    routes.insert("/asn.json".to_string(), Canned::json(ASN_FEED));
    routes.insert("/dns.json".to_string(), Canned::status(500));
    routes.insert("/ipv4.json".to_string(), Canned::json(IPV4_FEED));
    routes.insert("/ipv6.json".to_string(), Canned::json(IPV6_FEED));
    routes.insert("/whoisservers.json".to_string(), Canned::json(WHOIS_DIRECTORY));
    routes.insert("/public_suffix_list.dat".to_string(), Canned::text(FIXTURE_PSL));
    let (addr, seen) = spawn_http(routes).await;
    let (loader, cache) = loader_for(addr);

    let registry = assert_ok!(loader.registry().await);
    let services = registry.services();

    assert!(services.domains.is_empty());
    assert_eq!(services.asn["13335-13335"], "https://rdap.arin.net/registry/");
    assert_eq!(services.ipv4["1.0.0.0/8"], "https://rdap.apnic.net/");
    assert_eq!(services.whois_domains["de"], "whois://whois.denic.de");
    assert!(!services.whois_domains.contains_key("uk"));
    assert_eq!(services.rdap_fallback["uk"], "https://rdap.nominet.uk/uk/");

    // The PSL was applied: co.uk is a suffix, not a registrable name
    assert!(registry.suffixes().split("co.uk").is_none());

    let cached: Option<ServiceMap> = cache.get_json(BOOTSTRAP_SERVICES_KEY).await.unwrap();
    assert_eq!(cached.as_ref(), Some(services));
    assert!(cache.get_text(BOOTSTRAP_PSL_KEY).await.unwrap().is_some());

    // A fresh snapshot is served without refetching
    let requests = seen.lock().unwrap().len();
    assert_ok!(loader.registry().await);
    assert_eq!(seen.lock().unwrap().len(), requests);
}

fn all_feeds() -> HashMap<String, Canned> {
    let mut routes = HashMap::new();
    routes.insert("/asn.json".to_string(), Canned::json(ASN_FEED));
    routes.insert("/dns.json".to_string(), Canned::json(r#"{"services":[[["com"],["https://rdap.verisign.com/com/v1/"]]]}"#));
    routes.insert("/ipv4.json".to_string(), Canned::json(IPV4_FEED));
    routes.insert("/ipv6.json".to_string(), Canned::json(IPV6_FEED));
    routes.insert("/whoisservers.json".to_string(), Canned::json(WHOIS_DIRECTORY));
    routes.insert("/public_suffix_list.dat".to_string(), Canned::text(FIXTURE_PSL));
    routes
}

#[tokio::test]
async fn concurrent_callers_share_one_rebuild() {
    let (addr, seen) = spawn_http(all_feeds()).await;
    let (loader, _cache) = loader_for(addr);

    let (a, b, c, d) = tokio::join!(loader.registry(), loader.registry(), loader.registry(), loader.registry());
    for registry in [a, b, c, d] {
        assert_eq!(assert_ok!(registry).services().domains["com"], "https://rdap.verisign.com/com/v1/");
    }

    // Six upstream sources, each fetched once
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 6, "{:?}", seen);
}

#[tokio::test]
async fn total_upstream_failure_writes_nothing() {
    let (addr, _seen) = spawn_http(HashMap::new()).await;
    let (loader, cache) = loader_for(addr);

    let err = assert_err!(loader.registry().await.map(|_| ()));
    assert!(matches!(err, LookupError::Bootstrap(_)));
    assert!(cache.get_text(BOOTSTRAP_SERVICES_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn failed_refresh_keeps_previous_snapshot() {
    let (addr, _seen) = spawn_http(HashMap::new()).await;
    let config = Arc::new(Config {
        feeds: feeds(addr),
        ..Config::default()
    });
    let cache = CacheService::new(config.clone());
    let registry = Registry::new(services_fixture(), suffixes(), Vec::<String>::new());
    let loader = BootstrapLoader::with_registry(config, cache.clone(), registry).unwrap();

    assert_err!(loader.refresh().await.map(|_| ()));

    let current = assert_ok!(loader.registry().await);
    assert_eq!(current.services(), &services_fixture());
    assert!(cache.get_text(BOOTSTRAP_SERVICES_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn cached_service_map_skips_upstream() {
    let (addr, seen) = spawn_http(HashMap::new()).await;
    let (loader, cache) = loader_for(addr);

    cache
        .put_json(BOOTSTRAP_SERVICES_KEY, &services_fixture(), std::time::Duration::from_secs(60))
        .await
        .unwrap();
    cache
        .put_text(BOOTSTRAP_PSL_KEY, FIXTURE_PSL.to_string(), std::time::Duration::from_secs(60))
        .await
        .unwrap();

    let registry = assert_ok!(loader.registry().await);
    assert_eq!(registry.services(), &services_fixture());
    assert!(seen.lock().unwrap().is_empty());
}
