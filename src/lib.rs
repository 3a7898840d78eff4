//! # RDAP Service Library
//!
//! Registration data lookups for domains, IP addresses and autonomous
//! system numbers.
//!
//! ## Features
//!
//! - Bootstrap discovery from the IANA RDAP registries, a WHOIS server
//!   directory and the Public Suffix List
//! - RDAP over HTTPS with WHOIS (port 43) for registries without RDAP
//! - Per-TLD WHOIS grammars normalized into an RDAP-shaped record
//! - Result caching in a TTL key-value store
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rdap_service::LookupClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = LookupClient::new().await?;
//!     let batch = client.lookup_batch("google.com, 1.1.1.1, AS13335", false).await?;
//!
//!     for (target, result) in &batch.results {
//!         println!("{}: success={}", target, result.success);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod bootstrap;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod errors;
pub mod grammar;
pub mod lookup;
pub mod parser;
pub mod ranges;
pub mod rdap;
pub mod record;
pub mod resolver;
pub mod transport;
pub mod whois;

// Re-export main types for easy access
pub use bootstrap::{BootstrapLoader, Registry, ServiceMap};
pub use cache::{CacheService, KvStore, MemoryStore};
pub use classifier::{ClassifiedTarget, TargetKind};
pub use config::Config;
pub use errors::LookupError;
pub use lookup::{BatchResponse, LookupService, TargetResult};
pub use parser::{ParseError, WhoisParser};
pub use record::{LookupData, WhoisRecord};
pub use resolver::Endpoint;

use std::sync::Arc;

/// High-level lookup client owning the bootstrap registry and result cache
#[derive(Clone)]
pub struct LookupClient {
    service: Arc<LookupService>,
    config: Arc<Config>,
}

impl LookupClient {
    /// Create a new client with configuration from the environment
    pub async fn new() -> Result<Self, LookupError> {
        let config = Arc::new(Config::load()?);
        Self::new_with_config(config).await
    }

    /// Create a new client with custom configuration and an in-memory cache
    pub async fn new_with_config(config: Arc<Config>) -> Result<Self, LookupError> {
        let cache = CacheService::new(config.clone());
        let loader = Arc::new(BootstrapLoader::new(config.clone(), cache.clone())?);
        Self::from_parts(config, loader, cache)
    }

    /// Assemble a client from an existing loader and cache, e.g. a
    /// pre-seeded registry or an external key-value store
    pub fn from_parts(config: Arc<Config>, loader: Arc<BootstrapLoader>, cache: CacheService) -> Result<Self, LookupError> {
        let service = Arc::new(LookupService::new(&config, loader, cache)?);
        Ok(Self { service, config })
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn service(&self) -> &Arc<LookupService> {
        &self.service
    }

    /// Look up one target. Uses cached results unless `fresh` is true.
    pub async fn lookup(&self, target: &str, fresh: bool) -> Result<TargetResult, LookupError> {
        self.service.lookup(target, fresh).await
    }

    /// Look up a comma-separated list of targets
    pub async fn lookup_batch(&self, input: &str, fresh: bool) -> Result<BatchResponse, LookupError> {
        self.service.lookup_batch(input, fresh).await
    }

    pub async fn classify(&self, target: &str) -> Result<ClassifiedTarget, LookupError> {
        self.service.classify(target).await
    }

    /// The merged service map currently in use
    pub async fn services(&self) -> Result<ServiceMap, LookupError> {
        let registry = self.service.loader().registry().await?;
        Ok(registry.services().clone())
    }

    /// Rebuild the bootstrap registry from upstream sources
    pub async fn refresh_bootstrap(&self) -> Result<(), LookupError> {
        self.service.loader().refresh().await.map(|_| ())
    }

    /// Number of lookup results currently cached
    pub async fn cached_results(&self) -> Result<usize, LookupError> {
        self.service.cache().cached_results().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> LookupClient {
        let config = Arc::new(Config::default());
        let cache = CacheService::new(config.clone());
        let mut services = ServiceMap::default();
        services.domains.insert("com".into(), "https://rdap.verisign.com/com/v1/".into());
        let registry = Registry::new(services, domain::SuffixList::default(), Vec::<String>::new());
        let loader = Arc::new(BootstrapLoader::with_registry(config.clone(), cache.clone(), registry).unwrap());
        LookupClient::from_parts(config, loader, cache).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_targets_never_fetch() {
        let client = offline_client();
        let result = client.lookup("notadomain", false).await.unwrap();
        assert!(!result.success);
        assert_eq!(
            result.message.as_deref(),
            Some("notadomain does not appear to be a valid domain name, IP address or ASN")
        );
        assert_eq!(client.cached_results().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_services_exposes_snapshot() {
        let client = offline_client();
        let services = client.services().await.unwrap();
        assert_eq!(services.domains.len(), 1);

        let classified = client.classify("www.google.com").await.unwrap();
        assert_eq!(classified.kind, TargetKind::Domain);
        assert_eq!(classified.canonical, "google.com");
    }
}
