use crate::{
    bootstrap::{BootstrapLoader, Registry},
    cache::CacheService,
    classifier::{classify_target, ClassifiedTarget, TargetKind},
    config::Config,
    errors::LookupError,
    parser::WhoisParser,
    record::LookupData,
    transport::{Dispatcher, RawData},
};
use futures::future::join_all;
use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use std::{collections::HashSet, sync::Arc, time::Instant};
use tracing::{debug, info, warn};

/// Outcome for one target. Failures are values, not errors, so one bad
/// target never aborts its batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<LookupData>,
    #[serde(default)]
    pub cached: bool,
    /// Failure category for metrics, never serialized
    #[serde(skip)]
    pub failure: Option<&'static str>,
}

impl TargetResult {
    pub fn found(data: LookupData) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            cached: false,
            failure: None,
        }
    }

    pub fn failed(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            cached: false,
            failure: Some(kind),
        }
    }
}

pub fn invalid_target_message(input: &str) -> String {
    format!("{} does not appear to be a valid domain name, IP address or ASN", input)
}

pub fn unsupported_domain_message(input: &str) -> String {
    format!(
        "{} is not supported by RDAP. This may be because the domain belongs to a ccTLD, or the gTLD has not deployed RDAP",
        input
    )
}

pub fn not_registered_message(input: &str) -> String {
    format!("{} does not appear to be a registered domain name, IP address or ASN", input)
}

/// Splits a comma-separated request into unique targets, keeping first-seen order
pub fn split_targets(input: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

/// Results of a multi-target request, serialized as an object keyed by
/// each input in request order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResponse {
    pub results: Vec<(String, TargetResult)>,
}

impl BatchResponse {
    pub fn get(&self, target: &str) -> Option<&TargetResult> {
        self.results.iter().find(|(t, _)| t == target).map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

struct OrderedResults<'a>(&'a [(String, TargetResult)]);

impl Serialize for OrderedResults<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (target, result) in self.0 {
            map.serialize_entry(target, result)?;
        }
        map.end()
    }
}

impl Serialize for BatchResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("results", &OrderedResults(&self.results))?;
        map.end()
    }
}

/// classify -> resolve -> fetch -> parse, with result caching around it
pub struct LookupService {
    loader: Arc<BootstrapLoader>,
    cache: CacheService,
    dispatcher: Dispatcher,
    parser: WhoisParser,
    max_unique_lookups: usize,
}

impl LookupService {
    pub fn new(config: &Config, loader: Arc<BootstrapLoader>, cache: CacheService) -> Result<Self, LookupError> {
        Ok(Self {
            loader,
            cache,
            dispatcher: Dispatcher::new(config)?,
            parser: WhoisParser::new(),
            max_unique_lookups: config.max_unique_lookups,
        })
    }

    pub fn loader(&self) -> &Arc<BootstrapLoader> {
        &self.loader
    }

    pub fn cache(&self) -> &CacheService {
        &self.cache
    }

    /// Classifies a single target against the current registry
    pub async fn classify(&self, raw: &str) -> Result<ClassifiedTarget, LookupError> {
        let registry = self.loader.registry().await?;
        Ok(classify_target(&registry, raw))
    }

    pub async fn lookup(&self, raw: &str, fresh: bool) -> Result<TargetResult, LookupError> {
        let registry = self.loader.registry().await?;
        Ok(self.lookup_in(&registry, raw, fresh).await)
    }

    /// Looks up every unique comma-separated target concurrently
    pub async fn lookup_batch(&self, input: &str, fresh: bool) -> Result<BatchResponse, LookupError> {
        let targets = split_targets(input);

        if targets.is_empty() {
            return Err(LookupError::InvalidRequest("No lookup targets supplied".to_string()));
        }
        if targets.len() > self.max_unique_lookups {
            return Err(LookupError::TooManyTargets(self.max_unique_lookups));
        }

        let registry = self.loader.registry().await?;
        let results = join_all(targets.iter().map(|t| self.lookup_in(&registry, t, fresh))).await;

        Ok(BatchResponse {
            results: targets.into_iter().zip(results).collect(),
        })
    }

    async fn lookup_in(&self, registry: &Registry, raw: &str, fresh: bool) -> TargetResult {
        let start = Instant::now();
        let target = classify_target(registry, raw);
        debug!(
            input = %target.raw_input,
            kind = target.kind.as_str(),
            canonical = %target.canonical,
            "Classified target"
        );

        let result = self.resolve(&target, fresh).await;

        info!(
            input = %target.raw_input,
            kind = target.kind.as_str(),
            success = result.success,
            cached = result.cached,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Lookup finished"
        );
        result
    }

    async fn resolve(&self, target: &ClassifiedTarget, fresh: bool) -> TargetResult {
        let input = target.raw_input.as_str();

        match target.kind {
            TargetKind::Invalid | TargetKind::InvalidIp | TargetKind::InvalidAsn | TargetKind::InvalidDomain => {
                return TargetResult::failed(target.kind.as_str(), invalid_target_message(input));
            }
            TargetKind::UnsupportedDomain => {
                return TargetResult::failed(target.kind.as_str(), unsupported_domain_message(input));
            }
            TargetKind::Ip | TargetKind::Domain | TargetKind::Asn => {}
        }

        let cache_key = target.cache_key();

        if !fresh {
            if let Some(key) = cache_key.as_deref() {
                match self.cache.get_json::<TargetResult>(key).await {
                    Ok(Some(mut cached)) => {
                        cached.cached = true;
                        return cached;
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Cache read error for {}: {}", key, e),
                }
            }
        }

        let result = self.fetch(target).await;

        if result.success {
            if let Some(key) = cache_key.as_deref() {
                if let Err(e) = self.cache.put_json(key, &result, self.cache.result_ttl()).await {
                    warn!("Failed to cache result for {}: {}", key, e);
                }
            }
        }

        result
    }

    async fn fetch(&self, target: &ClassifiedTarget) -> TargetResult {
        let input = target.raw_input.as_str();

        match self.dispatcher.fetch(target).await {
            Ok(RawData::Rdap(value)) if !value.is_null() => TargetResult::found(LookupData::Rdap(value)),
            Ok(RawData::Rdap(_)) | Ok(RawData::Empty) => {
                TargetResult::failed("not-found", not_registered_message(input))
            }
            Ok(RawData::Whois(text)) => match self.parser.parse(&text, &target.canonical) {
                Ok(record) => TargetResult::found(LookupData::Whois(record)),
                Err(e) => {
                    debug!("WHOIS parse for {} failed: {}", target.canonical, e);
                    TargetResult::failed(e.kind(), e.to_string())
                }
            },
            Err(e) => {
                warn!("Fetch for {} from {:?} failed: {}", input, target.endpoint, e);
                TargetResult::failed(e.kind(), not_registered_message(input))
            }
        }
    }
}
