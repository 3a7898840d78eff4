use crate::domain::normalize_tld;
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub const DEFAULT_RDAP_ASN_URL: &str = "https://data.iana.org/rdap/asn.json";
pub const DEFAULT_RDAP_DNS_URL: &str = "https://data.iana.org/rdap/dns.json";
pub const DEFAULT_RDAP_IPV4_URL: &str = "https://data.iana.org/rdap/ipv4.json";
pub const DEFAULT_RDAP_IPV6_URL: &str = "https://data.iana.org/rdap/ipv6.json";
pub const DEFAULT_WHOIS_DIRECTORY_URL: &str =
    "https://raw.githubusercontent.com/7c/whoisserver-world/master/whoisservers.json";
pub const DEFAULT_PUBLIC_SUFFIX_URL: &str = "https://publicsuffix.org/list/public_suffix_list.dat";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub whois_timeout_seconds: u64,
    pub rdap_timeout_seconds: u64,
    pub max_response_size: usize,
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: u64,
    pub bootstrap_ttl_seconds: u64,
    pub max_unique_lookups: usize,
    /// TLDs whose plain-http RDAP endpoints are honored
    pub rdap_http_allowlist: Vec<String>,
    pub feeds: FeedUrls,
    pub start_time: Instant,
}

/// Upstream bootstrap sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedUrls {
    pub rdap_asn: String,
    pub rdap_dns: String,
    pub rdap_ipv4: String,
    pub rdap_ipv6: String,
    pub whois_directory: String,
    pub public_suffix: String,
}

impl Default for FeedUrls {
    fn default() -> Self {
        Self {
            rdap_asn: DEFAULT_RDAP_ASN_URL.to_string(),
            rdap_dns: DEFAULT_RDAP_DNS_URL.to_string(),
            rdap_ipv4: DEFAULT_RDAP_IPV4_URL.to_string(),
            rdap_ipv6: DEFAULT_RDAP_IPV6_URL.to_string(),
            whois_directory: DEFAULT_WHOIS_DIRECTORY_URL.to_string(),
            public_suffix: DEFAULT_PUBLIC_SUFFIX_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigData {
    pub port: u16,
    pub whois_timeout_seconds: u64,
    pub rdap_timeout_seconds: u64,
    pub max_response_size: usize,
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: u64,
    pub bootstrap_ttl_seconds: u64,
    pub max_unique_lookups: usize,
    pub rdap_http_allowlist: String,
    pub rdap_asn_url: String,
    pub rdap_dns_url: String,
    pub rdap_ipv4_url: String,
    pub rdap_ipv6_url: String,
    pub whois_directory_url: String,
    pub public_suffix_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            whois_timeout_seconds: 15,
            rdap_timeout_seconds: 15,
            max_response_size: 1024 * 1024,
            cache_ttl_seconds: 1800,
            cache_max_entries: 5000,
            bootstrap_ttl_seconds: 86400,
            max_unique_lookups: 10,
            rdap_http_allowlist: Vec::new(),
            feeds: FeedUrls::default(),
            start_time: Instant::now(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Get system information for intelligent defaults
        let system_info = Self::detect_system_capabilities();

        let mut settings = config::Config::builder()
            .set_default("port", Self::get_default_port())?
            .set_default("whois_timeout_seconds", system_info.default_timeout)?
            .set_default("rdap_timeout_seconds", system_info.default_timeout)?
            .set_default("max_response_size", system_info.max_response_size as i64)?
            .set_default("cache_ttl_seconds", system_info.cache_ttl)?
            .set_default("cache_max_entries", system_info.cache_max_entries)?
            .set_default("bootstrap_ttl_seconds", 86400)?
            .set_default("max_unique_lookups", 10)?
            .set_default("rdap_http_allowlist", "")?
            .set_default("rdap_asn_url", DEFAULT_RDAP_ASN_URL)?
            .set_default("rdap_dns_url", DEFAULT_RDAP_DNS_URL)?
            .set_default("rdap_ipv4_url", DEFAULT_RDAP_IPV4_URL)?
            .set_default("rdap_ipv6_url", DEFAULT_RDAP_IPV6_URL)?
            .set_default("whois_directory_url", DEFAULT_WHOIS_DIRECTORY_URL)?
            .set_default("public_suffix_url", DEFAULT_PUBLIC_SUFFIX_URL)?;

        // Override with environment variables if present
        settings = Self::apply_env_overrides(settings)?;

        let config_data: ConfigData = settings.build()?.try_deserialize()?;

        Ok(Config {
            port: config_data.port,
            whois_timeout_seconds: config_data.whois_timeout_seconds,
            rdap_timeout_seconds: config_data.rdap_timeout_seconds,
            max_response_size: config_data.max_response_size,
            cache_ttl_seconds: config_data.cache_ttl_seconds,
            cache_max_entries: config_data.cache_max_entries,
            bootstrap_ttl_seconds: config_data.bootstrap_ttl_seconds,
            max_unique_lookups: config_data.max_unique_lookups,
            rdap_http_allowlist: Self::parse_allowlist(&config_data.rdap_http_allowlist),
            feeds: FeedUrls {
                rdap_asn: config_data.rdap_asn_url,
                rdap_dns: config_data.rdap_dns_url,
                rdap_ipv4: config_data.rdap_ipv4_url,
                rdap_ipv6: config_data.rdap_ipv6_url,
                whois_directory: config_data.whois_directory_url,
                public_suffix: config_data.public_suffix_url,
            },
            start_time: Instant::now(),
        })
    }

    /// Splits a comma-separated TLD list, dropping leading dots and blanks
    pub fn parse_allowlist(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(normalize_tld)
            .filter(|tld| !tld.is_empty())
            .collect()
    }

    fn detect_system_capabilities() -> SystemCapabilities {
        let available_memory = Self::get_available_memory();
        let is_production = Self::is_production_environment();

        SystemCapabilities {
            default_timeout: if is_production { 30 } else { 15 },
            max_response_size: Self::calculate_max_response_size(available_memory),
            cache_ttl: if is_production { 3600 } else { 1800 }, // 1 hour prod, 30 min dev
            cache_max_entries: Self::calculate_cache_size(available_memory),
        }
    }

    fn get_available_memory() -> u64 {
        #[cfg(target_os = "linux")]
        {
            if let Ok(meminfo) = std::fs::read_to_string("/proc/meminfo") {
                for line in meminfo.lines() {
                    if line.starts_with("MemAvailable:") {
                        if let Some(kb) = line.split_whitespace().nth(1) {
                            if let Ok(kb_val) = kb.parse::<u64>() {
                                return kb_val * 1024;
                            }
                        }
                    }
                }
            }
        }

        #[cfg(target_os = "macos")]
        {
            use std::process::Command;
            if let Ok(output) = Command::new("sysctl").arg("-n").arg("hw.memsize").output() {
                if let Ok(mem_str) = String::from_utf8(output.stdout) {
                    if let Ok(mem_bytes) = mem_str.trim().parse::<u64>() {
                        return mem_bytes;
                    }
                }
            }
        }

        // Default fallback: assume 4GB
        4 * 1024 * 1024 * 1024
    }

    fn is_production_environment() -> bool {
        std::env::var("ENVIRONMENT")
            .or_else(|_| std::env::var("ENV"))
            .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
            .unwrap_or(false)
    }

    fn calculate_max_response_size(available_memory: u64) -> usize {
        // 0.1% of available memory, capped between 1MB and 10MB
        let calculated = (available_memory as f64 * 0.001) as usize;
        calculated.clamp(1024 * 1024, 10 * 1024 * 1024)
    }

    fn calculate_cache_size(available_memory: u64) -> u64 {
        let gb = available_memory / (1024 * 1024 * 1024);
        match gb {
            0..=2 => 1000,
            3..=8 => 5000,
            9..=16 => 10000,
            _ => 25000,
        }
    }

    fn get_default_port() -> u16 {
        std::env::var("PORT")
            .or_else(|_| std::env::var("HTTP_PORT"))
            .or_else(|_| std::env::var("SERVER_PORT"))
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000)
    }

    fn apply_env_overrides(
        mut settings: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        let env_mappings = [
            ("PORT", "port"),
            ("WHOIS_TIMEOUT_SECONDS", "whois_timeout_seconds"),
            ("WHOIS_TIMEOUT", "whois_timeout_seconds"),
            ("RDAP_TIMEOUT_SECONDS", "rdap_timeout_seconds"),
            ("RDAP_TIMEOUT", "rdap_timeout_seconds"),
            ("MAX_RESPONSE_SIZE", "max_response_size"),
            ("TTL", "cache_ttl_seconds"),
            ("CACHE_TTL_SECONDS", "cache_ttl_seconds"),
            ("CACHE_TTL", "cache_ttl_seconds"),
            ("CACHE_MAX_ENTRIES", "cache_max_entries"),
            ("CACHE_SIZE", "cache_max_entries"),
            ("BOOTSTRAP_TTL_SECONDS", "bootstrap_ttl_seconds"),
            ("BOOTSTRAP_TTL", "bootstrap_ttl_seconds"),
            ("MAX_UNIQUE_LOOKUPS", "max_unique_lookups"),
            ("RDAP_HTTP_TLD_ALLOWLIST", "rdap_http_allowlist"),
            ("RDAP_ASN_URL", "rdap_asn_url"),
            ("RDAP_DNS_URL", "rdap_dns_url"),
            ("RDAP_IPV4_URL", "rdap_ipv4_url"),
            ("RDAP_IPV6_URL", "rdap_ipv6_url"),
            ("WHOIS_DIRECTORY_URL", "whois_directory_url"),
            ("PUBLIC_SUFFIX_URL", "public_suffix_url"),
        ];

        for (env_var, config_key) in env_mappings {
            if let Ok(value) = std::env::var(env_var) {
                settings = settings.set_override(config_key, value)?;
            }
        }

        Ok(settings)
    }
}

struct SystemCapabilities {
    default_timeout: u64,
    max_response_size: usize,
    cache_ttl: u64,
    cache_max_entries: u64,
}
