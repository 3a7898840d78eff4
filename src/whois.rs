use crate::{config::Config, errors::LookupError};
use std::time::Duration;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tracing::debug;
use url::Url;

pub const WHOIS_PORT: u16 = 43;

const READ_BUFFER_SIZE: usize = 8192;

/// Registry-specific query line adaptations, keyed by final TLD label
pub fn query_line(target: &str, tld: Option<&str>) -> String {
    let query = match tld {
        // JPRS answers in Japanese unless asked for English
        Some("jp") => format!("{}/e", target),
        // DENIC restricts output to the domain object with -T dn
        Some("de") => format!("{} -T dn", target),
        _ => target.to_string(),
    };
    format!("{}\r\n", query)
}

/// Host and port of a `whois://host[:port]` endpoint
pub fn whois_address(endpoint: &str) -> Result<(String, u16), LookupError> {
    let url = Url::parse(endpoint)
        .map_err(|e| LookupError::UnsupportedEndpoint(format!("Invalid WHOIS endpoint '{}': {}", endpoint, e)))?;

    if url.scheme() != "whois" {
        return Err(LookupError::UnsupportedEndpoint(endpoint.to_string()));
    }

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| LookupError::UnsupportedEndpoint(format!("WHOIS endpoint without host: {}", endpoint)))?;

    // Bracketed IPv6 hosts come back with their brackets
    let host = host.trim_start_matches('[').trim_end_matches(']').to_string();
    Ok((host, url.port().unwrap_or(WHOIS_PORT)))
}

#[derive(Clone)]
pub struct WhoisClient {
    timeout: Duration,
    max_response_size: usize,
}

impl WhoisClient {
    pub fn new(config: &Config) -> Self {
        Self {
            timeout: Duration::from_secs(config.whois_timeout_seconds),
            max_response_size: config.max_response_size,
        }
    }

    /// Sends one query line and reads until the server closes the connection.
    pub async fn query(&self, endpoint: &str, target: &str, tld: Option<&str>) -> Result<String, LookupError> {
        let (host, port) = whois_address(endpoint)?;
        debug!("Querying WHOIS server {}:{} for {}", host, port, target);

        let mut stream = timeout(self.timeout, TcpStream::connect((host.as_str(), port))).await??;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }

        let result = self.exchange(&mut stream, &query_line(target, tld)).await;

        // Close in all cases; a failed shutdown only matters for logging
        if let Err(e) = stream.shutdown().await {
            debug!("WHOIS socket shutdown for {} failed: {}", host, e);
        }

        result
    }

    async fn exchange(&self, stream: &mut TcpStream, line: &str) -> Result<String, LookupError> {
        timeout(self.timeout, stream.write_all(line.as_bytes())).await??;

        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        let mut response = Vec::new();

        loop {
            match timeout(self.timeout, stream.read(&mut buffer)).await? {
                Ok(0) => break, // EOF
                Ok(n) => {
                    response.extend_from_slice(&buffer[..n]);
                    if response.len() > self.max_response_size {
                        return Err(LookupError::ResponseTooLarge);
                    }
                }
                Err(e) => return Err(LookupError::IoError(e)),
            }
        }

        debug!("WHOIS response length: {} bytes", response.len());
        Ok(String::from_utf8_lossy(&response).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_line_quirks() {
        assert_eq!(query_line("example.jp", Some("jp")), "example.jp/e\r\n");
        assert_eq!(query_line("example.de", Some("de")), "example.de -T dn\r\n");
        assert_eq!(query_line("example.com", Some("com")), "example.com\r\n");
        assert_eq!(query_line("example.com", None), "example.com\r\n");
    }

    #[test]
    fn test_whois_address() {
        assert_eq!(
            whois_address("whois://whois.denic.de").unwrap(),
            ("whois.denic.de".to_string(), WHOIS_PORT)
        );
        assert_eq!(
            whois_address("whois://127.0.0.1:4343").unwrap(),
            ("127.0.0.1".to_string(), 4343)
        );
        assert!(whois_address("https://rdap.example/").is_err());
        assert!(whois_address("whois://").is_err());
    }
}
