//! Loopback fixtures standing in for registries and bootstrap feeds

#![allow(dead_code)]

use rdap_service::{
    bootstrap::{BootstrapLoader, Registry, ServiceMap},
    domain::SuffixList,
    CacheService, Config, LookupClient,
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::mpsc,
};

pub const FIXTURE_PSL: &str = "// ===BEGIN ICANN DOMAINS===\n\
com\nuk\nco.uk\nde\nau\ncom.au\ntest\n\
// ===END ICANN DOMAINS===\n";

/// The classification fixture used across tests
pub fn services_fixture() -> ServiceMap {
    let mut services = ServiceMap::default();
    services.ipv4.insert("1.0.0.0/8".into(), "https://rdap.apnic.net/".into());
    services.ipv4.insert("8.0.0.0/8".into(), "https://rdap.arin.net/registry/".into());
    services
        .ipv6
        .insert("2a0e:1d47:d502:7400::/56".into(), "https://rdap.db.ripe.net/".into());
    services.domains.insert("co.uk".into(), "https://rdap.nominet.uk/uk/".into());
    services.domains.insert("com".into(), "https://rdap.verisign.com/com/v1/".into());
    services.asn.insert("13335-13335".into(), "https://rdap.arin.net/registry/".into());
    services.asn.insert("212655-212655".into(), "https://rdap.db.ripe.net/".into());
    services
}

pub fn suffixes() -> SuffixList {
    SuffixList::parse(FIXTURE_PSL).expect("fixture PSL parses")
}

/// Client over a pre-seeded registry; nothing is fetched from upstream
pub fn client_with(services: ServiceMap, config: Config) -> LookupClient {
    let config = Arc::new(config);
    let cache = CacheService::new(config.clone());
    let registry = Registry::new(services, suffixes(), config.rdap_http_allowlist.clone());
    let loader = Arc::new(BootstrapLoader::with_registry(config.clone(), cache.clone(), registry).expect("loader"));
    LookupClient::from_parts(config, loader, cache).expect("client")
}

/// WHOIS server answering each connection with `response`. Every received
/// query line is forwarded on the returned channel.
pub async fn spawn_whois(response: &'static str) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind whois fixture");
    let addr = listener.local_addr().expect("whois fixture addr");
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let line = read_until(&mut socket, b"\r\n").await;
                let _ = tx.send(line);
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, rx)
}

/// A canned HTTP reply
#[derive(Clone)]
pub struct Canned {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Canned {
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "application/json",
            body: body.into(),
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/plain",
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: String::new(),
        }
    }
}

/// What the HTTP fixture saw
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub accept: Option<String>,
}

/// Minimal HTTP/1.1 responder; unknown paths get a 404
pub async fn spawn_http(routes: HashMap<String, Canned>) -> (SocketAddr, Arc<Mutex<Vec<SeenRequest>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind http fixture");
    let addr = listener.local_addr().expect("http fixture addr");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let routes = Arc::new(routes);
    let log = seen.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let routes = routes.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let head = read_until(&mut socket, b"\r\n\r\n").await;
                let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                let accept = head
                    .lines()
                    .filter_map(|l| l.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("accept"))
                    .map(|(_, value)| value.trim().to_string());
                log.lock().unwrap().push(SeenRequest {
                    path: path.clone(),
                    accept,
                });

                let reply = routes.get(&path).cloned().unwrap_or_else(|| Canned::status(404));
                let response = format!(
                    "HTTP/1.1 {} Fixture\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    reply.status,
                    reply.content_type,
                    reply.body.len(),
                    reply.body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, seen)
}

async fn read_until(socket: &mut TcpStream, terminator: &[u8]) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                data.extend_from_slice(&buf[..n]);
                if data.windows(terminator.len()).any(|w| w == terminator) {
                    break;
                }
            }
        }
    }
    String::from_utf8_lossy(&data).into_owned()
}
