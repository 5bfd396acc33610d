//! HTTP transport for the availability endpoint, built on `ureq`.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use chrono::Utc;
use cpo_common::SiteId;
use cpo_config::SourceConfig;
use tracing::{debug, info};

use super::{scope_of, AvailabilitySource, FetchError, FetchedPayload};

const ACCEPT: &str = "text/html,application/json;q=0.9,*/*;q=0.8";

/// Blocking GET against the configured endpoint with a bounded timeout.
pub struct HttpSource {
    agent: ureq::Agent,
    endpoint: String,
    category: String,
    referer: Option<String>,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(config: &SourceConfig) -> Self {
        let timeout = config.timeout();
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(&config.user_agent)
            .build();
        Self {
            agent,
            endpoint: config.endpoint.clone(),
            category: config.category.clone(),
            referer: config.referer.clone(),
            timeout,
        }
    }

    fn timeout_error(&self, site_ids: &[SiteId]) -> FetchError {
        FetchError::Timeout {
            scope: scope_of(site_ids),
            seconds: self.timeout.as_secs(),
        }
    }
}

impl AvailabilitySource for HttpSource {
    fn retrieve(&self, site_ids: &[SiteId]) -> Result<FetchedPayload, FetchError> {
        let ids = scope_of(site_ids);
        // Defeats intermediate caches between scheduled runs.
        let cache_bust = Utc::now().format("%Y%m%d%H%M%S").to_string();

        let mut request = self
            .agent
            .get(&self.endpoint)
            .query("carparkIdParam", &ids)
            .query("categoryParam", &self.category)
            .query("t", &cache_bust)
            .set("Accept", ACCEPT);
        if let Some(referer) = &self.referer {
            request = request.set("Referer", referer);
        }

        info!(endpoint = %self.endpoint, sites = %ids, "fetching availability");
        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(FetchError::Status { scope: ids, status });
            }
            Err(ureq::Error::Transport(transport)) => {
                if is_timeout(&transport) {
                    return Err(self.timeout_error(site_ids));
                }
                return Err(FetchError::Transport {
                    scope: ids,
                    message: transport.to_string(),
                });
            }
        };

        let content_type = Some(response.content_type().to_string()).filter(|c| !c.is_empty());
        let body = response.into_string().map_err(|source| {
            if matches!(source.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) {
                self.timeout_error(site_ids)
            } else {
                FetchError::Body {
                    scope: scope_of(site_ids),
                    source,
                }
            }
        })?;

        debug!(bytes = body.len(), content_type = ?content_type, "response received");
        Ok(FetchedPayload { body, content_type })
    }
}

/// Whether a transport failure was caused by the read/connect timeout.
fn is_timeout(transport: &ureq::Transport) -> bool {
    let mut cause: Option<&(dyn StdError + 'static)> = transport.source();
    while let Some(err) = cause {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if matches!(io_err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) {
                return true;
            }
        }
        cause = err.source();
    }
    transport.to_string().contains("timed out")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    fn config_for(endpoint: String, timeout_secs: u64) -> SourceConfig {
        SourceConfig {
            endpoint,
            timeout_secs,
            ..SourceConfig::default()
        }
    }

    /// Serve a single canned HTTP response on a local port. The request head
    /// the server received is sent back over the channel.
    fn serve_once(response: &'static str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = tx.send(String::from_utf8_lossy(&head).into_owned());
                let _ = stream.write_all(response.as_bytes());
            }
        });
        (format!("http://{addr}/availability"), rx)
    }

    /// Decode one `application/x-www-form-urlencoded` value.
    fn form_decode(value: &str) -> String {
        let bytes = value.as_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'+' => out.push(b' '),
                b'%' if i + 2 < bytes.len() => {
                    let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap();
                    out.push(u8::from_str_radix(hex, 16).unwrap());
                    i += 2;
                }
                b => out.push(b),
            }
            i += 1;
        }
        String::from_utf8(out).unwrap()
    }

    fn query_param(request_line: &str, name: &str) -> Option<String> {
        let target = request_line.split(' ').nth(1)?;
        let (_, query) = target.split_once('?')?;
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| form_decode(value))
    }

    fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
        head.lines()
            .skip(1)
            .filter_map(|line| line.split_once(':'))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
            .map(|(_, value)| value.trim())
    }

    #[test]
    fn test_successful_retrieval() {
        let (endpoint, _request) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 2\r\nConnection: close\r\n\r\n[]",
        );
        let source = HttpSource::new(&config_for(endpoint, 5));
        let payload = source.retrieve(&[SiteId::new("civic")]).unwrap();
        assert_eq!(payload.body, "[]");
        assert_eq!(payload.content_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn test_request_carries_query_and_headers() {
        let (endpoint, request) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 2\r\nConnection: close\r\n\r\n[]",
        );
        let config = config_for(endpoint, 5);
        let source = HttpSource::new(&config);
        source
            .retrieve(&[SiteId::new("civic"), SiteId::new("victoria st")])
            .unwrap();

        let head = request.recv_timeout(Duration::from_secs(5)).unwrap();
        let request_line = head.lines().next().unwrap();
        assert!(request_line.starts_with("GET /availability?"), "{request_line}");

        assert_eq!(
            query_param(request_line, "carparkIdParam").as_deref(),
            Some("civic, victoria st")
        );
        assert_eq!(
            query_param(request_line, "categoryParam").as_deref(),
            Some(config.category.as_str())
        );
        let t = query_param(request_line, "t").unwrap();
        assert_eq!(t.len(), 14, "{t}");
        assert!(t.bytes().all(|b| b.is_ascii_digit()), "{t}");

        assert_eq!(header(&head, "accept"), Some(ACCEPT));
        assert_eq!(header(&head, "referer"), config.referer.as_deref());
        assert_eq!(header(&head, "user-agent"), Some(config.user_agent.as_str()));
    }

    #[test]
    fn test_referer_omitted_when_unset() {
        let (endpoint, request) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\n[]",
        );
        let config = SourceConfig {
            referer: None,
            ..config_for(endpoint, 5)
        };
        HttpSource::new(&config).retrieve(&[SiteId::new("civic")]).unwrap();

        let head = request.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(header(&head, "referer"), None);
    }

    #[test]
    fn test_error_status_is_reported() {
        let (endpoint, _request) = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        let source = HttpSource::new(&config_for(endpoint, 5));
        let err = source.retrieve(&[SiteId::new("civic")]).unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
    }

    #[test]
    fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let holder = thread::spawn(move || {
            let accepted = listener.accept();
            thread::sleep(Duration::from_secs(3));
            drop(accepted);
        });

        let source = HttpSource::new(&config_for(format!("http://{addr}/"), 1));
        let err = source.retrieve(&[SiteId::new("civic")]).unwrap_err();
        assert!(matches!(err, FetchError::Timeout { seconds: 1, .. }), "{err}");
        holder.join().unwrap();
    }
}
