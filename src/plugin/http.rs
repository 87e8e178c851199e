//! HTTP call plugin.
//!
//! Executes a request described by node params:
//!
//! ```json
//! { "url": "https://api.example.com/v1", "method": "POST",
//!   "headers": { "X-Token": "..." }, "body": { "k": "v" } }
//! ```
//!
//! Target URLs pass an SSRF guard before any connection: only http/https,
//! no loopback/private/link-local addresses, no cloud metadata or cluster
//! service endpoints, no encoding tricks in the hostname.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::engine::result::ErrorKind;
use crate::engine::ExecutionContext;

use super::{Plugin, PluginResult};

/// Maximum response body retained in a result
const MAX_BODY_BYTES: usize = 1024 * 1024;

// ============================================================================
// SSRF GUARD
// ============================================================================

/// Validate a URL for outbound use. Returns the reason on rejection.
pub fn validate_outbound_url(url: &str) -> Result<(), String> {
    let parsed = url::Url::parse(url).map_err(|e| format!("invalid URL: {}", e))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(format!("scheme '{}' not allowed", scheme)),
    }

    let host = parsed.host_str().ok_or_else(|| "URL has no host".to_string())?;

    if host.contains('%') || host.contains("0x") || host.contains("0X") {
        return Err("encoded hostname not allowed".to_string());
    }

    if host == "localhost"
        || host.ends_with(".localhost")
        || host.ends_with(".localdomain")
    {
        return Err("localhost not allowed".to_string());
    }

    if let Some(url_host) = parsed.host() {
        match url_host {
            url::Host::Ipv4(ip) => {
                if is_private_ip(&IpAddr::V4(ip)) {
                    return Err(format!("private address {} not allowed", ip));
                }
            }
            url::Host::Ipv6(ip) => {
                if is_private_ip(&IpAddr::V6(ip)) {
                    return Err(format!("private address {} not allowed", ip));
                }
            }
            url::Host::Domain(domain) => {
                if let Ok(ip) = domain.parse::<IpAddr>() {
                    if is_private_ip(&ip) {
                        return Err(format!("private address {} not allowed", ip));
                    }
                }
            }
        }
    }

    if host == "169.254.169.254"
        || host.ends_with(".internal")
        || host.ends_with(".metadata")
        || host == "metadata.goog"
    {
        return Err("metadata endpoint not allowed".to_string());
    }
    if host.ends_with(".svc.cluster.local") || host.ends_with(".pod.cluster.local") {
        return Err("cluster-internal endpoint not allowed".to_string());
    }

    Ok(())
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            octets[0] == 10
                || (octets[0] == 172 && (16..=31).contains(&octets[1]))
                || (octets[0] == 192 && octets[1] == 168)
                || octets[0] == 127
                || (octets[0] == 169 && octets[1] == 254)
                || octets == [0, 0, 0, 0]
        }
        IpAddr::V6(ipv6) => {
            let octets = ipv6.octets();
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                || (octets[0] & 0xfe) == 0xfc
                || (octets[0] == 0xfe && (octets[1] & 0xc0) == 0x80)
                // fec0::/10 (site-local, deprecated but check anyway)
                || (octets[0] == 0xfe && (octets[1] & 0xc0) == 0xc0)
                || is_ipv4_mapped_private(ipv6)
        }
    }
}

fn is_ipv4_mapped_private(ipv6: &Ipv6Addr) -> bool {
    let octets = ipv6.octets();
    if octets[..10] == [0; 10] && octets[10] == 0xff && octets[11] == 0xff {
        let ipv4 = Ipv4Addr::new(octets[12], octets[13], octets[14], octets[15]);
        return is_private_ip(&IpAddr::V4(ipv4));
    }
    false
}

// ============================================================================
// PLUGIN
// ============================================================================

/// Plugin performing outbound HTTP requests for `http_call` actions
pub struct HttpCallPlugin {
    id: String,
    client: reqwest::Client,
}

impl HttpCallPlugin {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            // Redirects could re-point a vetted URL at an internal service
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();
        Self {
            id: "pl_http".to_string(),
            client,
        }
    }
}

impl Default for HttpCallPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for HttpCallPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "http-call"
    }

    async fn execute(
        &self,
        _context: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> PluginResult {
        let started = Instant::now();
        let elapsed = |s: &Instant| s.elapsed().as_millis() as u64;

        let Some(url) = params.get("url").and_then(Value::as_str) else {
            return PluginResult::failure(&self.id, ErrorKind::Validation, "missing 'url' param")
                .with_time(elapsed(&started));
        };
        if let Err(reason) = validate_outbound_url(url) {
            warn!(url, reason, "blocked outbound request");
            return PluginResult::failure(
                &self.id,
                ErrorKind::Validation,
                format!("URL rejected: {}", reason),
            )
            .with_time(elapsed(&started));
        }

        let method = params
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_uppercase();
        let mut request = match method.as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "DELETE" => self.client.delete(url),
            "PATCH" => self.client.patch(url),
            "HEAD" => self.client.head(url),
            other => {
                return PluginResult::failure(
                    &self.id,
                    ErrorKind::Validation,
                    format!("unsupported method '{}'", other),
                )
                .with_time(elapsed(&started));
            }
        };

        if let Some(headers) = params.get("headers").and_then(Value::as_object) {
            for (key, value) in headers {
                if let Some(v) = value.as_str() {
                    request = request.header(key.as_str(), v);
                }
            }
        }
        if let Some(body) = params.get("body") {
            request = request.json(body);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let body = if body.len() > MAX_BODY_BYTES {
                    body[..MAX_BODY_BYTES].to_string()
                } else {
                    body
                };
                if status.is_success() {
                    PluginResult::success(
                        &self.id,
                        Some(json!({ "status": status.as_u16(), "body": body })),
                    )
                    .with_time(elapsed(&started))
                } else {
                    let kind = match status.as_u16() {
                        401 | 403 => ErrorKind::Auth,
                        429 => ErrorKind::RateLimited,
                        _ => ErrorKind::Network,
                    };
                    PluginResult::failure(
                        &self.id,
                        kind,
                        format!("HTTP {} from {}", status.as_u16(), url),
                    )
                    .with_time(elapsed(&started))
                }
            }
            Err(e) => {
                if e.is_timeout() {
                    PluginResult::timeout(&self.id, format!("request timed out: {}", e))
                        .with_time(elapsed(&started))
                } else {
                    PluginResult::failure(
                        &self.id,
                        ErrorKind::Network,
                        format!("request failed: {}", e),
                    )
                    .with_time(elapsed(&started))
                }
            }
        }
    }

    fn supported_actions(&self) -> Vec<String> {
        vec!["http_call".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_blocks_loopback_and_private_ranges() {
        assert!(validate_outbound_url("http://localhost/api").is_err());
        assert!(validate_outbound_url("http://127.0.0.1/api").is_err());
        assert!(validate_outbound_url("http://10.0.0.8/api").is_err());
        assert!(validate_outbound_url("http://172.20.1.1/api").is_err());
        assert!(validate_outbound_url("http://192.168.1.10/api").is_err());
        assert!(validate_outbound_url("http://[::1]/api").is_err());
        assert!(validate_outbound_url("http://[fe80::1]/api").is_err());
        assert!(validate_outbound_url("http://[fec0::1]/api").is_err());
        assert!(validate_outbound_url("http://[fc00::1]/api").is_err());
    }

    #[test]
    fn guard_blocks_metadata_and_cluster_endpoints() {
        assert!(validate_outbound_url("http://169.254.169.254/latest").is_err());
        assert!(validate_outbound_url("http://metadata.goog/").is_err());
        assert!(validate_outbound_url("http://svc.default.svc.cluster.local/x").is_err());
    }

    #[test]
    fn guard_blocks_non_http_schemes_and_tricks() {
        assert!(validate_outbound_url("file:///etc/passwd").is_err());
        assert!(validate_outbound_url("gopher://example.com/").is_err());
        assert!(validate_outbound_url("http://0x7f.0x0.0x0.0x1/").is_err());
    }

    #[test]
    fn guard_allows_public_urls() {
        assert!(validate_outbound_url("https://api.example.com/v1").is_ok());
        assert!(validate_outbound_url("https://8.8.8.8/dns").is_ok());
    }

    #[tokio::test]
    async fn missing_url_is_a_validation_failure() {
        let plugin = HttpCallPlugin::new();
        let ctx = ExecutionContext::new();
        let result = plugin.execute(&ctx, &Map::new()).await;
        assert_eq!(result.error_category, Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn blocked_url_never_leaves_the_process() {
        let plugin = HttpCallPlugin::new();
        let ctx = ExecutionContext::new();
        let mut params = Map::new();
        params.insert("url".into(), json!("http://169.254.169.254/latest"));
        let result = plugin.execute(&ctx, &params).await;
        assert_eq!(result.error_category, Some(ErrorKind::Validation));
        assert!(result.error_message.unwrap().contains("rejected"));
    }
}
