//! Client IP extraction and privacy-preserving digests
//!
//! Which headers are believed depends on [`TrustedProxyMode`]; anything
//! else falls back to the socket address, or `"unknown"` when even that is
//! unavailable (e.g. in-process test requests).

use anyhow::{anyhow, Result};
use axum::http::HeaderMap;
use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::net::IpAddr;
use tracing::debug;

use crate::config::TrustedProxyMode;

pub const UNKNOWN_IP: &str = "unknown";

/// Extract the client IP address from HTTP headers
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<IpAddr>,
    mode: TrustedProxyMode,
) -> String {
    let from_headers = match mode {
        TrustedProxyMode::Cloudflare => header_value(headers, "cf-connecting-ip"),
        TrustedProxyMode::Standard => header_value(headers, "cf-connecting-ip")
            .or_else(|| first_forwarded_for(headers))
            .or_else(|| header_value(headers, "x-real-ip")),
        TrustedProxyMode::None => None,
    };

    match (from_headers, socket_addr) {
        (Some(ip), _) => ip,
        (None, Some(addr)) => {
            if mode == TrustedProxyMode::Cloudflare {
                debug!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
            }
            addr.to_string()
        }
        (None, None) => UNKNOWN_IP.to_string(),
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Leftmost (original client) entry of X-Forwarded-For
fn first_forwarded_for(headers: &HeaderMap) -> Option<String> {
    let xff = headers.get("x-forwarded-for")?.to_str().ok()?;
    xff.split(',')
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse the extracted address for GeoIP lookups
pub fn parse_ip(ip: &str) -> Option<IpAddr> {
    ip.parse().ok()
}

/// Keyed one-way digest of client addresses.
///
/// Unlike a bare hash, the digest of a common address cannot be
/// precomputed without the key.
#[derive(Clone)]
pub struct IpHasher {
    mac: Hmac<Sha256>,
}

impl IpHasher {
    pub fn new(secret: &str) -> Result<Self> {
        let mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|e| anyhow!("Failed to create HMAC: {}", e))?;
        Ok(Self { mac })
    }

    pub fn hash(&self, ip: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(ip.as_bytes());
        BASE64_STANDARD.encode(mac.finalize().into_bytes())
    }
}
