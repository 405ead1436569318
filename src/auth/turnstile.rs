use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::analytics::ip_extractor::UNKNOWN_IP;
use crate::config::TurnstileConfig;

/// Human-verification check run before credentials at login
#[async_trait]
pub trait HumanVerifier: Send + Sync {
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> bool;
}

/// Cloudflare Turnstile siteverify client
#[derive(Clone)]
pub struct TurnstileVerifier {
    secret: String,
    verify_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    #[serde(default)]
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

impl TurnstileVerifier {
    pub fn from_config(config: &TurnstileConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("shortlink-turnstile/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client for Turnstile verification")?;

        Ok(Self {
            secret: config.secret.clone(),
            verify_url: config.verify_url.clone(),
            client,
        })
    }

    async fn siteverify(&self, token: &str, remote_ip: Option<&str>) -> Result<SiteverifyResponse> {
        let mut form = vec![("secret", self.secret.as_str()), ("response", token)];
        if let Some(ip) = remote_ip.filter(|ip| *ip != UNKNOWN_IP) {
            form.push(("remoteip", ip));
        }

        let response = self
            .client
            .post(&self.verify_url)
            .form(&form)
            .send()
            .await
            .context("failed to reach Turnstile siteverify")?
            .error_for_status()
            .context("Turnstile siteverify returned an error status")?;

        response
            .json::<SiteverifyResponse>()
            .await
            .context("failed to parse Turnstile siteverify response")
    }
}

#[async_trait]
impl HumanVerifier for TurnstileVerifier {
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> bool {
        if token.is_empty() {
            return false;
        }

        match self.siteverify(token, remote_ip).await {
            Ok(result) => {
                if !result.success {
                    debug!("Turnstile rejected token: {:?}", result.error_codes);
                }
                result.success
            }
            Err(e) => {
                warn!("Turnstile verification failed: {:#}", e);
                false
            }
        }
    }
}
