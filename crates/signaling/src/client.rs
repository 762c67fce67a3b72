//! WHIP/WHEP signaling client
//!
//! One POST creates a session: the body is the SDP offer, the response
//! body is the SDP answer, and the `Location` header names the session
//! resource for later teardown. HTTP-level failures are retried with
//! bounded exponential backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::retry::RetryPolicy;
use crate::{Error, Result};

/// Session direction on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// Publish media (WHIP)
    Whip,
    /// View media (WHEP)
    Whep,
}

impl SessionKind {
    /// Protocol path segment under the signaling base URL
    pub fn path_segment(&self) -> &'static str {
        match self {
            SessionKind::Whip => "whip",
            SessionKind::Whep => "whep",
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalingConfig {
    /// Signaling server base URL (http:// or https://)
    pub base_url: String,

    /// Bearer token sent with every request, if the server requires one
    pub bearer_token: Option<String>,

    /// Per-request timeout in milliseconds (default: 10000ms)
    pub timeout_ms: u64,

    /// Retry policy for offer POSTs
    #[serde(skip)]
    pub retry: RetryPolicy,
}

impl SignalingConfig {
    /// Configuration with defaults for the given base URL
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            bearer_token: None,
            timeout_ms: 10000,
            retry: RetryPolicy::default(),
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "base_url must start with http:// or https://, got {}",
                self.base_url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// An established signaling session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingSession {
    /// Direction this session was created with
    pub kind: SessionKind,
    /// Answer SDP returned by the server
    pub answer_sdp: String,
    /// Absolute session resource URL from the `Location` header, when the
    /// server provided one
    pub resource_url: Option<String>,
}

/// WHIP/WHEP offer-exchange client
pub struct SignalingClient {
    config: SignalingConfig,
    http: reqwest::Client,
}

impl SignalingClient {
    /// Create a client after validating the configuration
    pub fn new(config: SignalingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            http: reqwest::Client::new(),
        })
    }

    /// The offer endpoint for the given direction: `{base}/{whip|whep}`
    pub fn endpoint_url(&self, kind: SessionKind) -> Result<Url> {
        let joined = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            kind.path_segment()
        );
        Url::parse(&joined).map_err(|e| Error::InvalidConfig(format!("invalid base_url: {}", e)))
    }

    /// Create a session by posting an SDP offer
    ///
    /// Retries HTTP-level failures with the configured backoff; a 200 or
    /// 201 response stops the loop and yields the answer SDP plus the
    /// captured `Location` resource URL.
    pub async fn publish(&self, kind: SessionKind, offer_sdp: &str) -> Result<SignalingSession> {
        let url = self.endpoint_url(kind)?;
        let mut last_error: Option<Error> = None;

        for attempt in 1..=self.config.retry.max_attempts {
            if attempt > 1 {
                let delay = self.config.retry.delay_for(attempt - 1);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying offer POST");
                tokio::time::sleep(delay).await;
            }

            match self.try_post(&url, kind, offer_sdp).await {
                Ok(session) => {
                    info!(
                        kind = kind.path_segment(),
                        resource = session.resource_url.as_deref().unwrap_or("<none>"),
                        "signaling session established"
                    );
                    return Ok(session);
                }
                Err(e) if e.is_retryable() => {
                    warn!(attempt, error = %e, "offer POST failed");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::RetriesExhausted {
            attempts: self.config.retry.max_attempts,
            last: Box::new(last_error.unwrap_or(Error::Transport("no attempt made".to_string()))),
        })
    }

    /// Tear a session down via DELETE on its resource URL, best-effort
    pub async fn terminate(&self, session: &SignalingSession) -> Result<()> {
        let Some(resource_url) = session.resource_url.as_deref() else {
            debug!("session has no resource URL; nothing to terminate");
            return Ok(());
        };

        let response = self
            .request(self.http.delete(resource_url))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("DELETE {} failed: {}", resource_url, e)))?;

        if !response.status().is_success() {
            warn!(
                status = response.status().as_u16(),
                resource = resource_url,
                "session DELETE was not acknowledged"
            );
        }
        Ok(())
    }

    async fn try_post(
        &self,
        url: &Url,
        kind: SessionKind,
        offer_sdp: &str,
    ) -> Result<SignalingSession> {
        let response = self
            .request(self.http.post(url.clone()))
            .header(reqwest::header::CONTENT_TYPE, "application/sdp")
            .header(reqwest::header::ACCEPT, "application/sdp")
            .body(offer_sdp.to_string())
            .send()
            .await
            .map_err(|e| Error::Transport(format!("POST {} failed: {}", url, e)))?;

        let status = response.status();
        if !matches!(status.as_u16(), 200 | 201) {
            return Err(Error::Http {
                status: status.as_u16(),
            });
        }

        let resource_url = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|location| resolve_location(url, location));

        let answer_sdp = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("failed to read answer body: {}", e)))?;

        Ok(SignalingSession {
            kind,
            answer_sdp,
            resource_url,
        })
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.timeout(Duration::from_millis(self.config.timeout_ms));
        match &self.config.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

/// Resolve a `Location` header value against the request URL
///
/// Absolute values are kept verbatim; relative ones are joined against the
/// endpoint the offer was posted to.
fn resolve_location(request_url: &Url, location: &str) -> Option<String> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return Some(location.to_string());
    }
    match request_url.join(location) {
        Ok(url) => Some(url.to_string()),
        Err(e) => {
            warn!(location, error = %e, "could not resolve Location header");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segments() {
        assert_eq!(SessionKind::Whip.path_segment(), "whip");
        assert_eq!(SessionKind::Whep.path_segment(), "whep");
    }

    #[test]
    fn test_config_validation() {
        assert!(SignalingConfig::new("https://relay.example.com")
            .validate()
            .is_ok());
        assert!(SignalingConfig::new("ws://relay.example.com")
            .validate()
            .is_err());

        let mut config = SignalingConfig::new("https://relay.example.com");
        config.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_url_joins_segment() {
        let client =
            SignalingClient::new(SignalingConfig::new("https://relay.example.com/")).unwrap();
        assert_eq!(
            client.endpoint_url(SessionKind::Whip).unwrap().as_str(),
            "https://relay.example.com/whip"
        );
        assert_eq!(
            client.endpoint_url(SessionKind::Whep).unwrap().as_str(),
            "https://relay.example.com/whep"
        );
    }

    #[test]
    fn test_resolve_location_absolute_kept_verbatim() {
        let base = Url::parse("https://relay.example.com/whip").unwrap();
        assert_eq!(
            resolve_location(&base, "https://other.example.com/session/1"),
            Some("https://other.example.com/session/1".to_string())
        );
    }

    #[test]
    fn test_config_serialization_defaults_retry() {
        let mut config = SignalingConfig::new("https://relay.example.com");
        config.retry.max_attempts = 7;

        let json = serde_json::to_string(&config).unwrap();
        let back: SignalingConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(back.base_url, config.base_url);
        // The retry policy is runtime tuning, not wire config.
        assert_eq!(back.retry, RetryPolicy::default());
    }

    #[test]
    fn test_resolve_location_relative_joined() {
        let base = Url::parse("https://relay.example.com/whip").unwrap();
        assert_eq!(
            resolve_location(&base, "/session/abc"),
            Some("https://relay.example.com/session/abc".to_string())
        );
    }
}
