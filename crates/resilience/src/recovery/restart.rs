//! ICE restart renegotiation
//!
//! Creates a restart offer (fresh ICE credentials), installs it locally,
//! and delivers it to the configured endpoint as `application/sdp`. A
//! non-empty response body is the answer SDP and is applied to the peer
//! connection.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;
use webrtc::peer_connection::offer_answer_options::RTCOfferOptions;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::peer_connection::RTCPeerConnection;

use crate::config::{ResilienceConfig, RestartEndpoint};
use crate::{Error, Result};

/// How an ICE restart attempt concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartOutcome {
    /// Offer delivered; the returned answer (if any) was applied
    Completed,
    /// No endpoint configured: restart offer installed locally only
    LocalOnly,
    /// Renegotiation already in progress; nothing was done
    Skipped,
}

/// Performs the ICE-restart renegotiation handshake
pub struct IceRestartClient {
    http: reqwest::Client,
}

impl IceRestartClient {
    /// Create a client with a fresh HTTP connection pool
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Run one restart attempt against the peer connection
    ///
    /// A no-op (`Skipped`) while a remote-initiated renegotiation is in
    /// progress, since installing our own offer there would wedge the
    /// connection. An own restart offer still pending from a failed
    /// delivery is re-delivered instead of stacking a new negotiation.
    /// Delivery failures (non-2xx, transport error, timeout) are returned
    /// as retryable errors for the recovery controller.
    pub async fn restart(
        &self,
        pc: &Arc<RTCPeerConnection>,
        config: &ResilienceConfig,
    ) -> Result<RestartOutcome> {
        let offer_sdp = match pc.signaling_state() {
            RTCSignalingState::Stable => {
                let offer = pc
                    .create_offer(Some(RTCOfferOptions {
                        ice_restart: true,
                        ..Default::default()
                    }))
                    .await
                    .map_err(|e| Error::Sdp(format!("failed to create restart offer: {}", e)))?;
                let sdp = offer.sdp.clone();
                pc.set_local_description(offer)
                    .await
                    .map_err(|e| Error::Sdp(format!("failed to install restart offer: {}", e)))?;
                sdp
            }
            RTCSignalingState::HaveLocalOffer => {
                // Our previous restart offer never got an answer.
                match pc.local_description().await {
                    Some(pending) => {
                        debug!("re-delivering pending restart offer");
                        pending.sdp
                    }
                    None => return Ok(RestartOutcome::Skipped),
                }
            }
            other => {
                debug!(state = ?other, "skipping ICE restart: renegotiation in progress");
                return Ok(RestartOutcome::Skipped);
            }
        };

        let Some(endpoint) = resolve_endpoint(config)? else {
            warn!("no ICE restart endpoint configured; restart is local-only");
            return Ok(RestartOutcome::LocalOnly);
        };

        info!(endpoint = %endpoint, "delivering ICE restart offer");

        let request = self
            .http
            .post(endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/sdp")
            .body(offer_sdp)
            .send();
        let response = tokio::time::timeout(
            Duration::from_millis(config.connection_timeout_ms),
            request,
        )
        .await
        .map_err(|_| Error::RestartTimeout(config.connection_timeout_ms))?
        .map_err(|e| Error::RestartDelivery(format!("POST {} failed: {}", endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::RestartDelivery(format!(
                "endpoint returned {}",
                status
            )));
        }

        let answer_sdp = response
            .text()
            .await
            .map_err(|e| Error::RestartDelivery(format!("failed to read answer body: {}", e)))?;

        if !answer_sdp.trim().is_empty() {
            let answer = RTCSessionDescription::answer(answer_sdp)
                .map_err(|e| Error::Sdp(format!("invalid restart answer: {}", e)))?;
            pc.set_remote_description(answer)
                .await
                .map_err(|e| Error::Sdp(format!("failed to apply restart answer: {}", e)))?;
            debug!("restart answer applied");
        }

        Ok(RestartOutcome::Completed)
    }
}

impl Default for IceRestartClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the delivery URL from the config, or `None` for local-only
///
/// A resource endpoint (typically a captured `Location` value) is used
/// verbatim; a base endpoint gets `/{whip|whep}/{session_id}` appended.
fn resolve_endpoint(config: &ResilienceConfig) -> Result<Option<Url>> {
    let endpoint = match &config.ice_restart_endpoint {
        Some(endpoint) => endpoint,
        None => return Ok(None),
    };

    let url = match endpoint {
        RestartEndpoint::Resource { url } => Url::parse(url)
            .map_err(|e| Error::InvalidConfig(format!("invalid restart endpoint: {}", e)))?,
        RestartEndpoint::Base { url } => {
            let session_id = config.session_id.as_deref().ok_or_else(|| {
                Error::InvalidConfig("a base ICE restart endpoint requires a session_id".into())
            })?;
            let joined = format!(
                "{}/{}/{}",
                url.trim_end_matches('/'),
                config.connection_type.path_segment(),
                session_id
            );
            Url::parse(&joined)
                .map_err(|e| Error::InvalidConfig(format!("invalid restart endpoint: {}", e)))?
        }
    };

    Ok(Some(url))
}
