//! Sync Client - pushes full policy snapshots to agents
//! Core Principle: Classify every failure as unreachable (retry) or rejected (don't)

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

use crate::error::{RegistryError, Result};
use crate::policy::{PolicySnapshot, PushStatus};
use crate::shutdown::ShutdownListener;

use super::protocol::{decode_ack, encode_policy_update, policy_update_url};

/// Longest slice of an agent response body quoted in a rejection reason
const MAX_REASON_BODY: usize = 256;

/// Result of one push
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PushOutcome {
    /// Agent acknowledged the snapshot
    Success,
    /// Connection-level failure (timeout, DNS, refused, shutdown)
    AgentUnreachable { reason: String },
    /// Agent reachable but refused the payload
    AgentRejected { status: u16, reason: String },
}

impl PushOutcome {
    pub fn status(&self) -> PushStatus {
        match self {
            PushOutcome::Success => PushStatus::Success,
            PushOutcome::AgentUnreachable { .. } => PushStatus::AgentUnreachable,
            PushOutcome::AgentRejected { .. } => PushStatus::AgentRejected,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PushOutcome::Success)
    }

    pub fn into_result(self, agent_id: &str) -> Result<()> {
        match self {
            PushOutcome::Success => Ok(()),
            PushOutcome::AgentUnreachable { reason } => Err(RegistryError::AgentUnreachable {
                agent_id: agent_id.to_string(),
                reason,
            }),
            PushOutcome::AgentRejected { status, reason } => Err(RegistryError::AgentRejected {
                agent_id: agent_id.to_string(),
                status,
                reason,
            }),
        }
    }
}

/// HTTP client for policy pushes
pub struct SyncClient {
    http: reqwest::Client,
    push_timeout: Duration,
    shutdown: ShutdownListener,
}

impl SyncClient {
    /// Create a client whose pushes time out after `push_timeout` and are
    /// cancelled when `shutdown` fires
    pub fn new(push_timeout: Duration, shutdown: ShutdownListener) -> Result<Self> {
        if push_timeout.is_zero() {
            return Err(RegistryError::InvalidArgument(
                "push timeout must be greater than zero".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(push_timeout)
            .build()
            .map_err(|e| RegistryError::InvalidArgument(format!("failed to build HTTP client: {}", e)))?;

        Ok(SyncClient {
            http,
            push_timeout,
            shutdown,
        })
    }

    pub fn push_timeout(&self) -> Duration {
        self.push_timeout
    }

    /// Send `snapshot` to the agent at `agent_url` as a full replacement.
    ///
    /// Never fails; every failure is an outcome.
    pub async fn push(&self, agent_url: &str, agent_id: &str, snapshot: &PolicySnapshot) -> PushOutcome {
        let mut shutdown = self.shutdown.clone();
        if shutdown.is_shutdown() {
            return PushOutcome::AgentUnreachable {
                reason: "push cancelled: registry shutting down".to_string(),
            };
        }

        let body = match encode_policy_update(snapshot.rules()) {
            Ok(body) => body,
            Err(e) => {
                return PushOutcome::AgentRejected {
                    status: 0,
                    reason: format!("failed to encode policy snapshot: {}", e),
                }
            }
        };

        let url = policy_update_url(agent_url);
        log::debug!(
            "📤 Pushing {} rules (generation {}) to agent {} at {}",
            snapshot.len(),
            snapshot.generation(),
            agent_id,
            url
        );

        tokio::select! {
            _ = shutdown.wait() => PushOutcome::AgentUnreachable {
                reason: "push cancelled: registry shutting down".to_string(),
            },
            outcome = self.exchange(&url, body) => outcome,
        }
    }

    async fn exchange(&self, url: &str, body: Vec<u8>) -> PushOutcome {
        let response = match self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return self.classify_transport_error(e),
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return self.classify_transport_error(e),
        };

        if !status.is_success() {
            let reason = decode_ack(&text)
                .map(|ack| ack.reason())
                .unwrap_or_else(|| format!("HTTP {}: {}", status, truncate(&text)));
            return PushOutcome::AgentRejected {
                status: status.as_u16(),
                reason,
            };
        }

        match decode_ack(&text) {
            Some(ack) if ack.success => PushOutcome::Success,
            Some(ack) => PushOutcome::AgentRejected {
                status: status.as_u16(),
                reason: ack.reason(),
            },
            None => PushOutcome::AgentRejected {
                status: status.as_u16(),
                reason: format!("malformed acknowledgement: {}", truncate(&text)),
            },
        }
    }

    fn classify_transport_error(&self, e: reqwest::Error) -> PushOutcome {
        if e.is_builder() {
            // Bad URL, retrying cannot help
            return PushOutcome::AgentRejected {
                status: 0,
                reason: format!("invalid agent request: {}", e),
            };
        }

        let reason = if e.is_timeout() {
            format!("timed out after {}ms", self.push_timeout.as_millis())
        } else if e.is_connect() {
            format!("connection failed: {}", e)
        } else {
            format!("transport error: {}", e)
        };
        PushOutcome::AgentUnreachable { reason }
    }
}

fn truncate(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return "<empty body>".to_string();
    }
    match text.char_indices().nth(MAX_REASON_BODY) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
