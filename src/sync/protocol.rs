//! Registry -> Agent wire protocol
//! Core Principle: Always the full snapshot, never a delta

use serde::Deserialize;

use crate::policy::PolicyMap;

/// Endpoint on the agent that accepts a full policy replacement
pub const POLICY_UPDATE_PATH: &str = "/api/policy/update";

/// Build the update URL for an agent base URL
pub fn policy_update_url(agent_url: &str) -> String {
    format!("{}{}", agent_url.trim_end_matches('/'), POLICY_UPDATE_PATH)
}

/// Request body: `{ "<canonical path>": { "can_read": bool, ... }, ... }`
pub fn encode_policy_update(rules: &PolicyMap) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(rules)
}

/// Acknowledgement body returned by an agent
#[derive(Debug, Deserialize)]
pub struct AgentAck {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<AgentAckError>,
}

/// Error detail; agents send either a plain string or `{code, message}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AgentAckError {
    Text(String),
    Detailed {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

impl AgentAck {
    /// Best human-readable reason the agent gave
    pub fn reason(&self) -> String {
        match &self.error {
            Some(AgentAckError::Text(text)) => text.clone(),
            Some(AgentAckError::Detailed { code, message }) => match (code, message) {
                (Some(code), Some(message)) => format!("{}: {}", code, message),
                (None, Some(message)) => message.clone(),
                (Some(code), None) => code.clone(),
                (None, None) => "unspecified agent error".to_string(),
            },
            None => self
                .message
                .clone()
                .unwrap_or_else(|| "unspecified agent error".to_string()),
        }
    }
}

/// Parse an acknowledgement body, `None` if it is not one
pub fn decode_ack(body: &str) -> Option<AgentAck> {
    serde_json::from_str(body).ok()
}
