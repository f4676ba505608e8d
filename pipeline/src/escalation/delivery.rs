//! Out-of-band delivery channels for executive escalation.
//!
//! Three independent providers: an SMS gateway, a chat-platform webhook, and
//! an operator-notification webhook. Each exposes a single send; provider
//! errors of any shape count uniformly as a failed attempt on that channel.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::engine::CriticalAlert;
use crate::config::EscalationConfig;
use crate::error::{PipelineError, PipelineResult};

/// Identity of a delivery channel in results and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Sms,
    Chat,
    Operator,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Sms => "sms",
            ChannelKind::Chat => "chat",
            ChannelKind::Operator => "operator",
        }
    }

    pub fn all() -> [ChannelKind; 3] {
        [ChannelKind::Sms, ChannelKind::Chat, ChannelKind::Operator]
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One escalation transport. `address` comes from the contact entry: a phone
/// number for SMS, a webhook URL for chat and operator.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;
    async fn deliver(&self, alert: &CriticalAlert, address: &str) -> PipelineResult<()>;
}

fn status_check(kind: ChannelKind, response: &reqwest::Response) -> PipelineResult<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(PipelineError::ProviderStatus {
            provider: kind.as_str().into(),
            status: response.status().as_u16(),
        })
    }
}

/// Text-message delivery through a single shared gateway.
pub struct SmsChannel {
    client: reqwest::Client,
    gateway_url: String,
}

impl SmsChannel {
    pub fn new(client: reqwest::Client, config: &EscalationConfig) -> Self {
        Self {
            client,
            gateway_url: config.sms_gateway_url.clone(),
        }
    }
}

#[async_trait]
impl DeliveryChannel for SmsChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    async fn deliver(&self, alert: &CriticalAlert, address: &str) -> PipelineResult<()> {
        let response = self
            .client
            .post(&self.gateway_url)
            .json(&json!({
                "to": address,
                "message": alert.summary(),
            }))
            .send()
            .await?;
        status_check(self.kind(), &response)
    }
}

/// Chat-platform delivery; the address is the contact's incoming webhook.
pub struct ChatChannel {
    client: reqwest::Client,
}

impl ChatChannel {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeliveryChannel for ChatChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Chat
    }

    async fn deliver(&self, alert: &CriticalAlert, address: &str) -> PipelineResult<()> {
        let response = self
            .client
            .post(address)
            .json(&json!({ "text": alert.summary() }))
            .send()
            .await?;
        status_check(self.kind(), &response)
    }
}

/// Operator-console notification with the full alert as payload.
pub struct OperatorChannel {
    client: reqwest::Client,
}

impl OperatorChannel {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeliveryChannel for OperatorChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Operator
    }

    async fn deliver(&self, alert: &CriticalAlert, address: &str) -> PipelineResult<()> {
        let response = self.client.post(address).json(alert).send().await?;
        status_check(self.kind(), &response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in ChannelKind::all() {
            let json = serde_json::to_string(&kind).unwrap();
            let back: ChannelKind = serde_json::from_str(&json).unwrap();
            assert_eq!(kind, back);
        }
        assert_eq!(ChannelKind::Operator.to_string(), "operator");
    }
}
