//! Session economic value resolution
//!
//! Lane assignment and escalation eligibility both key off the value the
//! external identity service reports for a session. Resolution failure is
//! never an error at the pipeline level: the caller degrades to zero value,
//! which lands in the standard lane with no escalation eligibility.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ValueServiceConfig;
use crate::error::{PipelineError, PipelineResult};

/// Coarse account tier reported alongside the value. Informational only;
/// lane assignment uses the dollar figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueTier {
    Enterprise,
    MidMarket,
    Smb,
    #[default]
    Unknown,
}

/// Resolved economic value for one session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionValue {
    pub value_usd: f64,
    pub tier: ValueTier,
}

impl SessionValue {
    /// The degraded fallback: standard lane, no escalation.
    pub fn zero() -> Self {
        Self {
            value_usd: 0.0,
            tier: ValueTier::Unknown,
        }
    }
}

/// Resolves a session id to its economic value.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ValueResolver: Send + Sync {
    async fn resolve(&self, session_id: &str) -> PipelineResult<SessionValue>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueResponse {
    #[serde(default)]
    value_usd: f64,
    #[serde(default)]
    tier: Option<String>,
}

/// HTTP resolver against the identity service.
pub struct HttpValueResolver {
    client: reqwest::Client,
    base_url: String,
}

impl HttpValueResolver {
    pub fn new(config: &ValueServiceConfig) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn tier_from(label: Option<&str>) -> ValueTier {
        match label {
            Some("enterprise") => ValueTier::Enterprise,
            Some("mid_market") => ValueTier::MidMarket,
            Some("smb") => ValueTier::Smb,
            _ => ValueTier::Unknown,
        }
    }
}

#[async_trait]
impl ValueResolver for HttpValueResolver {
    async fn resolve(&self, session_id: &str) -> PipelineResult<SessionValue> {
        let url = format!("{}/v1/sessions/{}/value", self.base_url, session_id);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(PipelineError::ProviderStatus {
                provider: "value-service".into(),
                status: response.status().as_u16(),
            });
        }
        let body: ValueResponse = response.json().await?;
        Ok(SessionValue {
            value_usd: body.value_usd.max(0.0),
            tier: Self::tier_from(body.tier.as_deref()),
        })
    }
}

/// Fixed-value resolver for wiring without an identity service.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticValueResolver {
    pub value: f64,
}

#[async_trait]
impl ValueResolver for StaticValueResolver {
    async fn resolve(&self, _session_id: &str) -> PipelineResult<SessionValue> {
        Ok(SessionValue {
            value_usd: self.value,
            tier: ValueTier::Unknown,
        })
    }
}
