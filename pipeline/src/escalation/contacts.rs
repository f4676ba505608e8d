//! Executive contact directory.
//!
//! Value-tiered lookup table mapping session value to the responsible
//! executive and their per-channel addresses. Loaded once at startup from
//! TOML, or built from defaults for local runs; read-only afterwards.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::delivery::ChannelKind;
use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutiveRole {
    Ceo,
    VpSales,
    AccountManager,
}

impl ExecutiveRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutiveRole::Ceo => "ceo",
            ExecutiveRole::VpSales => "vp_sales",
            ExecutiveRole::AccountManager => "account_manager",
        }
    }
}

impl std::fmt::Display for ExecutiveRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One escalation tier: sessions worth at least `threshold_usd` go to this
/// contact. Address fields left out of the TOML disable that channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactTier {
    pub threshold_usd: f64,
    pub role: ExecutiveRole,
    pub name: String,
    #[serde(default)]
    pub sms: Option<String>,
    #[serde(default)]
    pub chat_webhook: Option<String>,
    #[serde(default)]
    pub operator_webhook: Option<String>,
}

impl ContactTier {
    pub fn address_for(&self, kind: ChannelKind) -> Option<&str> {
        match kind {
            ChannelKind::Sms => self.sms.as_deref(),
            ChannelKind::Chat => self.chat_webhook.as_deref(),
            ChannelKind::Operator => self.operator_webhook.as_deref(),
        }
    }

    fn has_addresses(&self) -> bool {
        ChannelKind::all()
            .iter()
            .any(|kind| self.address_for(*kind).is_some())
    }
}

#[derive(Debug, Deserialize)]
struct DirectoryFile {
    tiers: Vec<ContactTier>,
}

/// Tiers sorted from highest threshold down, so lookup takes the first tier
/// the session value clears.
#[derive(Debug, Clone)]
pub struct ContactDirectory {
    tiers: Vec<ContactTier>,
}

impl ContactDirectory {
    pub fn from_tiers(tiers: Vec<ContactTier>) -> PipelineResult<Self> {
        if tiers.is_empty() {
            return Err(PipelineError::Config(
                "contact directory needs at least one tier".into(),
            ));
        }
        for tier in &tiers {
            if !tier.threshold_usd.is_finite() || tier.threshold_usd <= 0.0 {
                return Err(PipelineError::Config(format!(
                    "tier {} has invalid threshold {}",
                    tier.role, tier.threshold_usd
                )));
            }
            if !tier.has_addresses() {
                return Err(PipelineError::Config(format!(
                    "tier {} has no delivery addresses",
                    tier.role
                )));
            }
        }
        let mut tiers = tiers;
        tiers.sort_by(|a, b| {
            b.threshold_usd
                .partial_cmp(&a.threshold_usd)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(Self { tiers })
    }

    /// Load and validate a directory from a TOML file.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| PipelineError::ContactsIo {
            path: display.clone(),
            source,
        })?;
        let file: DirectoryFile =
            toml::from_str(&content).map_err(|err| PipelineError::ContactsParse {
                path: display.clone(),
                message: err.to_string(),
            })?;
        Self::from_tiers(file.tiers).map_err(|err| PipelineError::ContactsParse {
            path: display,
            message: err.to_string(),
        })
    }

    /// Highest tier the value clears, descending scan. `None` means the
    /// session is below every escalation threshold.
    pub fn contact_for(&self, value_usd: f64) -> Option<&ContactTier> {
        self.tiers
            .iter()
            .find(|tier| value_usd >= tier.threshold_usd)
    }

    /// Entry bar for escalation eligibility.
    pub fn lowest_threshold(&self) -> f64 {
        self.tiers
            .last()
            .map(|tier| tier.threshold_usd)
            .unwrap_or(f64::INFINITY)
    }

    pub fn tiers(&self) -> &[ContactTier] {
        &self.tiers
    }
}

impl Default for ContactDirectory {
    /// Local-run directory pointing at loopback provider endpoints.
    fn default() -> Self {
        let tiers = vec![
            ContactTier {
                threshold_usd: 100_000.0,
                role: ExecutiveRole::Ceo,
                name: "CEO".into(),
                sms: Some("+15550100".into()),
                chat_webhook: Some("http://127.0.0.1:8720/hooks/ceo".into()),
                operator_webhook: Some("http://127.0.0.1:8730/v1/alerts".into()),
            },
            ContactTier {
                threshold_usd: 50_000.0,
                role: ExecutiveRole::VpSales,
                name: "VP Sales".into(),
                sms: Some("+15550101".into()),
                chat_webhook: Some("http://127.0.0.1:8720/hooks/vp-sales".into()),
                operator_webhook: None,
            },
            ContactTier {
                threshold_usd: 10_000.0,
                role: ExecutiveRole::AccountManager,
                name: "Account Manager".into(),
                sms: None,
                chat_webhook: Some("http://127.0.0.1:8720/hooks/am".into()),
                operator_webhook: None,
            },
        ];
        Self { tiers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_maps_to_tier() {
        let directory = ContactDirectory::default();
        assert_eq!(directory.contact_for(150_000.0).map(|t| t.role), Some(ExecutiveRole::Ceo));
        assert_eq!(
            directory.contact_for(60_000.0).map(|t| t.role),
            Some(ExecutiveRole::VpSales)
        );
        assert_eq!(
            directory.contact_for(15_000.0).map(|t| t.role),
            Some(ExecutiveRole::AccountManager)
        );
        assert!(directory.contact_for(5_000.0).is_none());
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        let directory = ContactDirectory::default();
        assert_eq!(
            directory.contact_for(100_000.0).map(|t| t.role),
            Some(ExecutiveRole::Ceo)
        );
        assert_eq!(
            directory.contact_for(10_000.0).map(|t| t.role),
            Some(ExecutiveRole::AccountManager)
        );
        assert!(directory.contact_for(9_999.99).is_none());
        assert_eq!(directory.lowest_threshold(), 10_000.0);
    }

    #[test]
    fn test_load_sorts_unordered_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.toml");
        std::fs::write(
            &path,
            r#"
[[tiers]]
threshold_usd = 10000.0
role = "account_manager"
name = "AM"
chat_webhook = "http://127.0.0.1:8720/hooks/am"

[[tiers]]
threshold_usd = 100000.0
role = "ceo"
name = "Boss"
sms = "+15550100"
"#,
        )
        .unwrap();

        let directory = ContactDirectory::load(&path).unwrap();
        assert_eq!(directory.tiers()[0].role, ExecutiveRole::Ceo);
        assert_eq!(
            directory.contact_for(120_000.0).map(|t| t.name.as_str()),
            Some("Boss")
        );
    }

    #[test]
    fn test_tier_without_addresses_rejected() {
        let tiers = vec![ContactTier {
            threshold_usd: 10_000.0,
            role: ExecutiveRole::AccountManager,
            name: "AM".into(),
            sms: None,
            chat_webhook: None,
            operator_webhook: None,
        }];
        assert!(ContactDirectory::from_tiers(tiers).is_err());
        assert!(ContactDirectory::from_tiers(Vec::new()).is_err());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = ContactDirectory::load(Path::new("/nonexistent/contacts.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/contacts.toml"));
    }
}
