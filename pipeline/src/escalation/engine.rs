//! Executive escalation engine.
//!
//! High-value sessions showing a critical emotion get pushed to a human.
//! Every channel configured for the responsible contact is attempted
//! concurrently; the first success wins the race. Losing attempts keep
//! running so their outcomes still land in the log, but their results are
//! discarded. The whole race runs against one hard deadline.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::contacts::ContactDirectory;
use super::delivery::{
    ChannelKind, ChatChannel, DeliveryChannel, OperatorChannel, SmsChannel,
};
use crate::classify::{Emotion, EmotionalEvent};
use crate::config::EscalationConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::PipelineCounters;

/// Alert payload handed to delivery channels and operator consoles.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalAlert {
    pub alert_id: Uuid,
    pub session_id: String,
    pub tenant_id: String,
    pub emotion: Emotion,
    pub confidence: u8,
    pub value_usd: f64,
    pub page_url: String,
    pub triggered_at: DateTime<Utc>,
}

impl CriticalAlert {
    pub fn from_event(event: &EmotionalEvent, value_usd: f64) -> Self {
        Self {
            alert_id: Uuid::new_v4(),
            session_id: event.session_id.clone(),
            tenant_id: event.tenant_id.clone(),
            emotion: event.emotion,
            confidence: event.confidence,
            value_usd,
            page_url: event.page_url.clone(),
            triggered_at: Utc::now(),
        }
    }

    /// One-line rendering for text-bodied channels.
    pub fn summary(&self) -> String {
        format!(
            "High-value session {} showing {} at {}% confidence (${:.0}) on {}",
            self.session_id, self.emotion, self.confidence, self.value_usd, self.page_url
        )
    }
}

/// Outcome of one escalation race.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DeliveryResult {
    /// First channel to land, with end-to-end time from trigger.
    #[serde(rename_all = "camelCase")]
    Delivered { channel: ChannelKind, elapsed_ms: u64 },
    /// Every attempt failed, or the deadline fired first.
    #[serde(rename_all = "camelCase")]
    Failed {
        channels_attempted: usize,
        deadline_exceeded: bool,
    },
}

struct ChannelAttempt {
    kind: ChannelKind,
    elapsed: Duration,
    result: PipelineResult<()>,
}

pub struct EscalationEngine {
    directory: ContactDirectory,
    channels: Vec<Arc<dyn DeliveryChannel>>,
    config: EscalationConfig,
    counters: Arc<PipelineCounters>,
}

impl EscalationEngine {
    pub fn new(
        directory: ContactDirectory,
        channels: Vec<Arc<dyn DeliveryChannel>>,
        config: EscalationConfig,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        Self {
            directory,
            channels,
            config,
            counters,
        }
    }

    /// Engine wired to the real SMS gateway and webhook providers.
    pub fn with_http_channels(
        directory: ContactDirectory,
        config: EscalationConfig,
        counters: Arc<PipelineCounters>,
    ) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let channels: Vec<Arc<dyn DeliveryChannel>> = vec![
            Arc::new(SmsChannel::new(client.clone(), &config)),
            Arc::new(ChatChannel::new(client.clone())),
            Arc::new(OperatorChannel::new(client)),
        ];
        Ok(Self::new(directory, channels, config, counters))
    }

    /// Both gates must hold before an alert is worth a human interruption.
    pub fn eligible(&self, emotion: Emotion, value_usd: f64) -> bool {
        emotion.is_critical() && value_usd >= self.directory.lowest_threshold()
    }

    /// Race every configured channel for the responsible contact.
    pub async fn escalate(&self, alert: CriticalAlert) -> DeliveryResult {
        PipelineCounters::incr(&self.counters.escalations_triggered);

        let Some(tier) = self.directory.contact_for(alert.value_usd) else {
            warn!(
                session_id = %alert.session_id,
                value_usd = alert.value_usd,
                "no escalation tier covers this value"
            );
            PipelineCounters::incr(&self.counters.escalations_failed);
            return DeliveryResult::Failed {
                channels_attempted: 0,
                deadline_exceeded: false,
            };
        };
        info!(
            alert_id = %alert.alert_id,
            session_id = %alert.session_id,
            emotion = %alert.emotion,
            confidence = alert.confidence,
            value_usd = alert.value_usd,
            role = %tier.role,
            "escalating critical session"
        );

        let started = Instant::now();
        let alert = Arc::new(alert);
        let (tx, mut rx) = mpsc::channel(self.channels.len().max(1));
        let mut launched = 0usize;
        for channel in &self.channels {
            let Some(address) = tier.address_for(channel.kind()) else {
                continue;
            };
            let address = address.to_string();
            let channel = Arc::clone(channel);
            let alert = Arc::clone(&alert);
            let tx = tx.clone();
            launched += 1;
            tokio::spawn(async move {
                let attempt_started = Instant::now();
                let result = channel.deliver(&alert, &address).await;
                let _ = tx
                    .send(ChannelAttempt {
                        kind: channel.kind(),
                        elapsed: attempt_started.elapsed(),
                        result,
                    })
                    .await;
            });
        }
        drop(tx);

        if launched == 0 {
            warn!(alert_id = %alert.alert_id, role = %tier.role, "contact has no configured channels");
            PipelineCounters::incr(&self.counters.escalations_failed);
            return DeliveryResult::Failed {
                channels_attempted: 0,
                deadline_exceeded: false,
            };
        }

        let deadline = tokio::time::sleep(self.config.deadline());
        tokio::pin!(deadline);
        let mut failures = 0usize;
        loop {
            tokio::select! {
                attempt = rx.recv() => {
                    let Some(attempt) = attempt else {
                        PipelineCounters::incr(&self.counters.escalations_failed);
                        return DeliveryResult::Failed {
                            channels_attempted: launched,
                            deadline_exceeded: false,
                        };
                    };
                    let attempt_ms = attempt.elapsed.as_millis() as u64;
                    match attempt.result {
                        Ok(()) => {
                            let elapsed_ms = started.elapsed().as_millis() as u64;
                            info!(
                                alert_id = %alert.alert_id,
                                channel = %attempt.kind,
                                attempt_ms,
                                elapsed_ms,
                                "escalation delivered"
                            );
                            PipelineCounters::incr(&self.counters.escalations_delivered);
                            Self::log_late_attempts(alert.alert_id, rx);
                            return DeliveryResult::Delivered {
                                channel: attempt.kind,
                                elapsed_ms,
                            };
                        }
                        Err(err) => {
                            warn!(
                                alert_id = %alert.alert_id,
                                channel = %attempt.kind,
                                attempt_ms,
                                error = %err,
                                "escalation channel failed"
                            );
                            failures += 1;
                            if failures == launched {
                                PipelineCounters::incr(&self.counters.escalations_failed);
                                return DeliveryResult::Failed {
                                    channels_attempted: launched,
                                    deadline_exceeded: false,
                                };
                            }
                        }
                    }
                }
                _ = &mut deadline => {
                    warn!(
                        alert_id = %alert.alert_id,
                        deadline_ms = self.config.deadline_ms,
                        "escalation deadline exceeded with no delivery"
                    );
                    PipelineCounters::incr(&self.counters.escalations_failed);
                    Self::log_late_attempts(alert.alert_id, rx);
                    return DeliveryResult::Failed {
                        channels_attempted: launched,
                        deadline_exceeded: true,
                    };
                }
            }
        }
    }

    /// Losers keep running after the race is decided; their durations still
    /// get recorded here.
    fn log_late_attempts(alert_id: Uuid, mut rx: mpsc::Receiver<ChannelAttempt>) {
        tokio::spawn(async move {
            while let Some(attempt) = rx.recv().await {
                let attempt_ms = attempt.elapsed.as_millis() as u64;
                match attempt.result {
                    Ok(()) => debug!(
                        %alert_id,
                        channel = %attempt.kind,
                        attempt_ms,
                        "late escalation attempt succeeded"
                    ),
                    Err(err) => debug!(
                        %alert_id,
                        channel = %attempt.kind,
                        attempt_ms,
                        error = %err,
                        "late escalation attempt failed"
                    ),
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::EmotionalVectors;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct TestChannel {
        kind: ChannelKind,
        delay_ms: u64,
        succeed: bool,
    }

    #[async_trait]
    impl DeliveryChannel for TestChannel {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        async fn deliver(&self, _alert: &CriticalAlert, _address: &str) -> PipelineResult<()> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            if self.succeed {
                Ok(())
            } else {
                Err(PipelineError::Config("provider refused".into()))
            }
        }
    }

    struct RecordingChannel {
        kind: ChannelKind,
        addresses: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl DeliveryChannel for RecordingChannel {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        async fn deliver(&self, _alert: &CriticalAlert, address: &str) -> PipelineResult<()> {
            self.addresses.lock().unwrap().push(address.to_string());
            Ok(())
        }
    }

    fn alert(value_usd: f64) -> CriticalAlert {
        let event = EmotionalEvent {
            session_id: "s-1".into(),
            tenant_id: "t-1".into(),
            emotion: Emotion::Rage,
            confidence: 90,
            vectors: EmotionalVectors::default(),
            page_url: "/checkout".into(),
            session_age_secs: 300,
            timestamp: Utc::now(),
        };
        CriticalAlert::from_event(&event, value_usd)
    }

    fn engine(channels: Vec<Arc<dyn DeliveryChannel>>) -> EscalationEngine {
        EscalationEngine::new(
            ContactDirectory::default(),
            channels,
            EscalationConfig::default(),
            Arc::new(PipelineCounters::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_fastest_channel_wins_race() {
        let engine = engine(vec![
            Arc::new(TestChannel { kind: ChannelKind::Sms, delay_ms: 2000, succeed: true }),
            Arc::new(TestChannel { kind: ChannelKind::Chat, delay_ms: 100, succeed: true }),
            Arc::new(TestChannel { kind: ChannelKind::Operator, delay_ms: 500, succeed: false }),
        ]);

        let result = engine.escalate(alert(150_000.0)).await;
        assert_eq!(
            result,
            DeliveryResult::Delivered {
                channel: ChannelKind::Chat,
                elapsed_ms: 100,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_then_slower_success() {
        let engine = engine(vec![
            Arc::new(TestChannel { kind: ChannelKind::Chat, delay_ms: 50, succeed: false }),
            Arc::new(TestChannel { kind: ChannelKind::Sms, delay_ms: 1000, succeed: true }),
        ]);

        let result = engine.escalate(alert(150_000.0)).await;
        assert_eq!(
            result,
            DeliveryResult::Delivered {
                channel: ChannelKind::Sms,
                elapsed_ms: 1000,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_channels_fail() {
        let counters = Arc::new(PipelineCounters::new());
        let engine = EscalationEngine::new(
            ContactDirectory::default(),
            vec![
                Arc::new(TestChannel { kind: ChannelKind::Sms, delay_ms: 10, succeed: false }),
                Arc::new(TestChannel { kind: ChannelKind::Chat, delay_ms: 20, succeed: false }),
            ],
            EscalationConfig::default(),
            Arc::clone(&counters),
        );

        let result = engine.escalate(alert(150_000.0)).await;
        assert_eq!(
            result,
            DeliveryResult::Failed {
                channels_attempted: 2,
                deadline_exceeded: false,
            }
        );
        assert_eq!(PipelineCounters::read(&counters.escalations_triggered), 1);
        assert_eq!(PipelineCounters::read(&counters.escalations_failed), 1);
        assert_eq!(PipelineCounters::read(&counters.escalations_delivered), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cuts_off_slow_channels() {
        let engine = engine(vec![
            Arc::new(TestChannel { kind: ChannelKind::Sms, delay_ms: 5000, succeed: true }),
            Arc::new(TestChannel { kind: ChannelKind::Chat, delay_ms: 6000, succeed: true }),
        ]);

        let started = Instant::now();
        let result = engine.escalate(alert(150_000.0)).await;
        assert_eq!(
            result,
            DeliveryResult::Failed {
                channels_attempted: 2,
                deadline_exceeded: true,
            }
        );
        assert_eq!(started.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn test_high_value_session_targets_ceo_tier() {
        let addresses = Arc::new(Mutex::new(Vec::new()));
        let engine = engine(vec![Arc::new(RecordingChannel {
            kind: ChannelKind::Sms,
            addresses: Arc::clone(&addresses),
        })]);

        let result = engine.escalate(alert(150_000.0)).await;
        assert!(matches!(result, DeliveryResult::Delivered { .. }));
        // Default directory: CEO tier owns +15550100.
        assert_eq!(addresses.lock().unwrap().as_slice(), ["+15550100"]);
    }

    #[tokio::test]
    async fn test_value_below_every_tier_fails_without_attempts() {
        let engine = engine(vec![Arc::new(TestChannel {
            kind: ChannelKind::Sms,
            delay_ms: 0,
            succeed: true,
        })]);

        let result = engine.escalate(alert(5_000.0)).await;
        assert_eq!(
            result,
            DeliveryResult::Failed {
                channels_attempted: 0,
                deadline_exceeded: false,
            }
        );
    }

    #[tokio::test]
    async fn test_eligibility_gates() {
        let engine = engine(Vec::new());
        assert!(engine.eligible(Emotion::Rage, 150_000.0));
        assert!(engine.eligible(Emotion::ExitRisk, 10_000.0));
        assert!(!engine.eligible(Emotion::Delight, 150_000.0));
        assert!(!engine.eligible(Emotion::Rage, 5_000.0));
    }
}
