//! Channel multiplexer.
//!
//! Routes pipeline output to whoever is connected: classified emotions fan
//! out to every dashboard, intervention commands go to exactly one visitor
//! session. A visitor may hold a bundled telemetry connection that also
//! carries interventions, or a dedicated intervention connection; delivery
//! prefers the bundled one.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::protocol::OutboundMessage;
use super::registry::{ClientRegistry, SendOutcome};
use crate::classify::EmotionalEvent;
use crate::config::ChannelConfig;
use crate::intervention::InterventionType;

/// Live connection totals for the metrics snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCounts {
    pub dashboards: usize,
    pub interventions: usize,
    pub telemetry: usize,
}

pub struct ChannelMultiplexer {
    dashboards: ClientRegistry,
    interventions: ClientRegistry,
    telemetry: ClientRegistry,
    config: ChannelConfig,
}

impl ChannelMultiplexer {
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            dashboards: ClientRegistry::new("emotions"),
            interventions: ClientRegistry::new("interventions"),
            telemetry: ClientRegistry::new("telemetry"),
            config,
        }
    }

    /// Bounded sender/receiver pair sized for one client connection.
    pub fn client_queue(&self) -> (mpsc::Sender<OutboundMessage>, mpsc::Receiver<OutboundMessage>) {
        mpsc::channel(self.config.send_capacity)
    }

    /// Attach a dashboard to the emotion broadcast set. Returns the key and
    /// handle id the stream task needs for cleanup.
    pub async fn register_dashboard(
        &self,
        sender: mpsc::Sender<OutboundMessage>,
    ) -> (String, Uuid) {
        let key = Uuid::new_v4().to_string();
        let id = self.dashboards.register(&key, sender).await;
        (key, id)
    }

    pub async fn unregister_dashboard(&self, key: &str, id: Uuid) -> bool {
        self.dashboards.unregister(key, id).await
    }

    /// Attach a dedicated intervention connection for one visitor session.
    pub async fn register_intervention(
        &self,
        session_id: &str,
        sender: mpsc::Sender<OutboundMessage>,
    ) -> Uuid {
        self.interventions.register(session_id, sender).await
    }

    pub async fn unregister_intervention(&self, session_id: &str, id: Uuid) -> bool {
        self.interventions.unregister(session_id, id).await
    }

    /// Attach a bundled client connection: telemetry up, interventions down.
    pub async fn register_telemetry(
        &self,
        session_id: &str,
        sender: mpsc::Sender<OutboundMessage>,
    ) -> Uuid {
        self.telemetry.register(session_id, sender).await
    }

    pub async fn unregister_telemetry(&self, session_id: &str, id: Uuid) -> bool {
        self.telemetry.unregister(session_id, id).await
    }

    /// Fan a classified emotion out to every dashboard. Dead dashboards are
    /// pruned along the way; this never fails.
    pub async fn broadcast_emotion(&self, event: &EmotionalEvent) -> usize {
        let frame = OutboundMessage::Event {
            payload: event.clone(),
        };
        let (delivered, pruned) = self.dashboards.broadcast(&frame).await;
        if pruned > 0 {
            debug!(delivered, pruned, "emotion broadcast pruned dead dashboards");
        }
        delivered
    }

    /// Push an intervention command to one visitor session. Checks the
    /// bundled telemetry connection first, then the dedicated intervention
    /// connection. Returns whether the frame was queued to a live client.
    pub async fn send_intervention(
        &self,
        session_id: &str,
        intervention_type: InterventionType,
    ) -> bool {
        let frame = OutboundMessage::intervention(intervention_type, session_id);
        if self.telemetry.contains(session_id).await {
            match self.telemetry.try_send(session_id, frame.clone()).await {
                SendOutcome::Sent => return true,
                SendOutcome::Full => return false,
                SendOutcome::Gone => {}
            }
        }
        self.interventions.try_send(session_id, frame).await == SendOutcome::Sent
    }

    /// Inbound traffic from a session refreshes its liveness clocks.
    pub async fn mark_session_seen(&self, session_id: &str) {
        self.telemetry.mark_seen(session_id).await;
        self.interventions.mark_seen(session_id).await;
    }

    pub async fn connection_counts(&self) -> ConnectionCounts {
        ConnectionCounts {
            dashboards: self.dashboards.len().await,
            interventions: self.interventions.len().await,
            telemetry: self.telemetry.len().await,
        }
    }

    /// Periodic liveness sweep over the session-keyed registries; runs until
    /// the token cancels. Dashboards are prune-on-send only since they have
    /// no inbound traffic to refresh their clocks.
    pub fn spawn_liveness_sweep(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let mux = Arc::clone(self);
        tokio::spawn(async move {
            let timeout = mux.config.liveness_timeout();
            let mut interval = tokio::time::interval(mux.config.liveness_sweep());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        mux.telemetry.prune_idle(timeout).await;
                        mux.interventions.prune_idle(timeout).await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Emotion;
    use crate::session::EmotionalVectors;
    use chrono::Utc;

    fn event() -> EmotionalEvent {
        EmotionalEvent {
            session_id: "s-1".into(),
            tenant_id: "t-1".into(),
            emotion: Emotion::StickerShock,
            confidence: 85,
            vectors: EmotionalVectors::default(),
            page_url: "/pricing".into(),
            session_age_secs: 120,
            timestamp: Utc::now(),
        }
    }

    fn mux() -> ChannelMultiplexer {
        ChannelMultiplexer::new(ChannelConfig::default())
    }

    #[tokio::test]
    async fn test_broadcast_skips_dead_dashboard() {
        let mux = mux();
        let (tx_live, mut rx_live) = mux.client_queue();
        let (tx_dead, rx_dead) = mux.client_queue();
        mux.register_dashboard(tx_live).await;
        mux.register_dashboard(tx_dead).await;
        drop(rx_dead);

        let delivered = mux.broadcast_emotion(&event()).await;
        assert_eq!(delivered, 1);
        assert!(matches!(
            rx_live.recv().await,
            Some(OutboundMessage::Event { .. })
        ));
        assert_eq!(mux.connection_counts().await.dashboards, 1);
    }

    #[tokio::test]
    async fn test_send_intervention_prefers_bundled_connection() {
        let mux = mux();
        let (tx_tel, mut rx_tel) = mux.client_queue();
        let (tx_int, mut rx_int) = mux.client_queue();
        mux.register_telemetry("s-1", tx_tel).await;
        mux.register_intervention("s-1", tx_int).await;

        assert!(mux.send_intervention("s-1", InterventionType::HelpChat).await);
        assert!(rx_tel.try_recv().is_ok());
        assert!(rx_int.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_intervention_falls_back_to_dedicated() {
        let mux = mux();
        let (tx_tel, rx_tel) = mux.client_queue();
        let (tx_int, mut rx_int) = mux.client_queue();
        mux.register_telemetry("s-1", tx_tel).await;
        mux.register_intervention("s-1", tx_int).await;
        drop(rx_tel);

        assert!(mux.send_intervention("s-1", InterventionType::ExitIntent).await);
        match rx_int.try_recv() {
            Ok(OutboundMessage::Intervention {
                intervention_type, ..
            }) => assert_eq!(intervention_type, InterventionType::ExitIntent),
            other => panic!("unexpected frame: {other:?}"),
        }
        // The dead bundled connection was pruned on the failed attempt.
        assert_eq!(mux.connection_counts().await.telemetry, 0);
    }

    #[tokio::test]
    async fn test_send_intervention_without_client_is_false() {
        let mux = mux();
        assert!(!mux.send_intervention("nobody", InterventionType::TrustBadges).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_liveness_sweep_prunes_silent_sessions() {
        let mux = Arc::new(ChannelMultiplexer::new(ChannelConfig::default()));
        let (tx, _rx) = mux.client_queue();
        mux.register_telemetry("s-1", tx).await;

        let cancel = CancellationToken::new();
        let handle = mux.spawn_liveness_sweep(cancel.clone());
        tokio::task::yield_now().await;

        tokio::time::advance(std::time::Duration::from_secs(61)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert_eq!(mux.connection_counts().await.telemetry, 0);
        cancel.cancel();
        let _ = handle.await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_traffic_defers_prune() {
        let mux = Arc::new(ChannelMultiplexer::new(ChannelConfig::default()));
        let (tx, _rx) = mux.client_queue();
        mux.register_telemetry("s-1", tx).await;

        let cancel = CancellationToken::new();
        let handle = mux.spawn_liveness_sweep(cancel.clone());
        tokio::task::yield_now().await;

        tokio::time::advance(std::time::Duration::from_secs(45)).await;
        mux.mark_session_seen("s-1").await;
        tokio::time::advance(std::time::Duration::from_secs(30)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert_eq!(mux.connection_counts().await.telemetry, 1);
        cancel.cancel();
        let _ = handle.await;
    }
}
