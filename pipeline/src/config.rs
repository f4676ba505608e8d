//! Pipeline configuration
//!
//! Each concern carries its own config struct with env-var overrides and
//! production defaults. Everything is constructed once at startup and passed
//! down explicitly; nothing reads the environment after that.

use std::time::Duration;

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Session table tuning: eviction and accumulator bounds.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle time after which a session is evicted.
    pub idle_timeout_secs: u64,
    /// Interval between eviction sweeps.
    pub sweep_interval_secs: u64,
    /// Capacity of each mouse sample ring buffer.
    pub sample_capacity: usize,
    /// Capacity of the exit-vector list.
    pub exit_vector_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: env_u64("PULSE_SESSION_IDLE_SECS", 1800),
            sweep_interval_secs: env_u64("PULSE_SESSION_SWEEP_SECS", 60),
            sample_capacity: env_usize("PULSE_SAMPLE_CAPACITY", 50),
            exit_vector_capacity: env_usize("PULSE_EXIT_VECTOR_CAPACITY", 20),
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Dispatch engine tuning: breaker thresholds and latency tracking.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Queue-to-process latency that trips the breaker, per item.
    pub latency_ceiling_ms: u64,
    /// How long the breaker stays open after a trip.
    pub breaker_cooldown_secs: u64,
    /// p99 latency target; breaches are logged, not fatal.
    pub p99_target_ms: u64,
    /// Rolling latency sample buffer size.
    pub latency_sample_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            latency_ceiling_ms: env_u64("PULSE_LATENCY_CEILING_MS", 5000),
            breaker_cooldown_secs: env_u64("PULSE_BREAKER_COOLDOWN_SECS", 30),
            p99_target_ms: env_u64("PULSE_P99_TARGET_MS", 1000),
            latency_sample_capacity: env_usize("PULSE_LATENCY_SAMPLES", 500),
        }
    }
}

impl DispatchConfig {
    pub fn latency_ceiling(&self) -> Duration {
        Duration::from_millis(self.latency_ceiling_ms)
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.breaker_cooldown_secs)
    }
}

/// Connection registry tuning: liveness and per-connection buffering.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// A connection silent longer than this is considered dead.
    pub liveness_timeout_secs: u64,
    /// Interval between liveness sweeps.
    pub liveness_sweep_secs: u64,
    /// Outbound message buffer per connection; overflow drops the message.
    pub send_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            liveness_timeout_secs: env_u64("PULSE_LIVENESS_TIMEOUT_SECS", 60),
            liveness_sweep_secs: env_u64("PULSE_LIVENESS_SWEEP_SECS", 15),
            send_capacity: env_usize("PULSE_SEND_CAPACITY", 64),
        }
    }
}

impl ChannelConfig {
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.liveness_timeout_secs)
    }

    pub fn liveness_sweep(&self) -> Duration {
        Duration::from_secs(self.liveness_sweep_secs)
    }
}

/// Session value resolution endpoint.
#[derive(Debug, Clone)]
pub struct ValueServiceConfig {
    /// Base URL of the identity service that resolves session values.
    pub base_url: String,
    /// Per-request timeout; a slow resolver degrades to zero value.
    pub timeout_ms: u64,
}

impl Default for ValueServiceConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("PULSE_VALUE_SERVICE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8700".into()),
            timeout_ms: env_u64("PULSE_VALUE_TIMEOUT_MS", 1500),
        }
    }
}

/// Escalation timing and provider endpoints.
#[derive(Debug, Clone)]
pub struct EscalationConfig {
    /// End-to-end deadline from trigger to first successful delivery.
    pub deadline_ms: u64,
    /// Per-attempt request timeout; losers may outlive the deadline.
    pub request_timeout_secs: u64,
    /// SMS gateway endpoint.
    pub sms_gateway_url: String,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            deadline_ms: env_u64("PULSE_ESCALATION_DEADLINE_MS", 3000),
            request_timeout_secs: env_u64("PULSE_ESCALATION_TIMEOUT_SECS", 10),
            sms_gateway_url: std::env::var("PULSE_SMS_GATEWAY_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8710/v1/messages".into()),
        }
    }
}

impl EscalationConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub session: SessionConfig,
    pub dispatch: DispatchConfig,
    pub channels: ChannelConfig,
    pub value_service: ValueServiceConfig,
    pub escalation: EscalationConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_production_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.session.idle_timeout_secs, 1800);
        assert_eq!(config.session.sweep_interval_secs, 60);
        assert_eq!(config.dispatch.latency_ceiling_ms, 5000);
        assert_eq!(config.dispatch.breaker_cooldown_secs, 30);
        assert_eq!(config.channels.send_capacity, 64);
        assert_eq!(config.escalation.deadline_ms, 3000);
    }

    #[test]
    fn test_duration_helpers() {
        let config = SessionConfig::default();
        assert_eq!(config.idle_timeout(), Duration::from_secs(1800));
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
    }
}
