//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a reliable
//! session. All types derive Serde traits for deserialization from config
//! files, and every field has a default so an empty file is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for a reliable session.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ReliableSessionConfig {
    /// Reliable requestor pacing.
    pub requestor: RequestorConfig,

    /// In-flight admission limits.
    pub guard: GuardConfig,

    /// Best-effort fault delivery deadlines.
    pub faults: FaultConfig,

    /// Session open/close deadlines.
    pub session: SessionConfig,

    /// Simulated transport settings (demo and tests).
    pub simulation: SimulationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Reliable requestor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestorConfig {
    /// Iteration window in milliseconds. Each attempt owns at most this much
    /// of the caller's budget.
    pub iteration_ms: u64,

    /// Cap on a secondary receive or reply wait, in milliseconds.
    pub receive_ms: u64,

    /// Whether a secondary receive may be capped at `receive_ms` instead of
    /// using everything left in the iteration.
    pub timeout_is_safe: bool,
}

impl RequestorConfig {
    pub fn iteration(&self) -> Duration {
        Duration::from_millis(self.iteration_ms)
    }

    pub fn receive(&self) -> Duration {
        Duration::from_millis(self.receive_ms)
    }
}

impl Default for RequestorConfig {
    fn default() -> Self {
        Self {
            iteration_ms: 10_000,
            receive_ms: 10_000,
            timeout_is_safe: false,
        }
    }
}

/// Guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Maximum concurrently admitted operations.
    pub max_in_flight: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self { max_in_flight: 1 }
    }
}

/// Fault helper configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FaultConfig {
    /// Deadline for sending one fault, in milliseconds.
    pub send_timeout_ms: u64,

    /// Deadline for closing the binder after its fault was sent.
    pub close_timeout_ms: u64,
}

impl FaultConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: 60_000,
            close_timeout_ms: 60_000,
        }
    }
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub open_timeout_ms: u64,
    pub close_timeout_ms: u64,
}

impl SessionConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            open_timeout_ms: 60_000,
            close_timeout_ms: 60_000,
        }
    }
}

/// Simulated transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SimulationConfig {
    /// Delay applied to every simulated operation, in milliseconds.
    pub latency_ms: u64,

    /// Probability in [0, 1] that a transmission is lost.
    pub drop_rate: f64,
}

impl SimulationConfig {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Record metrics counters.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
        }
    }
}
