//! Probe-driven health policy.
//!
//! This module does not run probes or restart anything; it defines the
//! contract an external supervisor applies and interprets the probe
//! outcomes it reports back. Readiness gates traffic admission: an
//! instance past its readiness failure threshold is removed from routing
//! but left running. Liveness gates replacement: an instance past its
//! liveness failure threshold is marked `Unhealthy`, and the supervisor
//! is contracted to replace it. An `Unhealthy` verdict is sticky; the
//! replacement instance starts with a fresh tracker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use caravel_core::ProbeConfig;

/// Which probe produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    Liveness,
    Readiness,
}

/// Outcome of one probe execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeOutcome {
    Pass,
    Fail,
}

/// One probe execution reported by the supervisor. Transient; consumed
/// to advance the health state machine and not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub kind: ProbeKind,
    pub outcome: ProbeOutcome,
    pub timestamp: DateTime<Utc>,
}

impl ProbeResult {
    pub fn now(kind: ProbeKind, outcome: ProbeOutcome) -> Self {
        Self {
            kind,
            outcome,
            timestamp: Utc::now(),
        }
    }
}

/// Local view of one workload instance's health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceHealth {
    /// No readiness pass observed yet; not routed
    Starting,

    /// Passing readiness; admitted to service routing
    Ready,

    /// Past the readiness failure threshold; removed from routing,
    /// not restarted
    NotReady,

    /// Past the liveness failure threshold; supervisor must replace
    Unhealthy,
}

impl std::fmt::Display for InstanceHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::NotReady => "not-ready",
            Self::Unhealthy => "unhealthy",
        };
        write!(f, "{name}")
    }
}

/// Consecutive-failure tracker for one workload instance.
///
/// Thresholds come from the workload's probe specs; a probe kind the
/// workload does not declare is ignored entirely.
#[derive(Debug, Clone)]
pub struct InstanceTracker {
    liveness_threshold: Option<u32>,
    readiness_threshold: Option<u32>,
    consecutive_liveness_failures: u32,
    consecutive_readiness_failures: u32,
    health: InstanceHealth,
}

impl InstanceTracker {
    pub fn new(probes: &ProbeConfig) -> Self {
        let readiness_threshold = probes.readiness.as_ref().map(|p| p.failure_threshold);
        Self {
            liveness_threshold: probes.liveness.as_ref().map(|p| p.failure_threshold),
            readiness_threshold,
            consecutive_liveness_failures: 0,
            consecutive_readiness_failures: 0,
            // With no readiness probe declared nothing gates admission;
            // the instance is routable from the start.
            health: if readiness_threshold.is_some() {
                InstanceHealth::Starting
            } else {
                InstanceHealth::Ready
            },
        }
    }

    pub fn health(&self) -> InstanceHealth {
        self.health
    }

    /// Whether traffic may be routed to this instance.
    pub fn is_routable(&self) -> bool {
        self.health == InstanceHealth::Ready
    }

    /// Whether the supervisor is contracted to replace this instance.
    pub fn needs_replacement(&self) -> bool {
        self.health == InstanceHealth::Unhealthy
    }

    /// Advance the state machine with one probe result.
    pub fn observe(&mut self, result: &ProbeResult) -> InstanceHealth {
        // Unhealthy is terminal for this instance; the replacement gets
        // a fresh tracker.
        if self.health == InstanceHealth::Unhealthy {
            return self.health;
        }

        match (result.kind, result.outcome) {
            (ProbeKind::Liveness, ProbeOutcome::Pass) => {
                self.consecutive_liveness_failures = 0;
            }
            (ProbeKind::Liveness, ProbeOutcome::Fail) => {
                if let Some(threshold) = self.liveness_threshold {
                    self.consecutive_liveness_failures += 1;
                    if self.consecutive_liveness_failures >= threshold {
                        self.health = InstanceHealth::Unhealthy;
                    }
                }
            }
            (ProbeKind::Readiness, ProbeOutcome::Pass) => {
                self.consecutive_readiness_failures = 0;
                if self.readiness_threshold.is_some() {
                    self.health = InstanceHealth::Ready;
                }
            }
            (ProbeKind::Readiness, ProbeOutcome::Fail) => {
                if let Some(threshold) = self.readiness_threshold {
                    self.consecutive_readiness_failures += 1;
                    if self.consecutive_readiness_failures >= threshold {
                        self.health = InstanceHealth::NotReady;
                    }
                }
            }
        }
        self.health
    }
}
