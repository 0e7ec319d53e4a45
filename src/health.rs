//! Health reporting.
//!
//! Combines the shutdown state with the lifecycle manager's status into a
//! single report for `GET /health`.

use std::time::Instant;

use serde::Serialize;

use crate::models::{LifecycleState, ManagerStatus, ModelName};
use crate::shutdown::ShutdownState;

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Detailed health report.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub state: HealthState,
    pub ready: bool,
    pub accepting_requests: bool,
    pub lifecycle: LifecycleState,
    pub model: Option<ModelName>,
    pub last_error: Option<String>,
    pub in_flight: u32,
    pub uptime_secs: u64,
}

/// Health check configuration.
#[derive(Debug, Clone, Default)]
pub struct HealthConfig {
    /// Report `Degraded` and not ready while no model is loaded.
    pub require_model_loaded: bool,
}

pub struct HealthChecker {
    config: HealthConfig,
    start_time: Instant,
}

impl HealthChecker {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            start_time: Instant::now(),
        }
    }

    pub fn is_ready(&self, shutdown: ShutdownState, lifecycle: LifecycleState) -> bool {
        if shutdown != ShutdownState::Running {
            return false;
        }
        !(self.config.require_model_loaded && lifecycle != LifecycleState::Loaded)
    }

    pub fn report(&self, shutdown: ShutdownState, status: ManagerStatus, in_flight: u32) -> HealthReport {
        HealthReport {
            state: self.compute_state(shutdown, status.state),
            ready: self.is_ready(shutdown, status.state),
            accepting_requests: shutdown == ShutdownState::Running,
            lifecycle: status.state,
            model: status.model,
            last_error: status.last_error,
            in_flight,
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    fn compute_state(&self, shutdown: ShutdownState, lifecycle: LifecycleState) -> HealthState {
        if shutdown != ShutdownState::Running {
            return HealthState::Unhealthy;
        }
        if self.config.require_model_loaded && lifecycle != LifecycleState::Loaded {
            return HealthState::Degraded;
        }
        HealthState::Healthy
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}
