use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Service-wide counters. Owned by whoever builds the service and shared via
/// `Arc`, so independent instances (e.g. in tests) never interfere.
#[derive(Debug)]
pub struct ServiceStats {
    models_loaded: AtomicU64,
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    start_time: DateTime<Utc>,
    started: Instant,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct StatsSnapshot {
    pub models_loaded: u64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    #[schema(value_type = String)]
    pub start_time: DateTime<Utc>,
    /// Seconds since the service started.
    pub uptime: f64,
    /// Percentage of successful requests, 0 when nothing was served yet.
    pub success_rate: f64,
}

impl ServiceStats {
    pub fn new() -> Self {
        Self {
            models_loaded: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            start_time: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn record_model_loaded(&self) {
        self.models_loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn models_loaded(&self) -> u64 {
        self.models_loaded.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let successful = self.successful_requests.load(Ordering::Relaxed);

        StatsSnapshot {
            models_loaded: self.models_loaded(),
            total_requests: total,
            successful_requests: successful,
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            start_time: self.start_time,
            uptime: self.uptime_secs(),
            success_rate: successful as f64 / total.max(1) as f64 * 100.0,
        }
    }
}

impl Default for ServiceStats {
    fn default() -> Self {
        Self::new()
    }
}
