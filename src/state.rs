//! # Application State Management
//!
//! Shared state handed to every HTTP request handler through `web::Data`.
//!
//! ## Design:
//! The adapters are explicitly constructed in `main` and injected here, not
//! reached through globals. The intentionally-unavailable states are encoded
//! as `None` (no durable store configured, transcription disabled), which
//! makes the 503 paths trivially testable by substitution.
//!
//! ## Thread Safety:
//! `Arc<RwLock<T>>` for the pieces requests mutate (config, metrics);
//! everything else is read-only after startup and shared behind plain `Arc`.

use crate::config::AppConfig;
use crate::persistence::{AnalysisStore, FileStore};
use crate::scoring::ScoringPolicy;
use crate::transcription::TranscriptionService;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (readable by handlers, e.g. for health).
    pub config: Arc<RwLock<AppConfig>>,

    /// Request metrics, updated by the telemetry middleware.
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// Server start, for uptime reporting.
    pub start_time: Instant,

    /// Scoring policy, selected at construction. Pure and always available.
    pub scorer: Arc<ScoringPolicy>,

    /// Durable store; `None` when no DATABASE_URL is configured.
    pub store: Option<Arc<AnalysisStore>>,

    /// Flat-file sinks under the clinical data directory.
    pub files: Arc<FileStore>,

    /// Transcription adapter; `None` when disabled or failed to load.
    pub transcriber: Option<Arc<TranscriptionService>>,
}

/// Counters collected across all HTTP requests.
#[derive(Debug, Default)]
pub struct AppMetrics {
    pub request_count: u64,
    pub error_count: u64,
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Per-endpoint counters.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

impl AppState {
    pub fn new(
        config: AppConfig,
        scorer: ScoringPolicy,
        store: Option<Arc<AnalysisStore>>,
        files: FileStore,
        transcriber: Option<Arc<TranscriptionService>>,
    ) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
            scorer: Arc::new(scorer),
            store,
            files: Arc::new(files),
            transcriber,
        }
    }

    /// Copy of the current configuration; cloning keeps the lock short.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn increment_request_count(&self) {
        self.metrics.write().unwrap().request_count += 1;
    }

    pub fn increment_error_count(&self) {
        self.metrics.write().unwrap().error_count += 1;
    }

    /// Fold one finished request into the per-endpoint counters.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Consistent copy of the metrics for the health/metrics endpoints.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap();
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_state() -> AppState {
        AppState::new(
            AppConfig::default(),
            ScoringPolicy::Heuristic,
            None,
            FileStore::new(std::env::temp_dir().join("cometik-state-tests")),
            None,
        )
    }

    #[test]
    fn test_unconfigured_adapters_are_absent() {
        let state = minimal_state();
        assert!(state.store.is_none());
        assert!(state.transcriber.is_none());
    }

    #[test]
    fn test_request_counters() {
        let state = minimal_state();
        state.increment_request_count();
        state.increment_request_count();
        state.increment_error_count();

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.request_count, 2);
        assert_eq!(snapshot.error_count, 1);
    }

    #[test]
    fn test_endpoint_metrics_aggregate() {
        let state = minimal_state();
        state.record_endpoint_request("POST /analyze_text", 10, false);
        state.record_endpoint_request("POST /analyze_text", 30, true);

        let snapshot = state.get_metrics_snapshot();
        let metric = &snapshot.endpoint_metrics["POST /analyze_text"];
        assert_eq!(metric.request_count, 2);
        assert_eq!(metric.average_duration_ms(), 20.0);
        assert_eq!(metric.error_rate(), 0.5);
    }

    #[test]
    fn test_empty_endpoint_metric_rates() {
        let metric = EndpointMetric::default();
        assert_eq!(metric.average_duration_ms(), 0.0);
        assert_eq!(metric.error_rate(), 0.0);
    }
}
