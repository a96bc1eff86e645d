//! Tracing setup and worker counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over `default_directive`.
pub fn init_tracing(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    // A second install (tests, embedded use) is not an error worth reporting.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Metrics handle for recording worker counters
#[derive(Debug, Default)]
pub struct Metrics {
    requests_forwarded: AtomicU64,
    forward_failures: AtomicU64,
    artifacts_downloaded: AtomicU64,
    artifacts_reused: AtomicU64,
    files_updated: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_forwarded(&self) {
        self.requests_forwarded.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "requests_forwarded", "Metric incremented");
    }

    pub fn forward_failed(&self) {
        self.forward_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "forward_failures", "Metric incremented");
    }

    pub fn artifact_downloaded(&self) {
        self.artifacts_downloaded.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "artifacts_downloaded", "Metric incremented");
    }

    pub fn artifact_reused(&self) {
        self.artifacts_reused.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "artifacts_reused", "Metric incremented");
    }

    pub fn file_updated(&self) {
        self.files_updated.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "files_updated", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_forwarded: self.requests_forwarded.load(Ordering::Relaxed),
            forward_failures: self.forward_failures.load(Ordering::Relaxed),
            artifacts_downloaded: self.artifacts_downloaded.load(Ordering::Relaxed),
            artifacts_reused: self.artifacts_reused.load(Ordering::Relaxed),
            files_updated: self.files_updated.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub requests_forwarded: u64,
    pub forward_failures: u64,
    pub artifacts_downloaded: u64,
    pub artifacts_reused: u64,
    pub files_updated: u64,
}
