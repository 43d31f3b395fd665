// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for the Tally numbering service.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. Metrics are
//! rendered as Prometheus text via [`PrometheusExporter::render`], which the
//! gateway exposes at `/metrics`.

pub mod recording;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use tally_core::TallyError;

pub use recording::{
    record_dispatch_failure, record_duplicate_number, record_job, record_sequence_issued,
    record_store_call, register_metrics,
};

/// Owns the handle of the process-wide Prometheus recorder.
#[derive(Clone)]
pub struct PrometheusExporter {
    handle: PrometheusHandle,
}

impl PrometheusExporter {
    /// Install the Prometheus recorder globally.
    ///
    /// Only one recorder can be installed per process; a second call fails.
    pub fn install() -> Result<Self, TallyError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            TallyError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Wrap an existing handle, e.g. one from a recorder that was not installed globally.
    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_recorder_renders_recorded_counters() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let exporter = PrometheusExporter::from_handle(recorder.handle());

        metrics::with_local_recorder(&recorder, || {
            record_sequence_issued("chat");
            record_sequence_issued("chat");
            record_duplicate_number("message");
        });

        let text = exporter.render();
        assert!(text.contains("tally_sequence_issued_total{scope=\"chat\"} 2"), "{text}");
        assert!(text.contains("tally_duplicate_numbers_total"), "{text}");
    }
}
