//! # Prometheus Metrics
//!
//! Exposes operational metrics for the hosted manager. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Messages delivered to the manager, accepted or not.
    pub messages_processed_total: IntCounter,
    /// Rejected messages, labelled by exit code.
    pub messages_rejected_total: IntCounterVec,
    /// Outbound messages emitted by committed steps.
    pub outbound_messages_total: IntCounter,
    /// Native balance of the manager account, in nanotons.
    pub native_balance: IntGauge,
    /// Time spent processing and committing one message.
    pub processing_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("custody".into()), None)
            .expect("failed to create prometheus registry");

        let messages_processed_total = IntCounter::new(
            "messages_processed_total",
            "Total number of inbound messages delivered to the manager",
        )
        .expect("metric creation");
        registry
            .register(Box::new(messages_processed_total.clone()))
            .expect("metric registration");

        let messages_rejected_total = IntCounterVec::new(
            Opts::new(
                "messages_rejected_total",
                "Total number of inbound messages the manager rejected",
            ),
            &["exit_code"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(messages_rejected_total.clone()))
            .expect("metric registration");

        let outbound_messages_total = IntCounter::new(
            "outbound_messages_total",
            "Total number of outbound messages emitted by committed steps",
        )
        .expect("metric creation");
        registry
            .register(Box::new(outbound_messages_total.clone()))
            .expect("metric registration");

        let native_balance = IntGauge::new(
            "native_balance_nanos",
            "Native balance of the manager account in nanotons",
        )
        .expect("metric creation");
        registry
            .register(Box::new(native_balance.clone()))
            .expect("metric registration");

        let processing_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "processing_latency_seconds",
                "Message processing and commit latency in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(processing_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            messages_processed_total,
            messages_rejected_total,
            outbound_messages_total,
            native_balance,
            processing_latency_seconds,
        }
    }

    /// Records the outcome of one delivered message.
    pub fn observe_transaction(&self, exit_code: u32, outbound: usize, balance_after: u128) {
        self.messages_processed_total.inc();
        if exit_code == 0 {
            self.outbound_messages_total.inc_by(outbound as u64);
        } else {
            self.messages_rejected_total
                .with_label_values(&[&exit_code.to_string()])
                .inc();
        }
        self.native_balance
            .set(i64::try_from(balance_after).unwrap_or(i64::MAX));
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
