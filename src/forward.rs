//! Forwarder (C6): converts a validated batch to Prometheus remote-write,
//! Snappy-compresses it, and POSTs it to the upstream sink. Always run as a
//! detached task; the handler has already committed the write to the store.

use std::time::{Duration, Instant};

use prost::Message;
use snap::raw::Encoder;

use crate::metric::{MetricValue, PartitionedMetrics};
use crate::validate::clamp_future_timestamps;
use telemeter_proto::remote_write::{Label, Sample, TimeSeries, WriteRequest};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const TENANT_HEADER: &str = "THANOS-TENANT";

pub struct Forwarder {
    http: reqwest::Client,
    endpoint: reqwest::Url,
}

impl Forwarder {
    pub fn new(endpoint: reqwest::Url) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, endpoint })
    }

    /// Spawns the forward as a detached task. Returns immediately; failures
    /// are logged and counted, never surfaced to the HTTP caller.
    pub fn forward_in_background(self: std::sync::Arc<Self>, metrics: PartitionedMetrics, now_millis: i64) {
        tokio::spawn(async move {
            self.forward(metrics, now_millis).await;
        });
    }

    async fn forward(&self, mut metrics: PartitionedMetrics, now_millis: i64) {
        let partition_key = metrics.partition_key.clone();
        let overwritten = clamp_future_timestamps(&mut metrics.families, now_millis);
        if overwritten > 0 {
            metrics::counter!("forward_overwritten_timestamps_total").increment(overwritten);
        }

        let timeseries = to_timeseries(&metrics);
        if timeseries.is_empty() {
            return;
        }
        let sample_count: u64 = timeseries.iter().map(|ts| ts.samples.len() as u64).sum();

        let write_request = WriteRequest { timeseries };
        let encoded = write_request.encode_to_vec();
        let compressed = match Encoder::new().compress_vec(&encoded) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(tenant = %partition_key, error = %e, "failed to snappy-compress write request");
                return;
            }
        };

        let start = Instant::now();
        let result = self
            .http
            .post(self.endpoint.clone())
            .header(TENANT_HEADER, partition_key.clone())
            .header(reqwest::header::CONTENT_ENCODING, "snappy")
            .header(reqwest::header::CONTENT_TYPE, "application/x-protobuf")
            .body(compressed)
            .send()
            .await;

        let elapsed = start.elapsed();

        match result {
            Ok(response) => {
                let status = response.status();
                metrics::histogram!("forward_request_duration_seconds", "status_code" => status.as_u16().to_string())
                    .record(elapsed.as_secs_f64());
                if status.is_success() {
                    metrics::counter!("forward_samples_total").increment(sample_count);
                } else {
                    metrics::counter!("forward_request_errors_total").increment(1);
                    tracing::warn!(tenant = %partition_key, %status, "upstream remote-write sink rejected batch");
                }
            }
            Err(e) => {
                metrics::counter!("forward_request_errors_total").increment(1);
                tracing::warn!(tenant = %partition_key, error = %e, "upstream remote-write request failed");
            }
        }
    }
}

/// Converts families to remote-write `TimeSeries`, one series per sample.
fn to_timeseries(metrics: &PartitionedMetrics) -> Vec<TimeSeries> {
    let mut out = Vec::new();
    for family in &metrics.families {
        for metric in &family.metrics {
            let mut labels = Vec::with_capacity(metric.labels.len() + 1);
            labels.push(Label {
                name: "__name__".to_owned(),
                value: family.name.clone(),
            });
            for (name, value) in &metric.labels {
                labels.push(Label {
                    name: name.clone(),
                    value: value.clone(),
                });
            }

            let value = match metric.value {
                MetricValue::Counter(v) | MetricValue::Gauge(v) | MetricValue::Untyped(v) => v,
            };

            out.push(TimeSeries {
                labels,
                samples: vec![Sample {
                    value,
                    timestamp: metric.timestamp_ms,
                }],
            });
        }
    }
    out
}
