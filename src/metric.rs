//! Domain model shared by the decode, validate, store, and forward stages.
//!
//! This is deliberately decoupled from the wire types in `telemeter_proto`:
//! decoders translate text/protobuf/remote-write payloads into these types,
//! and the forwarder translates back out to `telemeter_proto::remote_write`.

use indexmap::IndexMap;

/// One (name, value) sample, as it lives between decode and forward.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// Label set in source order, `__name__` excluded (carried on the family).
    pub labels: IndexMap<String, String>,
    pub value: MetricValue,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Counter(f64),
    Gauge(f64),
    Untyped(f64),
}

impl MetricValue {
    pub fn value(&self) -> f64 {
        match *self {
            MetricValue::Counter(v) | MetricValue::Gauge(v) | MetricValue::Untyped(v) => v,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            MetricValue::Counter(_) => "counter",
            MetricValue::Gauge(_) => "gauge",
            MetricValue::Untyped(_) => "untyped",
        }
    }
}

/// A named group of same-typed samples, as decoded from any of the three
/// wire formats the ingestion endpoints accept.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub metrics: Vec<Metric>,
}

/// The unit of storage and forwarding: one tenant's most recent batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionedMetrics {
    pub partition_key: String,
    pub families: Vec<MetricFamily>,
}

impl PartitionedMetrics {
    /// Maximum sample timestamp across all families, or `None` if empty.
    pub fn newest(&self) -> Option<i64> {
        self.families
            .iter()
            .flat_map(|f| f.metrics.iter())
            .map(|m| m.timestamp_ms)
            .max()
    }

    pub fn is_empty(&self) -> bool {
        self.families.iter().all(|f| f.metrics.is_empty())
    }

    pub fn sample_count(&self) -> usize {
        self.families.iter().map(|f| f.metrics.len()).sum()
    }
}
