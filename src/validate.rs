//! Validator / Transformer (C4): structural and label-level sanitization
//! applied to a decoded batch before it is stored and forwarded.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::errors::Error;
use crate::matcher::{passes_whitelist, LabelMatcher};
use crate::metric::{MetricFamily, PartitionedMetrics};

pub struct ValidatorConfig {
    pub limit_bytes: usize,
    pub whitelist: Vec<LabelMatcher>,
    pub elide_labels: Vec<String>,
    pub cluster_id_label: String,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            limit_bytes: 200 * 1024,
            whitelist: Vec::new(),
            elide_labels: Vec::new(),
            cluster_id_label: "_id".to_owned(),
        }
    }
}

/// Rejects bodies over the configured size cap. Called before decoding so
/// the decoder never runs on an oversized payload.
pub fn enforce_size_limit(body: &Bytes, limit_bytes: usize) -> Result<(), Error> {
    if body.len() > limit_bytes {
        return Err(Error::RequestTooLarge { limit: limit_bytes });
    }
    Ok(())
}

/// `/upload` path: stamps the cluster-id label and merges tenant labels onto
/// every sample (existing per-sample values win), in addition to whitelist
/// filtering, label elision, and type policy.
pub fn validate_for_upload(
    config: &ValidatorConfig,
    partition_key: &str,
    tenant_labels: &BTreeMap<String, String>,
    families: Vec<MetricFamily>,
) -> Result<PartitionedMetrics, Error> {
    let mut families = apply_whitelist_and_elision(config, families);

    for family in &mut families {
        for metric in &mut family.metrics {
            for (name, value) in tenant_labels {
                metric.labels.entry(name.clone()).or_insert_with(|| value.clone());
            }
            metric
                .labels
                .insert(config.cluster_id_label.clone(), partition_key.to_owned());
        }
    }

    Ok(PartitionedMetrics {
        partition_key: partition_key.to_owned(),
        families,
    })
}

/// `/metrics/v1/receive` path: rejects the whole batch if any sample's
/// cluster-id label is missing or does not match the authorized tenant.
pub fn validate_for_receive(
    config: &ValidatorConfig,
    partition_key: &str,
    families: Vec<MetricFamily>,
) -> Result<PartitionedMetrics, Error> {
    let families = apply_whitelist_and_elision(config, families);

    for family in &families {
        for metric in &family.metrics {
            match metric.labels.get(&config.cluster_id_label) {
                Some(id) if id == partition_key => {}
                _ => return Err(Error::MissingClusterId),
            }
        }
    }

    Ok(PartitionedMetrics {
        partition_key: partition_key.to_owned(),
        families,
    })
}

fn apply_whitelist_and_elision(config: &ValidatorConfig, families: Vec<MetricFamily>) -> Vec<MetricFamily> {
    families
        .into_iter()
        .filter(|family| {
            let keep = passes_whitelist(&config.whitelist, family);
            if !keep {
                tracing::debug!(family = %family.name, "dropped family not matched by whitelist");
            }
            keep
        })
        .map(|mut family| {
            if !config.elide_labels.is_empty() {
                for metric in &mut family.metrics {
                    for label in &config.elide_labels {
                        metric.labels.remove(label);
                    }
                }
            }
            family
        })
        .collect()
}

/// Clamps every sample's timestamp to `now` if it lies in the future,
/// counting how many samples were adjusted. Applied at forward time only;
/// the store retains original timestamps.
pub fn clamp_future_timestamps(families: &mut [MetricFamily], now_millis: i64) -> u64 {
    let mut overwritten = 0u64;
    let mut drift_sum_secs: i64 = 0;
    let mut sample_count: i64 = 0;

    for family in families.iter_mut() {
        for metric in &mut family.metrics {
            sample_count += 1;
            drift_sum_secs += (now_millis - metric.timestamp_ms) / 1000;
            if metric.timestamp_ms > now_millis {
                metric.timestamp_ms = now_millis;
                overwritten += 1;
            }
        }
    }

    if sample_count > 0 {
        let mean_drift = drift_sum_secs / sample_count;
        if mean_drift.abs() > 10 {
            tracing::warn!(mean_drift_secs = mean_drift, "large mean sample clock drift");
        }
    }

    overwritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{Metric, MetricValue};

    fn gauge_family(name: &str, ts: i64) -> MetricFamily {
        MetricFamily {
            name: name.to_owned(),
            metrics: vec![Metric {
                labels: indexmap::IndexMap::new(),
                value: MetricValue::Gauge(1.0),
                timestamp_ms: ts,
            }],
        }
    }

    #[test]
    fn upload_stamps_cluster_id_and_merges_tenant_labels() {
        let config = ValidatorConfig::default();
        let mut tenant_labels = BTreeMap::new();
        tenant_labels.insert("env".to_owned(), "prod".to_owned());

        let result =
            validate_for_upload(&config, "cluster-a", &tenant_labels, vec![gauge_family("up", 1000)])
                .unwrap();

        let labels = &result.families[0].metrics[0].labels;
        assert_eq!(labels.get("_id"), Some(&"cluster-a".to_owned()));
        assert_eq!(labels.get("env"), Some(&"prod".to_owned()));
    }

    #[test]
    fn receive_rejects_missing_cluster_id() {
        let config = ValidatorConfig::default();
        let err = validate_for_receive(&config, "cluster-a", vec![gauge_family("up", 1000)]).unwrap_err();
        assert!(matches!(err, Error::MissingClusterId));
    }

    #[test]
    fn receive_accepts_matching_cluster_id() {
        let config = ValidatorConfig::default();
        let mut family = gauge_family("up", 1000);
        family.metrics[0].labels.insert("_id".to_owned(), "cluster-a".to_owned());

        let result = validate_for_receive(&config, "cluster-a", vec![family]).unwrap();
        assert_eq!(result.families.len(), 1);
    }

    #[test]
    fn clamp_future_timestamps_clamps_and_counts() {
        let mut families = vec![gauge_family("up", 11_000)];
        let overwritten = clamp_future_timestamps(&mut families, 1_000);
        assert_eq!(overwritten, 1);
        assert_eq!(families[0].metrics[0].timestamp_ms, 1_000);
    }

    #[test]
    fn clamp_future_timestamps_leaves_past_samples_untouched() {
        let mut families = vec![gauge_family("up", 500)];
        let overwritten = clamp_future_timestamps(&mut families, 1_000);
        assert_eq!(overwritten, 0);
        assert_eq!(families[0].metrics[0].timestamp_ms, 500);
    }

    #[test]
    fn size_limit_rejects_oversized_body() {
        let body = Bytes::from(vec![0u8; 10]);
        assert!(enforce_size_limit(&body, 5).is_err());
        assert!(enforce_size_limit(&body, 10).is_ok());
    }
}
