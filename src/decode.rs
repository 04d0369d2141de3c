//! Decoders for the three wire formats accepted at ingestion: Prometheus
//! text exposition and protobuf-delimited `MetricFamily` for `/upload`, and
//! Snappy-compressed remote-write protobuf for `/metrics/v1/receive`.

use bytes::Bytes;
use prost::Message;

use crate::errors::Error;
use crate::metric::{Metric, MetricFamily, MetricValue};

fn bad_request(reason: impl Into<String>) -> Error {
    Error::BadRequest {
        reason: reason.into(),
    }
}

/// Decodes a `/upload` body. Protobuf-delimited payloads always start with a
/// varint length prefix that does not otherwise appear as valid UTF-8 text
/// for well-formed exposition, so content-type is the authoritative switch;
/// callers pass whichever the request declared.
pub fn decode_upload_body(body: &Bytes, is_protobuf: bool) -> Result<Vec<MetricFamily>, Error> {
    if is_protobuf {
        decode_protobuf_families(body.clone())
    } else {
        let text = std::str::from_utf8(body)
            .map_err(|e| bad_request(format!("body is not valid UTF-8: {e}")))?;
        decode_text_families(text)
    }
}

fn decode_text_families(text: &str) -> Result<Vec<MetricFamily>, Error> {
    let groups = prometheus_text_parser::parse_text(text)
        .map_err(|e| bad_request(format!("could not parse exposition text: {e}")))?;

    let mut families = Vec::with_capacity(groups.len());
    for group in groups {
        families.push(group_to_family(group)?);
    }
    Ok(families)
}

fn group_to_family(
    group: prometheus_text_parser::MetricGroup,
) -> Result<MetricFamily, Error> {
    use prometheus_text_parser::GroupKind;

    let name = group.name;
    let mut metrics = Vec::new();

    match group.metrics {
        GroupKind::Counter(map) => {
            for (key, simple) in map {
                metrics.push(simple_metric(key, MetricValue::Counter(simple.value)));
            }
        }
        GroupKind::Gauge(map) => {
            for (key, simple) in map {
                metrics.push(simple_metric(key, MetricValue::Gauge(simple.value)));
            }
        }
        GroupKind::Untyped(map) => {
            for (key, simple) in map {
                metrics.push(simple_metric(key, MetricValue::Untyped(simple.value)));
            }
        }
        GroupKind::Histogram(_) | GroupKind::Summary(_) => {
            tracing::debug!(family = %name, "dropping histogram/summary family, unsupported type");
            return Ok(MetricFamily {
                name,
                metrics: Vec::new(),
            });
        }
    }

    Ok(MetricFamily { name, metrics })
}

fn simple_metric(key: prometheus_text_parser::GroupKey, value: MetricValue) -> Metric {
    Metric {
        labels: key.labels.into_iter().collect(),
        value,
        timestamp_ms: key.timestamp.unwrap_or(0),
    }
}

fn decode_protobuf_families(body: Bytes) -> Result<Vec<MetricFamily>, Error> {
    let families = telemeter_proto::client_model::decode_delimited(body)
        .map_err(|e| bad_request(format!("could not decode protobuf exposition: {e}")))?;

    families
        .into_iter()
        .map(|family| {
            use telemeter_proto::client_model::MetricType;

            let metric_type = family.r#type();
            let name = family.name.unwrap_or_default();
            let mut metrics = Vec::with_capacity(family.metric.len());

            for m in family.metric {
                let value = match metric_type {
                    MetricType::Counter => m.counter.as_ref().map(|c| c.value.unwrap_or(0.0)).map(MetricValue::Counter),
                    MetricType::Gauge => m.gauge.as_ref().map(|g| g.value.unwrap_or(0.0)).map(MetricValue::Gauge),
                    MetricType::Untyped => m.untyped.as_ref().map(|u| u.value.unwrap_or(0.0)).map(MetricValue::Untyped),
                    MetricType::Summary | MetricType::Histogram => None,
                };
                let Some(value) = value else {
                    continue;
                };

                let labels: indexmap::IndexMap<String, String> = m
                    .label
                    .into_iter()
                    .filter_map(|l| Some((l.name?, l.value.unwrap_or_default())))
                    .collect();

                metrics.push(Metric {
                    labels,
                    value,
                    timestamp_ms: m.timestamp_ms.unwrap_or(0),
                });
            }

            Ok(MetricFamily { name, metrics })
        })
        .collect()
}

/// Decodes a `/metrics/v1/receive` body: Snappy-framed `WriteRequest`
/// protobuf.
pub fn decode_remote_write(body: &Bytes) -> Result<Vec<MetricFamily>, Error> {
    let mut decoder = snap::raw::Decoder::new();
    let decompressed = decoder
        .decompress_vec(body)
        .map_err(|e| bad_request(format!("could not decompress snappy body: {e}")))?;

    let write_request = telemeter_proto::remote_write::WriteRequest::decode(decompressed.as_slice())
        .map_err(|e| bad_request(format!("could not decode remote-write protobuf: {e}")))?;

    let mut by_name: indexmap::IndexMap<String, Vec<Metric>> = indexmap::IndexMap::new();
    for series in write_request.timeseries {
        let mut labels = indexmap::IndexMap::new();
        let mut name = String::new();
        for label in series.labels {
            if label.name == "__name__" {
                name = label.value;
            } else {
                labels.insert(label.name, label.value);
            }
        }
        if name.is_empty() {
            return Err(bad_request("time series is missing a __name__ label"));
        }

        for sample in series.samples {
            by_name.entry(name.clone()).or_default().push(Metric {
                labels: labels.clone(),
                value: MetricValue::Gauge(sample.value),
                timestamp_ms: sample.timestamp,
            });
        }
    }

    Ok(by_name
        .into_iter()
        .map(|(name, metrics)| MetricFamily { name, metrics })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_text_families_parses_simple_gauge() {
        let input = "up{job=\"x\"} 1 1000\n";
        let families = decode_text_families(input).expect("should parse");
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].name, "up");
        assert_eq!(families[0].metrics[0].value, MetricValue::Untyped(1.0));
    }

    #[test]
    fn decode_upload_body_rejects_non_utf8_text() {
        let body = Bytes::from_static(&[0xff, 0xfe, 0xfd]);
        let err = decode_upload_body(&body, false).unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
    }
}
