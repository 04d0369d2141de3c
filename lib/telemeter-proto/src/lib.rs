//! Wire-format protobuf types shared by the ingestion and forwarding paths:
//! the Prometheus remote-write `WriteRequest` family, and the exposition
//! client model used to decode protobuf-delimited `/upload` bodies.

/// `prometheus.WriteRequest` et al., as sent to the upstream remote-write sink.
pub mod remote_write {
    include!(concat!(env!("OUT_DIR"), "/prometheus.rs"));
}

/// `io.prometheus.client.MetricFamily` et al., the protobuf exposition format.
pub mod client_model {
    use bytes::Buf;
    use prost::Message;

    include!(concat!(env!("OUT_DIR"), "/io.prometheus.client.rs"));

    impl MetricType {
        pub fn as_str(self) -> &'static str {
            match self {
                MetricType::Counter => "counter",
                MetricType::Gauge => "gauge",
                MetricType::Summary => "summary",
                MetricType::Untyped => "untyped",
                MetricType::Histogram => "histogram",
            }
        }
    }

    /// Decodes a stream of length-delimited `MetricFamily` messages, the
    /// wire format Prometheus clients emit under
    /// `Content-Type: application/vnd.google.protobuf`.
    pub fn decode_delimited(mut buf: bytes::Bytes) -> Result<Vec<MetricFamily>, prost::DecodeError> {
        let mut families = Vec::new();
        while buf.has_remaining() {
            families.push(MetricFamily::decode_length_delimited(&mut buf)?);
        }
        Ok(families)
    }
}
