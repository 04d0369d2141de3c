//! PromQL-style label matchers used for whitelist filtering
//! (`--whitelist='{__name__="up",job=~"node.*"}'`).

use regex::Regex;
use snafu::Snafu;

use crate::metric::MetricFamily;

pub const METRIC_NAME_LABEL: &str = "__name__";

#[derive(Debug, Clone)]
enum MatchOp {
    Equal(String),
    Regex(Regex),
}

impl MatchOp {
    fn matches(&self, value: &str) -> bool {
        match self {
            MatchOp::Equal(expected) => expected == value,
            MatchOp::Regex(re) => re.is_match(value),
        }
    }
}

/// A single `{label="value", label2=~"regex"}` constraint set; every
/// constraint must hold (AND) for the matcher to match a sample.
#[derive(Debug, Clone)]
pub struct LabelMatcher {
    constraints: Vec<(String, MatchOp)>,
}

#[derive(Debug, Snafu)]
pub enum MatcherParseError {
    #[snafu(display("whitelist matcher `{input}` is missing enclosing braces"))]
    MissingBraces { input: String },
    #[snafu(display("whitelist matcher `{input}` has a malformed constraint `{constraint}`"))]
    MalformedConstraint { input: String, constraint: String },
    #[snafu(display("invalid regex in whitelist matcher: {source}"))]
    InvalidRegex { source: regex::Error },
}

impl LabelMatcher {
    /// Parses `{name="value", name2=~"pattern"}`. The name defaults to
    /// `__name__` match semantics when the label key is literally `__name__`.
    pub fn parse(input: &str) -> Result<Self, MatcherParseError> {
        let trimmed = input.trim();
        let inner = trimmed
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| MatcherParseError::MissingBraces {
                input: input.to_owned(),
            })?;

        let mut constraints = Vec::new();
        for part in split_constraints(inner) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            constraints.push(parse_constraint(input, part)?);
        }

        Ok(LabelMatcher { constraints })
    }

    /// Whether any sample in `family` satisfies every constraint.
    pub fn matches_family(&self, family: &MetricFamily) -> bool {
        family.metrics.iter().any(|m| {
            self.constraints.iter().all(|(name, op)| {
                if name == METRIC_NAME_LABEL {
                    op.matches(&family.name)
                } else {
                    m.labels.get(name).is_some_and(|v| op.matches(v))
                }
            })
        })
    }
}

fn split_constraints(inner: &str) -> Vec<&str> {
    inner.split(',').collect()
}

fn parse_constraint(original: &str, part: &str) -> Result<(String, MatchOp), MatcherParseError> {
    let malformed = || MatcherParseError::MalformedConstraint {
        input: original.to_owned(),
        constraint: part.to_owned(),
    };

    let (name, rest) = if let Some(idx) = part.find("=~") {
        (&part[..idx], &part[idx + 2..])
    } else if let Some(idx) = part.find('=') {
        (&part[..idx], &part[idx + 1..])
    } else {
        return Err(malformed());
    };
    let is_regex = part.contains("=~");

    let value = rest
        .trim()
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(malformed)?;

    let op = if is_regex {
        MatchOp::Regex(Regex::new(value).map_err(|source| MatcherParseError::InvalidRegex { source })?)
    } else {
        MatchOp::Equal(value.to_owned())
    };

    Ok((name.trim().to_owned(), op))
}

/// Whether `families` passes any configured whitelist matcher; an empty
/// whitelist allows everything through.
pub fn passes_whitelist(matchers: &[LabelMatcher], family: &MetricFamily) -> bool {
    matchers.is_empty() || matchers.iter().any(|m| m.matches_family(family))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{Metric, MetricValue};

    fn family(name: &str, labels: &[(&str, &str)]) -> MetricFamily {
        MetricFamily {
            name: name.to_owned(),
            metrics: vec![Metric {
                labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                value: MetricValue::Gauge(1.0),
                timestamp_ms: 0,
            }],
        }
    }

    #[test]
    fn matches_on_name_equality() {
        let matcher = LabelMatcher::parse(r#"{__name__="up"}"#).unwrap();
        assert!(matcher.matches_family(&family("up", &[])));
        assert!(!matcher.matches_family(&family("foo", &[])));
    }

    #[test]
    fn matches_on_label_regex() {
        let matcher = LabelMatcher::parse(r#"{job=~"node.*"}"#).unwrap();
        assert!(matcher.matches_family(&family("up", &[("job", "node_exporter")])));
        assert!(!matcher.matches_family(&family("up", &[("job", "other")])));
    }

    #[test]
    fn whitelist_is_an_or_of_matchers() {
        let matchers = vec![
            LabelMatcher::parse(r#"{__name__="up"}"#).unwrap(),
            LabelMatcher::parse(r#"{__name__="foo"}"#).unwrap(),
        ];
        assert!(passes_whitelist(&matchers, &family("foo", &[])));
        assert!(!passes_whitelist(&matchers, &family("bar", &[])));
    }

    #[test]
    fn empty_whitelist_allows_everything() {
        assert!(passes_whitelist(&[], &family("anything", &[])));
    }
}
