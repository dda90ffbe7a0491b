//! Request metrics registry for the tenant gateway
//!
//! Counters and simplified histograms (sum + count, no buckets) keyed by
//! metric name and a canonical label set, rendered in the Prometheus text
//! exposition format.
//!
//! Each registry owns its own `prometheus::Registry`, so independent
//! gateways (and tests) never share samples.

use std::collections::{BTreeMap, HashMap};

use dashmap::DashMap;
use prometheus::{
    CounterVec, Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
    proto::MetricFamily,
};
use thiserror::Error;

/// Label set of a sample. Sorted by label name, so insertion order never
/// changes a series' identity.
pub type Labels = BTreeMap<String, String>;

const INFO_METRIC: &str = "gateway_info";

/// Build a [`Labels`] map from `(name, value)` pairs.
pub fn labels<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Labels {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("metric '{name}' is registered with labels {expected:?}, got {got:?}")]
    LabelMismatch {
        name: String,
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("observation for '{name}' must be finite and non-negative, got {value}")]
    InvalidObservation { name: String, value: f64 },

    #[error("exposition is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

#[derive(Clone)]
struct CounterFamily {
    label_names: Vec<String>,
    samples: IntCounterVec,
}

#[derive(Clone)]
struct HistogramFamily {
    label_names: Vec<String>,
    sum: CounterVec,
    count: IntCounterVec,
}

/// Process-wide metrics registry.
///
/// Families are created lazily on first use and kept in sharded maps; the
/// hot path only takes a shard read lock plus the family's own child lock,
/// so unrelated metrics never serialize on each other.
pub struct MetricsRegistry {
    registry: Registry,
    counters: DashMap<String, CounterFamily>,
    histograms: DashMap<String, HistogramFamily>,
    help: DashMap<String, String>,
}

impl MetricsRegistry {
    /// Create an empty registry exposing `gateway_info{version="..."} 1`.
    pub fn new(version: &str) -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let info = IntGaugeVec::new(
            Opts::new(INFO_METRIC, "Information about the tenant gateway"),
            &["version"],
        )?;
        registry.register(Box::new(info.clone()))?;
        info.get_metric_with_label_values(&[version])?.set(1);

        Ok(Self {
            registry,
            counters: DashMap::new(),
            histograms: DashMap::new(),
            help: DashMap::new(),
        })
    }

    /// Attach a HELP text to a metric name. Only effective before first use.
    pub fn describe(&self, name: &str, help: &str) {
        self.help.insert(name.to_string(), help.to_string());
    }

    /// Increment the counter `name{labels}` by one.
    pub fn increment(&self, name: &str, labels: &Labels) -> Result<(), MetricsError> {
        let family = self.counter_family(name, labels)?;
        family.samples.get_metric_with(&label_map(labels))?.inc();
        Ok(())
    }

    /// Add `value` to `name_sum{labels}` and one to `name_count{labels}`.
    pub fn observe(&self, name: &str, value: f64, labels: &Labels) -> Result<(), MetricsError> {
        if !value.is_finite() || value < 0.0 {
            return Err(MetricsError::InvalidObservation {
                name: name.to_string(),
                value,
            });
        }

        let family = self.histogram_family(name, labels)?;
        let label_map = label_map(labels);
        family.sum.get_metric_with(&label_map)?.inc_by(value);
        family.count.get_metric_with(&label_map)?.inc();
        Ok(())
    }

    /// Render every family in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, MetricsError> {
        let mut buffer = vec![];
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode(&metric_families, &mut buffer)?;

        Ok(String::from_utf8(buffer)?)
    }

    /// Current value of a counter series, if it has been recorded.
    pub fn counter_value(&self, name: &str, labels: &Labels) -> Option<u64> {
        let families = self.registry.gather();
        find_sample(&families, name, labels).map(|m| m.get_counter().get_value() as u64)
    }

    /// Current `(sum, count)` of a histogram series, if it has been recorded.
    pub fn histogram_value(&self, name: &str, labels: &Labels) -> Option<(f64, u64)> {
        let families = self.registry.gather();
        let sum = find_sample(&families, &format!("{}_sum", name), labels)?
            .get_counter()
            .get_value();
        let count = find_sample(&families, &format!("{}_count", name), labels)?
            .get_counter()
            .get_value() as u64;
        Some((sum, count))
    }

    fn help_for(&self, name: &str) -> String {
        self.help
            .get(name)
            .map(|h| h.value().clone())
            .unwrap_or_else(|| name.to_string())
    }

    fn counter_family(&self, name: &str, labels: &Labels) -> Result<CounterFamily, MetricsError> {
        let family = match self.counters.get(name) {
            Some(family) => family.clone(),
            None => self
                .counters
                .entry(name.to_string())
                .or_try_insert_with(|| {
                    let label_names = label_names(labels);
                    let samples = IntCounterVec::new(
                        Opts::new(name, self.help_for(name)),
                        &as_strs(&label_names),
                    )?;
                    self.registry.register(Box::new(samples.clone()))?;
                    tracing::debug!(metric = %name, labels = ?label_names, "Registered counter");
                    Ok::<_, MetricsError>(CounterFamily {
                        label_names,
                        samples,
                    })
                })?
                .clone(),
        };

        check_labels(name, &family.label_names, labels)?;
        Ok(family)
    }

    fn histogram_family(
        &self,
        name: &str,
        labels: &Labels,
    ) -> Result<HistogramFamily, MetricsError> {
        let family = match self.histograms.get(name) {
            Some(family) => family.clone(),
            None => self
                .histograms
                .entry(name.to_string())
                .or_try_insert_with(|| {
                    let label_names = label_names(labels);
                    let names = as_strs(&label_names);
                    let help = self.help_for(name);
                    let sum = CounterVec::new(
                        Opts::new(format!("{}_sum", name), format!("{} (sum)", help)),
                        &names,
                    )?;
                    let count = IntCounterVec::new(
                        Opts::new(format!("{}_count", name), format!("{} (count)", help)),
                        &names,
                    )?;
                    self.registry.register(Box::new(sum.clone()))?;
                    self.registry.register(Box::new(count.clone()))?;
                    tracing::debug!(metric = %name, labels = ?label_names, "Registered histogram");
                    Ok::<_, MetricsError>(HistogramFamily {
                        label_names,
                        sum,
                        count,
                    })
                })?
                .clone(),
        };

        check_labels(name, &family.label_names, labels)?;
        Ok(family)
    }
}

fn label_names(labels: &Labels) -> Vec<String> {
    labels.keys().cloned().collect()
}

fn as_strs(names: &[String]) -> Vec<&str> {
    names.iter().map(String::as_str).collect()
}

fn label_map(labels: &Labels) -> HashMap<&str, &str> {
    labels
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

fn check_labels(name: &str, expected: &[String], labels: &Labels) -> Result<(), MetricsError> {
    if expected.len() == labels.len() && expected.iter().zip(labels.keys()).all(|(a, b)| a == b) {
        return Ok(());
    }
    Err(MetricsError::LabelMismatch {
        name: name.to_string(),
        expected: expected.to_vec(),
        got: label_names(labels),
    })
}

fn find_sample<'a>(
    families: &'a [MetricFamily],
    name: &str,
    labels: &Labels,
) -> Option<&'a prometheus::proto::Metric> {
    let family = families.iter().find(|f| f.get_name() == name)?;
    family.get_metric().iter().find(|metric| {
        let pairs = metric.get_label();
        pairs.len() == labels.len()
            && pairs
                .iter()
                .all(|p| labels.get(p.get_name()).map(String::as_str) == Some(p.get_value()))
    })
}
