//! In-process gauge registry with Prometheus text exposition.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use prometheus::proto::{Gauge as GaugeValue, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;

use super::key::Number;
use super::publisher::{Gauge, MetricRegistry, Supplier, Tag, Unit};

/// Registration identity: exported name plus tag set.
type GaugeId = (String, Vec<Tag>);

/// Thread-safe registry of lazily evaluated gauges.
///
/// Registration happens from the refresh path, [`render`](Self::render) from
/// scrape handlers. Neither blocks the other beyond a shard lock.
#[derive(Debug, Default)]
pub struct GaugeRegistry {
    gauges: DashMap<GaugeId, Arc<Gauge>>,
}

/// A gauge evaluated at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    pub name: String,
    pub unit: Unit,
    pub tags: Vec<Tag>,
    pub value: Number,
}

impl GaugeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.gauges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty()
    }

    /// Evaluates every gauge, sorted by name then tags.
    ///
    /// Gauges whose supplier has no value are left out.
    pub fn samples(&self) -> Vec<Sample> {
        let mut gauges: Vec<Arc<Gauge>> = self.gauges.iter().map(|e| e.value().clone()).collect();
        gauges.sort_by(|a, b| (a.name(), a.tags()).cmp(&(b.name(), b.tags())));

        gauges
            .iter()
            .filter_map(|g| {
                g.value().map(|value| Sample {
                    name: exported_name(g.name(), g.unit()),
                    unit: g.unit(),
                    tags: g.tags().to_vec(),
                    value,
                })
            })
            .collect()
    }

    /// Builds one gauge family per exported name.
    pub fn gather(&self) -> Vec<MetricFamily> {
        let mut families: BTreeMap<String, Vec<Metric>> = BTreeMap::new();

        for sample in self.samples() {
            let labels: Vec<LabelPair> = sample
                .tags
                .iter()
                .map(|tag| {
                    let mut pair = LabelPair::default();
                    pair.set_name(tag.name.to_string());
                    pair.set_value(tag.value.clone());
                    pair
                })
                .collect();

            let mut value = GaugeValue::default();
            value.set_value(sample.value.as_f64());

            let mut metric = Metric::default();
            metric.set_label(labels.into());
            metric.set_gauge(value);

            families.entry(sample.name).or_default().push(metric);
        }

        families
            .into_iter()
            .map(|(name, metrics)| {
                let mut family = MetricFamily::default();
                family.set_help(format!("Firebird gstat statistic {}", name));
                family.set_name(name);
                family.set_field_type(MetricType::GAUGE);
                family.set_metric(metrics.into());
                family
            })
            .collect()
    }

    /// Renders all gauges in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let families = self.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl MetricRegistry for GaugeRegistry {
    fn register_gauge(
        &self,
        name: &str,
        unit: Unit,
        tags: Vec<Tag>,
        supplier: Supplier,
    ) -> Arc<Gauge> {
        self.gauges
            .entry((name.to_string(), tags.clone()))
            .or_insert_with(|| Arc::new(Gauge::new(name, unit, tags, supplier)))
            .value()
            .clone()
    }
}

/// Name as exposed to scrapers: percent gauges get a `_percent` suffix.
fn exported_name(name: &str, unit: Unit) -> String {
    match unit {
        Unit::None => name.to_string(),
        Unit::Percent => format!("{}_percent", name),
    }
}
