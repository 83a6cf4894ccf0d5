//! Idempotent gauge registration on top of the value store.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tracing::trace;

use super::key::{MetricKey, Number};
use super::store::ValueStore;

/// Value of the `dbms` tag carried by every gauge.
pub const DBMS: &str = "firebirdsql";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    None,
    Percent,
}

/// A `name="value"` label attached to a gauge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Tag {
    pub name: &'static str,
    pub value: String,
}

impl Tag {
    pub fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// Tags for database-wide gauges: `dbms`, `database`.
pub fn database_tags(database: &str) -> Vec<Tag> {
    vec![Tag::new("dbms", DBMS), Tag::new("database", database)]
}

/// Tags for per-object gauges: `dbms`, `database`, `object`.
pub fn object_tags(database: &str, object: &str) -> Vec<Tag> {
    let mut tags = database_tags(database);
    tags.push(Tag::new("object", object));
    tags
}

/// Tags for distribution buckets: `dbms`, `database`, `object`, `range`.
pub fn distribution_tags(database: &str, object: &str, range_to: &str) -> Vec<Tag> {
    let mut tags = object_tags(database, object);
    tags.push(Tag::new("range", range_to));
    tags
}

/// Reads the current value of a gauge at scrape time.
pub type Supplier = Box<dyn Fn() -> Option<Number> + Send + Sync>;

/// A pull-based gauge: its value is whatever the supplier returns when asked.
pub struct Gauge {
    name: String,
    unit: Unit,
    tags: Vec<Tag>,
    supplier: Supplier,
}

impl Gauge {
    pub fn new(name: impl Into<String>, unit: Unit, tags: Vec<Tag>, supplier: Supplier) -> Self {
        Self {
            name: name.into(),
            unit,
            tags,
            supplier,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Evaluates the supplier.
    pub fn value(&self) -> Option<Number> {
        (self.supplier)()
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gauge")
            .field("name", &self.name)
            .field("unit", &self.unit)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

/// The metrics sink gauges are registered against.
pub trait MetricRegistry: Send + Sync {
    /// Registers a gauge, or returns the gauge already registered under the
    /// same name and tags (the new supplier is then dropped).
    fn register_gauge(
        &self,
        name: &str,
        unit: Unit,
        tags: Vec<Tag>,
        supplier: Supplier,
    ) -> Arc<Gauge>;
}

/// Writes values to the [`ValueStore`] and makes sure each [`MetricKey`] has
/// exactly one gauge.
///
/// The first publication of a key registers a gauge whose supplier reads the
/// key from the store on every call. Later publications only update the
/// store; the registered gauge, its tags and its unit never change.
pub struct MetricPublisher {
    registry: Arc<dyn MetricRegistry>,
    store: Arc<ValueStore>,
    gauges: DashMap<MetricKey, Arc<Gauge>>,
}

impl MetricPublisher {
    pub fn new(registry: Arc<dyn MetricRegistry>, store: Arc<ValueStore>) -> Self {
        Self {
            registry,
            store,
            gauges: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<ValueStore> {
        &self.store
    }

    /// Stores `value` and registers a gauge for `key` if none exists yet.
    ///
    /// Returns `true` if a gauge was registered by this call.
    pub fn publish(&self, key: MetricKey, value: Number, tags: Vec<Tag>, unit: Unit) -> bool {
        self.store.put(key.clone(), value);
        if self.gauges.contains_key(&key) {
            return false;
        }
        let supplier = self.supplier_for(&key);
        self.register(key, tags, unit, supplier).1
    }

    /// Registers a gauge for `key` the first time it is seen.
    ///
    /// A second call for the same key is a no-op: the existing gauge is
    /// returned and `tags`, `unit` and `supplier` are discarded.
    pub fn ensure_gauge(
        &self,
        key: MetricKey,
        tags: Vec<Tag>,
        unit: Unit,
        supplier: Supplier,
    ) -> Arc<Gauge> {
        self.register(key, tags, unit, supplier).0
    }

    fn register(
        &self,
        key: MetricKey,
        tags: Vec<Tag>,
        unit: Unit,
        supplier: Supplier,
    ) -> (Arc<Gauge>, bool) {
        match self.gauges.entry(key) {
            Entry::Occupied(e) => (e.get().clone(), false),
            Entry::Vacant(e) => {
                let name = e.key().metric_name();
                trace!(key = %e.key(), name = %name, "registering gauge");
                let gauge = self.registry.register_gauge(&name, unit, tags, supplier);
                e.insert(gauge.clone());
                (gauge, true)
            }
        }
    }

    /// Gauge registered for `key`, if any.
    pub fn gauge(&self, key: &MetricKey) -> Option<Arc<Gauge>> {
        self.gauges.get(key).map(|g| g.value().clone())
    }

    /// Number of keys with a registered gauge.
    pub fn gauge_count(&self) -> usize {
        self.gauges.len()
    }

    /// Supplier that reads the store entry for `key` at call time.
    fn supplier_for(&self, key: &MetricKey) -> Supplier {
        let store = Arc::clone(&self.store);
        let key = key.clone();
        Box::new(move || store.get(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::key::MetricGroup;
    use crate::metrics::registry::GaugeRegistry;

    fn publisher() -> (Arc<GaugeRegistry>, MetricPublisher) {
        let registry = Arc::new(GaugeRegistry::new());
        let publisher = MetricPublisher::new(registry.clone(), Arc::new(ValueStore::new()));
        (registry, publisher)
    }

    #[test]
    fn test_publish_registers_once() {
        let (registry, publisher) = publisher();
        let key = MetricKey::object("db", MetricGroup::Data, "T", "data_pages");

        assert!(publisher.publish(key.clone(), Number::Int(1), object_tags("db", "T"), Unit::None));
        let first = publisher.gauge(&key).unwrap();
        assert!(!publisher.publish(key.clone(), Number::Int(2), object_tags("db", "T"), Unit::None));
        let second = publisher.gauge(&key).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert_eq!(publisher.gauge_count(), 1);
    }

    #[test]
    fn test_supplier_reads_current_value() {
        let (_registry, publisher) = publisher();
        let key = MetricKey::header("db", "page_size");
        publisher.publish(key.clone(), Number::Int(4096), database_tags("db"), Unit::None);
        let gauge = publisher.gauge(&key).unwrap();
        assert_eq!(gauge.value(), Some(Number::Int(4096)));

        publisher.store().put(key, Number::Int(8192));
        assert_eq!(gauge.value(), Some(Number::Int(8192)));
    }

    #[test]
    fn test_second_ensure_keeps_first_tags_and_unit() {
        let (_registry, publisher) = publisher();
        let key = MetricKey::object("db", MetricGroup::Data, "T", "average_fill");
        let first = publisher.ensure_gauge(
            key.clone(),
            object_tags("db", "T"),
            Unit::Percent,
            Box::new(|| Some(Number::Int(1))),
        );
        let second = publisher.ensure_gauge(
            key,
            vec![Tag::new("other", "x")],
            Unit::None,
            Box::new(|| Some(Number::Int(2))),
        );

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.unit(), Unit::Percent);
        assert_eq!(second.tags(), object_tags("db", "T").as_slice());
        assert_eq!(second.value(), Some(Number::Int(1)));
    }

    #[test]
    fn test_tag_helpers() {
        let tags = distribution_tags("db", "T", "39");
        let names: Vec<&str> = tags.iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["dbms", "database", "object", "range"]);
        assert_eq!(tags[0].value, DBMS);
        assert_eq!(tags[3].value, "39");
    }
}
