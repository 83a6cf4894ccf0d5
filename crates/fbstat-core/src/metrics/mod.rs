//! Value store, gauge publication and exposition.

pub mod key;
pub mod publisher;
pub mod registry;
pub mod store;

pub use key::{MetricGroup, MetricKey, Number};
pub use publisher::{Gauge, MetricPublisher, MetricRegistry, Supplier, Tag, Unit};
pub use registry::{GaugeRegistry, Sample};
pub use store::ValueStore;
