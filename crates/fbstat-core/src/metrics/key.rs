//! Metric identity and numeric values.

use std::fmt;

use serde::Serialize;

/// A decoded statistic value.
///
/// Report literals containing a `.` decode to `Float`, everything else to
/// `Int`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Decodes a numeric literal from the report.
    ///
    /// Returns `None` when the literal does not parse as the type its shape
    /// selects (e.g. an integer overflowing `i64`).
    pub fn parse(literal: &str) -> Option<Self> {
        if literal.contains('.') {
            literal.parse::<f64>().ok().map(Number::Float)
        } else {
            literal.parse::<i64>().ok().map(Number::Int)
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(v) => v as f64,
            Number::Float(v) => v,
        }
    }

    /// Integer value, if this is an `Int`.
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Number::Int(v) => Some(v),
            Number::Float(_) => None,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Number::Float(_))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(v) => write!(f, "{}", v),
            Number::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Which part of the report a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricGroup {
    /// Database header page.
    Header,
    /// Table sections.
    Data,
    /// Index sections.
    Index,
}

impl MetricGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricGroup::Header => "header",
            MetricGroup::Data => "data",
            MetricGroup::Index => "index",
        }
    }
}

impl fmt::Display for MetricGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameter name under which the per-database data page total is stored.
pub const TOTAL_DATA_PAGES: &str = "total_data_pages";

/// Parameter name shared by all fill-distribution buckets.
pub const DISTRIBUTION: &str = "distribution";

/// Identity of one published value.
///
/// Compared field by field, so a database name that happens to contain an
/// object name can never collide with another key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MetricKey {
    pub database: String,
    pub group: MetricGroup,
    /// Table or index name; empty for header values and database totals.
    pub object: String,
    pub param: String,
    /// Upper bound label of a fill-distribution bucket.
    pub range: Option<String>,
}

impl MetricKey {
    pub fn header(database: &str, param: &str) -> Self {
        Self {
            database: database.to_string(),
            group: MetricGroup::Header,
            object: String::new(),
            param: param.to_string(),
            range: None,
        }
    }

    pub fn object(database: &str, group: MetricGroup, object: &str, param: &str) -> Self {
        Self {
            database: database.to_string(),
            group,
            object: object.to_string(),
            param: param.to_string(),
            range: None,
        }
    }

    pub fn distribution(database: &str, group: MetricGroup, object: &str, range_to: &str) -> Self {
        Self {
            database: database.to_string(),
            group,
            object: object.to_string(),
            param: DISTRIBUTION.to_string(),
            range: Some(range_to.to_string()),
        }
    }

    pub fn total_data_pages(database: &str) -> Self {
        Self::object(database, MetricGroup::Data, "", TOTAL_DATA_PAGES)
    }

    /// Exported gauge name for this key.
    ///
    /// Header values are `headerpage_<param>`, distribution buckets
    /// `<group>_distribution`, everything else `<group>_<param>`.
    pub fn metric_name(&self) -> String {
        match self.group {
            MetricGroup::Header => format!("headerpage_{}", self.param),
            group => format!("{}_{}", group, self.param),
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.database, self.group, self.object, self.param
        )?;
        if let Some(ref range) = self.range {
            write!(f, "/{}", range)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_parse_selects_type_by_decimal_point() {
        assert_eq!(Number::parse("8192"), Some(Number::Int(8192)));
        assert_eq!(Number::parse("12.2"), Some(Number::Float(12.2)));
        assert_eq!(Number::parse("12."), Some(Number::Float(12.0)));
        assert_eq!(Number::parse("abc"), None);
        assert_eq!(Number::parse("99999999999999999999"), None);
    }

    #[test]
    fn test_metric_names() {
        assert_eq!(
            MetricKey::header("db", "page_size").metric_name(),
            "headerpage_page_size"
        );
        assert_eq!(
            MetricKey::object("db", MetricGroup::Index, "PK_X", "depth").metric_name(),
            "index_depth"
        );
        assert_eq!(
            MetricKey::distribution("db", MetricGroup::Data, "T", "19").metric_name(),
            "data_distribution"
        );
        assert_eq!(
            MetricKey::total_data_pages("db").metric_name(),
            "data_total_data_pages"
        );
    }

    #[test]
    fn test_keys_do_not_collide_on_concatenation() {
        // "ab" + "c" and "a" + "bc" concatenate identically.
        let a = MetricKey::object("ab", MetricGroup::Data, "c", "x");
        let b = MetricKey::object("a", MetricGroup::Data, "bc", "x");
        assert_ne!(a, b);
    }

    #[test]
    fn test_distribution_key_differs_from_plain_param() {
        let plain = MetricKey::object("db", MetricGroup::Data, "T", DISTRIBUTION);
        let bucket = MetricKey::distribution("db", MetricGroup::Data, "T", "19");
        assert_ne!(plain, bucket);
    }
}
