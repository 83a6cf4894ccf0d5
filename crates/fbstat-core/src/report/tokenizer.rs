//! Line classifiers for the `gstat` report grammar.
//!
//! Each recognizer is total: a line it does not understand yields `None`,
//! never an error. All patterns must match the whole line.

use std::sync::LazyLock;

use regex::Regex;

use crate::metrics::key::Number;

/// `<tabs><label><tabs><number>` on the header page.
static HEADER_PAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\t*)([^\t]*?)(\t*)(\d+(\.)?\d*)$").expect("header page pattern compiles")
});

/// One to three `<label>: <number>[%]` groups.
///
/// The fractional part is `.?\d+` where `.` is "any character", not a
/// literal point. `1x5` is therefore accepted as a number literal (and then
/// fails to decode). Kept as-is so the set of accepted lines does not change.
static DATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(\s*)(([A-Za-z ]+):\s*)((\d+(.?\d+)?)%?)",
        r"(,\s*([A-Za-z ]+):\s*((\d+(.?\d+)?)%?))?",
        r"(,\s*([A-Za-z ]+):\s*((\d+(.?\d+)?)%?))?$",
    ))
    .expect("data pattern compiles")
});

/// `<from> - <to>% = <count>`; the lower bound is discarded.
static DISTRIBUTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\d{1,2}\s*-\s*(\d{1,2})%\s*=\s*(\d+)$").expect("distribution pattern compiles")
});

/// Capture group indices of (label, value with `%`, number) for each data group.
const DATA_GROUPS: [(usize, usize, usize); 3] = [(3, 4, 5), (8, 9, 10), (13, 14, 15)];

/// Marker that identifies an index section header.
pub const INDEX_MARKER: &str = "Index ";

/// Normalizes a report label to a parameter key.
///
/// Alphabetic characters are lower-cased, every other character becomes `_`:
/// `"Data page slots"` → `"data_page_slots"`.
pub fn to_param(label: &str) -> String {
    let mut param = String::with_capacity(label.len());
    for ch in label.chars() {
        if ch.is_alphabetic() {
            param.extend(ch.to_lowercase());
        } else {
            param.push('_');
        }
    }
    param
}

/// Scalar statistic from the header page.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderEntry {
    pub name: String,
    pub value: Number,
}

/// Parses a header page line such as `"\tPage size\t\t8192"`.
pub fn parse_header_line(line: &str) -> Option<HeaderEntry> {
    let caps = HEADER_PAGE.captures(line)?;
    let label = caps.get(2)?.as_str();
    let literal = caps.get(4)?.as_str();
    Some(HeaderEntry {
        name: to_param(label),
        value: Number::parse(literal)?,
    })
}

/// One `name: value` pair from an object data line.
#[derive(Debug, Clone, PartialEq)]
pub struct DataEntry {
    pub name: String,
    /// Number literal without the `%` sign.
    pub raw_value: String,
    pub is_percent: bool,
}

impl DataEntry {
    /// Decoded value; `None` if the literal is not a valid number.
    pub fn value(&self) -> Option<Number> {
        Number::parse(&self.raw_value)
    }
}

/// Parses a data line into its 1–3 entries.
///
/// `"    Pointer pages: 1, data page slots: 3"` yields `pointer_pages = 1`
/// and `data_page_slots = 3`. Returns `None` if the line does not match.
pub fn parse_data_line(line: &str) -> Option<Vec<DataEntry>> {
    let caps = DATA.captures(line)?;
    let entries = DATA_GROUPS
        .iter()
        .filter_map(|&(label, value, number)| {
            let label = caps.get(label)?;
            let value = caps.get(value)?;
            let number = caps.get(number)?;
            Some(DataEntry {
                name: to_param(label.as_str()),
                raw_value: number.as_str().to_string(),
                is_percent: value.as_str().contains('%'),
            })
        })
        .collect();
    Some(entries)
}

/// One row of a fill-distribution histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionBucket {
    /// Upper bound of the bucket, kept as the label printed in the report.
    pub range_to: String,
    pub count: i64,
}

/// Parses a distribution line such as `"\t 20 - 39% = 4"`.
pub fn parse_distribution_line(line: &str) -> Option<DistributionBucket> {
    let caps = DISTRIBUTION.captures(line)?;
    Some(DistributionBucket {
        range_to: caps.get(1)?.as_str().to_string(),
        count: caps.get(2)?.as_str().parse().ok()?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    Index,
}

/// Table or index a report section describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSection {
    pub kind: ObjectKind,
    pub name: String,
}

/// Parses the line that opens an object section.
///
/// A line containing `"Index "` opens an index named by the text after the
/// marker up to the next space (`"    Index RDB$PRIMARY1 (0)"`). Any other
/// line opens a table named by the text before the first space
/// (`"COUNTRY (128)"`). Returns `None` if the terminating space is missing.
pub fn parse_section_header(line: &str) -> Option<ObjectSection> {
    if let Some(pos) = line.find(INDEX_MARKER) {
        let rest = &line[pos + INDEX_MARKER.len()..];
        let end = rest.find(' ')?;
        return Some(ObjectSection {
            kind: ObjectKind::Index,
            name: rest[..end].to_string(),
        });
    }
    let end = line.find(' ')?;
    Some(ObjectSection {
        kind: ObjectKind::Table,
        name: line[..end].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_param() {
        assert_eq!(to_param("Data page slots"), "data_page_slots");
        assert_eq!(to_param("ODS version"), "ods_version");
        assert_eq!(to_param("Next attachment ID"), "next_attachment_id");
        assert_eq!(to_param("a-b.c 1"), "a_b_c__");
        assert_eq!(to_param(""), "");
    }

    #[test]
    fn test_to_param_is_deterministic_and_idempotent() {
        for label in ["Page size", "Oldest snapshot", "  Mixed CASE 42 ", "Sweep_interval"] {
            let once = to_param(label);
            assert_eq!(once, to_param(label));
            assert_eq!(to_param(&once), once);
            assert!(once.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }

    #[test]
    fn test_parse_header_line_integer() {
        let entry = parse_header_line("\tPage size\t\t8192").unwrap();
        assert_eq!(entry.name, "page_size");
        assert_eq!(entry.value, Number::Int(8192));
    }

    #[test]
    fn test_parse_header_line_float() {
        let entry = parse_header_line("\tODS version\t\t12.2").unwrap();
        assert_eq!(entry.name, "ods_version");
        assert_eq!(entry.value, Number::Float(12.2));
        assert!(entry.value.is_float());
    }

    #[test]
    fn test_parse_header_line_round_trips_normalized_name() {
        let entry = parse_header_line("\tNext transaction\t\t1234").unwrap();
        let again = parse_header_line(&format!("\t{}\t\t1234", entry.name)).unwrap();
        assert_eq!(again.name, entry.name);
        assert_eq!(again.value, entry.value);
    }

    #[test]
    fn test_parse_header_line_rejects_text_values() {
        assert!(parse_header_line("\tCreation date\t\tJan 1, 2024 10:00:00").is_none());
        assert!(parse_header_line("\tAttributes\t\tforce write").is_none());
        assert!(parse_header_line("").is_none());
    }

    #[test]
    fn test_parse_data_line_single() {
        let entries = parse_data_line("    Data pages: 12").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "data_pages");
        assert_eq!(entries[0].raw_value, "12");
        assert!(!entries[0].is_percent);
    }

    #[test]
    fn test_parse_data_line_three_groups() {
        let entries =
            parse_data_line("    Average version length: 0.00, total versions: 0, max versions: 3")
                .unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "average_version_length");
        assert_eq!(entries[0].value(), Some(Number::Float(0.0)));
        assert_eq!(entries[1].name, "total_versions");
        assert_eq!(entries[2].name, "max_versions");
        assert_eq!(entries[2].value(), Some(Number::Int(3)));
    }

    #[test]
    fn test_parse_data_line_percent_is_per_group() {
        let entries = parse_data_line("    Data pages: 1, average fill: 8%").unwrap();
        assert!(!entries[0].is_percent);
        assert!(entries[1].is_percent);
        assert_eq!(entries[1].raw_value, "8");
    }

    #[test]
    fn test_parse_data_line_four_groups_does_not_match() {
        assert!(parse_data_line("\tRoot page: 186, depth: 1, leaf buckets: 1, nodes: 16").is_none());
    }

    #[test]
    fn test_parse_data_line_rejects_non_data() {
        assert!(parse_data_line("    Fill distribution:").is_none());
        assert!(parse_data_line("COUNTRY (128)").is_none());
        assert!(parse_data_line("").is_none());
    }

    #[test]
    fn test_parse_data_line_fraction_accepts_any_separator() {
        // The fractional separator matches any character, not only '.'.
        let entries = parse_data_line("    Compression ratio: 1x5").unwrap();
        assert_eq!(entries[0].raw_value, "1x5");
        assert_eq!(entries[0].value(), None);

        let entries = parse_data_line("    Compression ratio: 1.35").unwrap();
        assert_eq!(entries[0].value(), Some(Number::Float(1.35)));
    }

    #[test]
    fn test_parse_distribution_line() {
        let bucket = parse_distribution_line("\t 20 - 39% = 4").unwrap();
        assert_eq!(bucket.range_to, "39");
        assert_eq!(bucket.count, 4);

        let bucket = parse_distribution_line("10-20%=5").unwrap();
        assert_eq!(bucket.range_to, "20");
        assert_eq!(bucket.count, 5);
    }

    #[test]
    fn test_parse_distribution_line_rejects_other_lines() {
        assert!(parse_distribution_line("    Fill distribution:").is_none());
        assert!(parse_distribution_line("100 - 199% = 1").is_none());
        assert!(parse_distribution_line("").is_none());
    }

    #[test]
    fn test_parse_section_header_table() {
        let section = parse_section_header("COUNTRY (128)").unwrap();
        assert_eq!(section.kind, ObjectKind::Table);
        assert_eq!(section.name, "COUNTRY");
    }

    #[test]
    fn test_parse_section_header_index() {
        let section = parse_section_header("    Index RDB$PRIMARY1 (0)").unwrap();
        assert_eq!(section.kind, ObjectKind::Index);
        assert_eq!(section.name, "RDB$PRIMARY1");
    }

    #[test]
    fn test_parse_section_header_malformed() {
        assert!(parse_section_header("CUSTOMERS").is_none());
        assert!(parse_section_header("    Index PK_CUSTOMERS").is_none());
    }
}
