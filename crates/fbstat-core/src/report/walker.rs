//! State machine that walks a `gstat` report and publishes its values.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, trace};

use super::ReportError;
use super::lines::LineSource;
use super::tokenizer::{
    ObjectKind, ObjectSection, parse_data_line, parse_distribution_line, parse_header_line,
    parse_section_header,
};
use crate::metrics::key::{MetricGroup, MetricKey, Number};
use crate::metrics::publisher::{
    MetricPublisher, Tag, Unit, database_tags, distribution_tags, object_tags,
};

/// Line that opens the header page.
pub const HEADER_MARKER: &str = "Database header page information:";
/// Line that precedes the first object section.
pub const ANALYSIS_MARKER: &str = "Analyzing database pages ...";
/// Substring of the line that ends an object's data lines.
pub const FILL_DISTRIBUTION_MARKER: &str = "Fill distribution:";
/// Table parameter summed into the per-database data page total.
pub const DATA_PAGE_SLOTS: &str = "data_page_slots";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    AwaitingHeaderMarker,
    InHeaderPage,
    AwaitingAnalysisMarker,
    SectionNamePending,
    InObjectData,
    InObjectDistribution,
    Done,
}

/// Counters for one walk, including every best-effort skip.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WalkStats {
    /// Lines consumed from the report.
    pub lines: usize,
    pub header_entries: u64,
    pub tables: u64,
    pub indices: u64,
    pub data_entries: u64,
    pub distribution_buckets: u64,
    /// Gauges registered for keys first seen in this walk.
    pub gauges_registered: u64,
    pub total_data_pages: i64,
    /// `data_page_slots` additions that overflowed; the total saturates.
    pub total_overflows: u64,
    pub skipped_header_lines: u64,
    pub skipped_data_lines: u64,
    /// Data entries whose literal matched the grammar but did not decode.
    pub skipped_values: u64,
    pub skipped_distribution_lines: u64,
    /// Distribution buckets repeating a range already seen in the section.
    pub duplicate_ranges: u64,
}

impl WalkStats {
    /// Total number of lines or values skipped as unparseable.
    pub fn skipped(&self) -> u64 {
        self.skipped_header_lines
            + self.skipped_data_lines
            + self.skipped_values
            + self.skipped_distribution_lines
    }
}

/// Walks one report for one database.
///
/// ```text
/// AwaitingHeaderMarker ─▶ InHeaderPage ─▶ AwaitingAnalysisMarker ─▶ SectionNamePending
///                                                                     │        ▲
///                                                                     ▼        │
///                                            InObjectData ─▶ InObjectDistribution
/// ```
///
/// Every value is written through the [`MetricPublisher`] as soon as it is
/// read, so an aborted walk leaves everything before the failure published.
pub struct ReportWalker<'a> {
    database: &'a str,
    lines: LineSource<'a>,
    publisher: &'a MetricPublisher,
    state: WalkState,
    section: Option<ObjectSection>,
    section_ranges: HashSet<String>,
    stats: WalkStats,
}

impl<'a> ReportWalker<'a> {
    pub fn new(database: &'a str, text: &'a str, publisher: &'a MetricPublisher) -> Self {
        Self {
            database,
            lines: LineSource::new(text),
            publisher,
            state: WalkState::AwaitingHeaderMarker,
            section: None,
            section_ranges: HashSet::new(),
            stats: WalkStats::default(),
        }
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    pub fn stats(&self) -> &WalkStats {
        &self.stats
    }

    /// Runs the walk to completion and publishes the data page total.
    ///
    /// On a malformed section header the walk stops where it is; the total
    /// is not published for that walk.
    pub fn run(&mut self) -> Result<&WalkStats, ReportError> {
        while self.state != WalkState::Done {
            let next = self.step();
            self.stats.lines = self.lines.line_number();
            self.state = next?;
        }
        self.publish_total();
        Ok(&self.stats)
    }

    fn step(&mut self) -> Result<WalkState, ReportError> {
        let next = match self.state {
            WalkState::AwaitingHeaderMarker => {
                if self.lines.forward_to(HEADER_MARKER) {
                    WalkState::InHeaderPage
                } else {
                    debug!(database = self.database, "no header page in report");
                    WalkState::AwaitingAnalysisMarker
                }
            }
            WalkState::InHeaderPage => match self.lines.next_line() {
                Some(line) if !is_blank(line) => {
                    self.header_line(line);
                    WalkState::InHeaderPage
                }
                _ => WalkState::AwaitingAnalysisMarker,
            },
            WalkState::AwaitingAnalysisMarker => {
                if self.lines.forward_to(ANALYSIS_MARKER) {
                    WalkState::SectionNamePending
                } else {
                    debug!(database = self.database, "no analysis section in report");
                    WalkState::Done
                }
            }
            WalkState::SectionNamePending => match self.lines.next_line() {
                None => WalkState::Done,
                Some(line) if is_blank(line) => WalkState::SectionNamePending,
                Some(line) => {
                    self.open_section(line)?;
                    WalkState::InObjectData
                }
            },
            WalkState::InObjectData => match self.lines.next_line() {
                None => WalkState::Done,
                Some(line) if line.contains(FILL_DISTRIBUTION_MARKER) => {
                    WalkState::InObjectDistribution
                }
                Some(line) => {
                    self.data_line(line);
                    WalkState::InObjectData
                }
            },
            WalkState::InObjectDistribution => match self.lines.next_line() {
                None => WalkState::Done,
                Some(line) if is_blank(line) => WalkState::SectionNamePending,
                Some(line) => {
                    self.distribution_line(line);
                    WalkState::InObjectDistribution
                }
            },
            WalkState::Done => WalkState::Done,
        };
        Ok(next)
    }

    fn header_line(&mut self, line: &str) {
        let Some(entry) = parse_header_line(line) else {
            trace!(line = self.lines.line_number(), text = line, "skipping header line");
            self.stats.skipped_header_lines += 1;
            return;
        };
        self.stats.header_entries += 1;
        let key = MetricKey::header(self.database, &entry.name);
        self.publish(key, entry.value, database_tags(self.database), Unit::None);
    }

    fn open_section(&mut self, line: &str) -> Result<(), ReportError> {
        let section = parse_section_header(line).ok_or_else(|| {
            ReportError::MalformedSectionHeader {
                line_number: self.lines.line_number(),
                line: line.to_string(),
            }
        })?;
        match section.kind {
            ObjectKind::Table => self.stats.tables += 1,
            ObjectKind::Index => self.stats.indices += 1,
        }
        trace!(kind = ?section.kind, name = %section.name, "object section");
        self.section = Some(section);
        self.section_ranges.clear();
        Ok(())
    }

    fn data_line(&mut self, line: &str) {
        let Some(section) = self.section.clone() else {
            return;
        };
        let Some(entries) = parse_data_line(line) else {
            trace!(line = self.lines.line_number(), text = line, "skipping data line");
            self.stats.skipped_data_lines += 1;
            return;
        };
        let group = group_of(section.kind);

        for entry in entries {
            let Some(value) = entry.value() else {
                debug!(
                    line = self.lines.line_number(),
                    name = %entry.name,
                    raw = %entry.raw_value,
                    "skipping undecodable value"
                );
                self.stats.skipped_values += 1;
                continue;
            };
            self.stats.data_entries += 1;

            if section.kind == ObjectKind::Table && entry.name == DATA_PAGE_SLOTS {
                match value.as_i64() {
                    Some(slots) => match self.stats.total_data_pages.checked_add(slots) {
                        Some(total) => self.stats.total_data_pages = total,
                        None => {
                            debug!(
                                object = %section.name,
                                slots,
                                "data page total overflows, saturating"
                            );
                            self.stats.total_data_pages =
                                self.stats.total_data_pages.saturating_add(slots);
                            self.stats.total_overflows += 1;
                        }
                    },
                    None => debug!(object = %section.name, %value, "non-integer data page slots"),
                }
            }

            let unit = if entry.is_percent {
                Unit::Percent
            } else {
                Unit::None
            };
            let key = MetricKey::object(self.database, group, &section.name, &entry.name);
            self.publish(key, value, object_tags(self.database, &section.name), unit);
        }
    }

    fn distribution_line(&mut self, line: &str) {
        let Some(section) = self.section.clone() else {
            return;
        };
        let Some(bucket) = parse_distribution_line(line) else {
            trace!(line = self.lines.line_number(), text = line, "skipping distribution line");
            self.stats.skipped_distribution_lines += 1;
            return;
        };
        if !self.section_ranges.insert(bucket.range_to.clone()) {
            debug!(object = %section.name, range = %bucket.range_to, "duplicate distribution range");
            self.stats.duplicate_ranges += 1;
        }
        self.stats.distribution_buckets += 1;

        let key = MetricKey::distribution(
            self.database,
            group_of(section.kind),
            &section.name,
            &bucket.range_to,
        );
        let tags = distribution_tags(self.database, &section.name, &bucket.range_to);
        self.publish(key, Number::Int(bucket.count), tags, Unit::Percent);
    }

    fn publish_total(&mut self) {
        let key = MetricKey::total_data_pages(self.database);
        let total = Number::Int(self.stats.total_data_pages);
        self.publish(key, total, database_tags(self.database), Unit::None);
    }

    fn publish(&mut self, key: MetricKey, value: Number, tags: Vec<Tag>, unit: Unit) {
        if self.publisher.publish(key, value, tags, unit) {
            self.stats.gauges_registered += 1;
        }
    }
}

/// Walks `text` for `database`, publishing through `publisher`.
pub fn walk_report(
    database: &str,
    text: &str,
    publisher: &MetricPublisher,
) -> Result<WalkStats, ReportError> {
    let mut walker = ReportWalker::new(database, text, publisher);
    walker.run().cloned()
}

fn group_of(kind: ObjectKind) -> MetricGroup {
    match kind {
        ObjectKind::Table => MetricGroup::Data,
        ObjectKind::Index => MetricGroup::Index,
    }
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}
