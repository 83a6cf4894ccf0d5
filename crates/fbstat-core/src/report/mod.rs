//! Parser for Firebird `gstat` statistics reports.
//!
//! A report is line-oriented text with no schema:
//!
//! ```text
//! Database header page information:
//!         Page size               8192
//!         ODS version             12.2
//!         ...
//!
//! Analyzing database pages ...
//! CUSTOMERS (128)
//!     Pointer pages: 1, data page slots: 3
//!     Data pages: 3, average fill: 61%
//!     Fill distribution:
//!          0 - 19% = 0
//!         20 - 39% = 1
//!
//!     Index PK_CUSTOMERS (0)
//!         Average data length: 4.00, total dup: 0, max dup: 0
//!         Fill distribution:
//!              0 - 19% = 1
//! ```
//!
//! [`lines`] provides the cursor, [`tokenizer`] classifies single lines and
//! [`walker`] drives the section grammar and publishes every value it reads.

pub mod lines;
pub mod tokenizer;
pub mod walker;

use std::fmt;

pub use lines::LineSource;
pub use tokenizer::{DataEntry, DistributionBucket, HeaderEntry, ObjectKind, ObjectSection};
pub use walker::{ReportWalker, WalkState, WalkStats, walk_report};

/// A walk that had to stop before the end of the report.
///
/// Values published before the failure stay published.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportError {
    /// A section header line without the space that terminates the object name.
    MalformedSectionHeader { line_number: usize, line: String },
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::MalformedSectionHeader { line_number, line } => {
                write!(f, "malformed section header at line {}: {:?}", line_number, line)
            }
        }
    }
}

impl std::error::Error for ReportError {}
