//! API types for fbstat-web JSON serialization.
//!
//! Timestamps are Unix seconds; walk counters are copied from [`WalkStats`].
//!
//! [`WalkStats`]: crate::report::WalkStats

pub mod convert;
pub mod status;
