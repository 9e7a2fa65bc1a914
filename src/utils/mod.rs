//! Utility functions for the delegation tracker.
//!
//! - [`date`] - Reference timezone clock and display formats

mod date;

pub use date::{format_date, format_timestamp, now_in, DATE_FORMAT, TIME_FORMAT};
