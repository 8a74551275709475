//! Query Response Parsing
//!
//! - [`table`]: annotated CSV into rows and value sets
//! - [`extract`]: pattern-based device snapshot from raw output

pub mod extract;
pub mod table;

pub use extract::{DeviceSnapshot, ExtractionRule, Target, ELECTRICAL_FIELDS, EXTRACTION_RULES};
pub use table::{merge_value_sets, parse_table, parse_value_set, ResultRow};
