//! Flux Query Construction
//!
//! Builds the read scripts sent to the time-series database:
//!
//! - **Window**: validated relative range or ±60 s around an instant
//! - **Filter**: allow-listed field-name tokens
//! - **Flux**: pipeline builder and the three gateway queries
//!
//! # Example
//!
//! ```rust,ignore
//! use ksave_gateway::query::{current_values, FieldFilter, QueryWindow, RelativeRange};
//!
//! let window = QueryWindow::from_params(Some("-6h"), None, &RelativeRange::default())?;
//! let flux = current_values("k_db", &window, &FieldFilter::default());
//! ```

mod error;
mod filter;
mod flux;
mod window;

pub use error::{QueryError, QueryResult};
pub use filter::{FieldFilter, DEFAULT_FIELD_TOKENS};
pub use flux::{
    current_values, device_lookup, string_literal, tag_values, FluxQuery, CURRENT_COLUMNS,
};
pub use window::{QueryWindow, RelativeRange, DEFAULT_RANGE, INSTANT_WINDOW_SECS};
