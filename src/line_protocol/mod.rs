//! Line Protocol Encoding
//!
//! Converts JSON telemetry payloads into the text format accepted by the
//! time-series write endpoint:
//!
//! - [`escape`]: per-role token escaping
//! - [`value`]: field values and the null / number encoding options
//! - [`timestamp`]: timestamp normalization to epoch seconds
//! - [`point`]: the line builder and batch encoder
//! - [`payload`]: JSON payload decoding

pub mod error;
pub mod escape;
pub mod payload;
pub mod point;
pub mod timestamp;
pub mod value;

pub use error::{LineError, LineResult};
pub use escape::{escape, quote, unescape, unquote, Role};
pub use payload::{point_from_json, split_points, DEVICE_INPUT_TAG, DEVICE_TAG};
pub use point::{decode_line, encode_batch, Batch, EncodedLine, Point, RejectedPoint};
pub use value::{EncodingOptions, FieldValue, NullPolicy, NumberFormat};
