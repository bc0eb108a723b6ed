//! Measurement buffering, decoding and range estimation

pub mod buffer;
pub mod distance;
pub mod parser;

pub use buffer::MeasurementBuffer;
pub use distance::PathLossModel;
pub use parser::{MessageParser, ParseError};
