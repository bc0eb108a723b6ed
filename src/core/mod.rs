//! Core types and constants for the position fusion pipeline

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
