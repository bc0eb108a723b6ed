//! Model parameters and system defaults

/// Received signal strength at the 1 m reference distance (dB)
pub const REFERENCE_SIGNAL_DB: f64 = -30.0;

/// Log-distance path-loss exponent (2.0 = free space)
pub const PATH_LOSS_EXPONENT: f64 = 2.0;

/// Number of most recent measurements averaged per distance estimate
pub const DISTANCE_WINDOW: usize = 10;

/// Per-node measurement history kept in memory
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// Distinct data-bearing nodes required before a solve is attempted
pub const QUORUM: usize = 3;

/// Confidence attached to every published estimate
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Relative determinant below which anchor geometry is treated as degenerate
pub const DEFAULT_COLLINEARITY_TOLERANCE: f64 = 1e-9;
