use crate::error::Error;

/// Result type alias used across all tilestore crates.
pub type Result<T> = std::result::Result<T, Error>;
