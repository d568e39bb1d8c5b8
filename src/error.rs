//! Error types for inferir operations
//!
//! All fallible operations in the crate return [`Result`], which wraps
//! [`InferirError`]. Shape problems are rejected before any arithmetic runs,
//! so a forward call either fully succeeds or reports the violation without
//! producing partial output.

use thiserror::Error;

/// Errors that can occur during tensor and layer operations
#[derive(Debug, Error)]
pub enum InferirError {
    /// Shape is invalid for the requested operation
    #[error("Invalid shape: {reason}")]
    InvalidShape {
        /// Explanation of why the shape is invalid
        reason: String,
    },

    /// Data size doesn't match the declared shape
    #[error("Data size {data_size} doesn't match shape {shape:?} (expected {expected})")]
    DataShapeMismatch {
        /// Actual number of elements provided
        data_size: usize,
        /// Declared shape
        shape: Vec<usize>,
        /// Number of elements the shape requires
        expected: usize,
    },
}

/// Result type for inferir operations
pub type Result<T> = std::result::Result<T, InferirError>;
