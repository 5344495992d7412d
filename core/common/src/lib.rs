//! Common utilities and types shared across ZeroKey crates.
//!
//! This module provides the error taxonomy every component maps its
//! failures into, plus the zeroizing byte container used for raw key
//! material in transit between components.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::SensitiveBytes;
