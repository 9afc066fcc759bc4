//! Feature preprocessing
//!
//! Standardization fitted on the training partition and reused for the test
//! partition and full-grid prediction.

mod scaler;

pub use scaler::{NormalizationParams, StandardScaler};
