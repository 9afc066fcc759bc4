//! Probability calibration
//!
//! Platt scaling maps raw margin scores (SVM decision values) to
//! probabilities of the positive class.

mod platt;

pub use platt::PlattScaling;
