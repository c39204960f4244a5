//! Data preprocessing
//!
//! Feature standardization fitted on the training partition only.

mod scaler;

pub use scaler::{transform, Scaler};
