//! Diabetes risk prediction service.
//!
//! A four-field clinical form (age, BMI, insulin, plasma glucose) is
//! validated, turned into a fixed-order feature row and passed to a
//! pre-trained binary classifier. The returned label is mapped to a
//! negative or positive outcome and rendered as HTML or returned as JSON.

pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod page;
pub mod rate_limit;
pub mod routes;

pub use error::AppError;
pub use inference::{Classifier, ModelSlot, Predictor};
pub use models::{Outcome, PredictionRequest, PredictionResult};
