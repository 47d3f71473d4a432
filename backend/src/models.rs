use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Number of features the classifier consumes.
pub const FEATURE_COUNT: usize = 4;

/// Feature names in the order the model was trained on.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] =
    ["age", "body_mass_index", "insulin_level", "plasma_glucose"];

/// The only label that maps to a negative outcome.
pub const NEGATIVE_LABEL: &str = "tested_negative";

pub const AGE_MIN: u32 = 1;
pub const AGE_MAX: u32 = 120;
pub const BMI_MIN: f64 = 0.0;
pub const BMI_MAX: f64 = 70.0;
pub const INSULIN_MIN: u32 = 0;
pub const INSULIN_MAX: u32 = 900;
pub const GLUCOSE_MIN: u32 = 0;
pub const GLUCOSE_MAX: u32 = 300;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct PredictionRequest {
    pub age: u32,
    #[serde(alias = "bmi", alias = "mass")]
    pub body_mass_index: f64,
    #[serde(alias = "insulin", alias = "insu")]
    pub insulin_level: u32,
    #[serde(alias = "glucose", alias = "plas")]
    pub plasma_glucose: u32,
}

impl Default for PredictionRequest {
    fn default() -> Self {
        PredictionRequest {
            age: 30,
            body_mass_index: 33.6,
            insulin_level: 0,
            plasma_glucose: 148,
        }
    }
}

impl PredictionRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let checks = [
            ("age", self.age as f64, AGE_MIN as f64, AGE_MAX as f64),
            ("body_mass_index", self.body_mass_index, BMI_MIN, BMI_MAX),
            ("insulin_level", self.insulin_level as f64, INSULIN_MIN as f64, INSULIN_MAX as f64),
            ("plasma_glucose", self.plasma_glucose as f64, GLUCOSE_MIN as f64, GLUCOSE_MAX as f64),
        ];

        for (name, value, min, max) in checks.iter() {
            // NaN fails `contains`, so it is rejected here too.
            if !(*min..=*max).contains(value) {
                return Err(AppError::InvalidInput(format!(
                    "{} must be between {} and {} (value: {})",
                    name, min, max, value
                )));
            }
        }

        Ok(())
    }

    /// Single-row feature vector, always `[age, bmi, insulin, glucose]`.
    pub fn to_features(&self) -> [f32; FEATURE_COUNT] {
        [
            self.age as f32,
            self.body_mass_index as f32,
            self.insulin_level as f32,
            self.plasma_glucose as f32,
        ]
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Negative,
    Positive,
}

impl Outcome {
    /// Exactly `tested_negative` is negative; every other label, including
    /// unexpected ones, counts as positive.
    pub fn from_label(label: &str) -> Self {
        if label == NEGATIVE_LABEL {
            Outcome::Negative
        } else {
            Outcome::Positive
        }
    }

    pub fn headline(&self) -> &'static str {
        match self {
            Outcome::Negative => "Negative",
            Outcome::Positive => "Positive",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Outcome::Negative => "The model predicts a low risk of diabetes.",
            Outcome::Positive => "The model predicts a likelihood of diabetes.",
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PredictionResult {
    pub outcome: Outcome,
    /// Raw label returned by the model.
    pub label: String,
    pub headline: String,
    pub message: String,
}

impl PredictionResult {
    pub fn from_label(label: String) -> Self {
        let outcome = Outcome::from_label(&label);
        PredictionResult {
            outcome,
            label,
            headline: outcome.headline().to_string(),
            message: outcome.message().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: String,
    pub execution_time_ms: Option<u64>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            execution_time_ms: None,
        }
    }

    pub fn error(message: &str) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            execution_time_ms: None,
        }
    }

    pub fn with_elapsed(mut self, started: std::time::Instant) -> Self {
        self.execution_time_ms = Some(started.elapsed().as_millis() as u64);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(age: u32, bmi: f64, insulin: u32, glucose: u32) -> PredictionRequest {
        PredictionRequest {
            age,
            body_mass_index: bmi,
            insulin_level: insulin,
            plasma_glucose: glucose,
        }
    }

    #[test]
    fn age_bounds_are_inclusive() {
        assert!(request(1, 33.6, 0, 148).validate().is_ok());
        assert!(request(120, 33.6, 0, 148).validate().is_ok());
        assert!(matches!(
            request(0, 33.6, 0, 148).validate(),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            request(121, 33.6, 0, 148).validate(),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn other_bounds_are_enforced() {
        assert!(request(30, 0.0, 0, 0).validate().is_ok());
        assert!(request(30, 70.0, 900, 300).validate().is_ok());
        assert!(request(30, 70.1, 0, 148).validate().is_err());
        assert!(request(30, -0.1, 0, 148).validate().is_err());
        assert!(request(30, 33.6, 901, 148).validate().is_err());
        assert!(request(30, 33.6, 0, 301).validate().is_err());
    }

    #[test]
    fn non_finite_bmi_is_rejected() {
        assert!(request(30, f64::NAN, 0, 148).validate().is_err());
        assert!(request(30, f64::INFINITY, 0, 148).validate().is_err());
    }

    #[test]
    fn error_names_the_offending_field() {
        let err = request(30, 33.6, 0, 301).validate().unwrap_err();
        assert!(err.to_string().contains("plasma_glucose"));
    }

    #[test]
    fn feature_order_is_fixed() {
        let features = request(45, 28.5, 120, 99).to_features();
        assert_eq!(features, [45.0, 28.5, 120.0, 99.0]);
    }

    #[test]
    fn defaults_match_the_form() {
        let r = PredictionRequest::default();
        assert_eq!(r, request(30, 33.6, 0, 148));
        assert!(r.validate().is_ok());
    }

    #[test]
    fn short_field_aliases_deserialize() {
        let r: PredictionRequest =
            serde_json::from_str(r#"{"age":50,"mass":31.2,"insu":80,"plas":160}"#).unwrap();
        assert_eq!(r, request(50, 31.2, 80, 160));
    }

    #[test]
    fn only_the_exact_negative_label_is_negative() {
        assert_eq!(Outcome::from_label("tested_negative"), Outcome::Negative);
        assert_eq!(Outcome::from_label("tested_positive"), Outcome::Positive);
        assert_eq!(Outcome::from_label("Tested_Negative"), Outcome::Positive);
        assert_eq!(Outcome::from_label(" tested_negative"), Outcome::Positive);
        assert_eq!(Outcome::from_label(""), Outcome::Positive);
        assert_eq!(Outcome::from_label("0"), Outcome::Positive);
    }

    #[test]
    fn result_carries_label_and_texts() {
        let r = PredictionResult::from_label("tested_negative".to_string());
        assert_eq!(r.outcome, Outcome::Negative);
        assert_eq!(r.headline, "Negative");
        assert_eq!(r.message, "The model predicts a low risk of diabetes.");

        let json = serde_json::to_value(PredictionResult::from_label("x".into())).unwrap();
        assert_eq!(json["outcome"], "positive");
        assert_eq!(json["label"], "x");
    }
}
