use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tract_onnx::prelude::*;

use crate::error::AppError;
use crate::models::{PredictionRequest, PredictionResult, FEATURE_COUNT, FEATURE_NAMES};

/// A pre-trained binary classifier: feature row in, class label out.
pub trait Classifier: Send + Sync {
    fn classify(&self, features: &[f32; FEATURE_COUNT]) -> Result<String, AppError>;

    /// Short backend identifier reported by `/api/model-info`.
    fn kind(&self) -> &'static str;
}

fn default_classes() -> Vec<String> {
    vec!["tested_negative".to_string(), "tested_positive".to_string()]
}

fn default_threshold() -> f64 {
    0.5
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// `classes[1]` strictly above the threshold, `classes[0]` otherwise.
fn label_for(probability: f64, threshold: f64, classes: &[String]) -> String {
    if probability > threshold {
        classes[1].clone()
    } else {
        classes[0].clone()
    }
}

fn check_classes(classes: &[String], threshold: f64) -> Result<(), String> {
    if classes.len() != 2 {
        return Err(format!("expected 2 class labels, got {}", classes.len()));
    }
    if !(0.0..=1.0).contains(&threshold) {
        return Err(format!("threshold must be between 0 and 1 (value: {})", threshold));
    }
    Ok(())
}

/// Logistic regression stored as JSON.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LogisticModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    #[serde(default = "default_classes")]
    pub classes: Vec<String>,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl LogisticModel {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref();
        let unavailable = |reason: String| {
            AppError::ModelUnavailable(format!("{}: {}", path.display(), reason))
        };

        let raw = std::fs::read_to_string(path).map_err(|e| unavailable(e.to_string()))?;
        let model: LogisticModel =
            serde_json::from_str(&raw).map_err(|e| unavailable(e.to_string()))?;
        model.check().map_err(unavailable)?;
        Ok(model)
    }

    fn check(&self) -> Result<(), String> {
        if self.coefficients.len() != FEATURE_COUNT {
            return Err(format!(
                "expected {} coefficients, got {}",
                FEATURE_COUNT,
                self.coefficients.len()
            ));
        }
        check_classes(&self.classes, self.threshold)
    }

    pub fn probability(&self, features: &[f32; FEATURE_COUNT]) -> f64 {
        let z = self
            .coefficients
            .iter()
            .zip(features.iter())
            .map(|(w, x)| w * *x as f64)
            .sum::<f64>()
            + self.intercept;
        sigmoid(z)
    }
}

impl Classifier for LogisticModel {
    fn classify(&self, features: &[f32; FEATURE_COUNT]) -> Result<String, AppError> {
        Ok(label_for(self.probability(features), self.threshold, &self.classes))
    }

    fn kind(&self) -> &'static str {
        "logistic-regression"
    }
}

/// ONNX graph executed with tract.
pub struct OnnxModel {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>,
    classes: Vec<String>,
    threshold: f64,
}

impl OnnxModel {
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self, AppError> {
        let path = model_path.as_ref();
        let model = Self::plan(path).map_err(|e| {
            AppError::ModelUnavailable(format!("{}: {:#}", path.display(), e))
        })?;

        Ok(Self {
            model,
            classes: default_classes(),
            threshold: default_threshold(),
        })
    }

    fn plan(
        path: &Path,
    ) -> TractResult<SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>>
    {
        tract_onnx::onnx()
            .model_for_path(path)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, FEATURE_COUNT)),
            )?
            .into_optimized()?
            .into_runnable()
    }

    fn run(&self, features: &[f32; FEATURE_COUNT]) -> TractResult<String> {
        let input = Tensor::from_shape(&[1, FEATURE_COUNT], features)?;
        let outputs = self.model.run(tvec!(input.into()))?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow::anyhow!("model produced no output"))?;
        label_from_output(output, self.threshold, &self.classes)
    }
}

/// Reads a label from the first model output. A string tensor carries the
/// class name itself; otherwise two or more scores give the positive class
/// probability at index 1 and a single score is a logit.
fn label_from_output(output: &Tensor, threshold: f64, classes: &[String]) -> TractResult<String> {
    if output.datum_type() == String::datum_type() {
        return output
            .to_array_view::<String>()?
            .iter()
            .next()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("empty label output"));
    }

    let values = output.cast_to::<f32>()?;
    let values = values.as_slice::<f32>()?;
    let probability = match values {
        [] => anyhow::bail!("empty score output"),
        [logit] => sigmoid(*logit as f64),
        [_, positive, ..] => *positive as f64,
    };
    Ok(label_for(probability, threshold, classes))
}

impl Classifier for OnnxModel {
    fn classify(&self, features: &[f32; FEATURE_COUNT]) -> Result<String, AppError> {
        self.run(features)
            .map_err(|e| AppError::Inference(format!("{:#}", e)))
    }

    fn kind(&self) -> &'static str {
        "onnx"
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ModelInfo {
    pub kind: String,
    pub source: String,
    pub input_shape: Vec<usize>,
    pub features: Vec<String>,
    pub version: String,
}

/// Loaded model plus the request handling around it. Cheap to clone.
#[derive(Clone)]
pub struct Predictor {
    classifier: Arc<dyn Classifier>,
    info: ModelInfo,
}

impl Predictor {
    pub fn new(classifier: Arc<dyn Classifier>, source: impl Into<String>) -> Self {
        let info = ModelInfo {
            kind: classifier.kind().to_string(),
            source: source.into(),
            input_shape: vec![1, FEATURE_COUNT],
            features: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        Predictor { classifier, info }
    }

    /// Picks the backend from the file extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let classifier: Arc<dyn Classifier> = match extension.as_deref() {
            Some("json") => Arc::new(LogisticModel::load(path)?),
            Some("onnx") => Arc::new(OnnxModel::load(path)?),
            _ => {
                return Err(AppError::ModelUnavailable(format!(
                    "{}: unsupported model format (expected .json or .onnx)",
                    path.display()
                )))
            }
        };

        Ok(Self::new(classifier, path.display().to_string()))
    }

    pub fn predict(&self, request: &PredictionRequest) -> Result<PredictionResult, AppError> {
        request.validate()?;
        let label = self.classifier.classify(&request.to_features())?;
        Ok(PredictionResult::from_label(label))
    }

    pub fn model_info(&self) -> &ModelInfo {
        &self.info
    }
}

/// Holds the model for the life of the process. Loaded on first use; a load
/// failure is kept and reported on every later access.
pub struct ModelSlot {
    path: PathBuf,
    cell: OnceCell<Result<Predictor, AppError>>,
}

impl ModelSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ModelSlot {
            path: path.into(),
            cell: OnceCell::new(),
        }
    }

    pub fn with_predictor(predictor: Predictor) -> Self {
        ModelSlot {
            path: PathBuf::from(predictor.model_info().source.clone()),
            cell: OnceCell::with_value(Ok(predictor)),
        }
    }

    pub fn get(&self) -> Result<&Predictor, AppError> {
        self.cell
            .get_or_init(|| {
                let loaded = Predictor::load(&self.path);
                match &loaded {
                    Ok(p) => info!("Model loaded: {} ({})", p.info.source, p.info.kind),
                    Err(e) => error!("{}", e),
                }
                loaded
            })
            .as_ref()
            .map_err(Clone::clone)
    }
}
