use std::path::Path;

use ndarray::Array4;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("model {model}: unsupported artifact format {path}")]
    UnsupportedFormat { model: String, path: String },
    #[error("model {model} failed to load: {message}")]
    Load { model: String, message: String },
    #[error("model {model} failed: {message}")]
    Runtime { model: String, message: String },
    #[error("model {model} returned {actual} outputs, expected {expected}")]
    OutputShape {
        model: String,
        expected: usize,
        actual: usize,
    },
    #[error("model {model} returned a non-finite score")]
    NonFinite { model: String },
    #[error("model {0} is unavailable after a previous panic")]
    Poisoned(String),
    #[error("ensemble has no models")]
    EmptyEnsemble,
    #[error("all ensemble members failed: {}", .0.join("; "))]
    AllMembersFailed(Vec<String>),
}

/// A loaded model that maps an image tensor to one score per class.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    /// Runs a forward pass and returns the raw, flattened output vector.
    fn predict(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError>;
}

/// Loads a model artifact, picking the runtime from the file extension.
pub fn load_classifier(name: &str, path: &Path) -> Result<Box<dyn Classifier>, InferenceError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        #[cfg(feature = "onnx")]
        Some("onnx") => Ok(Box::new(super::onnx::OnnxModel::load(name, path)?)),
        #[cfg(feature = "torch")]
        Some("pt") | Some("ts") => Ok(Box::new(super::torch::TorchModel::load(name, path)?)),
        _ => Err(InferenceError::UnsupportedFormat {
            model: name.to_string(),
            path: path.display().to_string(),
        }),
    }
}
