pub mod ensemble;
pub mod model;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod preprocess;
#[cfg(feature = "torch")]
pub mod torch;

pub use ensemble::{Ensemble, EnsemblePrediction, Prediction};
pub use model::{Classifier, InferenceError, load_classifier};
pub use preprocess::{PreprocessError, preprocess};
