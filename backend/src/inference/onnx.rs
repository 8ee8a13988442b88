use std::path::Path;
use std::sync::Mutex;

use ndarray::Array4;
use tract_onnx::prelude::*;

use super::model::{Classifier, InferenceError};
use super::preprocess::{CHANNELS, INPUT_SIZE};

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX model executed with tract, the default runtime.
pub struct OnnxModel {
    name: String,
    plan: Mutex<Plan>,
}

impl OnnxModel {
    pub fn load(name: &str, path: &Path) -> Result<Self, InferenceError> {
        let side = INPUT_SIZE as usize;
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| {
                model.with_input_fact(
                    0,
                    InferenceFact::dt_shape(f32::datum_type(), tvec!(1, side, side, CHANNELS)),
                )
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| InferenceError::Load {
                model: name.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            name: name.to_string(),
            plan: Mutex::new(plan),
        })
    }

    fn runtime_error(&self, e: impl std::fmt::Display) -> InferenceError {
        InferenceError::Runtime {
            model: self.name.clone(),
            message: e.to_string(),
        }
    }
}

impl Classifier for OnnxModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let data: Vec<f32> = input.iter().copied().collect();
        let tensor = Tensor::from_shape(input.shape(), &data).map_err(|e| self.runtime_error(e))?;

        let plan = self
            .plan
            .lock()
            .map_err(|_| InferenceError::Poisoned(self.name.clone()))?;
        let outputs = plan
            .run(tvec!(tensor.into()))
            .map_err(|e| self.runtime_error(e))?;

        let first = outputs
            .first()
            .ok_or_else(|| self.runtime_error("model produced no outputs"))?;
        let scores = first
            .to_array_view::<f32>()
            .map_err(|e| self.runtime_error(e))?;
        Ok(scores.iter().copied().collect())
    }
}
