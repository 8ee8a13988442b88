use std::path::Path;
use std::sync::Mutex;

use ndarray::Array4;
use tch::{CModule, Device, Kind, Tensor};

use super::model::{Classifier, InferenceError};

/// TorchScript model executed through libtorch.
pub struct TorchModel {
    name: String,
    device: Device,
    module: Mutex<CModule>,
}

impl TorchModel {
    pub fn load(name: &str, path: &Path) -> Result<Self, InferenceError> {
        let device = Device::cuda_if_available();
        let module = CModule::load_on_device(path, device).map_err(|e| InferenceError::Load {
            model: name.to_string(),
            message: e.to_string(),
        })?;
        log::info!("Loaded TorchScript model {} on {:?}", name, device);

        Ok(Self {
            name: name.to_string(),
            device,
            module: Mutex::new(module),
        })
    }

    fn runtime_error(&self, e: tch::TchError) -> InferenceError {
        InferenceError::Runtime {
            model: self.name.clone(),
            message: e.to_string(),
        }
    }
}

impl Classifier for TorchModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let data: Vec<f32> = input.iter().copied().collect();
        let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let tensor = Tensor::from_slice(&data).view(shape.as_slice()).to_device(self.device);

        let module = self
            .module
            .lock()
            .map_err(|_| InferenceError::Poisoned(self.name.clone()))?;
        let output = tch::no_grad(|| module.forward_ts(&[tensor]))
            .map_err(|e| self.runtime_error(e))?;

        let flat = output.to_kind(Kind::Float).to_device(Device::Cpu).view([-1]);
        Vec::<f32>::try_from(&flat).map_err(|e| self.runtime_error(e))
    }
}
