use log::warn;
use ndarray::Array4;
use shared::ClassLabel;

use super::model::{Classifier, InferenceError};

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: ClassLabel,
    pub index: usize,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnsemblePrediction {
    pub prediction: Prediction,
    /// Averaged scores the prediction was taken from.
    pub scores: Vec<f32>,
    /// Number of members whose output was averaged.
    pub contributors: usize,
    /// Names of the members that failed on this input.
    pub failed: Vec<String>,
}

/// The set of models loaded at startup, averaged with equal weight.
pub struct Ensemble {
    members: Vec<Box<dyn Classifier>>,
}

impl Ensemble {
    pub fn new(members: Vec<Box<dyn Classifier>>) -> Result<Self, InferenceError> {
        if members.is_empty() {
            return Err(InferenceError::EmptyEnsemble);
        }
        Ok(Self { members })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member_names(&self) -> Vec<String> {
        self.members.iter().map(|m| m.name().to_string()).collect()
    }

    /// Runs every member on `input` and classifies the mean of their outputs.
    ///
    /// A member that errors or returns a malformed vector is left out of the
    /// average; the request only fails when no member succeeds.
    pub fn predict(&self, input: &Array4<f32>) -> Result<EnsemblePrediction, InferenceError> {
        let mut outputs = Vec::with_capacity(self.members.len());
        let mut failures = Vec::new();

        for member in &self.members {
            match member.predict(input).and_then(|scores| validate(member.name(), scores)) {
                Ok(scores) => outputs.push(scores),
                Err(e) => {
                    warn!("Ensemble member {} skipped: {}", member.name(), e);
                    failures.push((member.name().to_string(), e.to_string()));
                }
            }
        }

        if outputs.is_empty() {
            return Err(InferenceError::AllMembersFailed(
                failures.into_iter().map(|(_, message)| message).collect(),
            ));
        }

        let scores = mean(&outputs);
        let prediction = classify(&scores)?;

        Ok(EnsemblePrediction {
            prediction,
            scores,
            contributors: outputs.len(),
            failed: failures.into_iter().map(|(name, _)| name).collect(),
        })
    }
}

fn validate(model: &str, scores: Vec<f32>) -> Result<Vec<f32>, InferenceError> {
    let expected = ClassLabel::count();
    if scores.len() != expected {
        return Err(InferenceError::OutputShape {
            model: model.to_string(),
            expected,
            actual: scores.len(),
        });
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(InferenceError::NonFinite {
            model: model.to_string(),
        });
    }
    Ok(scores)
}

fn mean(outputs: &[Vec<f32>]) -> Vec<f32> {
    let count = outputs.len() as f32;
    let mut sums = vec![0.0f32; ClassLabel::count()];
    for scores in outputs {
        for (sum, score) in sums.iter_mut().zip(scores) {
            *sum += score;
        }
    }
    sums.into_iter().map(|sum| sum / count).collect()
}

/// Picks the highest score; ties go to the lowest index.
pub fn classify(scores: &[f32]) -> Result<Prediction, InferenceError> {
    let (index, confidence) = scores
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, score)| match best {
            Some((_, top)) if score <= top => best,
            _ => Some((i, score)),
        })
        .ok_or(InferenceError::EmptyEnsemble)?;

    let label = ClassLabel::from_index(index).ok_or_else(|| InferenceError::OutputShape {
        model: "ensemble".to_string(),
        expected: ClassLabel::count(),
        actual: scores.len(),
    })?;

    Ok(Prediction {
        label,
        index,
        confidence,
    })
}
