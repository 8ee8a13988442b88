use serde::{Deserialize, Serialize};
use strum::{EnumCount, IntoEnumIterator};
use strum_macros::{AsRefStr, Display, EnumCount as EnumCountMacro, EnumIter, EnumString};

/// Diagnosis categories, in the order of the model output vector.
///
/// The discriminant of each variant is its position in the output vector, so
/// reordering these variants changes what every deployed model means.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
    EnumCountMacro,
)]
pub enum ClassLabel {
    Bacterial = 0,
    Normal = 1,
    Viral = 2,
}

impl ClassLabel {
    pub fn from_index(index: usize) -> Option<Self> {
        Self::iter().nth(index)
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn count() -> usize {
        Self::COUNT
    }
}

/// Renders a confidence in `[0, 1]` as a percentage with two decimals.
///
/// Rounds half away from zero on the exact binary value, so `0.03125` becomes
/// `"3.13%"`.
pub fn format_confidence(confidence: f32) -> String {
    let hundredths = (f64::from(confidence) * 10_000.0).round();
    format!("{:.2}%", hundredths / 100.0)
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PredictionResponse {
    #[serde(rename = "prediccion")]
    pub prediction: String,
    #[serde(rename = "confianza")]
    pub confidence: String,
    #[serde(
        rename = "modelos_fallidos",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub failed_models: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub models: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_output_order() {
        assert_eq!(ClassLabel::from_index(0), Some(ClassLabel::Bacterial));
        assert_eq!(ClassLabel::from_index(1), Some(ClassLabel::Normal));
        assert_eq!(ClassLabel::from_index(2), Some(ClassLabel::Viral));
        assert_eq!(ClassLabel::from_index(3), None);
        assert_eq!(ClassLabel::count(), 3);
        assert_eq!(ClassLabel::Viral.index(), 2);
        assert_eq!(ClassLabel::Normal.to_string(), "Normal");
    }

    #[test]
    fn confidence_uses_two_decimals() {
        assert_eq!(format_confidence(0.87432), "87.43%");
        assert_eq!(format_confidence(1.0), "100.00%");
        assert_eq!(format_confidence(0.0), "0.00%");
        assert_eq!(format_confidence(0.6), "60.00%");
    }

    #[test]
    fn confidence_rounds_ties_up() {
        // 0.03125 * 10000 is exactly 312.5
        assert_eq!(format_confidence(0.03125), "3.13%");
        assert_eq!(format_confidence(0.87436), "87.44%");
    }

    #[test]
    fn failed_models_omitted_when_empty() {
        let response = PredictionResponse {
            prediction: ClassLabel::Normal.to_string(),
            confidence: format_confidence(0.6),
            failed_models: Vec::new(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"prediccion": "Normal", "confianza": "60.00%"})
        );
    }
}
