//! Core types for the CropGuard advisory engine
//!
//! Everything the engine hands back is a plain value:
//! - Severity is a closed enum, so risk and strategy lookups are total
//! - Treatment and pesticide strategy are never optional on a result
//! - Results are built fresh per call and owned by the caller

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker reported as confidence by the environment pathway
pub const RULE_BASED_MARKER: &str = "RULE_BASED";

/// Crop name used when a classifier label cannot be split
pub const UNKNOWN_CROP: &str = "Unknown Crop";

/// Disease name used when the crop is not catalogued
pub const UNKNOWN_DISEASE: &str = "Unknown";

/// Sentinel disease entry that marks a crop without disease
pub const HEALTHY: &str = "Healthy";

/// Ordinal urgency tier driving risk score and pesticide strategy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        }
    }

    /// Parse a stored label. Unrecognized labels return `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "Low" => Some(Severity::Low),
            "Medium" => Some(Severity::Medium),
            "High" => Some(Severity::High),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the two analysis routes produced a result
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InferenceMode {
    #[serde(rename = "CNN_IMAGE_BASED")]
    ImageBased,
    #[serde(rename = "ENVIRONMENT_RULE_BASED")]
    EnvironmentRuleBased,
}

impl InferenceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InferenceMode::ImageBased => "CNN_IMAGE_BASED",
            InferenceMode::EnvironmentRuleBased => "ENVIRONMENT_RULE_BASED",
        }
    }
}

/// Chemical, organic and preventive guidance for one disease
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treatment {
    pub chemical: String,
    pub organic: String,
    pub prevention: String,
}

impl Treatment {
    /// Advisory applied whenever the knowledge base has no exact entry
    pub fn default_advisory() -> Self {
        Self {
            chemical: "Consult local agriculture expert before chemical use".to_string(),
            organic: "Neem oil or bio-fungicide spray".to_string(),
            prevention: "Regular monitoring and field hygiene".to_string(),
        }
    }
}

/// Humidity (%) and temperature (°C) as supplied by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentReading {
    #[serde(default)]
    pub humidity: f64,
    #[serde(default)]
    pub temperature: f64,
}

impl EnvironmentReading {
    pub fn new(humidity: f64, temperature: f64) -> Self {
        Self {
            humidity,
            temperature,
        }
    }
}

/// Features extracted by the external visual classifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageFeatures {
    /// Packed label such as `Tomato___Late_blight`
    #[serde(default)]
    pub disease: Option<String>,
    /// Percentage string such as `92.40%`
    #[serde(default)]
    pub confidence: Option<String>,
}

impl ImageFeatures {
    pub fn new(disease: impl Into<String>, confidence: impl Into<String>) -> Self {
        Self {
            disease: Some(disease.into()),
            confidence: Some(confidence.into()),
        }
    }
}

/// Confidence exactly as the engine produced it
///
/// The image pathway echoes the classifier's string; the environment
/// pathway reports an opaque marker. Callers normalize it before doing
/// numeric comparisons (see [`crate::confidence::normalize`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConfidenceValue {
    Reported(String),
    RuleBased,
}

impl ConfidenceValue {
    pub fn as_str(&self) -> &str {
        match self {
            ConfidenceValue::Reported(s) => s,
            ConfidenceValue::RuleBased => RULE_BASED_MARKER,
        }
    }
}

impl From<String> for ConfidenceValue {
    fn from(s: String) -> Self {
        if s == RULE_BASED_MARKER {
            ConfidenceValue::RuleBased
        } else {
            ConfidenceValue::Reported(s)
        }
    }
}

impl From<ConfidenceValue> for String {
    fn from(value: ConfidenceValue) -> Self {
        match value {
            ConfidenceValue::Reported(s) => s,
            ConfidenceValue::RuleBased => RULE_BASED_MARKER.to_string(),
        }
    }
}

/// Treatment, strategy and yield note bundled for the farmer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    pub treatment: Treatment,
    pub pesticide_strategy: String,
    pub yield_impact: String,
}

/// Unified output of both pathways
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryResult {
    pub status: String,
    pub crop_type: String,
    pub disease_detected: String,
    pub severity: Severity,
    pub risk_score: f64,
    pub confidence: ConfidenceValue,
    pub inference_mode: InferenceMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_source: Option<String>,
    pub decision_reason: String,
    pub reasoning_clues: Vec<String>,
    pub advisory: Advisory,
}

/// Farmer feedback on a prediction or on the treatment outcome
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(default)]
    pub crop: Option<String>,
    #[serde(default)]
    pub disease: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    /// `None` for open questions that are neither right nor wrong
    #[serde(default)]
    pub correct: Option<bool>,
    /// "Recovered", "No Change" or "Condition Worsened"
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub yield_change: Option<String>,
    #[serde(default)]
    pub days_after_treatment: Option<u32>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl Feedback {
    /// True when nothing identifies what the feedback is about
    pub fn is_empty(&self) -> bool {
        let blank = |s: &Option<String>| s.as_deref().map_or(true, |v| v.trim().is_empty());
        blank(&self.crop) && blank(&self.disease) && blank(&self.comment) && self.correct.is_none()
    }
}
