//! Confidence parsing, normalization and expert escalation
//!
//! The classifier reports confidence as a percentage string ("92.40%").
//! The environment pathway reports the opaque `RULE_BASED` marker instead.
//! Anything that compares confidence numerically goes through [`normalize`]
//! first.

use crate::types::ConfidenceValue;
use serde::{Deserialize, Serialize};

/// Value substituted when confidence is not numeric
pub const NEUTRAL_CONFIDENCE: f64 = 50.0;

/// Default escalation threshold (percent)
pub const DEFAULT_EXPERT_THRESHOLD: f64 = 60.0;

/// A parsed classifier confidence, in percent
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Confidence(f64);

impl Confidence {
    /// Parse `"92.4%"`, `"92.4"` or `" 92 % "`. Range is not checked,
    /// but NaN and infinities are rejected.
    pub fn parse(raw: &str) -> Result<Self, ConfidenceParseError> {
        let trimmed = raw.trim();
        let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();

        if number.is_empty() {
            return Err(ConfidenceParseError::Missing);
        }

        let value = number
            .parse::<f64>()
            .map_err(|_| ConfidenceParseError::NotNumeric(raw.to_string()))?;
        if !value.is_finite() {
            return Err(ConfidenceParseError::NotFinite(raw.to_string()));
        }
        Ok(Confidence(value))
    }

    pub fn percent(&self) -> f64 {
        self.0
    }
}

/// Why a confidence string could not be read
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfidenceParseError {
    #[error("confidence is missing")]
    Missing,
    #[error("confidence {0:?} is not a number")]
    NotNumeric(String),
    #[error("confidence {0:?} is not finite")]
    NotFinite(String),
}

/// Confidence ready for numeric comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedConfidence {
    pub value: f64,
    /// Original marker when `value` is the neutral substitute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Numeric confidence is used directly; anything else becomes
/// [`NEUTRAL_CONFIDENCE`] with the original marker kept in `kind`.
pub fn normalize(value: &ConfidenceValue) -> NormalizedConfidence {
    match value {
        ConfidenceValue::Reported(raw) => match Confidence::parse(raw) {
            Ok(c) => NormalizedConfidence {
                value: c.percent(),
                kind: None,
            },
            Err(_) => NormalizedConfidence {
                value: NEUTRAL_CONFIDENCE,
                kind: Some(raw.clone()),
            },
        },
        ConfidenceValue::RuleBased => NormalizedConfidence {
            value: NEUTRAL_CONFIDENCE,
            kind: Some(value.as_str().to_string()),
        },
    }
}

/// Where farmers are sent when the AI is unsure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertContacts {
    pub whatsapp: String,
    pub helpline: String,
    pub threshold: f64,
}

impl Default for ExpertContacts {
    fn default() -> Self {
        Self {
            whatsapp: "919876543210".to_string(),
            helpline: "+91-1800-123-456".to_string(),
            threshold: DEFAULT_EXPERT_THRESHOLD,
        }
    }
}

/// Escalation block attached to every analysis response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertConnect {
    pub enabled: bool,
    pub reason: String,
    pub whatsapp: String,
    pub helpline: String,
}

impl ExpertConnect {
    /// Enabled when normalized confidence is strictly below the threshold
    pub fn evaluate(confidence: &NormalizedConfidence, contacts: &ExpertContacts) -> Self {
        Self {
            enabled: confidence.value < contacts.threshold,
            reason: "Low AI confidence".to_string(),
            whatsapp: format!("https://wa.me/{}", contacts.whatsapp),
            helpline: contacts.helpline.clone(),
        }
    }
}
