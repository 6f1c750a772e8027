//! Severity, risk and pesticide rules
//!
//! Pure functions only. Both pathways share risk and strategy; they differ in
//! how severity is derived.

use crate::confidence::{Confidence, ConfidenceParseError};
use crate::types::{EnvironmentReading, Severity};

/// Confidence (percent) at or above which an image finding is High severity
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 85.0;

const HIGH_HUMIDITY: f64 = 75.0;
const HIGH_TEMPERATURE: f64 = 30.0;
const MEDIUM_HUMIDITY: f64 = 60.0;

/// Severity from a parsed classifier confidence.
///
/// Confidence alone never signals Low: a confident finding is High and
/// everything else is Medium.
pub fn severity_from_confidence(confidence: &Result<Confidence, ConfidenceParseError>) -> Severity {
    match confidence {
        Ok(c) if c.percent() >= HIGH_CONFIDENCE_THRESHOLD => Severity::High,
        Ok(_) => Severity::Medium,
        Err(ConfidenceParseError::Missing)
        | Err(ConfidenceParseError::NotNumeric(_))
        | Err(ConfidenceParseError::NotFinite(_)) => {
            Severity::Medium
        }
    }
}

/// Severity from humidity and temperature. Thresholds are strict.
pub fn assess_severity(env: &EnvironmentReading) -> Severity {
    if env.humidity > HIGH_HUMIDITY && env.temperature > HIGH_TEMPERATURE {
        Severity::High
    } else if env.humidity > MEDIUM_HUMIDITY {
        Severity::Medium
    } else {
        Severity::Low
    }
}

pub fn risk_score(severity: Severity) -> f64 {
    match severity {
        Severity::Low => 0.2,
        Severity::Medium => 0.5,
        Severity::High => 0.8,
    }
}

/// Risk for a stored severity label; unrecognized labels score 0.5
pub fn risk_score_for_label(label: &str) -> f64 {
    Severity::from_label(label).map(risk_score).unwrap_or(0.5)
}

pub fn pesticide_strategy(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "Targeted chemical treatment required",
        Severity::Medium => "Organic treatment with limited chemical use",
        Severity::Low => "Preventive organic measures only",
    }
}

/// Strategy for a stored severity label; unrecognized labels get the Low text
pub fn pesticide_strategy_for_label(label: &str) -> &'static str {
    pesticide_strategy(Severity::from_label(label).unwrap_or(Severity::Low))
}
