//! Advisory Engine
//!
//! Turns classifier features or environment readings into one
//! [`AdvisoryResult`]. Neither pathway fails: malformed or unmatched input
//! degrades to the generic advisory with a reasoning clue explaining why.
//!
//! The engine never calls the visual model or any other I/O. It holds a
//! shared read-only [`KnowledgeBase`] and can be cloned freely across
//! request handlers.

use crate::confidence::{Confidence, ConfidenceParseError};
use crate::decision::{assess_severity, pesticide_strategy, risk_score, severity_from_confidence};
use crate::knowledge::KnowledgeBase;
use crate::labels::parse_crop_and_disease;
use crate::types::*;
use std::sync::Arc;
use tracing::debug;

const STATUS_SUCCESS: &str = "SUCCESS";
const MODEL_SOURCE_CNN: &str = "cnn";

/// Label reported when the classifier gave none
const LABEL_PLACEHOLDER: &str = "Uncertain";
/// Confidence reported when the classifier gave none
const CONFIDENCE_PLACEHOLDER: &str = "N/A";

const CLUE_AUTO_DETECTED: &str = "Crop automatically detected from image";
const CLUE_VISUAL_CLASSIFIER: &str = "Disease identified using CNN visual patterns";
const CLUE_NO_KB_MATCH: &str = "No exact match found in knowledge base";
const CLUE_NO_IMAGE: &str = "No image uploaded";
const CLUE_ENVIRONMENT: &str = "Environmental conditions analyzed";
const CLUE_CROP_NOT_CATALOGUED: &str = "Crop not present in knowledge base";

const REASON_MATCHED: &str = "Disease matched with knowledge base";
const REASON_GENERIC_IMAGE: &str = "Generic advisory applied (unknown crop/disease)";
const REASON_GENERIC: &str = "Generic advisory applied";
const REASON_RULE_BASED: &str = "Rule-based crop and environment analysis";

const YIELD_EARLY_DETECTION: &str = "Early detection improves yield and reduces losses";
const YIELD_PREVENTIVE: &str = "Preventive care reduces risk";
const YIELD_EARLY_INTERVENTION: &str = "Early intervention improves yield";

/// The advisory engine shared by the HTTP server, CLI and batch sync
#[derive(Debug, Clone)]
pub struct AdvisoryEngine {
    kb: Arc<KnowledgeBase>,
}

impl AdvisoryEngine {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    /// Image pathway: classifier label + confidence
    pub fn analyze_with_image(&self, features: &ImageFeatures) -> AdvisoryResult {
        let label = features.disease.as_deref().unwrap_or(LABEL_PLACEHOLDER);
        let raw_confidence = features
            .confidence
            .as_deref()
            .unwrap_or(CONFIDENCE_PLACEHOLDER);

        let (crop, disease) = parse_crop_and_disease(label);

        let mut reasoning_clues = vec![
            CLUE_AUTO_DETECTED.to_string(),
            CLUE_VISUAL_CLASSIFIER.to_string(),
        ];

        let parsed = Confidence::parse(raw_confidence);
        let severity = severity_from_confidence(&parsed);
        if let Err(err) = &parsed {
            reasoning_clues.push(degraded_confidence_clue(err));
        }

        let (treatment, decision_reason) = match self.kb.treatment(&crop, &disease) {
            Some(t) => (t.clone(), REASON_MATCHED),
            None => {
                reasoning_clues.push(CLUE_NO_KB_MATCH.to_string());
                (Treatment::default_advisory(), REASON_GENERIC_IMAGE)
            }
        };

        debug!(
            crop = %crop,
            disease = %disease,
            severity = %severity,
            matched = decision_reason == REASON_MATCHED,
            "image pathway decision"
        );

        AdvisoryResult {
            status: STATUS_SUCCESS.to_string(),
            crop_type: crop,
            disease_detected: disease,
            severity,
            risk_score: risk_score(severity),
            confidence: ConfidenceValue::Reported(raw_confidence.to_string()),
            inference_mode: InferenceMode::ImageBased,
            model_source: Some(MODEL_SOURCE_CNN.to_string()),
            decision_reason: decision_reason.to_string(),
            reasoning_clues,
            advisory: Advisory {
                treatment,
                pesticide_strategy: pesticide_strategy(severity).to_string(),
                yield_impact: YIELD_EARLY_DETECTION.to_string(),
            },
        }
    }

    /// Environment pathway: crop name + humidity/temperature.
    ///
    /// `crop_type` must be non-empty; the caller rejects empty crops before
    /// getting here.
    pub fn analyze_without_image(
        &self,
        crop_type: &str,
        environment: &EnvironmentReading,
    ) -> AdvisoryResult {
        let severity = assess_severity(environment);

        let mut reasoning_clues = vec![CLUE_NO_IMAGE.to_string(), CLUE_ENVIRONMENT.to_string()];

        let Some(crop) = self.kb.crop(crop_type) else {
            reasoning_clues.push(CLUE_CROP_NOT_CATALOGUED.to_string());
            debug!(crop = %crop_type, severity = %severity, "crop not catalogued");

            return rule_based_result(
                crop_type,
                UNKNOWN_DISEASE.to_string(),
                severity,
                REASON_GENERIC,
                reasoning_clues,
                Treatment::default_advisory(),
                YIELD_PREVENTIVE,
            );
        };

        let disease = select_disease(severity, &crop.disease_names_excluding_healthy());
        let treatment = crop
            .treatment(&disease)
            .cloned()
            .unwrap_or_else(Treatment::default_advisory);

        debug!(
            crop = %crop_type,
            disease = %disease,
            severity = %severity,
            humidity = environment.humidity,
            temperature = environment.temperature,
            "environment pathway decision"
        );

        rule_based_result(
            crop_type,
            disease,
            severity,
            REASON_RULE_BASED,
            reasoning_clues,
            treatment,
            YIELD_EARLY_INTERVENTION,
        )
    }
}

/// Order-dependent pick from the crop's non-Healthy diseases.
///
/// High takes the first, Medium the second, anything else is Healthy.
/// This is pattern matching on catalogue position, not a diagnosis.
fn select_disease(severity: Severity, diseases: &[&str]) -> String {
    let picked = match severity {
        Severity::High => diseases.first(),
        Severity::Medium => diseases.get(1),
        Severity::Low => None,
    };
    picked.map(|d| d.to_string()).unwrap_or_else(|| HEALTHY.to_string())
}

fn degraded_confidence_clue(err: &ConfidenceParseError) -> String {
    format!("Confidence unreadable ({err}); severity defaulted to Medium")
}

fn rule_based_result(
    crop_type: &str,
    disease: String,
    severity: Severity,
    decision_reason: &str,
    reasoning_clues: Vec<String>,
    treatment: Treatment,
    yield_impact: &str,
) -> AdvisoryResult {
    AdvisoryResult {
        status: STATUS_SUCCESS.to_string(),
        crop_type: crop_type.to_string(),
        disease_detected: disease,
        severity,
        risk_score: risk_score(severity),
        confidence: ConfidenceValue::RuleBased,
        inference_mode: InferenceMode::EnvironmentRuleBased,
        model_source: None,
        decision_reason: decision_reason.to_string(),
        reasoning_clues,
        advisory: Advisory {
            treatment,
            pesticide_strategy: pesticide_strategy(severity).to_string(),
            yield_impact: yield_impact.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn treatment(tag: &str) -> Treatment {
        Treatment {
            chemical: format!("{tag}-chemical"),
            organic: format!("{tag}-organic"),
            prevention: format!("{tag}-prevention"),
        }
    }

    fn engine_with(entries: Vec<(&str, Vec<&str>)>) -> AdvisoryEngine {
        let kb = KnowledgeBase::from_entries(entries.into_iter().map(|(crop, diseases)| {
            let diseases: Vec<(String, Treatment)> = diseases
                .into_iter()
                .map(|d| (d.to_string(), treatment(d)))
                .collect();
            (crop.to_string(), diseases)
        }))
        .unwrap();
        AdvisoryEngine::new(Arc::new(kb))
    }

    fn test_engine() -> AdvisoryEngine {
        engine_with(vec![
            ("Potato", vec!["Early Blight", "Late Blight", "Healthy"]),
            ("Tomato", vec!["Late Blight", "Healthy"]),
            ("Wheat", vec!["Stem Rust", "Healthy", "Leaf Rust"]),
            ("Rice", vec!["Blast", "Healthy"]),
            ("Orange", vec!["Citrus Greening"]),
            ("Barley", vec![]),
        ])
    }

    fn assert_complete(result: &AdvisoryResult) {
        let t = &result.advisory.treatment;
        assert!(!t.chemical.is_empty());
        assert!(!t.organic.is_empty());
        assert!(!t.prevention.is_empty());
        assert!(!result.advisory.pesticide_strategy.is_empty());
        assert!(!result.advisory.yield_impact.is_empty());
        assert!((0.0..=1.0).contains(&result.risk_score));
        assert_eq!(result.status, "SUCCESS");
    }

    // =========================================================================
    // image pathway
    // =========================================================================

    #[test]
    fn test_image_healthy_potato_high_confidence() {
        let engine = test_engine();
        let result = engine.analyze_with_image(&ImageFeatures::new("Potato___Healthy", "92%"));

        assert_eq!(result.crop_type, "Potato");
        assert_eq!(result.disease_detected, "Healthy");
        assert_eq!(result.severity, Severity::High);
        assert_relative_eq!(result.risk_score, 0.8);
        assert_eq!(result.inference_mode, InferenceMode::ImageBased);
        assert_eq!(result.model_source.as_deref(), Some("cnn"));
        assert_eq!(result.decision_reason, "Disease matched with knowledge base");
        assert_eq!(result.advisory.treatment, treatment("Healthy"));
        assert_eq!(result.confidence, ConfidenceValue::Reported("92%".to_string()));
        assert_complete(&result);
    }

    #[test]
    fn test_image_baseline_clues_come_first() {
        let engine = test_engine();
        let result = engine.analyze_with_image(&ImageFeatures::new("Durian___Rot", "bad"));

        assert_eq!(result.reasoning_clues[0], "Crop automatically detected from image");
        assert_eq!(result.reasoning_clues[1], "Disease identified using CNN visual patterns");
        assert!(result.reasoning_clues.len() > 2);
    }

    #[test]
    fn test_image_matched_label_uses_kb_treatment() {
        let engine = test_engine();
        let result = engine.analyze_with_image(&ImageFeatures::new("Tomato___Late_blight", "70.5%"));

        assert_eq!(result.disease_detected, "Late Blight");
        assert_eq!(result.severity, Severity::Medium);
        assert_relative_eq!(result.risk_score, 0.5);
        assert_eq!(result.advisory.treatment, treatment("Late Blight"));
        assert_eq!(
            result.advisory.pesticide_strategy,
            "Organic treatment with limited chemical use"
        );
        assert_eq!(result.reasoning_clues.len(), 2);
    }

    #[test]
    fn test_image_unmatched_disease_gets_generic_advisory() {
        let engine = test_engine();
        let result = engine.analyze_with_image(&ImageFeatures::new("Tomato___Leaf_Mold", "88%"));

        assert_eq!(result.advisory.treatment, Treatment::default_advisory());
        assert_eq!(
            result.decision_reason,
            "Generic advisory applied (unknown crop/disease)"
        );
        assert!(result
            .reasoning_clues
            .contains(&"No exact match found in knowledge base".to_string()));
        assert_eq!(result.severity, Severity::High);
    }

    #[test]
    fn test_image_unparseable_confidence_is_explained() {
        let engine = test_engine();
        let result = engine.analyze_with_image(&ImageFeatures::new("Potato___Late_blight", "N/A"));

        assert_eq!(result.severity, Severity::Medium);
        assert!(result
            .reasoning_clues
            .iter()
            .any(|c| c.contains("severity defaulted to Medium")));
        // still matched against the knowledge base
        assert_eq!(result.decision_reason, "Disease matched with knowledge base");
    }

    #[test]
    fn test_image_non_finite_confidence_is_explained() {
        let engine = test_engine();
        for raw in ["NaN", "inf%"] {
            let result = engine.analyze_with_image(&ImageFeatures::new("Potato___Late_blight", raw));

            assert_eq!(result.severity, Severity::Medium, "{raw}");
            assert!(result
                .reasoning_clues
                .iter()
                .any(|c| c.contains("severity defaulted to Medium")));
        }
    }

    #[test]
    fn test_image_missing_features_degrade() {
        let engine = test_engine();
        let result = engine.analyze_with_image(&ImageFeatures::default());

        assert_eq!(result.crop_type, "Unknown Crop");
        assert_eq!(result.disease_detected, "Uncertain");
        assert_eq!(result.severity, Severity::Medium);
        assert_eq!(result.confidence, ConfidenceValue::Reported("N/A".to_string()));
        assert_eq!(result.advisory.treatment, Treatment::default_advisory());
        assert_complete(&result);
    }

    #[test]
    fn test_image_empty_label() {
        let engine = test_engine();
        let result = engine.analyze_with_image(&ImageFeatures::new("", "95%"));

        assert_eq!(result.crop_type, "Unknown Crop");
        assert_eq!(result.disease_detected, "");
        assert_eq!(result.severity, Severity::High);
        assert_eq!(result.advisory.treatment, Treatment::default_advisory());
    }

    // =========================================================================
    // environment pathway
    // =========================================================================

    #[test]
    fn test_env_high_selects_first_disease() {
        let engine = test_engine();
        let result = engine.analyze_without_image("Wheat", &EnvironmentReading::new(80.0, 35.0));

        assert_eq!(result.severity, Severity::High);
        assert_eq!(result.disease_detected, "Stem Rust");
        assert_eq!(result.advisory.treatment, treatment("Stem Rust"));
        assert_eq!(result.inference_mode, InferenceMode::EnvironmentRuleBased);
        assert_eq!(result.confidence, ConfidenceValue::RuleBased);
        assert_eq!(result.model_source, None);
        assert_eq!(result.decision_reason, "Rule-based crop and environment analysis");
        assert_eq!(
            result.reasoning_clues,
            vec!["No image uploaded", "Environmental conditions analyzed"]
        );
    }

    #[test]
    fn test_env_medium_selects_second_disease_skipping_healthy() {
        let engine = test_engine();
        let result = engine.analyze_without_image("Wheat", &EnvironmentReading::new(65.0, 20.0));

        assert_eq!(result.severity, Severity::Medium);
        assert_eq!(result.disease_detected, "Leaf Rust");
        assert_eq!(result.advisory.treatment, treatment("Leaf Rust"));
    }

    #[test]
    fn test_env_medium_with_single_disease_falls_to_healthy() {
        let engine = test_engine();
        let result = engine.analyze_without_image("Rice", &EnvironmentReading::new(65.0, 20.0));

        assert_eq!(result.severity, Severity::Medium);
        assert_eq!(result.disease_detected, "Healthy");
        assert_eq!(result.advisory.treatment, treatment("Healthy"));
    }

    #[test]
    fn test_env_low_is_healthy() {
        let engine = test_engine();
        let result = engine.analyze_without_image("Potato", &EnvironmentReading::new(40.0, 25.0));

        assert_eq!(result.severity, Severity::Low);
        assert_relative_eq!(result.risk_score, 0.2);
        assert_eq!(result.disease_detected, "Healthy");
        assert_eq!(result.advisory.pesticide_strategy, "Preventive organic measures only");
    }

    #[test]
    fn test_env_boundary_humidity_75_is_medium() {
        let engine = test_engine();
        let result = engine.analyze_without_image("Potato", &EnvironmentReading::new(75.0, 31.0));

        assert_eq!(result.severity, Severity::Medium);
        assert_eq!(result.disease_detected, "Late Blight");
    }

    #[test]
    fn test_env_selected_healthy_without_entry_uses_default() {
        let engine = test_engine();
        let result = engine.analyze_without_image("Orange", &EnvironmentReading::new(65.0, 25.0));

        assert_eq!(result.disease_detected, "Healthy");
        assert_eq!(result.advisory.treatment, Treatment::default_advisory());
        assert_eq!(result.decision_reason, "Rule-based crop and environment analysis");
    }

    #[test]
    fn test_env_crop_without_diseases() {
        let engine = test_engine();
        let result = engine.analyze_without_image("Barley", &EnvironmentReading::new(90.0, 40.0));

        assert_eq!(result.severity, Severity::High);
        assert_eq!(result.disease_detected, "Healthy");
        assert_eq!(result.advisory.treatment, Treatment::default_advisory());
    }

    #[test]
    fn test_env_unknown_crop_degrades() {
        let engine = test_engine();
        let result = engine.analyze_without_image("Durian", &EnvironmentReading::new(80.0, 35.0));

        assert_eq!(result.crop_type, "Durian");
        assert_eq!(result.disease_detected, "Unknown");
        assert_eq!(result.advisory.treatment, Treatment::default_advisory());
        assert_eq!(result.decision_reason, "Generic advisory applied");
        assert_eq!(result.advisory.yield_impact, "Preventive care reduces risk");
        assert!(result
            .reasoning_clues
            .contains(&"Crop not present in knowledge base".to_string()));
        assert_eq!(result.severity, Severity::High);
    }

    #[test]
    fn test_select_disease_policy() {
        let two = ["A", "B"];
        let one = ["A"];
        assert_eq!(select_disease(Severity::High, &two), "A");
        assert_eq!(select_disease(Severity::Medium, &two), "B");
        assert_eq!(select_disease(Severity::Low, &two), "Healthy");
        assert_eq!(select_disease(Severity::Medium, &one), "Healthy");
        assert_eq!(select_disease(Severity::High, &[]), "Healthy");
    }

    // =========================================================================
    // every branch yields a complete advisory
    // =========================================================================

    #[test]
    fn test_every_branch_has_treatment_and_strategy() {
        let engine = test_engine();

        let labels = [
            "Potato___Healthy",
            "Potato___Late_blight",
            "Tomato___Unknown_thing",
            "Durian___Rot",
            "no-separator",
            "",
        ];
        let confidences = ["99%", "85", "84.9%", "0%", "N/A", ""];
        for label in labels {
            for conf in confidences {
                let result = engine.analyze_with_image(&ImageFeatures::new(label, conf));
                assert_complete(&result);
            }
        }
        assert_complete(&engine.analyze_with_image(&ImageFeatures::default()));

        let crops = ["Potato", "Tomato", "Wheat", "Rice", "Orange", "Barley", "Durian"];
        let readings = [
            EnvironmentReading::new(80.0, 35.0),
            EnvironmentReading::new(75.0, 31.0),
            EnvironmentReading::new(65.0, 10.0),
            EnvironmentReading::new(60.0, 40.0),
            EnvironmentReading::new(-10.0, -5.0),
            EnvironmentReading::new(150.0, 90.0),
        ];
        for crop in crops {
            for reading in &readings {
                let result = engine.analyze_without_image(crop, reading);
                assert_complete(&result);
            }
        }
    }

    #[test]
    fn test_bundled_catalogue_image_scenario() {
        let kb = KnowledgeBase::bundled().unwrap();
        let engine = AdvisoryEngine::new(Arc::new(kb));

        let result = engine.analyze_with_image(&ImageFeatures::new(
            "Cherry_(including_sour)___Powdery_mildew",
            "91.2%",
        ));
        assert_eq!(result.crop_type, "Cherry");
        assert_eq!(result.disease_detected, "Powdery Mildew");
        assert_eq!(result.decision_reason, "Disease matched with knowledge base");
    }
}
