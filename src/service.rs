//! Advisory service: the layer every caller goes through
//!
//! Wraps the pure [`AdvisoryEngine`] with what a real request needs:
//! input validation, confidence normalization, expert escalation, weather,
//! report ids and persistence.
//!
//! ```rust,ignore
//! // At startup
//! let service = AdvisoryService::from_settings(&settings)?;
//!
//! // Per request
//! let response = service.analyze(request).await?;
//! service.record_feedback(&feedback)?;
//! ```

use crate::config::Settings;
use crate::confidence::{normalize, ExpertConnect, ExpertContacts, NormalizedConfidence};
use crate::db::{self, FeedbackSummary, NewReport, StoredReport};
use crate::engine::AdvisoryEngine;
use crate::knowledge::KnowledgeBase;
use crate::types::*;
use crate::weather::{OpenWeatherClient, WeatherProvider, WeatherSnapshot};
use anyhow::Context;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

/// Confidence assumed for offline results that did not record one
const OFFLINE_DEFAULT_CONFIDENCE: &str = "50%";

/// Caller-side contract violations, reported as bad requests
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Crop required")]
    CropRequired,
    #[error("No feedback data")]
    EmptyFeedback,
    #[error("No data")]
    EmptySync,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// One analysis request. A classifier label selects the image pathway;
/// otherwise `crop` is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Packed classifier label, e.g. `Tomato___Late_blight`
    #[serde(default)]
    pub disease: Option<String>,
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(default)]
    pub crop: Option<String>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub city: Option<String>,
}

impl AnalysisRequest {
    fn image_features(&self) -> Option<ImageFeatures> {
        let label = self.disease.as_deref().map(str::trim).filter(|l| !l.is_empty())?;
        Some(ImageFeatures {
            disease: Some(label.to_string()),
            confidence: self.confidence.clone(),
        })
    }
}

/// A result captured on a device without connectivity, synced later
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfflineRecord {
    #[serde(default)]
    pub crop_disease_label: Option<String>,
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// What the caller receives for one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub report_id: String,
    pub status: String,
    pub crop_type: String,
    pub disease_detected: String,
    pub severity: Severity,
    pub risk_score: f64,
    /// Normalized, 0-100
    pub confidence: f64,
    /// Original marker when `confidence` is the neutral substitute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_type: Option<String>,
    pub inference_mode: InferenceMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_source: Option<String>,
    pub decision_reason: String,
    pub reasoning_clues: Vec<String>,
    pub advisory: Advisory,
    pub expert_connect: ExpertConnect,
    pub weather_data: Option<WeatherSnapshot>,
    pub offline_mode: bool,
}

/// Outcome of a batch sync
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub synced: usize,
    pub failed: usize,
    pub report_ids: Vec<String>,
}

pub struct AdvisoryService {
    engine: AdvisoryEngine,
    conn: Mutex<Connection>,
    weather: Arc<dyn WeatherProvider>,
    contacts: ExpertContacts,
}

impl AdvisoryService {
    pub fn new(
        engine: AdvisoryEngine,
        conn: Connection,
        weather: Arc<dyn WeatherProvider>,
        contacts: ExpertContacts,
    ) -> Self {
        Self {
            engine,
            conn: Mutex::new(conn),
            weather,
            contacts,
        }
    }

    /// Load the knowledge base, open the report database and build the
    /// weather client. A knowledge base that fails to load is fatal.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let kb = match &settings.kb_path {
            Some(path) => KnowledgeBase::load(path)
                .with_context(|| format!("Failed to load knowledge base from {:?}", path))?,
            None => KnowledgeBase::bundled().context("Bundled knowledge base is invalid")?,
        };
        info!(
            crops = kb.crop_count(),
            diseases = kb.disease_count(),
            "Knowledge base loaded"
        );

        let db_path = settings.db_path();
        let conn = db::init_db(&db_path)?;
        info!("Report database at {:?}", db_path);

        if settings.weather_api_key.is_none() {
            warn!("WEATHER_API_KEY not set, weather lookups disabled");
        }
        let weather = OpenWeatherClient::new(
            settings.weather_api_key.clone(),
            settings.weather_base_url.clone(),
        )
        .context("Failed to build weather client")?;

        Ok(Self::new(
            AdvisoryEngine::new(Arc::new(kb)),
            conn,
            Arc::new(weather),
            settings.expert_contacts(),
        ))
    }

    pub fn engine(&self) -> &AdvisoryEngine {
        &self.engine
    }

    /// Analyze, escalate, persist
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResponse, ServiceError> {
        let image = request.image_features();
        let crop = request
            .crop
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let (result, weather) = match (image, crop) {
            (Some(features), _) => {
                let weather = self.lookup_weather(request.city.as_deref()).await;
                (self.engine.analyze_with_image(&features), weather)
            }
            (None, Some(crop)) => {
                let weather = self.lookup_weather(request.city.as_deref()).await;
                let reading = EnvironmentReading {
                    humidity: request
                        .humidity
                        .or(weather.as_ref().map(|w| w.humidity))
                        .unwrap_or_default(),
                    temperature: request
                        .temperature
                        .or(weather.as_ref().map(|w| w.temperature))
                        .unwrap_or_default(),
                };
                (self.engine.analyze_without_image(crop, &reading), weather)
            }
            (None, None) => return Err(RequestError::CropRequired.into()),
        };

        let normalized = normalize(&result.confidence);
        let expert = ExpertConnect::evaluate(&normalized, &self.contacts);

        self.persist(result, normalized, expert, weather, false)
    }

    /// Re-run an offline result through the image pathway and store it.
    /// A record without a label is rejected. Offline results are past the
    /// point of escalation.
    pub async fn sync_offline(&self, record: OfflineRecord) -> Result<AnalysisResponse, ServiceError> {
        let label = record
            .crop_disease_label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or(RequestError::EmptySync)?;

        let features = ImageFeatures {
            disease: Some(label.to_string()),
            confidence: Some(
                record
                    .confidence
                    .unwrap_or_else(|| OFFLINE_DEFAULT_CONFIDENCE.to_string()),
            ),
        };

        let weather = self.lookup_weather(record.city.as_deref()).await;
        let result = self.engine.analyze_with_image(&features);

        let normalized = normalize(&result.confidence);
        let mut expert = ExpertConnect::evaluate(&normalized, &self.contacts);
        expert.enabled = false;

        self.persist(result, normalized, expert, weather, true)
    }

    /// Sync a queue of offline results; one bad record does not stop the rest
    pub async fn sync_batch(&self, records: Vec<OfflineRecord>) -> Result<SyncSummary, ServiceError> {
        if records.is_empty() {
            return Err(RequestError::EmptySync.into());
        }

        let mut summary = SyncSummary::default();
        for record in records {
            match self.sync_offline(record).await {
                Ok(response) => {
                    summary.synced += 1;
                    summary.report_ids.push(response.report_id);
                }
                Err(e) => {
                    warn!(error = %e, "offline record failed to sync");
                    summary.failed += 1;
                }
            }
        }

        info!(synced = summary.synced, failed = summary.failed, "Offline sync finished");
        Ok(summary)
    }

    pub fn record_feedback(&self, feedback: &Feedback) -> Result<(), ServiceError> {
        if feedback.is_empty() {
            return Err(RequestError::EmptyFeedback.into());
        }
        let conn = self.lock()?;
        db::insert_feedback(&conn, feedback)?;
        Ok(())
    }

    pub fn report(&self, report_id: &str) -> anyhow::Result<Option<StoredReport>> {
        let conn = self.lock()?;
        db::get_report(&conn, report_id)
    }

    pub fn recent_reports(&self, limit: usize) -> anyhow::Result<Vec<StoredReport>> {
        let conn = self.lock()?;
        db::recent_reports(&conn, limit)
    }

    pub fn feedback_summary(&self) -> anyhow::Result<FeedbackSummary> {
        let conn = self.lock()?;
        db::feedback_summary(&conn)
    }

    async fn lookup_weather(&self, city: Option<&str>) -> Option<WeatherSnapshot> {
        match city.map(str::trim).filter(|c| !c.is_empty()) {
            Some(city) => self.weather.current(city).await,
            None => None,
        }
    }

    fn persist(
        &self,
        result: AdvisoryResult,
        normalized: NormalizedConfidence,
        expert: ExpertConnect,
        weather: Option<WeatherSnapshot>,
        offline_mode: bool,
    ) -> Result<AnalysisResponse, ServiceError> {
        let report_id = Uuid::new_v4().simple().to_string();

        {
            let conn = self.lock()?;
            db::insert_report(
                &conn,
                &NewReport {
                    report_id: &report_id,
                    crop: &result.crop_type,
                    disease: &result.disease_detected,
                    severity: result.severity.as_str(),
                    confidence: normalized.value,
                    advisory: &result.advisory,
                    expert_enabled: expert.enabled,
                    offline_mode,
                },
            )?;
        }

        info!(
            report_id = %report_id,
            crop = %result.crop_type,
            disease = %result.disease_detected,
            severity = %result.severity,
            mode = result.inference_mode.as_str(),
            "Report stored"
        );

        Ok(AnalysisResponse {
            report_id,
            status: result.status,
            crop_type: result.crop_type,
            disease_detected: result.disease_detected,
            severity: result.severity,
            risk_score: result.risk_score,
            confidence: normalized.value,
            confidence_type: normalized.kind,
            inference_mode: result.inference_mode,
            model_source: result.model_source,
            decision_reason: result.decision_reason,
            reasoning_clues: result.reasoning_clues,
            advisory: result.advisory,
            expert_connect: expert,
            weather_data: weather,
            offline_mode,
        })
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("report database lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct FixedWeather(WeatherSnapshot);

    #[async_trait]
    impl WeatherProvider for FixedWeather {
        async fn current(&self, _city: &str) -> Option<WeatherSnapshot> {
            Some(self.0.clone())
        }
    }

    fn humid_weather() -> WeatherSnapshot {
        WeatherSnapshot {
            temperature: 34.0,
            humidity: 82.0,
            weather: "overcast clouds".to_string(),
            wind_speed: 2.1,
        }
    }

    fn setup_service(weather: Arc<dyn WeatherProvider>) -> (AdvisoryService, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let conn = db::init_db(&dir.path().join("test.db")).unwrap();
        let engine = AdvisoryEngine::new(Arc::new(KnowledgeBase::bundled().unwrap()));
        let service = AdvisoryService::new(engine, conn, weather, ExpertContacts::default());
        (service, dir)
    }

    fn no_weather() -> Arc<dyn WeatherProvider> {
        Arc::new(crate::weather::NoWeather)
    }

    #[test]
    fn test_from_settings_builds_service() {
        let dir = tempdir().unwrap();
        let settings = Settings {
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        };

        let service = AdvisoryService::from_settings(&settings).unwrap();
        assert_eq!(service.engine().knowledge_base().crop_count(), 13);
        assert!(settings.db_path().exists());
    }

    #[tokio::test]
    async fn test_missing_crop_without_image_is_rejected() {
        let (service, _dir) = setup_service(no_weather());

        let err = service.analyze(AnalysisRequest::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Request(RequestError::CropRequired)));

        let blank = AnalysisRequest {
            crop: Some("   ".to_string()),
            disease: Some("".to_string()),
            ..Default::default()
        };
        let err = service.analyze(blank).await.unwrap_err();
        assert!(matches!(err, ServiceError::Request(RequestError::CropRequired)));
    }

    #[tokio::test]
    async fn test_image_request_normalizes_percent_confidence() {
        let (service, _dir) = setup_service(no_weather());

        let response = service
            .analyze(AnalysisRequest {
                disease: Some("Tomato___Late_blight".to_string()),
                confidence: Some("92.5%".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(response.confidence, 92.5);
        assert_eq!(response.confidence_type, None);
        assert!(!response.expert_connect.enabled);
        assert_eq!(response.severity, Severity::High);
        assert_eq!(response.inference_mode, InferenceMode::ImageBased);

        let stored = service.report(&response.report_id).unwrap().unwrap();
        assert_eq!(stored.disease, "Late Blight");
        assert_eq!(stored.confidence, 92.5);
        assert!(!stored.expert_enabled);
    }

    #[tokio::test]
    async fn test_environment_request_escalates_rule_based_confidence() {
        let (service, _dir) = setup_service(no_weather());

        let response = service
            .analyze(AnalysisRequest {
                crop: Some("Wheat".to_string()),
                humidity: Some(80.0),
                temperature: Some(35.0),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(response.confidence, 50.0);
        assert_eq!(response.confidence_type.as_deref(), Some("RULE_BASED"));
        assert!(response.expert_connect.enabled);
        assert_eq!(response.disease_detected, "Leaf Rust");
        assert!(response.weather_data.is_none());

        let stored = service.report(&response.report_id).unwrap().unwrap();
        assert!(stored.expert_enabled);
    }

    #[tokio::test]
    async fn test_weather_fills_missing_readings_only() {
        let (service, _dir) = setup_service(Arc::new(FixedWeather(humid_weather())));

        let from_weather = service
            .analyze(AnalysisRequest {
                crop: Some("Potato".to_string()),
                city: Some("Pune".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(from_weather.severity, Severity::High);
        assert_eq!(from_weather.weather_data, Some(humid_weather()));

        let from_form = service
            .analyze(AnalysisRequest {
                crop: Some("Potato".to_string()),
                humidity: Some(40.0),
                temperature: Some(20.0),
                city: Some("Pune".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(from_form.severity, Severity::Low);
        assert!(from_form.weather_data.is_some());
    }

    #[tokio::test]
    async fn test_sync_offline_defaults_confidence_and_flags_mode() {
        let (service, _dir) = setup_service(no_weather());

        let response = service
            .sync_offline(OfflineRecord {
                crop_disease_label: Some("Potato___Early_blight".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(response.offline_mode);
        assert_eq!(response.confidence, 50.0);
        assert_eq!(response.severity, Severity::Medium);
        assert!(!response.expert_connect.enabled);

        let stored = service.report(&response.report_id).unwrap().unwrap();
        assert!(stored.offline_mode);
    }

    #[tokio::test]
    async fn test_sync_offline_requires_label() {
        let (service, _dir) = setup_service(no_weather());

        for label in [None, Some("  ".to_string())] {
            let err = service
                .sync_offline(OfflineRecord {
                    crop_disease_label: label,
                    confidence: Some("90%".to_string()),
                    city: None,
                })
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::Request(RequestError::EmptySync)));
        }
        assert!(service.recent_reports(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_batch_counts() {
        let (service, _dir) = setup_service(no_weather());

        let err = service.sync_batch(vec![]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Request(RequestError::EmptySync)));

        let summary = service
            .sync_batch(vec![
                OfflineRecord {
                    crop_disease_label: Some("Grape___Black_rot".to_string()),
                    confidence: Some("88%".to_string()),
                    city: None,
                },
                OfflineRecord::default(),
            ])
            .await
            .unwrap();

        assert_eq!(summary.synced, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.report_ids.len(), 1);
        assert_eq!(service.recent_reports(10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_feedback_validation_and_summary() {
        let (service, _dir) = setup_service(no_weather());

        let err = service.record_feedback(&Feedback::default()).unwrap_err();
        assert!(matches!(err, ServiceError::Request(RequestError::EmptyFeedback)));

        service
            .record_feedback(&Feedback {
                crop: Some("Tomato".to_string()),
                correct: Some(false),
                comment: Some("Prediction is incorrect".to_string()),
                ..Default::default()
            })
            .unwrap();

        let summary = service.feedback_summary().unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.incorrect, 1);
    }
}
