//! CropGuard - crop disease advisory engine
//!
//! Turns either a visual classifier's finding or a farmer's crop plus field
//! conditions into one advisory: disease, severity, risk, treatment,
//! pesticide strategy and the reasoning behind it.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use cropguard::{AdvisoryEngine, KnowledgeBase, ImageFeatures, EnvironmentReading};
//! use std::sync::Arc;
//!
//! let engine = AdvisoryEngine::new(Arc::new(KnowledgeBase::bundled()?));
//!
//! // Image pathway
//! let result = engine.analyze_with_image(&ImageFeatures::new("Tomato___Late_blight", "92%"));
//!
//! // Environment pathway
//! let result = engine.analyze_without_image("Wheat", &EnvironmentReading::new(80.0, 32.0));
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │        CLI (cropguard)  /  HTTP (axum)        │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │ AdvisoryService                              │
//! │  normalize → expert connect → weather → db   │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │ AdvisoryEngine (pure, Arc<KnowledgeBase>)    │
//! │  labels · decision · knowledge               │
//! └──────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod confidence;
pub mod db;
pub mod decision;
pub mod engine;
pub mod knowledge;
pub mod labels;
pub mod server;
pub mod service;
pub mod types;
pub mod weather;

pub use confidence::{normalize, Confidence, ConfidenceParseError, ExpertConnect};
pub use db::init_db;
pub use engine::AdvisoryEngine;
pub use knowledge::{KnowledgeBase, KnowledgeError};
pub use service::{AdvisoryService, AnalysisRequest, AnalysisResponse, RequestError};
pub use types::*;
