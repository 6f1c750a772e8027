//! Report and feedback storage
//!
//! SQLite, single file, works offline. Sits beside the engine: the engine
//! never touches it.

use crate::types::{Advisory, Feedback};
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Open (or create) the database and apply the schema
pub fn init_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory {:?}", parent))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database at {:?}", path))?;

    conn.execute_batch(SCHEMA)?;

    Ok(conn)
}

const SCHEMA: &str = r#"
-- One row per analysis handed back to a farmer
CREATE TABLE IF NOT EXISTS crop_reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    report_id TEXT UNIQUE NOT NULL,
    crop TEXT,
    disease TEXT,
    severity TEXT,
    confidence REAL,            -- normalized, 0-100
    advisory TEXT,              -- JSON advisory block
    expert_enabled INTEGER DEFAULT 0,
    offline_mode INTEGER DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reports_created ON crop_reports(created_at);

-- Farmer feedback on predictions and treatment outcomes
CREATE TABLE IF NOT EXISTS feedback (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    crop TEXT,
    disease TEXT,
    confidence REAL,
    correct INTEGER,            -- NULL = open query, 0 = wrong, 1 = right
    outcome TEXT,
    yield_change TEXT,
    days_after_treatment INTEGER,
    comment TEXT,
    created_at TEXT NOT NULL
);
"#;

/// A persisted analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReport {
    pub report_id: String,
    pub crop: String,
    pub disease: String,
    pub severity: String,
    pub confidence: f64,
    pub advisory: Advisory,
    pub expert_enabled: bool,
    pub offline_mode: bool,
    pub created_at: String,
}

/// What gets written for one analysis
#[derive(Debug, Clone)]
pub struct NewReport<'a> {
    pub report_id: &'a str,
    pub crop: &'a str,
    pub disease: &'a str,
    pub severity: &'a str,
    pub confidence: f64,
    pub advisory: &'a Advisory,
    pub expert_enabled: bool,
    pub offline_mode: bool,
}

/// Feedback tallies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSummary {
    pub total: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub open: usize,
}

/// Record an analysis
pub fn insert_report(conn: &Connection, report: &NewReport<'_>) -> Result<()> {
    let advisory_json = serde_json::to_string(report.advisory)?;

    conn.execute(
        r#"
        INSERT INTO crop_reports (report_id, crop, disease, severity, confidence,
                                  advisory, expert_enabled, offline_mode, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            report.report_id,
            report.crop,
            report.disease,
            report.severity,
            report.confidence,
            advisory_json,
            report.expert_enabled as i32,
            report.offline_mode as i32,
            now(),
        ],
    )?;
    Ok(())
}

/// Fetch one report by id
pub fn get_report(conn: &Connection, report_id: &str) -> Result<Option<StoredReport>> {
    let mut stmt = conn.prepare(
        "SELECT report_id, crop, disease, severity, confidence, advisory,
                expert_enabled, offline_mode, created_at
         FROM crop_reports WHERE report_id = ?1",
    )?;

    let row = stmt
        .query_row([report_id], read_report_row)
        .optional()?;

    row.map(into_report).transpose()
}

/// Most recent reports first
pub fn recent_reports(conn: &Connection, limit: usize) -> Result<Vec<StoredReport>> {
    let mut stmt = conn.prepare(
        "SELECT report_id, crop, disease, severity, confidence, advisory,
                expert_enabled, offline_mode, created_at
         FROM crop_reports ORDER BY created_at DESC, id DESC LIMIT ?1",
    )?;

    let rows = stmt
        .query_map([limit as i64], read_report_row)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(into_report).collect()
}

/// Record one piece of farmer feedback
pub fn insert_feedback(conn: &Connection, feedback: &Feedback) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO feedback (crop, disease, confidence, correct, outcome,
                              yield_change, days_after_treatment, comment, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            feedback.crop,
            feedback.disease,
            feedback.confidence,
            feedback.correct.map(|c| c as i32),
            feedback.outcome,
            feedback.yield_change,
            feedback.days_after_treatment,
            feedback.comment,
            now(),
        ],
    )?;
    Ok(())
}

pub fn feedback_summary(conn: &Connection) -> Result<FeedbackSummary> {
    let (total, correct, incorrect, open): (i64, i64, i64, i64) = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN correct = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN correct = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN correct IS NULL THEN 1 ELSE 0 END), 0)
         FROM feedback",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;

    Ok(FeedbackSummary {
        total: total as usize,
        correct: correct as usize,
        incorrect: incorrect as usize,
        open: open as usize,
    })
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

type ReportRow = (String, String, String, String, f64, String, i32, i32, String);

fn read_report_row(row: &Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok((
        row.get(0)?,
        row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        row.get::<_, Option<f64>>(4)?.unwrap_or_default(),
        row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn into_report(row: ReportRow) -> Result<StoredReport> {
    let (report_id, crop, disease, severity, confidence, advisory, expert, offline, created_at) =
        row;
    let advisory: Advisory = serde_json::from_str(&advisory)
        .with_context(|| format!("Corrupt advisory JSON in report {}", report_id))?;

    Ok(StoredReport {
        report_id,
        crop,
        disease,
        severity,
        confidence,
        advisory,
        expert_enabled: expert != 0,
        offline_mode: offline != 0,
        created_at,
    })
}
