//! CropGuard CLI and server
//!
//! Run with: cargo run -- serve
//! One-shot:  cargo run -- analyze-env --crop Tomato --humidity 82 --temperature 31

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cropguard::{
    config::Settings,
    db::StoredReport,
    server,
    service::{AdvisoryService, AnalysisRequest, AnalysisResponse, OfflineRecord, ServiceError},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cropguard", version, about = "Crop disease advisory engine")]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Advise from a classifier label such as Tomato___Late_blight
    AnalyzeImage {
        label: String,
        /// Classifier confidence, e.g. "92.4%"
        #[arg(long)]
        confidence: Option<String>,
        #[arg(long)]
        city: Option<String>,
    },
    /// Advise from crop and field conditions
    AnalyzeEnv {
        #[arg(long)]
        crop: String,
        #[arg(long)]
        humidity: Option<f64>,
        #[arg(long)]
        temperature: Option<f64>,
        #[arg(long)]
        city: Option<String>,
    },
    /// Sync a JSON array of offline results
    Sync { file: PathBuf },
    /// List recent reports
    Reports {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show feedback tallies
    FeedbackStats,
    /// List the crop and disease catalogue
    Kb,
    /// Start the HTTP server
    Serve {
        /// Overrides the configured port
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load().context("Failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let service = AdvisoryService::from_settings(&settings)?;

    match cli.command {
        Command::AnalyzeImage {
            label,
            confidence,
            city,
        } => {
            let request = AnalysisRequest {
                disease: Some(label),
                confidence,
                city,
                ..Default::default()
            };
            run_analyze(&service, request, cli.json).await
        }
        Command::AnalyzeEnv {
            crop,
            humidity,
            temperature,
            city,
        } => {
            let request = AnalysisRequest {
                crop: Some(crop),
                humidity,
                temperature,
                city,
                ..Default::default()
            };
            run_analyze(&service, request, cli.json).await
        }
        Command::Sync { file } => run_sync(&service, &file, cli.json).await,
        Command::Reports { limit } => run_reports(&service, limit, cli.json),
        Command::FeedbackStats => run_feedback_stats(&service, cli.json),
        Command::Kb => run_kb(&service, cli.json),
        Command::Serve { port } => {
            let port = port.unwrap_or(settings.port);
            server::serve(Arc::new(service), port).await
        }
    }
}

async fn run_analyze(service: &AdvisoryService, request: AnalysisRequest, json: bool) -> Result<()> {
    match service.analyze(request).await {
        Ok(response) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_advisory(&response);
            }
            Ok(())
        }
        Err(ServiceError::Request(e)) if json => {
            println!("{}", serde_json::json!({ "error": e.to_string() }));
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_sync(service: &AdvisoryService, file: &Path, json: bool) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read offline queue {:?}", file))?;
    let records: Vec<OfflineRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("Offline queue {:?} is not a JSON array of records", file))?;

    let summary = service.sync_batch(records).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Synced {} record(s), {} failed", summary.synced, summary.failed);
        for id in &summary.report_ids {
            println!("  {}", id);
        }
    }
    Ok(())
}

fn run_reports(service: &AdvisoryService, limit: usize, json: bool) -> Result<()> {
    let reports = service.recent_reports(limit)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    if reports.is_empty() {
        println!("No reports yet.");
        return Ok(());
    }
    for report in &reports {
        print_report_line(report);
    }
    Ok(())
}

fn run_feedback_stats(service: &AdvisoryService, json: bool) -> Result<()> {
    let summary = service.feedback_summary()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Feedback received: {}", summary.total);
        println!("  Correct:   {}", summary.correct);
        println!("  Incorrect: {}", summary.incorrect);
        println!("  Open:      {}", summary.open);
    }
    Ok(())
}

fn run_kb(service: &AdvisoryService, json: bool) -> Result<()> {
    let kb = service.engine().knowledge_base();

    if json {
        let catalogue: Vec<_> = kb
            .crops()
            .map(|crop| {
                serde_json::json!({
                    "crop": crop.name(),
                    "diseases": crop.diseases().iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&catalogue)?);
        return Ok(());
    }

    println!("{} crops, {} diseases\n", kb.crop_count(), kb.disease_count());
    for crop in kb.crops() {
        let names: Vec<&str> = crop.diseases().iter().map(|d| d.name.as_str()).collect();
        println!("{}: {}", crop.name(), names.join(", "));
    }
    Ok(())
}

fn print_advisory(response: &AnalysisResponse) {
    println!("\n{} / {}", response.crop_type, response.disease_detected);
    println!(
        "Severity: {}  Risk: {:.1}  Confidence: {:.1}{}",
        response.severity,
        response.risk_score,
        response.confidence,
        response
            .confidence_type
            .as_deref()
            .map(|k| format!(" ({})", k))
            .unwrap_or_default()
    );
    println!("Mode: {}", response.inference_mode.as_str());
    println!("Why: {}", response.decision_reason);
    for clue in &response.reasoning_clues {
        println!("  - {}", clue);
    }

    let treatment = &response.advisory.treatment;
    println!("\nChemical:   {}", treatment.chemical);
    println!("Organic:    {}", treatment.organic);
    println!("Prevention: {}", treatment.prevention);
    println!("Strategy:   {}", response.advisory.pesticide_strategy);
    println!("Yield:      {}", response.advisory.yield_impact);

    if let Some(weather) = &response.weather_data {
        println!(
            "\nWeather: {}, {:.1}°C, {:.0}% humidity, wind {:.1} m/s",
            weather.weather, weather.temperature, weather.humidity, weather.wind_speed
        );
    }

    if response.expert_connect.enabled {
        println!(
            "\n{}: talk to an expert at {} or call {}",
            response.expert_connect.reason,
            response.expert_connect.whatsapp,
            response.expert_connect.helpline
        );
    }
    println!("\nReport: {}", response.report_id);
}

fn print_report_line(report: &StoredReport) {
    println!(
        "{}  {}  {} / {}  {} ({:.0}){}{}",
        report.created_at,
        report.report_id,
        report.crop,
        report.disease,
        report.severity,
        report.confidence,
        if report.expert_enabled { "  [expert]" } else { "" },
        if report.offline_mode { "  [offline]" } else { "" },
    );
}
