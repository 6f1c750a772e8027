//! Runtime configuration
//!
//! Precedence: `CROPGUARD__*` environment variables > config file > defaults.
//! The config file path comes from `CROPGUARD_CONFIG` (default
//! `cropguard.toml` in the working directory). A `.env` file is read first so
//! `WEATHER_API_KEY` can live there.

use crate::confidence::{ExpertContacts, DEFAULT_EXPERT_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "cropguard.toml";
const DEFAULT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub port: u16,
    /// Where the report database lives
    pub data_dir: PathBuf,
    /// Knowledge base file; the bundled catalogue is used when unset
    #[serde(default)]
    pub kb_path: Option<PathBuf>,
    pub log_level: String,
    pub expert_threshold: f64,
    pub expert_whatsapp: String,
    pub expert_helpline: String,
    #[serde(default)]
    pub weather_api_key: Option<String>,
    pub weather_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        let contacts = ExpertContacts::default();
        Self {
            port: 5000,
            data_dir: default_data_dir(),
            kb_path: None,
            log_level: "info".to_string(),
            expert_threshold: DEFAULT_EXPERT_THRESHOLD,
            expert_whatsapp: contacts.whatsapp,
            expert_helpline: contacts.helpline,
            weather_api_key: None,
            weather_base_url: DEFAULT_WEATHER_URL.to_string(),
        }
    }
}

impl Settings {
    /// Load `.env`, then layer file and environment over the defaults.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let _ = dotenvy::dotenv();

        let config_path =
            std::env::var("CROPGUARD_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let mut settings = Self::load_from(Path::new(&config_path))?;

        if settings.weather_api_key.is_none() {
            settings.weather_api_key = std::env::var("WEATHER_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty());
        }

        Ok(settings)
    }

    /// Layer an optional file and `CROPGUARD__*` variables over the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ::config::ConfigError> {
        let defaults = Self::default();
        let builder = ::config::Config::builder()
            .set_default("port", i64::from(defaults.port))?
            .set_default("data_dir", defaults.data_dir.to_string_lossy().to_string())?
            .set_default("log_level", defaults.log_level)?
            .set_default("expert_threshold", defaults.expert_threshold)?
            .set_default("expert_whatsapp", defaults.expert_whatsapp)?
            .set_default("expert_helpline", defaults.expert_helpline)?
            .set_default("weather_base_url", defaults.weather_base_url)?;

        let builder = if path.exists() {
            builder.add_source(::config::File::from(path))
        } else {
            builder
        };

        builder
            .add_source(::config::Environment::with_prefix("CROPGUARD").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn expert_contacts(&self) -> ExpertContacts {
        ExpertContacts {
            whatsapp: self.expert_whatsapp.clone(),
            helpline: self.expert_helpline.clone(),
            threshold: self.expert_threshold,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("cropguard.db")
    }
}

/// XDG data dir on Linux, ~/Library/Application Support on macOS
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cropguard")
}
