//! Current-weather lookup
//!
//! Weather is optional context. Any failure (no key, no city, network error,
//! non-200 reply, unexpected body) yields `None` and the analysis carries on.
//! No retries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Weather at the farmer's location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature: f64,
    pub humidity: f64,
    pub weather: String,
    pub wind_speed: f64,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, city: &str) -> Option<WeatherSnapshot>;
}

/// OpenWeatherMap current-weather client (metric units)
pub struct OpenWeatherClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenWeatherClient {
    /// Fails only when the HTTP client cannot be built (TLS backend init).
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_key,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn current(&self, city: &str) -> Option<WeatherSnapshot> {
        let api_key = self.api_key.as_deref()?;
        let city = city.trim();
        if city.is_empty() {
            return None;
        }

        let response = match self
            .http
            .get(&self.base_url)
            .query(&[("q", city), ("appid", api_key), ("units", "metric")])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(city, error = %e, "weather request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(city, status = %response.status(), "weather lookup rejected");
            return None;
        }

        match response.json::<OwmResponse>().await {
            Ok(body) => body.into_snapshot(),
            Err(e) => {
                warn!(city, error = %e, "unexpected weather response");
                None
            }
        }
    }
}

/// Provider used when weather lookups are switched off
pub struct NoWeather;

#[async_trait]
impl WeatherProvider for NoWeather {
    async fn current(&self, _city: &str) -> Option<WeatherSnapshot> {
        None
    }
}

#[derive(Debug, Deserialize)]
struct OwmResponse {
    main: OwmMain,
    #[serde(default)]
    weather: Vec<OwmCondition>,
    wind: OwmWind,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: f64,
}

impl OwmResponse {
    fn into_snapshot(self) -> Option<WeatherSnapshot> {
        let description = self.weather.into_iter().next()?.description;
        Some(WeatherSnapshot {
            temperature: self.main.temp,
            humidity: self.main.humidity,
            weather: description,
            wind_speed: self.wind.speed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owm_body_maps_to_snapshot() {
        let body = r#"{
            "main": {"temp": 31.5, "humidity": 78, "pressure": 1008},
            "weather": [{"id": 500, "description": "light rain"}],
            "wind": {"speed": 3.6, "deg": 220},
            "name": "Pune"
        }"#;
        let parsed: OwmResponse = serde_json::from_str(body).unwrap();
        let snapshot = parsed.into_snapshot().unwrap();

        assert_eq!(snapshot.temperature, 31.5);
        assert_eq!(snapshot.humidity, 78.0);
        assert_eq!(snapshot.weather, "light rain");
        assert_eq!(snapshot.wind_speed, 3.6);
    }

    #[test]
    fn test_owm_body_without_conditions_is_none() {
        let body = r#"{"main": {"temp": 20, "humidity": 50}, "weather": [], "wind": {"speed": 1}}"#;
        let parsed: OwmResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.into_snapshot().is_none());
    }

    #[tokio::test]
    async fn test_missing_key_or_city_skips_lookup() {
        let client = OpenWeatherClient::new(None, "http://127.0.0.1:9").unwrap();
        assert!(client.current("Pune").await.is_none());

        let client = OpenWeatherClient::new(Some("key".into()), "http://127.0.0.1:9").unwrap();
        assert!(client.current("   ").await.is_none());
    }

    #[test]
    fn test_no_weather_provider() {
        assert!(tokio_test::block_on(NoWeather.current("Pune")).is_none());
    }
}
