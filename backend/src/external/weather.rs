//! Weather API client for ambient temperature sampling
//!
//! At pickup the batch's ambient temperature default is refreshed from
//! OpenWeatherMap. Sampling is strictly best-effort: invalid coordinates or
//! any API failure fall back to the default so a pickup can never fail on
//! weather.

use reqwest::Client;
use serde::Deserialize;

use crate::config::WeatherConfig;
use crate::error::{AppError, AppResult};
use crate::models::batch::DEFAULT_LOCATION_TEMP;

/// Weather API client
#[derive(Clone)]
pub struct WeatherClient {
    client: Client,
    api_key: String,
    base_url: String,
}

/// OpenWeatherMap current-conditions response (the subset we read)
#[derive(Debug, Deserialize)]
struct OWMCurrentResponse {
    main: OWMMain,
}

#[derive(Debug, Deserialize)]
struct OWMMain {
    temp: f64,
}

impl WeatherClient {
    /// Create a new WeatherClient
    pub fn new(config: &WeatherConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.api_endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Current ambient temperature at a location, in Celsius.
    ///
    /// Missing or zero coordinates and request failures all resolve to the
    /// 22.0 default rather than an error.
    pub async fn location_temperature(&self, lat: Option<f64>, lon: Option<f64>) -> f64 {
        let (lat, lon) = match (lat, lon) {
            (Some(lat), Some(lon)) if lat != 0.0 && lon != 0.0 => (lat, lon),
            _ => {
                tracing::debug!("No usable coordinates, using default ambient temperature");
                return DEFAULT_LOCATION_TEMP;
            }
        };

        match self.fetch_current(lat, lon).await {
            Ok(temp) => {
                tracing::debug!("Ambient temperature at ({}, {}): {}°C", lat, lon, temp);
                temp
            }
            Err(e) => {
                tracing::warn!("Weather lookup failed, using default: {}", e);
                DEFAULT_LOCATION_TEMP
            }
        }
    }

    async fn fetch_current(&self, lat: f64, lon: f64) -> AppResult<f64> {
        let url = format!(
            "{}/weather?lat={}&lon={}&appid={}&units=metric",
            self.base_url, lat, lon, self.api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Weather API request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Weather API error: {}",
                response.status()
            )));
        }

        let data: OWMCurrentResponse = response.json().await.map_err(|e| {
            AppError::ExternalService(format!("Failed to parse weather response: {}", e))
        })?;

        Ok(data.main.temp)
    }
}
