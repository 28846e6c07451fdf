use crate::error::{PlantOpsError, Result};
use crate::models::weather::{Location, RainDay};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const ARCHIVE_URL: &str = "https://archive-api.open-meteo.com/v1/archive";
const REVERSE_GEO_URL: &str = "https://nominatim.openstreetmap.org/reverse";

const FORECAST_DAILY_VARS: &str = "temperature_2m_max,relative_humidity_2m_max,precipitation_sum,\
                                   et0_fao_evapotranspiration,shortwave_radiation_sum,wind_speed_10m_max";

/// A geocoding hit for a free-text city name.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoMatch {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Today's conditions, taken from the first row of the daily forecast.
/// Every field is optional so partial provider responses degrade
/// cleanly in the aggregator's coalesce.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DailyConditions {
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub et0_mm: Option<f64>,
    pub solar_rad_mj: Option<f64>,
    pub wind_kmh: Option<f64>,
}

/// Daily forecast: today's conditions plus the per-day rain series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastBundle {
    pub today: DailyConditions,
    pub rain_days: Vec<RainDay>,
}

/// External weather provider consumed by the aggregator.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Resolve a free-text city name to coordinates.
    async fn geocode(&self, city: &str) -> Result<Option<GeoMatch>>;

    /// Resolve bare coordinates to a display name.
    async fn reverse_geocode(&self, latitude: f64, longitude: f64) -> Result<Option<String>>;

    /// Upcoming-days daily forecast for the given coordinates.
    async fn forecast_daily(&self, latitude: f64, longitude: f64) -> Result<ForecastBundle>;

    /// Historical daily rainfall for the given date range (inclusive).
    async fn history_daily(
        &self,
        latitude: f64,
        longitude: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RainDay>>;
}

pub struct OpenMeteoClient {
    client: reqwest::Client,
}

// Open-Meteo API response structures
#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    name: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ReverseGeoResponse {
    #[serde(default)]
    address: ReverseGeoAddress,
}

#[derive(Debug, Default, Deserialize)]
struct ReverseGeoAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    daily: Option<ForecastDaily>,
}

#[derive(Debug, Deserialize)]
struct ForecastDaily {
    #[serde(default)]
    time: Vec<NaiveDate>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    et0_fao_evapotranspiration: Vec<Option<f64>>,
    #[serde(default)]
    shortwave_radiation_sum: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: Option<ArchiveDaily>,
}

#[derive(Debug, Deserialize)]
struct ArchiveDaily {
    #[serde(default)]
    time: Vec<NaiveDate>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
}

impl OpenMeteoClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("plantops/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Probe the forecast endpoint with the fallback coordinates.
    pub async fn test_connection(&self) -> Result<bool> {
        let fallback = Location::fallback();
        let response = self
            .client
            .get(FORECAST_URL)
            .query(&[
                ("latitude", fallback.latitude.to_string()),
                ("longitude", fallback.longitude.to_string()),
                ("daily", "precipitation_sum".to_string()),
            ])
            .send()
            .await
            .map_err(|e| PlantOpsError::DataSourceUnavailable(format!("open-meteo: {}", e)))?;
        Ok(response.status().is_success())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| PlantOpsError::DataSourceUnavailable(format!("open-meteo: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PlantOpsError::DataSourceUnavailable(format!(
                "open-meteo returned {}: {}",
                status, body
            )));
        }

        response.json().await.map_err(|e| {
            PlantOpsError::DataSourceUnavailable(format!("failed to parse open-meteo response: {}", e))
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoClient {
    async fn geocode(&self, city: &str) -> Result<Option<GeoMatch>> {
        let response: GeocodingResponse = self
            .get_json(
                GEOCODING_URL,
                &[
                    ("name", city.to_string()),
                    ("count", "1".to_string()),
                    ("language", "en".to_string()),
                    ("format", "json".to_string()),
                ],
            )
            .await?;

        Ok(response.results.into_iter().next().map(|r| GeoMatch {
            name: r.name,
            latitude: r.latitude,
            longitude: r.longitude,
        }))
    }

    async fn reverse_geocode(&self, latitude: f64, longitude: f64) -> Result<Option<String>> {
        let response: ReverseGeoResponse = self
            .get_json(
                REVERSE_GEO_URL,
                &[
                    ("lat", latitude.to_string()),
                    ("lon", longitude.to_string()),
                    ("format", "json".to_string()),
                ],
            )
            .await?;

        let addr = response.address;
        Ok(addr
            .city
            .or(addr.town)
            .or(addr.village)
            .or(addr.municipality))
    }

    async fn forecast_daily(&self, latitude: f64, longitude: f64) -> Result<ForecastBundle> {
        let response: ForecastResponse = self
            .get_json(
                FORECAST_URL,
                &[
                    ("latitude", latitude.to_string()),
                    ("longitude", longitude.to_string()),
                    ("daily", FORECAST_DAILY_VARS.to_string()),
                    ("timezone", "auto".to_string()),
                ],
            )
            .await?;

        let Some(daily) = response.daily else {
            return Ok(ForecastBundle::default());
        };

        let first = |series: &[Option<f64>]| series.first().copied().flatten();
        let today = DailyConditions {
            temperature_c: first(&daily.temperature_2m_max),
            humidity_pct: first(&daily.relative_humidity_2m_max),
            et0_mm: first(&daily.et0_fao_evapotranspiration),
            solar_rad_mj: first(&daily.shortwave_radiation_sum),
            wind_kmh: first(&daily.wind_speed_10m_max),
        };

        let rain_days = daily
            .time
            .iter()
            .zip(daily.precipitation_sum.iter().chain(std::iter::repeat(&None)))
            .map(|(date, rain)| RainDay {
                date: *date,
                rain_mm: rain.unwrap_or(0.0),
            })
            .collect();

        Ok(ForecastBundle { today, rain_days })
    }

    async fn history_daily(
        &self,
        latitude: f64,
        longitude: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RainDay>> {
        let response: ArchiveResponse = self
            .get_json(
                ARCHIVE_URL,
                &[
                    ("latitude", latitude.to_string()),
                    ("longitude", longitude.to_string()),
                    ("start_date", start.format("%Y-%m-%d").to_string()),
                    ("end_date", end.format("%Y-%m-%d").to_string()),
                    ("daily", "precipitation_sum".to_string()),
                    ("timezone", "auto".to_string()),
                ],
            )
            .await?;

        let Some(daily) = response.daily else {
            return Ok(Vec::new());
        };

        Ok(daily
            .time
            .iter()
            .zip(daily.precipitation_sum.iter().chain(std::iter::repeat(&None)))
            .map(|(date, rain)| RainDay {
                date: *date,
                rain_mm: rain.unwrap_or(0.0),
            })
            .collect())
    }
}
