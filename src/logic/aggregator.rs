use crate::datasources::openmeteo::{DailyConditions, WeatherProvider};
use crate::models::plant::Plant;
use crate::models::weather::{
    Location, RainDay, WeatherContext, DEFAULT_ET0_MM, DEFAULT_HUMIDITY_PCT,
    DEFAULT_SOLAR_RAD_MJ, DEFAULT_TEMPERATURE_C, DEFAULT_WIND_KMH,
};
use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;

const HISTORY_DAYS_BACK: i64 = 6;

/// Freshly fetched weather, still partial: the coalesce step fills the
/// gaps from the plant's stored context and the hard defaults.
#[derive(Debug, Default)]
struct FetchedWeather {
    today: DailyConditions,
    rain_trend: Vec<RainDay>,
    location: Option<Location>,
}

/// Resolves a plant's location and produces a fully populated
/// [`WeatherContext`], degrading to stored values or defaults on any
/// provider failure. Never returns an error.
pub struct WeatherAggregator {
    provider: Arc<dyn WeatherProvider>,
}

impl WeatherAggregator {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self { provider }
    }

    pub async fn fetch_context(&self, plant: &Plant) -> WeatherContext {
        let fetched = self.fetch_fresh(plant).await;
        coalesce(fetched, plant.stored_weather.as_ref())
    }

    async fn fetch_fresh(&self, plant: &Plant) -> FetchedWeather {
        let location = self.resolve_location(plant).await;

        let today = Utc::now().date_naive();
        let history_start = today - Duration::days(HISTORY_DAYS_BACK);
        let history_end = today - Duration::days(1);

        let history = match self
            .provider
            .history_daily(
                location.latitude,
                location.longitude,
                history_start,
                history_end,
            )
            .await
        {
            Ok(days) => days,
            Err(e) => {
                tracing::warn!("historical rainfall fetch failed: {}", e);
                Vec::new()
            }
        };

        let forecast = match self
            .provider
            .forecast_daily(location.latitude, location.longitude)
            .await
        {
            Ok(bundle) => bundle,
            Err(e) => {
                tracing::warn!("forecast fetch failed: {}", e);
                Default::default()
            }
        };

        FetchedWeather {
            today: forecast.today,
            rain_trend: merge_trend(history, forecast.rain_days),
            location: Some(location),
        }
    }

    /// Resolution order: explicit coordinates, then geocoded city name,
    /// then the fixed fallback location.
    async fn resolve_location(&self, plant: &Plant) -> Location {
        if let (Some(latitude), Some(longitude)) = (plant.latitude, plant.longitude) {
            let name = match &plant.location {
                Some(city) => city.clone(),
                None => match self.provider.reverse_geocode(latitude, longitude).await {
                    Ok(Some(name)) => name,
                    Ok(None) => "Detected location".to_string(),
                    Err(e) => {
                        tracing::warn!("reverse geocoding failed: {}", e);
                        "Detected location".to_string()
                    }
                },
            };
            return Location {
                name,
                latitude,
                longitude,
            };
        }

        if let Some(city) = &plant.location {
            match self.provider.geocode(city).await {
                Ok(Some(hit)) => {
                    tracing::debug!("geocoded '{}' to {},{}", city, hit.latitude, hit.longitude);
                    return Location {
                        name: hit.name,
                        latitude: hit.latitude,
                        longitude: hit.longitude,
                    };
                }
                Ok(None) => {
                    tracing::warn!("no geocoding result for '{}', using fallback location", city);
                }
                Err(e) => {
                    tracing::warn!("geocoding failed for '{}': {}", city, e);
                }
            }
        }

        Location::fallback()
    }
}

/// Merge historical and forecast rain series by date; historical
/// entries win ties, result is ascending.
fn merge_trend(history: Vec<RainDay>, forecast: Vec<RainDay>) -> Vec<RainDay> {
    let mut seen: HashSet<_> = HashSet::new();
    let mut trend = Vec::with_capacity(history.len() + forecast.len());

    for day in history.into_iter().chain(forecast) {
        if seen.insert(day.date) {
            trend.push(day);
        }
    }
    trend.sort_by_key(|d| d.date);
    trend
}

/// Field-level coalesce: first non-null among fresh fetch, stored
/// context and hard default. Guarantees a fully populated context even
/// under total provider failure.
fn coalesce(fetched: FetchedWeather, stored: Option<&WeatherContext>) -> WeatherContext {
    let pick = |fresh: Option<f64>, stored_value: Option<f64>, default: f64| {
        fresh.or(stored_value).unwrap_or(default)
    };

    WeatherContext {
        temperature_c: pick(
            fetched.today.temperature_c,
            stored.map(|s| s.temperature_c),
            DEFAULT_TEMPERATURE_C,
        ),
        humidity_pct: pick(
            fetched.today.humidity_pct,
            stored.map(|s| s.humidity_pct),
            DEFAULT_HUMIDITY_PCT,
        ),
        et0_mm: pick(fetched.today.et0_mm, stored.map(|s| s.et0_mm), DEFAULT_ET0_MM),
        solar_rad_mj: pick(
            fetched.today.solar_rad_mj,
            stored.map(|s| s.solar_rad_mj),
            DEFAULT_SOLAR_RAD_MJ,
        ),
        wind_kmh: pick(
            fetched.today.wind_kmh,
            stored.map(|s| s.wind_kmh),
            DEFAULT_WIND_KMH,
        ),
        rain_trend: if !fetched.rain_trend.is_empty() {
            fetched.rain_trend
        } else {
            stored.map(|s| s.rain_trend.clone()).unwrap_or_default()
        },
        location: fetched
            .location
            .or_else(|| stored.map(|s| s.location.clone()))
            .unwrap_or_else(Location::fallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasources::openmeteo::{ForecastBundle, GeoMatch};
    use crate::error::{PlantOpsError, Result};
    use async_trait::async_trait;
    use chrono::NaiveDate;

    #[derive(Default)]
    struct StubProvider {
        geocode_hit: Option<GeoMatch>,
        forecast: Option<ForecastBundle>,
        history: Option<Vec<RainDay>>,
        fail_all: bool,
    }

    #[async_trait]
    impl WeatherProvider for StubProvider {
        async fn geocode(&self, _city: &str) -> Result<Option<GeoMatch>> {
            if self.fail_all {
                return Err(PlantOpsError::DataSourceUnavailable("down".into()));
            }
            Ok(self.geocode_hit.clone())
        }

        async fn reverse_geocode(&self, _lat: f64, _lon: f64) -> Result<Option<String>> {
            Ok(None)
        }

        async fn forecast_daily(&self, _lat: f64, _lon: f64) -> Result<ForecastBundle> {
            if self.fail_all {
                return Err(PlantOpsError::DataSourceUnavailable("down".into()));
            }
            Ok(self.forecast.clone().unwrap_or_default())
        }

        async fn history_daily(
            &self,
            _lat: f64,
            _lon: f64,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<RainDay>> {
            if self.fail_all {
                return Err(PlantOpsError::DataSourceUnavailable("down".into()));
            }
            Ok(self.history.clone().unwrap_or_default())
        }
    }

    fn day(s: &str, rain_mm: f64) -> RainDay {
        RainDay {
            date: s.parse().unwrap(),
            rain_mm,
        }
    }

    #[tokio::test]
    async fn total_provider_failure_degrades_to_defaults() {
        let aggregator = WeatherAggregator::new(Arc::new(StubProvider {
            fail_all: true,
            ..Default::default()
        }));
        let plant = Plant {
            id: "p1".into(),
            location: Some("Atlantis".into()),
            ..Default::default()
        };

        let ctx = aggregator.fetch_context(&plant).await;
        assert_eq!(ctx.temperature_c, DEFAULT_TEMPERATURE_C);
        assert_eq!(ctx.et0_mm, DEFAULT_ET0_MM);
        assert!(ctx.rain_trend.is_empty());
        assert_eq!(ctx.location, Location::fallback());
    }

    #[tokio::test]
    async fn stored_context_wins_over_defaults() {
        let aggregator = WeatherAggregator::new(Arc::new(StubProvider {
            fail_all: true,
            ..Default::default()
        }));
        let stored = WeatherContext {
            temperature_c: 31.0,
            et0_mm: 4.5,
            rain_trend: vec![day("2026-08-20", 2.0)],
            ..Default::default()
        };
        let plant = Plant {
            id: "p1".into(),
            stored_weather: Some(stored),
            ..Default::default()
        };

        let ctx = aggregator.fetch_context(&plant).await;
        assert_eq!(ctx.temperature_c, 31.0);
        assert_eq!(ctx.et0_mm, 4.5);
        assert_eq!(ctx.rain_trend.len(), 1);
    }

    #[tokio::test]
    async fn fetched_values_win_over_stored() {
        let forecast = ForecastBundle {
            today: DailyConditions {
                temperature_c: Some(27.0),
                et0_mm: Some(3.8),
                ..Default::default()
            },
            rain_days: vec![day("2026-08-25", 1.0)],
        };
        let aggregator = WeatherAggregator::new(Arc::new(StubProvider {
            forecast: Some(forecast),
            ..Default::default()
        }));
        let plant = Plant {
            id: "p1".into(),
            latitude: Some(41.0),
            longitude: Some(16.0),
            location: Some("Bari".into()),
            stored_weather: Some(WeatherContext {
                temperature_c: 10.0,
                humidity_pct: 80.0,
                ..Default::default()
            }),
            ..Default::default()
        };

        let ctx = aggregator.fetch_context(&plant).await;
        assert_eq!(ctx.temperature_c, 27.0);
        // Humidity missing from the fetch falls through to the stored value.
        assert_eq!(ctx.humidity_pct, 80.0);
        assert_eq!(ctx.location.name, "Bari");
    }

    #[tokio::test]
    async fn geocoded_city_supplies_the_location() {
        let aggregator = WeatherAggregator::new(Arc::new(StubProvider {
            geocode_hit: Some(GeoMatch {
                name: "Bisceglie".into(),
                latitude: 41.24,
                longitude: 16.5,
            }),
            ..Default::default()
        }));
        let plant = Plant {
            id: "p1".into(),
            location: Some("bisceglie".into()),
            ..Default::default()
        };

        let ctx = aggregator.fetch_context(&plant).await;
        assert_eq!(ctx.location.name, "Bisceglie");
        assert_eq!(ctx.location.latitude, 41.24);
    }

    #[test]
    fn merge_keeps_historical_entry_on_date_collision() {
        let history = vec![day("2026-08-22", 5.0), day("2026-08-23", 1.0)];
        let forecast = vec![day("2026-08-23", 9.0), day("2026-08-24", 0.5)];

        let trend = merge_trend(history, forecast);
        assert_eq!(trend.len(), 3);
        assert_eq!(trend[1].date, "2026-08-23".parse().unwrap());
        assert_eq!(trend[1].rain_mm, 1.0);
        // Ascending by date.
        assert!(trend.windows(2).all(|w| w[0].date < w[1].date));
    }
}
