use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Hard fallbacks applied when neither the weather provider nor the
/// plant's stored snapshot supplies a value.
pub const DEFAULT_TEMPERATURE_C: f64 = 20.0;
pub const DEFAULT_HUMIDITY_PCT: f64 = 50.0;
pub const DEFAULT_ET0_MM: f64 = 2.5;
pub const DEFAULT_SOLAR_RAD_MJ: f64 = 400.0;
pub const DEFAULT_WIND_KMH: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    /// Fixed location used when neither coordinates nor a resolvable
    /// city name are available.
    pub fn fallback() -> Self {
        Self {
            name: "Bisceglie".to_string(),
            latitude: 41.24,
            longitude: 16.50,
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::fallback()
    }
}

/// One day of observed or forecast rainfall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RainDay {
    pub date: NaiveDate,
    #[serde(default)]
    pub rain_mm: f64,
}

/// Fully populated weather snapshot for one plant.
///
/// Invariants: every numeric field holds a real value (the aggregator
/// coalesces fetched, stored and default values), and `rain_trend` is
/// ascending by date with at most one entry per date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherContext {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    /// Reference evapotranspiration, mm/day.
    pub et0_mm: f64,
    /// Daily shortwave radiation, MJ/m².
    pub solar_rad_mj: f64,
    pub wind_kmh: f64,
    pub rain_trend: Vec<RainDay>,
    pub location: Location,
}

impl Default for WeatherContext {
    fn default() -> Self {
        Self {
            temperature_c: DEFAULT_TEMPERATURE_C,
            humidity_pct: DEFAULT_HUMIDITY_PCT,
            et0_mm: DEFAULT_ET0_MM,
            solar_rad_mj: DEFAULT_SOLAR_RAD_MJ,
            wind_kmh: DEFAULT_WIND_KMH,
            rain_trend: Vec::new(),
            location: Location::fallback(),
        }
    }
}

impl WeatherContext {
    /// Rough illuminance estimate from daily shortwave radiation,
    /// assuming 12 hours of daylight and ~120 lux per W/m².
    pub fn estimated_lux(&self) -> f64 {
        if self.solar_rad_mj <= 0.0 {
            return 0.0;
        }
        let watts_m2 = self.solar_rad_mj * 1_000_000.0 / 43_200.0;
        (watts_m2 * 120.0 * 100.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_context_is_fully_populated() {
        let ctx = WeatherContext::default();
        assert_eq!(ctx.temperature_c, DEFAULT_TEMPERATURE_C);
        assert_eq!(ctx.et0_mm, DEFAULT_ET0_MM);
        assert!(ctx.rain_trend.is_empty());
        assert_eq!(ctx.location.name, "Bisceglie");
    }

    #[test]
    fn lux_estimate_handles_missing_radiation() {
        let mut ctx = WeatherContext::default();
        ctx.solar_rad_mj = 0.0;
        assert_eq!(ctx.estimated_lux(), 0.0);

        ctx.solar_rad_mj = 4.32;
        // 4.32 MJ over 12h = 100 W/m² -> 12000 lux
        assert!((ctx.estimated_lux() - 12_000.0).abs() < 1.0);
    }
}
