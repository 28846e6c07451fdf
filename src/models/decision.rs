use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::weather::WeatherContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Irrigate,
    Skip,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Irrigate => "IRRIGATE",
            Recommendation::Skip => "SKIP",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Final structured recommendation for one plant at one point in time.
/// Constructed once by the supervisor and never mutated afterwards;
/// `reason` is the single channel through which degraded or fallback
/// states reach the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub recommendation: Recommendation,
    pub reason: String,
    /// Liters to apply, >= 0, rounded to 2 decimals.
    pub quantity_liters: f64,

    // Diagnostics carried for the explanation prompt and the frontend.
    pub estimated_liters: f64,
    pub water_today_liters: f64,
    pub past_rain_mm: f64,
    pub future_rain_mm: f64,
    pub recent_rain_mm: f64,
    pub fertilization: Option<String>,
}

/// Outcome of the natural-language explanation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplanationReport {
    pub text: String,
    pub used_llm: bool,
    /// Identifier of the model that answered, when one did.
    pub model: Option<String>,
}

/// Result of one pipeline run for one plant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantAnalysis {
    pub decision: Decision,
    pub weather: WeatherContext,
    pub explanation: ExplanationReport,
}

/// Batch entry: a per-plant analysis tagged with the plant id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchAnalysis {
    pub id: String,
    #[serde(flatten)]
    pub analysis: PlantAnalysis,
}

/// Snapshot written back to the plant's record after a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub report: ExplanationReport,
    pub weather: WeatherContext,
    pub last_checked: DateTime<Utc>,
    pub water_today_liters: f64,
}
