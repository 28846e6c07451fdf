use crate::datasources::openrouter::{ChatBackend, FALLBACK_MODELS};
use crate::models::decision::{Decision, ExplanationReport, Recommendation};
use crate::models::plant::Plant;
use crate::models::weather::WeatherContext;
use chrono::{DateTime, Datelike, Utc};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(40);
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);
const RAIN_TREND_MIN_MM: f64 = 0.5;

const SYSTEM_PROMPT: &str = "You are an expert agronomist assistant. You receive a plant's \
profile, today's weather and a completed irrigation analysis. Write practical advice for the \
plant's owner in plain language. Follow the agronomic analysis verdict exactly; never contradict \
it. Never mention which software, model or service produced the analysis.";

/// Turns a settled decision into user-facing advice via an external
/// chat backend, falling back to a deterministic summary when no
/// backend is configured or every model attempt fails.
pub struct ExplanationGenerator {
    backend: Option<Arc<dyn ChatBackend>>,
    models: Vec<String>,
    attempt_timeout: Duration,
    backoff: Duration,
}

impl ExplanationGenerator {
    pub fn new(backend: Option<Arc<dyn ChatBackend>>) -> Self {
        Self {
            backend,
            models: FALLBACK_MODELS.iter().map(|m| m.to_string()).collect(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            backoff: DEFAULT_BACKOFF,
        }
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        if !models.is_empty() {
            self.models = models;
        }
        self
    }

    pub fn with_timing(mut self, attempt_timeout: Duration, backoff: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self.backoff = backoff;
        self
    }

    pub async fn generate(
        &self,
        plant: &Plant,
        weather: &WeatherContext,
        decision: &Decision,
        now: DateTime<Utc>,
    ) -> ExplanationReport {
        let Some(backend) = &self.backend else {
            return fallback_report(decision, "no credentials configured");
        };

        let user_prompt = build_prompt(plant, weather, decision, now);

        for model in &self.models {
            let attempt = tokio::time::timeout(
                self.attempt_timeout,
                backend.complete(model, SYSTEM_PROMPT, &user_prompt),
            )
            .await;

            match attempt {
                Ok(Ok(text)) if !text.trim().is_empty() => {
                    tracing::debug!("explanation generated by {}", model);
                    return ExplanationReport {
                        text,
                        used_llm: true,
                        model: Some(model.clone()),
                    };
                }
                Ok(Ok(_)) => {
                    tracing::warn!("{} returned an empty explanation", model);
                }
                Ok(Err(e)) => {
                    tracing::warn!("{} failed: {}", model, e);
                }
                Err(_) => {
                    tracing::warn!("{} timed out after {:?}", model, self.attempt_timeout);
                }
            }
            tokio::time::sleep(self.backoff).await;
        }

        fallback_report(decision, "all models unavailable")
    }
}

fn fallback_report(decision: &Decision, reason: &str) -> ExplanationReport {
    ExplanationReport {
        text: format!(
            "💧 ADVICE: {}. {} (AI analysis temporarily unavailable: {})",
            decision.recommendation, decision.reason, reason
        ),
        used_llm: false,
        model: None,
    }
}

fn build_prompt(
    plant: &Plant,
    weather: &WeatherContext,
    decision: &Decision,
    now: DateTime<Utc>,
) -> String {
    let verdict = match decision.recommendation {
        Recommendation::Irrigate => format!(
            "IRRIGATE with {:.2} liters today",
            decision.quantity_liters
        ),
        Recommendation::Skip => "DO NOT irrigate today".to_string(),
    };

    let fertilization_section = match &decision.fertilization {
        Some(info) => format!(
            "The user last fertilized: {}. Acknowledge it and advise whether another \
             application is due yet.",
            info
        ),
        None => "No fertilization was logged in the past two weeks. If the season calls for \
                 it, suggest a suitable one."
            .to_string(),
    };

    format!(
        "[PLANT]\nName: {}\nSpecies: {}\nLocation: {}\nSeason: {}\n\n\
         [CONDITIONS]\nTemperature: {:.1}°C\nHumidity: {:.0}%\nET0: {:.2}mm\n\
         Wind: {:.1}km/h\nEstimated light: {:.0} lux\nRain trend: {}\n\n\
         [USER LOG]\nWater already given today: {:.2}L\n{}\n\n\
         [AGRONOMIC ANALYSIS]\nVerdict: {}\nReason: {}\n\n\
         [WRITING INSTRUCTIONS]\nAnswer in at most three short paragraphs using exactly this \
         structure:\n💧 IRRIGATION: restate the verdict and how to apply it.\n\
         🌿 FERTILIZATION: the fertilization advice.\n💡 NOTE: one seasonal care tip.\n\
         Never reveal or speculate about how the analysis was computed.",
        plant.display_name(),
        plant.species,
        weather.location.name,
        season_for(now.month()),
        weather.temperature_c,
        weather.humidity_pct,
        weather.et0_mm,
        weather.wind_kmh,
        weather.estimated_lux(),
        format_rain_trend(weather, now.date_naive()),
        decision.water_today_liters,
        fertilization_section,
        verdict,
        decision.reason,
    )
}

fn season_for(month: u32) -> &'static str {
    match month {
        3..=5 => "Spring",
        6..=8 => "Summer",
        9..=11 => "Autumn",
        _ => "Winter",
    }
}

/// Compact rain summary for the prompt: only days above a trace
/// threshold, split into past and upcoming.
fn format_rain_trend(weather: &WeatherContext, today: chrono::NaiveDate) -> String {
    let mut past = Vec::new();
    let mut upcoming = Vec::new();

    for day in &weather.rain_trend {
        if day.rain_mm <= RAIN_TREND_MIN_MM {
            continue;
        }
        let entry = format!("{} ({:.0}mm)", day.date.format("%m-%d"), day.rain_mm);
        if day.date < today {
            past.push(entry);
        } else {
            upcoming.push(entry);
        }
    }

    if past.is_empty() && upcoming.is_empty() {
        return "no significant rain".to_string();
    }
    format!(
        "Past: {}. Upcoming: {}",
        if past.is_empty() { "none".to_string() } else { past.join(", ") },
        if upcoming.is_empty() { "none".to_string() } else { upcoming.join(", ") },
    )
}
