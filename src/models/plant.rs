use serde::{Deserialize, Serialize};

use super::weather::WeatherContext;

/// A monitored plant, as handed to the decision pipeline by the
/// persistence collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Plant {
    /// External identifier; an empty id is a client error.
    pub id: String,
    pub name: String,
    pub species: String,
    /// Free-text city name, used when coordinates are absent.
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Weather snapshot from the previous analysis, consulted by the
    /// aggregator's field-level coalesce.
    pub stored_weather: Option<WeatherContext>,
}

impl Plant {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "unnamed plant"
        } else {
            &self.name
        }
    }
}
