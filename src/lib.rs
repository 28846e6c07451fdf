//! Irrigation decision engine for potted plants.
//!
//! Aggregates live weather, a learned water-demand estimate and the
//! user's own intervention log into a daily IRRIGATE/SKIP decision
//! with a natural-language explanation.

pub mod config;
pub mod datasources;
pub mod error;
pub mod logic;
pub mod models;

pub use error::{PlantOpsError, Result};
pub use logic::pipeline::DecisionPipeline;
