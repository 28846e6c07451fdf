pub mod openmeteo;
pub mod openrouter;

pub use openmeteo::OpenMeteoClient;
pub use openrouter::OpenRouterClient;
