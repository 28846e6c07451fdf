pub mod aggregator;
pub mod estimator;
pub mod explainer;
pub mod ledger;
pub mod pipeline;
pub mod rain_windows;
pub mod supervisor;

pub use aggregator::WeatherAggregator;
pub use estimator::DemandEstimator;
pub use explainer::ExplanationGenerator;
pub use ledger::{JsonLedger, LedgerReader};
pub use pipeline::{DecisionPipeline, JsonSnapshotStore};
