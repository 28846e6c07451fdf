use crate::error::{PlantOpsError, Result};
use crate::logic::aggregator::WeatherAggregator;
use crate::logic::estimator::{DemandInputs, WaterDemand};
use crate::logic::explainer::ExplanationGenerator;
use crate::logic::ledger::LedgerReader;
use crate::logic::rain_windows;
use crate::logic::supervisor::{self, SupervisorInput};
use crate::models::decision::{
    AnalysisSnapshot, BatchAnalysis, Decision, ExplanationReport, PlantAnalysis, Recommendation,
};
use crate::models::plant::Plant;
use crate::models::weather::WeatherContext;
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;

const BATCH_CONCURRENCY: usize = 4;

/// Persistence hook for finished analyses. A failing store never
/// affects the analysis result.
#[async_trait]
pub trait PlantStore: Send + Sync {
    async fn save_snapshot(&self, plant_id: &str, snapshot: &AnalysisSnapshot) -> Result<()>;
}

/// Snapshot store writing one pretty-printed JSON file per plant.
pub struct JsonSnapshotStore {
    dir: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }
}

#[async_trait]
impl PlantStore for JsonSnapshotStore {
    async fn save_snapshot(&self, plant_id: &str, snapshot: &AnalysisSnapshot) -> Result<()> {
        let path = self.dir.join(format!("{}.json", plant_id));
        let body = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&path, body).await?;
        Ok(())
    }
}

/// End-to-end analysis for one plant: weather aggregation, rainfall
/// windows, demand estimation, ledger lookups, the supervisor rule
/// chain and the explanation, in that order.
pub struct DecisionPipeline {
    aggregator: WeatherAggregator,
    estimator: Option<Arc<dyn WaterDemand>>,
    ledger: LedgerReader,
    explainer: ExplanationGenerator,
    store: Option<Arc<dyn PlantStore>>,
}

impl DecisionPipeline {
    pub fn new(
        aggregator: WeatherAggregator,
        estimator: Option<Arc<dyn WaterDemand>>,
        ledger: LedgerReader,
        explainer: ExplanationGenerator,
        store: Option<Arc<dyn PlantStore>>,
    ) -> Self {
        Self {
            aggregator,
            estimator,
            ledger,
            explainer,
            store,
        }
    }

    pub async fn compute_decision(&self, plant: &Plant) -> Result<PlantAnalysis> {
        if plant.id.trim().is_empty() {
            return Err(PlantOpsError::InvalidData("missing plant id".to_string()));
        }

        let weather = self.aggregator.fetch_context(plant).await;
        let today = Utc::now().date_naive();
        let rainfall = rain_windows::accumulate(&weather.rain_trend, today);

        let target = match &self.estimator {
            Some(estimator) => {
                let theoretical = estimator.predict(DemandInputs {
                    temperature_c: Some(weather.temperature_c),
                    humidity_pct: Some(weather.humidity_pct),
                    tomorrow_rain_mm: Some(rainfall.tomorrow_mm),
                    et0_mm: Some(weather.et0_mm),
                });
                supervisor::estimator_target(theoretical)
            }
            None => supervisor::legacy_et0_target(weather.et0_mm, weather.wind_kmh),
        };

        let water_today = self.ledger.manual_water_today(&plant.id).await;
        let fertilization = self.ledger.recent_fertilization(&plant.id).await;

        let decision = supervisor::decide(SupervisorInput {
            target_liters: target,
            water_today_liters: water_today,
            rainfall,
            fertilization,
        });
        tracing::info!(
            "{}: {} ({})",
            plant.display_name(),
            decision.recommendation,
            decision.reason
        );

        let explanation = self
            .explainer
            .generate(plant, &weather, &decision, Utc::now())
            .await;

        let analysis = PlantAnalysis {
            decision,
            weather,
            explanation,
        };

        if let Some(store) = &self.store {
            let snapshot = AnalysisSnapshot {
                report: analysis.explanation.clone(),
                weather: analysis.weather.clone(),
                last_checked: Utc::now(),
                water_today_liters: analysis.decision.water_today_liters,
            };
            if let Err(e) = store.save_snapshot(&plant.id, &snapshot).await {
                tracing::warn!("snapshot save failed for {}: {}", plant.id, e);
            }
        }

        Ok(analysis)
    }

    /// Analyze a batch of plants with bounded concurrency. A failure
    /// for one plant yields a degraded SKIP entry instead of aborting
    /// the batch.
    pub async fn compute_batch(&self, plants: &[Plant]) -> Vec<BatchAnalysis> {
        stream::iter(plants)
            .map(|plant| async move {
                let analysis = match self.compute_decision(plant).await {
                    Ok(analysis) => analysis,
                    Err(e) => {
                        tracing::error!("analysis failed for {}: {}", plant.display_name(), e);
                        degraded_analysis(&e)
                    }
                };
                BatchAnalysis {
                    id: plant.id.clone(),
                    analysis,
                }
            })
            .buffer_unordered(BATCH_CONCURRENCY)
            .collect()
            .await
    }
}

fn degraded_analysis(error: &PlantOpsError) -> PlantAnalysis {
    let reason = format!("Error: {}", error);
    PlantAnalysis {
        decision: Decision {
            recommendation: Recommendation::Skip,
            reason: reason.clone(),
            quantity_liters: 0.0,
            estimated_liters: 0.0,
            water_today_liters: 0.0,
            past_rain_mm: 0.0,
            future_rain_mm: 0.0,
            recent_rain_mm: 0.0,
            fertilization: None,
        },
        weather: WeatherContext::default(),
        explanation: ExplanationReport {
            text: format!("💧 ADVICE: SKIP. {}", reason),
            used_llm: false,
            model: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasources::openmeteo::{
        DailyConditions, ForecastBundle, GeoMatch, WeatherProvider,
    };
    use crate::logic::ledger::{InterventionLedger, JsonLedger};
    use crate::models::intervention::{InterventionRecord, InterventionType, LedgerKey};
    use crate::models::weather::RainDay;
    use chrono::{DateTime, Duration, NaiveDate};

    struct StubProvider {
        forecast: ForecastBundle,
    }

    #[async_trait]
    impl WeatherProvider for StubProvider {
        async fn geocode(&self, _city: &str) -> Result<Option<GeoMatch>> {
            Ok(None)
        }

        async fn reverse_geocode(&self, _lat: f64, _lon: f64) -> Result<Option<String>> {
            Ok(None)
        }

        async fn forecast_daily(&self, _lat: f64, _lon: f64) -> Result<ForecastBundle> {
            Ok(self.forecast.clone())
        }

        async fn history_daily(
            &self,
            _lat: f64,
            _lon: f64,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<RainDay>> {
            Ok(Vec::new())
        }
    }

    struct FixedDemand(f64);

    impl WaterDemand for FixedDemand {
        fn predict(&self, _inputs: DemandInputs) -> f64 {
            self.0
        }
    }

    struct FailingStore;

    #[async_trait]
    impl PlantStore for FailingStore {
        async fn save_snapshot(&self, _plant_id: &str, _snapshot: &AnalysisSnapshot) -> Result<()> {
            Err(PlantOpsError::DataSourceUnavailable("disk full".into()))
        }
    }

    fn forecast(et0: f64, rain_today: f64) -> ForecastBundle {
        ForecastBundle {
            today: DailyConditions {
                temperature_c: Some(28.0),
                humidity_pct: Some(45.0),
                et0_mm: Some(et0),
                solar_rad_mj: Some(20.0),
                wind_kmh: Some(8.0),
            },
            rain_days: vec![RainDay {
                date: Utc::now().date_naive(),
                rain_mm: rain_today,
            }],
        }
    }

    fn pipeline(
        forecast: ForecastBundle,
        estimator: Option<Arc<dyn WaterDemand>>,
        ledger: Arc<dyn InterventionLedger>,
        store: Option<Arc<dyn PlantStore>>,
    ) -> DecisionPipeline {
        DecisionPipeline::new(
            WeatherAggregator::new(Arc::new(StubProvider { forecast })),
            estimator,
            LedgerReader::new(ledger),
            ExplanationGenerator::new(None),
            store,
        )
    }

    fn plant(id: &str) -> Plant {
        Plant {
            id: id.into(),
            name: "Basil".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn dry_day_produces_an_irrigate_decision() {
        let pipeline = pipeline(
            forecast(3.0, 0.0),
            Some(Arc::new(FixedDemand(2.5))),
            Arc::new(JsonLedger::default()),
            None,
        );

        let analysis = pipeline.compute_decision(&plant("p1")).await.unwrap();
        assert_eq!(analysis.decision.recommendation, Recommendation::Irrigate);
        assert_eq!(analysis.decision.quantity_liters, 2.5);
        assert!(!analysis.explanation.used_llm);
        assert_eq!(analysis.weather.temperature_c, 28.0);
    }

    #[tokio::test]
    async fn heavy_rain_today_skips_irrigation() {
        let pipeline = pipeline(
            forecast(3.0, 12.0),
            Some(Arc::new(FixedDemand(2.5))),
            Arc::new(JsonLedger::default()),
            None,
        );

        let analysis = pipeline.compute_decision(&plant("p1")).await.unwrap();
        assert_eq!(analysis.decision.recommendation, Recommendation::Skip);
        assert!(analysis.decision.reason.contains("Recent rain"));
        assert_eq!(analysis.decision.quantity_liters, 0.0);
    }

    #[tokio::test]
    async fn logged_water_is_subtracted_from_the_target() {
        fn record(liters: f64, minutes_ago: i64) -> InterventionRecord {
            InterventionRecord {
                plant_key: LedgerKey::Text("p1".into()),
                kind: InterventionType::Irrigation,
                executed_at: Utc::now() - Duration::minutes(minutes_ago),
                liters: Some(liters),
                dose: None,
            }
        }
        let ledger = JsonLedger::from_records(vec![record(1.0, 0)]);
        let pipeline = pipeline(
            forecast(3.0, 0.0),
            Some(Arc::new(FixedDemand(2.5))),
            Arc::new(ledger),
            None,
        );

        let analysis = pipeline.compute_decision(&plant("p1")).await.unwrap();
        assert_eq!(analysis.decision.recommendation, Recommendation::Irrigate);
        assert_eq!(analysis.decision.quantity_liters, 1.5);
        assert_eq!(analysis.decision.water_today_liters, 1.0);
    }

    #[tokio::test]
    async fn without_an_estimator_the_legacy_target_applies() {
        let pipeline = pipeline(
            forecast(2.8, 0.0),
            None,
            Arc::new(JsonLedger::default()),
            None,
        );

        let analysis = pipeline.compute_decision(&plant("p1")).await.unwrap();
        assert_eq!(analysis.decision.estimated_liters, 2.8);
    }

    #[tokio::test]
    async fn blank_plant_id_is_rejected() {
        let pipeline = pipeline(
            forecast(3.0, 0.0),
            None,
            Arc::new(JsonLedger::default()),
            None,
        );

        let err = pipeline.compute_decision(&plant("  ")).await.unwrap_err();
        assert!(matches!(err, PlantOpsError::InvalidData(_)));
    }

    #[tokio::test]
    async fn batch_degrades_failed_plants_instead_of_aborting() {
        let pipeline = pipeline(
            forecast(3.0, 0.0),
            Some(Arc::new(FixedDemand(2.5))),
            Arc::new(JsonLedger::default()),
            None,
        );

        let results = pipeline
            .compute_batch(&[plant("p1"), plant(""), plant("p3")])
            .await;
        assert_eq!(results.len(), 3);

        let degraded = results.iter().find(|r| r.id.is_empty()).unwrap();
        assert_eq!(
            degraded.analysis.decision.recommendation,
            Recommendation::Skip
        );
        assert!(degraded.analysis.decision.reason.starts_with("Error:"));

        let ok = results.iter().find(|r| r.id == "p1").unwrap();
        assert_eq!(
            ok.analysis.decision.recommendation,
            Recommendation::Irrigate
        );
    }

    #[tokio::test]
    async fn a_failing_store_does_not_affect_the_result() {
        let pipeline = pipeline(
            forecast(3.0, 0.0),
            Some(Arc::new(FixedDemand(2.5))),
            Arc::new(JsonLedger::default()),
            Some(Arc::new(FailingStore)),
        );

        let analysis = pipeline.compute_decision(&plant("p1")).await.unwrap();
        assert_eq!(analysis.decision.recommendation, Recommendation::Irrigate);
    }

    #[tokio::test]
    async fn snapshot_store_writes_one_file_per_plant() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonSnapshotStore::new(dir.path().to_path_buf()).unwrap());
        let pipeline = pipeline(
            forecast(3.0, 0.0),
            Some(Arc::new(FixedDemand(2.5))),
            Arc::new(JsonLedger::default()),
            Some(store),
        );

        pipeline.compute_decision(&plant("p1")).await.unwrap();

        let saved = std::fs::read_to_string(dir.path().join("p1.json")).unwrap();
        let snapshot: AnalysisSnapshot = serde_json::from_str(&saved).unwrap();
        assert!(snapshot.report.text.contains("IRRIGATE"));
        assert_eq!(snapshot.water_today_liters, 0.0);
        let _: DateTime<Utc> = snapshot.last_checked;
    }
}
