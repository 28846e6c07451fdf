mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands, PlantArgs};
use plantops::config::Config;
use plantops::datasources::{OpenMeteoClient, OpenRouterClient};
use plantops::datasources::openrouter::ChatBackend;
use plantops::logic::estimator::{DemandEstimator, WaterDemand};
use plantops::logic::{
    DecisionPipeline, ExplanationGenerator, JsonLedger, JsonSnapshotStore, LedgerReader,
    WeatherAggregator,
};
use plantops::models::decision::{BatchAnalysis, PlantAnalysis};
use plantops::models::plant::Plant;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = Config::load(cli.config).context("failed to load configuration")?;

    match cli.command {
        Commands::Analyze {
            plant,
            interventions,
            json,
        } => {
            let plant = resolve_plant(plant)?;
            let pipeline = build_pipeline(&config, interventions.as_deref())?;
            let analysis = pipeline.compute_decision(&plant).await?;
            print_analysis(&plant, &analysis, json)?;
        }
        Commands::Batch {
            file,
            interventions,
            json,
        } => {
            let plants: Vec<Plant> = serde_json::from_str(
                &std::fs::read_to_string(&file)
                    .with_context(|| format!("failed to read {}", file.display()))?,
            )
            .context("failed to parse plants file")?;

            let pipeline = build_pipeline(&config, interventions.as_deref())?;
            let results = pipeline.compute_batch(&plants).await;
            print_batch(&results, json)?;
        }
        Commands::Train => {
            let model_dir = config.model_dir()?;
            DemandEstimator::retrain(&model_dir)?;
            println!("Model trained and saved to {}", model_dir.display());
        }
        Commands::Check => {
            run_check(&config).await?;
        }
    }

    Ok(())
}

fn build_pipeline(
    config: &Config,
    interventions: Option<&std::path::Path>,
) -> anyhow::Result<DecisionPipeline> {
    let weather_client =
        OpenMeteoClient::new(Duration::from_secs(config.weather.timeout_secs))?;
    let aggregator = WeatherAggregator::new(Arc::new(weather_client));

    let estimator: Option<Arc<dyn WaterDemand>> =
        match DemandEstimator::load_or_train(&config.model_dir()?) {
            Ok(estimator) => Some(Arc::new(estimator)),
            Err(e) => {
                tracing::warn!("estimator unavailable, using ET0 fallback: {}", e);
                None
            }
        };

    let ledger = match interventions {
        Some(path) => JsonLedger::from_file(path)
            .with_context(|| format!("failed to load interventions from {}", path.display()))?,
        None => JsonLedger::default(),
    };

    let backend: Option<Arc<dyn ChatBackend>> = match config.resolved_api_key() {
        Some(key) => {
            let client =
                OpenRouterClient::new(key, Duration::from_secs(config.explainer.timeout_secs))?;
            Some(Arc::new(client))
        }
        None => {
            tracing::debug!("no AI credentials configured, explanations use the fallback");
            None
        }
    };
    let explainer = ExplanationGenerator::new(backend)
        .with_models(config.explainer.models.clone())
        .with_timing(
            Duration::from_secs(config.explainer.timeout_secs),
            Duration::from_millis(config.explainer.backoff_ms),
        );

    let store = Arc::new(JsonSnapshotStore::new(config.snapshot_dir()?)?);

    Ok(DecisionPipeline::new(
        aggregator,
        estimator,
        LedgerReader::new(Arc::new(ledger)),
        explainer,
        Some(store),
    ))
}

fn resolve_plant(args: PlantArgs) -> anyhow::Result<Plant> {
    if let Some(file) = args.file {
        let plant: Plant = serde_json::from_str(
            &std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?,
        )
        .context("failed to parse plant file")?;
        return Ok(plant);
    }

    let Some(id) = args.id else {
        anyhow::bail!("provide a plant via --file or --id");
    };

    Ok(Plant {
        id,
        name: args.name.unwrap_or_default(),
        species: args.species.unwrap_or_default(),
        location: args.city,
        latitude: args.lat,
        longitude: args.lon,
        stored_weather: None,
    })
}

fn print_analysis(plant: &Plant, analysis: &PlantAnalysis, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(analysis)?);
        return Ok(());
    }

    let decision = &analysis.decision;
    println!("{} ({})", plant.display_name(), analysis.weather.location.name);
    println!(
        "  {} - {} [{:.2}L]",
        decision.recommendation, decision.reason, decision.quantity_liters
    );
    println!(
        "  rain: {:.1}mm past / {:.1}mm recent / {:.1}mm forecast",
        decision.past_rain_mm, decision.recent_rain_mm, decision.future_rain_mm
    );
    println!();
    println!("{}", analysis.explanation.text);
    Ok(())
}

fn print_batch(results: &[BatchAnalysis], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    for entry in results {
        let decision = &entry.analysis.decision;
        println!(
            "{}: {} - {} [{:.2}L]",
            entry.id, decision.recommendation, decision.reason, decision.quantity_liters
        );
    }
    Ok(())
}

async fn run_check(config: &Config) -> anyhow::Result<()> {
    let mut status_parts = Vec::new();

    let weather_client = OpenMeteoClient::new(Duration::from_secs(config.weather.timeout_secs))?;
    match weather_client.test_connection().await {
        Ok(true) => status_parts.push("Weather: OK"),
        Ok(false) => status_parts.push("Weather: ERROR"),
        Err(_) => status_parts.push("Weather: OFFLINE"),
    }

    if config.resolved_api_key().is_some() {
        status_parts.push("AI: configured");
    } else {
        status_parts.push("AI: no credentials (fallback advice only)");
    }

    let estimator = DemandEstimator::load_or_train(&config.model_dir()?);
    match estimator {
        Ok(e) if e.is_trained() => status_parts.push("Model: OK"),
        _ => status_parts.push("Model: UNAVAILABLE"),
    }

    println!("{}", status_parts.join(" | "));
    Ok(())
}
