use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "plantops", version, about = "Irrigation decision engine for potted plants")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config.yaml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a single plant and print its irrigation advice
    Analyze {
        #[command(flatten)]
        plant: PlantArgs,

        /// JSON file with user-logged interventions
        #[arg(short, long)]
        interventions: Option<PathBuf>,

        /// Print the full analysis as JSON
        #[arg(long)]
        json: bool,
    },
    /// Analyze every plant in a JSON file
    Batch {
        /// JSON file with an array of plants
        file: PathBuf,

        /// JSON file with user-logged interventions
        #[arg(short, long)]
        interventions: Option<PathBuf>,

        /// Print the full analyses as JSON
        #[arg(long)]
        json: bool,
    },
    /// Retrain the water-demand model from scratch
    Train,
    /// Validate config and test external connections
    Check,
}

/// A plant given either as a JSON file or inline via flags.
#[derive(Args)]
pub struct PlantArgs {
    /// JSON file describing the plant
    #[arg(short, long, conflicts_with_all = ["id", "name"])]
    pub file: Option<PathBuf>,

    /// Plant identifier
    #[arg(long)]
    pub id: Option<String>,

    /// Display name
    #[arg(long)]
    pub name: Option<String>,

    /// Botanical species
    #[arg(long)]
    pub species: Option<String>,

    /// City used for geocoding
    #[arg(long)]
    pub city: Option<String>,

    /// Latitude, overrides geocoding together with --lon
    #[arg(long, requires = "lon")]
    pub lat: Option<f64>,

    /// Longitude
    #[arg(long, requires = "lat")]
    pub lon: Option<f64>,
}
