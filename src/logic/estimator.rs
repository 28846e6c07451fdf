use crate::error::Result;
use ndarray::{Array1, Array2, Axis};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const MODEL_FILE: &str = "water_model.json";
pub const SCALER_FILE: &str = "scaler.json";

const FEATURES: usize = 4;
const HIDDEN_1: usize = 16;
const HIDDEN_2: usize = 8;
const TRAIN_SAMPLES: usize = 2000;
const TRAIN_EPOCHS: usize = 600;
const LEARNING_RATE: f64 = 0.05;
const TRAIN_SEED: u64 = 42;

// Substituted for missing prediction inputs.
const DEFAULT_TEMP_C: f64 = 20.0;
const DEFAULT_HUMIDITY_PCT: f64 = 50.0;
const DEFAULT_RAIN_MM: f64 = 0.0;
const DEFAULT_ET0_MM: f64 = 3.0;

// Rainfall soaks in at roughly 80% efficiency.
const RAIN_EFFICIENCY: f64 = 0.8;

/// Inputs to one water-demand prediction. `None` fields fall back to
/// fixed defaults before inference.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DemandInputs {
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub tomorrow_rain_mm: Option<f64>,
    pub et0_mm: Option<f64>,
}

/// Water-demand model seam; the pipeline only ever sees this trait so
/// tests can substitute a stub.
pub trait WaterDemand: Send + Sync {
    /// Theoretical liters of water needed, >= 0, rounded to 2 decimals.
    /// Must be deterministic for identical inputs.
    fn predict(&self, inputs: DemandInputs) -> f64;
}

/// Per-feature standardization fitted on the training set and reused
/// verbatim at inference time.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Scaler {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl Scaler {
    fn fit(x: &Array2<f64>) -> Self {
        let n = x.nrows().max(1) as f64;
        let mean = x.sum_axis(Axis(0)) / n;
        let centered = x - &mean;
        let std = (centered.mapv(|v| v * v).sum_axis(Axis(0)) / n).mapv(f64::sqrt);
        Self {
            mean: mean.to_vec(),
            std: std.to_vec(),
        }
    }

    fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.to_owned();
        for j in 0..out.ncols() {
            let mean = self.mean[j];
            let std = if self.std[j] > 1e-9 { self.std[j] } else { 1.0 };
            out.column_mut(j).map_inplace(|v| *v = (*v - mean) / std);
        }
        out
    }
}

/// Two-hidden-layer regressor (4 -> 16 -> 8 -> 1, ReLU) trained with
/// full-batch gradient descent on a mean-squared-error loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Mlp {
    w1: Array2<f64>,
    b1: Array1<f64>,
    w2: Array2<f64>,
    b2: Array1<f64>,
    w3: Array2<f64>,
    b3: Array1<f64>,
}

impl Mlp {
    fn new(rng: &mut SmallRng) -> Self {
        fn layer(rng: &mut SmallRng, rows: usize, cols: usize) -> Array2<f64> {
            let limit = (6.0 / (rows + cols) as f64).sqrt();
            Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-limit..limit))
        }
        Self {
            w1: layer(rng, FEATURES, HIDDEN_1),
            b1: Array1::zeros(HIDDEN_1),
            w2: layer(rng, HIDDEN_1, HIDDEN_2),
            b2: Array1::zeros(HIDDEN_2),
            w3: layer(rng, HIDDEN_2, 1),
            b3: Array1::zeros(1),
        }
    }

    fn forward(&self, x: &Array2<f64>) -> (Array2<f64>, Array2<f64>, Array2<f64>) {
        let z1 = x.dot(&self.w1) + &self.b1;
        let a1 = z1.mapv(|v| v.max(0.0));
        let z2 = a1.dot(&self.w2) + &self.b2;
        let a2 = z2.mapv(|v| v.max(0.0));
        let out = a2.dot(&self.w3) + &self.b3;
        (a1, a2, out)
    }

    fn predict_one(&self, x: &Array2<f64>) -> f64 {
        let (_, _, out) = self.forward(x);
        out[[0, 0]]
    }

    fn train(&mut self, x: &Array2<f64>, y: &Array2<f64>, epochs: usize, lr: f64) -> f64 {
        let n = x.nrows() as f64;
        let mut mse = f64::INFINITY;

        for _ in 0..epochs {
            let (a1, a2, out) = self.forward(x);
            let err = &out - y;
            mse = err.mapv(|v| v * v).sum() / n;

            let d_out = err.mapv(|v| 2.0 * v / n);
            let g_w3 = a2.t().dot(&d_out);
            let g_b3 = d_out.sum_axis(Axis(0));

            let d_a2 = d_out.dot(&self.w3.t());
            let d_z2 = &d_a2 * &a2.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
            let g_w2 = a1.t().dot(&d_z2);
            let g_b2 = d_z2.sum_axis(Axis(0));

            let d_a1 = d_z2.dot(&self.w2.t());
            let d_z1 = &d_a1 * &a1.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
            let g_w1 = x.t().dot(&d_z1);
            let g_b1 = d_z1.sum_axis(Axis(0));

            self.w3 = &self.w3 - &(g_w3 * lr);
            self.b3 = &self.b3 - &(g_b3 * lr);
            self.w2 = &self.w2 - &(g_w2 * lr);
            self.b2 = &self.b2 - &(g_b2 * lr);
            self.w1 = &self.w1 - &(g_w1 * lr);
            self.b1 = &self.b1 - &(g_b1 * lr);
        }
        mse
    }
}

#[derive(Debug, Clone)]
struct TrainedModel {
    mlp: Mlp,
    scaler: Scaler,
}

/// The water-demand estimator service.
///
/// Construct once at startup via [`DemandEstimator::load_or_train`];
/// the trained parameters are immutable afterwards and safe to share
/// across concurrent predictions. An untrained instance answers with
/// the closed-form heuristic `max(0, et0 - rain)`.
pub struct DemandEstimator {
    model: Option<TrainedModel>,
}

impl DemandEstimator {
    /// Load persisted weights from `model_dir`, or train on the
    /// synthetic dataset and persist the result. Runs at most once per
    /// process, before the pipeline starts serving predictions.
    pub fn load_or_train(model_dir: &Path) -> Result<Self> {
        match Self::load(model_dir) {
            Ok(Some(model)) => {
                tracing::info!("water-demand model loaded from disk");
                return Ok(Self { model: Some(model) });
            }
            Ok(None) => {
                tracing::info!("no persisted water-demand model, training");
            }
            Err(e) => {
                tracing::warn!("failed to load water-demand model, retraining: {}", e);
            }
        }
        Self::retrain(model_dir)
    }

    /// Train from scratch and overwrite any persisted model.
    pub fn retrain(model_dir: &Path) -> Result<Self> {
        let (model, mse) = fit(TRAIN_SAMPLES, TRAIN_EPOCHS, TRAIN_SEED);
        Self::save(model_dir, &model)?;
        tracing::info!("water-demand model trained (mse {:.4})", mse);
        Ok(Self { model: Some(model) })
    }

    /// An estimator with no trained model; predictions use the
    /// closed-form heuristic.
    pub fn untrained() -> Self {
        Self { model: None }
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    fn load(model_dir: &Path) -> Result<Option<TrainedModel>> {
        let model_path = model_dir.join(MODEL_FILE);
        let scaler_path = model_dir.join(SCALER_FILE);
        if !model_path.exists() || !scaler_path.exists() {
            return Ok(None);
        }
        let mlp: Mlp = serde_json::from_str(&fs::read_to_string(model_path)?)?;
        let scaler: Scaler = serde_json::from_str(&fs::read_to_string(scaler_path)?)?;
        Ok(Some(TrainedModel { mlp, scaler }))
    }

    fn save(model_dir: &Path, model: &TrainedModel) -> Result<()> {
        fs::create_dir_all(model_dir)?;
        fs::write(
            model_dir.join(MODEL_FILE),
            serde_json::to_string(&model.mlp)?,
        )?;
        fs::write(
            model_dir.join(SCALER_FILE),
            serde_json::to_string(&model.scaler)?,
        )?;
        Ok(())
    }
}

impl WaterDemand for DemandEstimator {
    fn predict(&self, inputs: DemandInputs) -> f64 {
        let temp = inputs.temperature_c.unwrap_or(DEFAULT_TEMP_C);
        let humidity = inputs.humidity_pct.unwrap_or(DEFAULT_HUMIDITY_PCT);
        let rain = inputs.tomorrow_rain_mm.unwrap_or(DEFAULT_RAIN_MM);
        let et0 = inputs.et0_mm.unwrap_or(DEFAULT_ET0_MM);

        let heuristic = || round2((et0 - rain).max(0.0));

        let Some(model) = &self.model else {
            return heuristic();
        };

        let features = match Array2::from_shape_vec((1, FEATURES), vec![temp, humidity, rain, et0])
        {
            Ok(f) => f,
            Err(_) => return heuristic(),
        };
        let prediction = model.mlp.predict_one(&model.scaler.transform(&features));
        if !prediction.is_finite() {
            tracing::warn!("water-demand inference produced a non-finite value, using heuristic");
            return heuristic();
        }
        round2(prediction.max(0.0))
    }
}

/// Generate the synthetic physical dataset the regressor is fitted on.
/// Rain is more likely under high humidity; ET0 tracks temperature;
/// the target is ET0-driven demand adjusted for heat and dryness,
/// reduced by effective rainfall and clamped non-negative.
fn generate_synthetic(n_samples: usize, rng: &mut SmallRng) -> (Array2<f64>, Array2<f64>) {
    let mut features = Vec::with_capacity(n_samples * FEATURES);
    let mut targets = Vec::with_capacity(n_samples);

    for _ in 0..n_samples {
        let temp = rng.gen_range(0.0..45.0);
        let humidity = rng.gen_range(10.0..100.0);
        let rain = if humidity > 70.0 && rng.gen::<f64>() > 0.6 {
            rng.gen_range(0.0..50.0)
        } else {
            0.0
        };
        let et0_noise: f64 = rng.gen_range(0.0..1.5);
        let et0 = (temp * 0.15 + et0_noise).max(0.5);

        let mut need = et0;
        if temp > 30.0 {
            need *= 1.2;
        }
        if humidity < 30.0 {
            need *= 1.1;
        }
        need -= rain * RAIN_EFFICIENCY;
        need = need.max(0.0);
        need += rng.gen_range(-0.1..0.1);
        need = need.max(0.0);

        features.extend_from_slice(&[temp, humidity, rain, et0]);
        targets.push(need);
    }

    let x = Array2::from_shape_vec((n_samples, FEATURES), features)
        .expect("synthetic feature matrix shape");
    let y = Array2::from_shape_vec((n_samples, 1), targets).expect("synthetic target shape");
    (x, y)
}

fn fit(samples: usize, epochs: usize, seed: u64) -> (TrainedModel, f64) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let (x, y) = generate_synthetic(samples, &mut rng);
    let scaler = Scaler::fit(&x);
    let x_scaled = scaler.transform(&x);
    let mut mlp = Mlp::new(&mut rng);
    let mse = mlp.train(&x_scaled, &y, epochs, LEARNING_RATE);
    (TrainedModel { mlp, scaler }, mse)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
