use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterventionType {
    Irrigation,
    Fertilization,
}

/// Plant reference as stored in the intervention ledger.
///
/// Historical records were written under either a plain string id or
/// the ledger's native id, so queries must be expressible in both
/// forms. Untagged deserialization tries the native form first, which
/// reproduces that drift for ledger files authored with uuid strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LedgerKey {
    Native(Uuid),
    Text(String),
}

/// One user-logged action, read-only to this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionRecord {
    pub plant_key: LedgerKey,
    pub kind: InterventionType,
    pub executed_at: DateTime<Utc>,
    /// Liters applied, for irrigation records.
    #[serde(default)]
    pub liters: Option<f64>,
    /// Dose descriptor, for fertilization records.
    #[serde(default)]
    pub dose: Option<String>,
}
