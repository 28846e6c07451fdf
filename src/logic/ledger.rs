use crate::error::Result;
use crate::models::intervention::{InterventionRecord, InterventionType, LedgerKey};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

const FERTILIZATION_LOOKBACK_DAYS: i64 = 15;

/// Append-only log of user-performed interventions, owned by the
/// persistence collaborator and read-only to this crate.
#[async_trait]
pub trait InterventionLedger: Send + Sync {
    /// Records of `kind` for `key` executed at or after `since`.
    async fn find(
        &self,
        key: &LedgerKey,
        kind: InterventionType,
        since: DateTime<Utc>,
    ) -> Result<Vec<InterventionRecord>>;
}

/// Read-side aggregations over the intervention ledger.
///
/// The ledger holds plant references in two historical shapes (plain
/// text and native id); this reader is the only place aware of that,
/// so the rest of the pipeline works with plain `&str` plant ids.
pub struct LedgerReader {
    ledger: Arc<dyn InterventionLedger>,
}

impl LedgerReader {
    pub fn new(ledger: Arc<dyn InterventionLedger>) -> Self {
        Self { ledger }
    }

    /// Liters of irrigation the user has already logged today (UTC day
    /// boundary). Looks the plant up by its text id first and retries
    /// with the native form only when that comes back empty; any
    /// ledger failure counts as zero.
    pub async fn manual_water_today(&self, plant_id: &str) -> f64 {
        let Some(start_of_day) = Utc::now().date_naive().and_hms_opt(0, 0, 0) else {
            return 0.0;
        };
        let since = start_of_day.and_utc();

        let records = match self
            .lookup_with_retry(plant_id, InterventionType::Irrigation, since)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("manual water lookup failed for {}: {}", plant_id, e);
                return 0.0;
            }
        };

        let total: f64 = records.iter().filter_map(|r| r.liters).sum();
        if total > 0.0 {
            tracing::debug!("found {:.1}L of user-logged water today", total);
        }
        total
    }

    /// Most recent fertilization within the 15-day lookback, formatted
    /// for the explanation prompt. Both key shapes are searched, as
    /// records may exist under either. Errors yield `None`.
    pub async fn recent_fertilization(&self, plant_id: &str) -> Option<String> {
        let since = Utc::now() - Duration::days(FERTILIZATION_LOOKBACK_DAYS);

        let mut records = match self
            .lookup_merged(plant_id, InterventionType::Fertilization, since)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("fertilization lookup failed for {}: {}", plant_id, e);
                return None;
            }
        };

        records.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
        let last = records.first()?;

        let dose = last
            .dose
            .clone()
            .or_else(|| last.liters.map(|l| format!("{}L", l)))
            .unwrap_or_else(|| "dose standard".to_string());
        Some(format!("{} in data {}", dose, last.executed_at.format("%d/%m")))
    }

    async fn lookup_with_retry(
        &self,
        plant_id: &str,
        kind: InterventionType,
        since: DateTime<Utc>,
    ) -> Result<Vec<InterventionRecord>> {
        let records = self
            .ledger
            .find(&LedgerKey::Text(plant_id.to_string()), kind, since)
            .await?;
        if !records.is_empty() {
            return Ok(records);
        }
        match Uuid::parse_str(plant_id) {
            Ok(native) => self.ledger.find(&LedgerKey::Native(native), kind, since).await,
            Err(_) => Ok(records),
        }
    }

    async fn lookup_merged(
        &self,
        plant_id: &str,
        kind: InterventionType,
        since: DateTime<Utc>,
    ) -> Result<Vec<InterventionRecord>> {
        let mut records = self
            .ledger
            .find(&LedgerKey::Text(plant_id.to_string()), kind, since)
            .await?;
        if let Ok(native) = Uuid::parse_str(plant_id) {
            records.extend(
                self.ledger
                    .find(&LedgerKey::Native(native), kind, since)
                    .await?,
            );
        }
        Ok(records)
    }
}

/// Intervention ledger backed by a JSON file, used by the CLI to feed
/// user-logged actions into an analysis run.
#[derive(Debug, Default)]
pub struct JsonLedger {
    records: Vec<InterventionRecord>,
}

impl JsonLedger {
    pub fn from_file(path: &Path) -> Result<Self> {
        let records: Vec<InterventionRecord> =
            serde_json::from_str(&std::fs::read_to_string(path)?)?;
        Ok(Self { records })
    }

    pub fn from_records(records: Vec<InterventionRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl InterventionLedger for JsonLedger {
    async fn find(
        &self,
        key: &LedgerKey,
        kind: InterventionType,
        since: DateTime<Utc>,
    ) -> Result<Vec<InterventionRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.plant_key == *key && r.kind == kind && r.executed_at >= since)
            .cloned()
            .collect())
    }
}
