use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A cancellation event as classified and extracted by the Darwin decoder,
/// before any schedule-store lookup has happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedEvent {
    pub rid: String,
    pub train_service_code: Option<String>,
    pub reason_code: Option<String>,
    pub reason_text: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl DecodedEvent {
    /// Splits the push-port `rid` into its `service_date` (leading 8 digits,
    /// `YYYYMMDD`) and `train_uid` segment, per the derivation rule in the
    /// spec. Returns `None` if the `rid` doesn't start with a parseable date.
    pub fn service_date_and_uid(&self) -> Option<(NaiveDate, &str)> {
        if self.rid.len() <= 8 {
            return None;
        }
        let (date_part, uid_part) = self.rid.split_at(8);
        let date = NaiveDate::parse_from_str(date_part, "%Y%m%d").ok()?;
        if uid_part.is_empty() {
            return None;
        }
        Some((date, uid_part))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallingPoint {
    pub tiploc: String,
    pub station_name: Option<String>,
    pub arrival: Option<String>,
    pub departure: Option<String>,
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginStop {
    pub tiploc: String,
    pub station_name: Option<String>,
    pub scheduled_departure: String,
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationStop {
    pub tiploc: String,
    pub station_name: Option<String>,
    pub scheduled_arrival: String,
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationCategory {
    Planned,
    ShortTerm,
}

/// Why a `DecodedEvent` could not be enriched; mirrors the counter
/// breakdown the Enrichment Engine maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentFailureReason {
    NoRid,
    NoSchedule,
    Ambiguous,
    StoreError,
}

/// An enriched (or unenriched) cancellation, ready to be inserted into the
/// cancellation cache. Enriched fields are value copies taken from the
/// schedule store at decode time — there is no live linkage back to it, so
/// a cache row stays meaningful even across a schedule-store re-import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveCancellation {
    pub rid: String,
    pub train_service_code: Option<String>,
    pub reason_code: Option<String>,
    pub reason_text: Option<String>,
    pub observed_at: DateTime<Utc>,
    pub darwin_enriched: bool,

    pub train_uid: Option<String>,
    pub headcode: Option<String>,
    pub operator_code: Option<String>,
    pub service_date: Option<NaiveDate>,
    pub origin: Option<OriginStop>,
    pub destination: Option<DestinationStop>,
    pub calling_points: Vec<CallingPoint>,
    pub category: Option<CancellationCategory>,
}

impl ActiveCancellation {
    /// Constructs the non-enriched shape used when the RID has no
    /// resolvable schedule. Never fabricates schedule-shaped fields.
    pub fn unenriched(event: DecodedEvent) -> Self {
        Self {
            rid: event.rid,
            train_service_code: event.train_service_code,
            reason_code: event.reason_code,
            reason_text: event.reason_text,
            observed_at: event.received_at,
            darwin_enriched: false,
            train_uid: None,
            headcode: None,
            operator_code: None,
            service_date: None,
            origin: None,
            destination: None,
            calling_points: Vec::new(),
            category: None,
        }
    }

    pub fn route(&self) -> Option<(&str, &str)> {
        match (&self.origin, &self.destination) {
            (Some(origin), Some(destination)) => {
                Some((origin.tiploc.as_str(), destination.tiploc.as_str()))
            }
            _ => None,
        }
    }
}
