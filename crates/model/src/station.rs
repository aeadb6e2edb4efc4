use serde::{Deserialize, Serialize};

/// A station reference record, derived from a master-station-names import.
///
/// Exactly one active record exists per `tiploc` at any time; re-imports
/// mutate rather than duplicate. `crs_code` is not unique across history —
/// NR has recycled CRS codes onto different TIPLOCs over the decades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub tiploc: String,
    pub crs_code: Option<String>,
    pub station_name: String,
    pub country: Option<String>,
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_active: bool,
}

impl Station {
    /// Case-folds the CRS code the way every call site needs it, and
    /// asserts the coordinate-pair invariant documented on this type.
    pub fn normalized(mut self) -> Self {
        self.crs_code = self.crs_code.map(|crs| crs.to_uppercase());
        if self.latitude.is_none() || self.longitude.is_none() {
            self.latitude = None;
            self.longitude = None;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationAliasType {
    Common,
    Official,
    Historical,
    Colloquial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationAlias {
    pub station_tiploc: String,
    pub alias_name: String,
    pub alias_type: StationAliasType,
    pub is_primary: bool,
}

/// Normalizes a possibly malformed or legacy TIPLOC to the canonical one a
/// given data source actually uses, e.g. when a CIF extract ships a
/// TIPLOC that was since renumbered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TiplocMapping {
    pub source_tiploc: String,
    pub canonical_tiploc: String,
    pub data_source: String,
    pub reason: String,
}
