use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    Walk,
    Interchange,
}

impl ConnectionMode {
    pub fn from_str_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "walk" | "w" => Some(Self::Walk),
            "interchange" | "i" => Some(Self::Interchange),
            _ => None,
        }
    }
}

/// An ALF-like fixed-link record between two TIPLOCs. The canonical field
/// set for non-walk (`interchange`) connections — platform-level transfer
/// metadata — is not documented in any source this adapter was built
/// against, so only the common fields below are carried; see the project's
/// design notes for that gap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub from_tiploc: String,
    pub to_tiploc: String,
    pub mode: ConnectionMode,
    pub duration_minutes: u16,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
}
