use bitflags::bitflags;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

bitflags! {
    /// The seven-bit day-of-week mask carried by a schedule, Monday first.
    /// An all-zero mask is valid and means "never active".
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DaysRun: u8 {
        const MONDAY    = 0b0000_0001;
        const TUESDAY   = 0b0000_0010;
        const WEDNESDAY = 0b0000_0100;
        const THURSDAY  = 0b0000_1000;
        const FRIDAY    = 0b0001_0000;
        const SATURDAY  = 0b0010_0000;
        const SUNDAY    = 0b0100_0000;
    }
}

impl DaysRun {
    /// Parses the CIF-style 7-character `"1010000"` string (Monday first).
    pub fn from_cif_str(raw: &str) -> Option<Self> {
        if raw.len() != 7 || !raw.bytes().all(|b| b == b'0' || b == b'1') {
            return None;
        }
        let mut mask = DaysRun::empty();
        const BITS: [DaysRun; 7] = [
            DaysRun::MONDAY,
            DaysRun::TUESDAY,
            DaysRun::WEDNESDAY,
            DaysRun::THURSDAY,
            DaysRun::FRIDAY,
            DaysRun::SATURDAY,
            DaysRun::SUNDAY,
        ];
        for (bit, ch) in BITS.iter().zip(raw.bytes()) {
            if ch == b'1' {
                mask |= *bit;
            }
        }
        Some(mask)
    }

    pub fn runs_on(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;
        let bit = match date.weekday() {
            chrono::Weekday::Mon => DaysRun::MONDAY,
            chrono::Weekday::Tue => DaysRun::TUESDAY,
            chrono::Weekday::Wed => DaysRun::WEDNESDAY,
            chrono::Weekday::Thu => DaysRun::THURSDAY,
            chrono::Weekday::Fri => DaysRun::FRIDAY,
            chrono::Weekday::Sat => DaysRun::SATURDAY,
            chrono::Weekday::Sun => DaysRun::SUNDAY,
        };
        self.contains(bit)
    }
}

/// Short-term-planning indicator, translated from the source's `C/N/O/P`
/// codes at the format-adapter boundary so nothing above it ever sees the
/// source-specific letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StpIndicator {
    /// Lowest precedence: a base timetable entry.
    Permanent,
    /// A wholly independent schedule, not related to any permanent one.
    New,
    /// Supersedes a `Permanent` schedule on overlapping dates.
    Overlay,
    /// Highest precedence: suppresses any coverage on its date range.
    Cancelled,
}

impl StpIndicator {
    pub fn from_source_code(code: char) -> Option<Self> {
        match code {
            'P' => Some(Self::Permanent),
            'N' => Some(Self::New),
            'O' => Some(Self::Overlay),
            'C' => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Precedence order used to resolve overlapping schedules for the same
    /// `train_uid` on the same date: `Cancelled > Overlay > New > Permanent`.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Permanent => 0,
            Self::New => 1,
            Self::Overlay => 2,
            Self::Cancelled => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Passenger,
    Freight,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub schedule_id: i64,
    pub train_uid: String,
    pub headcode: Option<String>,
    pub operator_code: Option<String>,
    pub service_type: ServiceType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days_run: DaysRun,
    pub stp_indicator: StpIndicator,
    pub speed: Option<u16>,
    pub seating_class: Option<String>,
    pub sleepers: Option<String>,
    pub reservations: Option<String>,
    pub catering: Option<String>,
}

impl Schedule {
    /// Whether this schedule covers `date`, honouring its own date range and
    /// days-run mask. STP precedence across *other* schedules sharing a
    /// `train_uid` is resolved by the schedule store, not here.
    pub fn active_on(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date && self.days_run.runs_on(date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopType {
    Origin,
    Intermediate,
    Terminus,
    Pass,
}

/// `HH:MM`, 24-hour. A stop's arrival time may be smaller than its
/// departure time at the origin/before a midnight rollover; the schedule
/// store does not need to resolve that, only the duration calculations
/// downstream do (see `utility::time`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleStop {
    pub schedule_id: i64,
    pub sequence: u32,
    pub tiploc: String,
    pub stop_type: StopType,
    pub arrival_time: Option<String>,
    pub departure_time: Option<String>,
    pub pass_time: Option<String>,
    pub platform: Option<String>,
    pub activities: Option<String>,
}
