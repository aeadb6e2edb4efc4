pub mod cancellation;
pub mod connection;
pub mod import;
pub mod schedule;
pub mod station;

pub use connection::{Connection, ConnectionMode};
pub use cancellation::{
    ActiveCancellation, CallingPoint, CancellationCategory, DecodedEvent, DestinationStop,
    EnrichmentFailureReason, OriginStop,
};
pub use import::{FileType, ImportOutcome, ImportRecord, ParseError, ParseReport};
pub use schedule::{DaysRun, Schedule, ScheduleStop, ServiceType, StopType, StpIndicator};
pub use station::{Station, StationAlias, StationAliasType, TiplocMapping};
