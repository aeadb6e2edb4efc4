//! `HH:MM` parsing and rollover-aware duration arithmetic for schedule times.
//!
//! CIF-derived times carry no date of their own: a service departing at
//! `23:55` and arriving at `00:10` has crossed midnight, but the schedule
//! store only ever sees the two naive clock times. Call sites that need a
//! duration (e.g. dwell time, journey time) go through [`duration_between`]
//! rather than subtracting `NaiveTime`s directly.

use chrono::NaiveTime;

/// Parses a schedule time in `HH:MM` form. Returns `None` for anything else,
/// including the half-minute suffixes (`H`) some CIF extracts use — callers
/// that care about those truncate before calling this.
pub fn parse_hhmm(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    if raw.len() != 5 || raw.as_bytes()[2] != b':' {
        return None;
    }
    let hours: u32 = raw[0..2].parse().ok()?;
    let minutes: u32 = raw[3..5].parse().ok()?;
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

/// Minutes from `start` to `end`, assuming at most one midnight rollover —
/// true for any single calling-point-to-calling-point hop in a day's
/// timetable.
pub fn duration_between(start: NaiveTime, end: NaiveTime) -> u32 {
    let start_minutes = start.hour_minute_total();
    let end_minutes = end.hour_minute_total();
    if end_minutes >= start_minutes {
        end_minutes - start_minutes
    } else {
        (24 * 60 - start_minutes) + end_minutes
    }
}

trait HourMinuteTotal {
    fn hour_minute_total(&self) -> u32;
}

impl HourMinuteTotal for NaiveTime {
    fn hour_minute_total(&self) -> u32 {
        use chrono::Timelike;
        self.hour() * 60 + self.minute()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_hhmm() {
        assert_eq!(
            parse_hhmm("08:05"),
            Some(NaiveTime::from_hms_opt(8, 5, 0).unwrap())
        );
    }

    #[test]
    fn rejects_malformed_strings() {
        assert_eq!(parse_hhmm("8:05"), None);
        assert_eq!(parse_hhmm("25:00"), None);
        assert_eq!(parse_hhmm(""), None);
    }

    #[test]
    fn duration_handles_midnight_rollover() {
        let start = parse_hhmm("23:55").unwrap();
        let end = parse_hhmm("00:10").unwrap();
        assert_eq!(duration_between(start, end), 15);
    }

    #[test]
    fn duration_same_day() {
        let start = parse_hhmm("08:00").unwrap();
        let end = parse_hhmm("08:45").unwrap();
        assert_eq!(duration_between(start, end), 45);
    }
}
