//! CIF-like schedule adapter: `HD`/`BS`/`BX`/`LO`/`LI`/`CR`/`LT` records into
//! `Schedule` + `[ScheduleStop]` pairs. Field widths follow the CIF basic
//! schedule bundle; record types outside the schedule bundle (`TI`/`TA`/
//! `TD`/`AA`/`ZZ`) belong to the station-reference and association files
//! and are skipped here without being counted as errors.

use chrono::NaiveDate;
use model::{DaysRun, ParseReport, Schedule, ScheduleStop, ServiceType, StopType, StpIndicator};

/// One schedule plus its stops, still carrying a placeholder `schedule_id`
/// of `0` — the Schedule Store assigns the real id on insert.
#[derive(Debug, Clone)]
pub struct ParsedSchedule {
    pub schedule: Schedule,
    pub stops: Vec<ScheduleStop>,
}

struct InProgress {
    train_uid: String,
    headcode: Option<String>,
    operator_code: Option<String>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    days_run: DaysRun,
    stp_indicator: StpIndicator,
    speed: Option<u16>,
    seating_class: Option<String>,
    sleepers: Option<String>,
    reservations: Option<String>,
    catering: Option<String>,
    stops: Vec<ScheduleStop>,
}

pub fn parse(input: &str) -> (Vec<ParsedSchedule>, ParseReport) {
    let mut report = ParseReport::default();
    let mut out = Vec::new();
    let mut current: Option<InProgress> = None;

    for (idx, raw_line) in input.lines().enumerate() {
        let line_number = idx as u64 + 1;
        let line = raw_line.trim_end_matches(['\r', '\n']);
        if line.len() < 2 {
            continue;
        }
        let record_type = &line[0..2];

        match record_type {
            "BS" => match parse_basic_schedule(line) {
                Ok(builder) => current = Some(builder),
                Err(reason) => {
                    report.record_error(line_number, reason);
                    current = None;
                }
            },
            "BX" => {
                if let Some(builder) = current.as_mut() {
                    if let Some(operator) = parse_operator_code(line) {
                        builder.operator_code = Some(operator);
                    }
                }
                report.record_ok();
            }
            "LO" => {
                if let Some(builder) = current.as_mut() {
                    match parse_origin(line, builder.stops.len() as u32) {
                        Ok(stop) => builder.stops.push(stop),
                        Err(reason) => report.record_error(line_number, reason),
                    }
                } else {
                    report.record_error(line_number, "LO record with no open BS");
                }
            }
            "LI" => {
                if let Some(builder) = current.as_mut() {
                    match parse_intermediate(line, builder.stops.len() as u32) {
                        Ok(stop) => builder.stops.push(stop),
                        Err(reason) => report.record_error(line_number, reason),
                    }
                } else {
                    report.record_error(line_number, "LI record with no open BS");
                }
            }
            "CR" => {
                // Change-en-route: alters operating characteristics from this
                // point on. Not a stop in its own right; no counterpart in
                // the normalized ScheduleStop shape.
                report.record_ok();
            }
            "LT" => {
                if let Some(mut builder) = current.take() {
                    match parse_terminus(line, builder.stops.len() as u32) {
                        Ok(stop) => {
                            builder.stops.push(stop);
                            out.push(finish(builder));
                            report.record_ok();
                        }
                        Err(reason) => report.record_error(line_number, reason),
                    }
                } else {
                    report.record_error(line_number, "LT record with no open BS");
                }
            }
            "HD" | "TI" | "TA" | "TD" | "AA" | "ZZ" => {
                // Header, TIPLOC maintenance, and association records belong
                // to other files/adapters.
            }
            other => {
                report.record_error(line_number, format!("unrecognized record type '{other}'"));
            }
        }
    }

    (out, report)
}

fn finish(builder: InProgress) -> ParsedSchedule {
    let schedule = Schedule {
        schedule_id: 0,
        train_uid: builder.train_uid,
        headcode: builder.headcode,
        operator_code: builder.operator_code,
        service_type: ServiceType::Passenger,
        start_date: builder.start_date,
        end_date: builder.end_date,
        days_run: builder.days_run,
        stp_indicator: builder.stp_indicator,
        speed: builder.speed,
        seating_class: builder.seating_class,
        sleepers: builder.sleepers,
        reservations: builder.reservations,
        catering: builder.catering,
    };
    ParsedSchedule {
        schedule,
        stops: builder.stops,
    }
}

fn field(line: &str, start: usize, end: usize) -> Option<&str> {
    line.get(start..end)
}

fn parse_basic_schedule(line: &str) -> Result<InProgress, String> {
    let train_uid = field(line, 3, 9)
        .ok_or("BS record too short for train_uid")?
        .trim()
        .to_string();
    let start_date = parse_cif_date(field(line, 9, 15).ok_or("BS missing date_runs_from")?)
        .ok_or("BS has unparseable date_runs_from")?;
    let end_date = parse_cif_date(field(line, 15, 21).ok_or("BS missing date_runs_to")?)
        .ok_or("BS has unparseable date_runs_to")?;
    let days_run_raw = field(line, 21, 28).ok_or("BS missing days_run")?;
    let days_run = DaysRun::from_cif_str(days_run_raw).ok_or("BS has malformed days_run")?;
    let headcode = field(line, 32, 36)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let speed = field(line, 57, 60).and_then(|s| s.trim().parse::<u16>().ok());
    let seating_class = field(line, 66, 67).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    let sleepers = field(line, 67, 68).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    let reservations = field(line, 68, 70).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    let catering = field(line, 77, 81).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    let stp_char = line.chars().last().ok_or("BS record has no STP indicator")?;
    let stp_indicator =
        StpIndicator::from_source_code(stp_char).ok_or("BS has invalid stp_indicator")?;

    Ok(InProgress {
        train_uid,
        headcode,
        operator_code: None,
        start_date,
        end_date,
        days_run,
        stp_indicator,
        speed,
        seating_class,
        sleepers,
        reservations,
        catering,
        stops: Vec::new(),
    })
}

fn parse_operator_code(line: &str) -> Option<String> {
    field(line, 11, 13)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_cif_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%y%m%d").ok()
}

fn parse_hhmm_half(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.len() < 4 {
        return None;
    }
    let hours = &raw[0..2];
    let minutes = &raw[2..4];
    hours.parse::<u32>().ok()?;
    minutes.parse::<u32>().ok()?;
    Some(format!("{hours}:{minutes}"))
}

fn parse_origin(line: &str, sequence: u32) -> Result<ScheduleStop, String> {
    let tiploc = field(line, 2, 9).ok_or("LO too short for tiploc")?.trim().to_string();
    if tiploc.is_empty() {
        return Err("LO has empty tiploc".into());
    }
    let departure = field(line, 10, 15)
        .and_then(parse_hhmm_half)
        .ok_or("LO has unparseable scheduled departure")?;
    let platform = field(line, 19, 22).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    Ok(ScheduleStop {
        schedule_id: 0,
        sequence,
        tiploc,
        stop_type: StopType::Origin,
        arrival_time: None,
        departure_time: Some(departure),
        pass_time: None,
        platform,
        activities: field(line, 29, 41).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
    })
}

fn parse_intermediate(line: &str, sequence: u32) -> Result<ScheduleStop, String> {
    let tiploc = field(line, 2, 9).ok_or("LI too short for tiploc")?.trim().to_string();
    if tiploc.is_empty() {
        return Err("LI has empty tiploc".into());
    }
    let arrival = field(line, 10, 15).and_then(parse_hhmm_half);
    let departure = field(line, 15, 20).and_then(parse_hhmm_half);
    let pass = field(line, 20, 25).and_then(parse_hhmm_half);
    if arrival.is_none() && departure.is_none() && pass.is_none() {
        return Err("LI has no arrival, departure, or pass time".into());
    }
    let platform = field(line, 33, 36).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    Ok(ScheduleStop {
        schedule_id: 0,
        sequence,
        tiploc,
        stop_type: if pass.is_some() && arrival.is_none() && departure.is_none() {
            StopType::Pass
        } else {
            StopType::Intermediate
        },
        arrival_time: arrival,
        departure_time: departure,
        pass_time: pass,
        platform,
        activities: field(line, 42, 54).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
    })
}

fn parse_terminus(line: &str, sequence: u32) -> Result<ScheduleStop, String> {
    let tiploc = field(line, 2, 9).ok_or("LT too short for tiploc")?.trim().to_string();
    if tiploc.is_empty() {
        return Err("LT has empty tiploc".into());
    }
    let arrival = field(line, 10, 15)
        .and_then(parse_hhmm_half)
        .ok_or("LT has unparseable scheduled arrival")?;
    let platform = field(line, 19, 22).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    Ok(ScheduleStop {
        schedule_id: 0,
        sequence,
        tiploc,
        stop_type: StopType::Terminus,
        arrival_time: Some(arrival),
        departure_time: None,
        pass_time: None,
        platform,
        activities: field(line, 25, 37).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> String {
        [
            "HDTPS.UDFROC1.PD231124           130524",
            "BSNC123452512012512011111100    2A11                     100      BSR        C100P",
            "BX         VT                                                  ",
            "LOEUSTON  1800 1   1         TB          ",
            "LIMKTCENT 1825 1825              1        T           ",
            "LTBHAMNS  1935     2     TF          ",
        ]
        .join("\n")
    }

    #[test]
    fn parses_a_full_schedule_bundle() {
        let (schedules, report) = parse(&sample());
        assert!(report.parse_errors.is_empty(), "{:?}", report.parse_errors);
        assert_eq!(schedules.len(), 1);

        let parsed = &schedules[0];
        assert_eq!(parsed.schedule.train_uid, "C12345");
        assert_eq!(parsed.schedule.operator_code.as_deref(), Some("VT"));
        assert_eq!(parsed.schedule.stp_indicator, StpIndicator::Permanent);
        assert_eq!(parsed.stops.len(), 3);
        assert_eq!(parsed.stops[0].stop_type, StopType::Origin);
        assert_eq!(parsed.stops[0].tiploc, "EUSTON");
        assert_eq!(parsed.stops[0].departure_time.as_deref(), Some("18:00"));
        assert_eq!(parsed.stops[1].tiploc, "MKTCENT");
        assert_eq!(parsed.stops[2].stop_type, StopType::Terminus);
        assert_eq!(parsed.stops[2].tiploc, "BHAMNS");
    }

    #[test]
    fn skips_li_with_no_open_schedule() {
        let (_, report) = parse("LIMKTCENT 1825 1825      000000                        T");
        assert_eq!(report.parse_errors.len(), 1);
    }
}
