//! MSN-like station-reference adapter. Each record is a fixed-width line
//! starting with `A`; anything else (header/trailer banners, blank lines)
//! is skipped without being counted as an error.
//!
//! The source format carries an Ordnance Survey grid reference rather than
//! a lat/long pair, and projecting one to the other is out of scope here —
//! `latitude`/`longitude` are left `None` for every MSN-derived station.
//! Downstream TIPLOC canonicalization (`TiplocMapping`) is the Schedule
//! Store's responsibility, not this adapter's.

use model::{ParseReport, Station};

pub fn parse(input: &str) -> (Vec<Station>, ParseReport) {
    let mut report = ParseReport::default();
    let mut out = Vec::new();

    for (idx, raw_line) in input.lines().enumerate() {
        let line_number = idx as u64 + 1;
        let line = raw_line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            continue;
        }
        if !line.starts_with('A') {
            continue;
        }
        match parse_station_record(line) {
            Ok(station) => {
                out.push(station);
                report.record_ok();
            }
            Err(reason) => report.record_error(line_number, reason),
        }
    }

    (out, report)
}

fn field(line: &str, start: usize, end: usize) -> Option<&str> {
    line.get(start..end)
}

fn parse_station_record(line: &str) -> Result<Station, String> {
    let station_name = field(line, 1, 31)
        .ok_or("station record too short for name")?
        .trim()
        .to_string();
    if station_name.is_empty() {
        return Err("station record has empty name".into());
    }
    let tiploc = field(line, 32, 39)
        .ok_or("station record too short for tiploc")?
        .trim()
        .to_string();
    if tiploc.is_empty() {
        return Err("station record has empty tiploc".into());
    }
    let crs_code = field(line, 42, 45)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_uppercase);

    Ok(Station {
        tiploc,
        crs_code,
        station_name,
        country: None,
        region: None,
        latitude: None,
        longitude: None,
        is_active: true,
    }
    .normalized())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad(s: &str, len: usize) -> String {
        let mut out = s.to_string();
        while out.len() < len {
            out.push(' ');
        }
        out
    }

    fn sample_line() -> String {
        let mut line = String::from("A");
        line.push_str(&pad("LONDON EUSTON", 30));
        line.push('1');
        line.push_str(&pad("EUSTON", 7));
        line.push_str(&pad("EUS", 3));
        line.push_str(&pad("eus", 3));
        line
    }

    #[test]
    fn parses_a_station_record() {
        let (stations, report) = parse(&sample_line());
        assert!(report.parse_errors.is_empty(), "{:?}", report.parse_errors);
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].tiploc, "EUSTON");
        assert_eq!(stations[0].crs_code.as_deref(), Some("EUS"));
        assert_eq!(stations[0].station_name, "LONDON EUSTON");
    }

    #[test]
    fn skips_non_station_lines() {
        let (stations, report) = parse("HEADER BANNER LINE\n\nZ TRAILER");
        assert!(stations.is_empty());
        assert!(report.parse_errors.is_empty());
        assert_eq!(report.record_count, 0);
    }
}
