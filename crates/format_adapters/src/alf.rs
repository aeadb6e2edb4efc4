//! ALF-like connection adapter. Accepts two variants, as the source data
//! ships both: a `key=value;...` line format, and a legacy fixed-width
//! layout of two back-to-back 7-character TIPLOCs followed by a mode flag
//! and a duration. Which variant a given line is written in is detected
//! per-line rather than per-file, since both have been observed mixed
//! within the same extract.

use chrono::NaiveDate;
use model::{Connection, ConnectionMode, ParseReport};

pub fn parse(input: &str) -> (Vec<Connection>, ParseReport) {
    let mut report = ParseReport::default();
    let mut out = Vec::new();

    for (idx, raw_line) in input.lines().enumerate() {
        let line_number = idx as u64 + 1;
        let line = raw_line.trim_end_matches(['\r', '\n']).trim();
        if line.is_empty() {
            continue;
        }

        let parsed = if line.contains('=') {
            parse_key_value(line)
        } else {
            parse_fixed_width(line)
        };

        match parsed {
            Ok(connection) => {
                out.push(connection);
                report.record_ok();
            }
            Err(reason) => report.record_error(line_number, reason),
        }
    }

    (out, report)
}

fn parse_key_value(line: &str) -> Result<Connection, String> {
    let mut from_tiploc = None;
    let mut to_tiploc = None;
    let mut mode = None;
    let mut duration_minutes = None;
    let mut valid_from = None;
    let mut valid_to = None;

    for pair in line.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("malformed key=value pair '{pair}'"))?;
        match key.trim().to_ascii_uppercase().as_str() {
            "TIPLOC1" | "FROM" => from_tiploc = Some(value.trim().to_string()),
            "TIPLOC2" | "TO" => to_tiploc = Some(value.trim().to_string()),
            "MODE" => mode = ConnectionMode::from_str_loose(value),
            "DURATION" => duration_minutes = value.trim().parse::<u16>().ok(),
            "VALID_FROM" => valid_from = NaiveDate::parse_from_str(value.trim(), "%Y%m%d").ok(),
            "VALID_TO" => valid_to = NaiveDate::parse_from_str(value.trim(), "%Y%m%d").ok(),
            _ => {}
        }
    }

    Ok(Connection {
        from_tiploc: from_tiploc.ok_or("missing TIPLOC1/FROM")?,
        to_tiploc: to_tiploc.ok_or("missing TIPLOC2/TO")?,
        mode: mode.ok_or("missing or unrecognized MODE")?,
        duration_minutes: duration_minutes.ok_or("missing or unparseable DURATION")?,
        valid_from,
        valid_to,
    })
}

fn parse_fixed_width(line: &str) -> Result<Connection, String> {
    if line.len() < 16 {
        return Err("legacy connection record too short".into());
    }
    let from_tiploc = line[0..7].trim().to_string();
    let to_tiploc = line[7..14].trim().to_string();
    if from_tiploc.is_empty() || to_tiploc.is_empty() {
        return Err("legacy connection record has an empty tiploc".into());
    }
    let mode_char = line.chars().nth(14).ok_or("legacy record missing mode flag")?;
    let mode = match mode_char {
        'W' | 'w' => ConnectionMode::Walk,
        'I' | 'i' => ConnectionMode::Interchange,
        _ => return Err(format!("unrecognized legacy mode flag '{mode_char}'")),
    };
    let duration_minutes = line[15..]
        .trim()
        .parse::<u16>()
        .map_err(|_| "legacy record has unparseable duration")?;

    Ok(Connection {
        from_tiploc,
        to_tiploc,
        mode,
        duration_minutes,
        valid_from: None,
        valid_to: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_variant() {
        let (connections, report) = parse(
            "TIPLOC1=EUSTON;TIPLOC2=KNGX;MODE=walk;DURATION=15;VALID_FROM=20250101",
        );
        assert!(report.parse_errors.is_empty(), "{:?}", report.parse_errors);
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].from_tiploc, "EUSTON");
        assert_eq!(connections[0].mode, ConnectionMode::Walk);
        assert_eq!(connections[0].duration_minutes, 15);
    }

    #[test]
    fn parses_legacy_fixed_width_variant() {
        let (connections, report) = parse("EUSTON KNGX   W015");
        assert!(report.parse_errors.is_empty(), "{:?}", report.parse_errors);
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].to_tiploc, "KNGX");
        assert_eq!(connections[0].mode, ConnectionMode::Walk);
        assert_eq!(connections[0].duration_minutes, 15);
    }

    #[test]
    fn rejects_malformed_key_value_line() {
        let (connections, report) = parse("TIPLOC1=EUSTON;MODE=teleport;DURATION=1");
        assert!(connections.is_empty());
        assert_eq!(report.parse_errors.len(), 1);
    }
}
