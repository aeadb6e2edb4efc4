//! Station Resolver: ranks a free-text query against the
//! station catalogue. Pure, synchronous, and store-agnostic — the store
//! loads candidates, this module only scores and orders them.

use model::{Station, StationAlias};
use utility::edit_distance::token_set_ratio;

pub struct StationWithAliases {
    pub station: Station,
    pub aliases: Vec<StationAlias>,
}

/// `[A-Z0-9]{3,7}`, no spaces, no lowercase — treated as an identifier so
/// fuzzy matching never hijacks a real TIPLOC/CRS code.
pub fn is_tiploc_shaped(input: &str) -> bool {
    let len = input.len();
    (3..=7).contains(&len)
        && input
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Ranks `candidates` against `query` per the resolution order in the
/// component's contract; returns `(station, score)` pairs sorted
/// highest-score-first, tie-broken by active status, primary-alias
/// presence, then alphabetical station name. Callers slice to `limit`.
pub fn rank(query: &str, candidates: &[StationWithAliases]) -> Vec<(Station, u8)> {
    let normalized_query = normalize(query);
    if normalized_query.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(Station, u8, bool)> = Vec::new();

    for candidate in candidates {
        let station = &candidate.station;
        let has_primary_alias = candidate.aliases.iter().any(|a| a.is_primary);

        if station.tiploc.eq_ignore_ascii_case(query.trim()) {
            scored.push((station.clone(), 100, has_primary_alias));
            continue;
        }
        if let Some(crs) = &station.crs_code {
            if crs.eq_ignore_ascii_case(query.trim()) {
                scored.push((station.clone(), 100, has_primary_alias));
                continue;
            }
        }
        if normalize(&station.station_name) == normalized_query {
            scored.push((station.clone(), 95, has_primary_alias));
            continue;
        }
        if let Some(alias) = candidate
            .aliases
            .iter()
            .find(|a| normalize(&a.alias_name) == normalized_query)
        {
            let score = if alias.is_primary { 90 } else { 88 };
            scored.push((station.clone(), score, has_primary_alias));
            continue;
        }

        let name_norm = normalize(&station.station_name);
        if name_norm.starts_with(&normalized_query) {
            let ratio = normalized_query.len() as f64 / name_norm.len().max(1) as f64;
            let score = 80 + (ratio * 10.0) as u8;
            scored.push((station.clone(), score.min(90), has_primary_alias));
            continue;
        }
        if let Some(alias) = candidate.aliases.iter().find(|a| {
            normalize(&a.alias_name).starts_with(&normalized_query)
        }) {
            let alias_norm = normalize(&alias.alias_name);
            let ratio = normalized_query.len() as f64 / alias_norm.len().max(1) as f64;
            let score = 80 + (ratio * 10.0) as u8;
            scored.push((station.clone(), score.min(90), has_primary_alias));
            continue;
        }

        let mut best_ratio = token_set_ratio(&name_norm, &normalized_query);
        for alias in &candidate.aliases {
            best_ratio = best_ratio.max(token_set_ratio(&normalize(&alias.alias_name), &normalized_query));
        }
        let fuzzy_score = (best_ratio * 100.0) as u8;
        if fuzzy_score >= 70 {
            scored.push((station.clone(), fuzzy_score, has_primary_alias));
        }
    }

    scored.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then(b.0.is_active.cmp(&a.0.is_active))
            .then(b.2.cmp(&a.2))
            .then(a.0.station_name.cmp(&b.0.station_name))
    });

    scored.into_iter().map(|(station, score, _)| (station, score)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(tiploc: &str, crs: &str, name: &str) -> Station {
        Station {
            tiploc: tiploc.to_string(),
            crs_code: Some(crs.to_string()),
            station_name: name.to_string(),
            country: None,
            region: None,
            latitude: None,
            longitude: None,
            is_active: true,
        }
    }

    #[test]
    fn exact_tiploc_match_scores_100() {
        let candidates = vec![StationWithAliases {
            station: station("EUSTON", "EUS", "London Euston"),
            aliases: vec![],
        }];
        let ranked = rank("EUSTON", &candidates);
        assert_eq!(ranked[0].1, 100);
    }

    #[test]
    fn exact_name_match_beats_fuzzy() {
        let candidates = vec![
            StationWithAliases {
                station: station("EUSTON", "EUS", "London Euston"),
                aliases: vec![],
            },
            StationWithAliases {
                station: station("EustonSq", "ESQ", "London Eustan"),
                aliases: vec![],
            },
        ];
        let ranked = rank("London Euston", &candidates);
        assert_eq!(ranked[0].0.tiploc, "EUSTON");
        assert_eq!(ranked[0].1, 95);
    }

    #[test]
    fn fuzzy_tier_scores_reordered_tokens_highly() {
        let candidates = vec![StationWithAliases {
            station: station("EUSTON", "EUS", "London Euston"),
            aliases: vec![],
        }];
        let ranked = rank("Euston London", &candidates);
        assert_eq!(ranked[0].0.tiploc, "EUSTON");
        assert!(ranked[0].1 >= 95, "reordered query should score as high as a token-set match: {}", ranked[0].1);
    }

    #[test]
    fn tiploc_shape_detection() {
        assert!(is_tiploc_shaped("EUSTON"));
        assert!(is_tiploc_shaped("BHM"));
        assert!(!is_tiploc_shaped("euston"));
        assert!(!is_tiploc_shaped("London Euston"));
    }
}
