//! Unauthenticated HTML dashboard. `format!`-built markup, no templating
//! crate — kept as thin as plain static-file serving would be.

use axum::extract::State;
use axum::response::{Html, IntoResponse};

use crate::WebState;

pub(crate) async fn dashboard(State(state): State<WebState>) -> impl IntoResponse {
    let recent = state.cache.recent(20, None);
    let stats = state.cache.stats();

    let mut rows = String::new();
    for c in &recent {
        let route = match (&c.origin, &c.destination) {
            (Some(origin), Some(destination)) => format!(
                "{} &rarr; {}",
                escape_html(origin.station_name.as_deref().unwrap_or(&origin.tiploc)),
                escape_html(destination.station_name.as_deref().unwrap_or(&destination.tiploc)),
            ),
            _ => "unresolved".to_string(),
        };
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            c.observed_at.format("%Y-%m-%d %H:%M:%S"),
            route,
            escape_html(c.reason_text.as_deref().unwrap_or("")),
            if c.darwin_enriched { "yes" } else { "no" },
        ));
    }

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="30">
<title>Darwin cancellation watch</title>
<style>
body {{ font-family: sans-serif; margin: 2rem; }}
table {{ border-collapse: collapse; width: 100%; }}
td, th {{ border: 1px solid #ccc; padding: 0.3rem 0.6rem; text-align: left; }}
</style>
</head>
<body>
<h1>Darwin cancellation watch</h1>
<p>{total} cancellations in window, {enriched} enriched ({rate:.1}%)</p>
<table>
<thead><tr><th>Observed at</th><th>Route</th><th>Reason</th><th>Enriched</th></tr></thead>
<tbody>
{rows}
</tbody>
</table>
</body>
</html>
"#,
        total = stats.total,
        enriched = stats.enriched,
        rate = stats.enrichment_rate * 100.0,
        rows = rows,
    );

    Html(html)
}

/// Darwin reason text and CIF station names are operator-supplied free
/// text, not markup — escape them before interpolating into the
/// hand-built HTML so a reason like `<script>` renders as text, not code.
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(escape_html("<script>alert('x')</script>"), "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;");
    }
}
