//! Decodes Darwin push-port XML payloads into cancellation events.
//! Only the cancellation-relevant subset of the
//! push-port schema is recognized here: a `<schedule>` element carrying a
//! `<cancelReason>` child. Every other element (activations, forecasts,
//! plain updates) is valid Darwin but outside this system's scope and is
//! silently skipped by the walk below.

use chrono::Utc;
use model::DecodedEvent;
use roxmltree::Document;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),
}

/// Parses one push-port frame and returns the cancellation events it
/// contains, in document order. A frame with no cancellation-bearing
/// `<schedule>` elements yields an empty, non-error result — that is the
/// expected shape for the vast majority of Darwin traffic.
pub fn decode_frame(xml: &str) -> Result<Vec<DecodedEvent>, DecodeError> {
    let doc = Document::parse(xml)?;
    let now = Utc::now();

    let events = doc
        .descendants()
        .filter(|node| node.has_tag_name("schedule"))
        .filter_map(|schedule| {
            let cancel_reason = schedule
                .children()
                .find(|child| child.has_tag_name("cancelReason"))?;

            let rid = schedule.attribute("rid")?.to_string();
            let train_service_code = schedule.attribute("trainId").map(str::to_string);
            let reason_code = cancel_reason.attribute("reasonCode").map(str::to_string);
            let reason_text = cancel_reason.text().map(str::trim).filter(|t| !t.is_empty()).map(str::to_string);

            Some(DecodedEvent {
                rid,
                train_service_code,
                reason_code,
                reason_text,
                received_at: now,
            })
        })
        .collect();

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_cancellation() {
        let xml = r#"<Pport><uR><schedule rid="202512010000C12345" trainId="2A11">
            <cancelReason reasonCode="104">Signal failure</cancelReason>
        </schedule></uR></Pport>"#;

        let events = decode_frame(xml).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].rid, "202512010000C12345");
        assert_eq!(events[0].train_service_code.as_deref(), Some("2A11"));
        assert_eq!(events[0].reason_code.as_deref(), Some("104"));
        assert_eq!(events[0].reason_text.as_deref(), Some("Signal failure"));
    }

    #[test]
    fn ignores_non_cancellation_schedules() {
        let xml = r#"<Pport><uR><schedule rid="202512010000C99999" trainId="1A01" /></uR></Pport>"#;
        let events = decode_frame(xml).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn ignores_unrelated_frames() {
        let xml = r#"<Pport><uR><TS rid="202512010000C12345"><Location tpl="EUS" /></TS></uR></Pport>"#;
        let events = decode_frame(xml).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn rejects_malformed_xml() {
        let xml = "<Pport><uR>";
        assert!(decode_frame(xml).is_err());
    }
}
