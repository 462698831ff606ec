//! Event exports.
//!
//! CSV rows and the PDF report are both built from an already-loaded,
//! newest-first slice of events.

use chrono::{DateTime, Utc};

use metricflow_core::Event;

use crate::pdf::PdfDocument;

/// Most events a CSV export contains.
pub const CSV_EXPORT_LIMIT: usize = 10_000;

/// Most events a PDF report contains.
pub const PDF_EXPORT_LIMIT: usize = 100;

/// CSV column order.
pub const CSV_HEADER: [&str; 9] = [
    "id", "name", "type", "revenue", "country", "device", "browser", "referrer", "timestamp",
];

/// Error building an export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// CSV encoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The CSV buffer could not be recovered from the writer.
    #[error("CSV buffer error: {0}")]
    Buffer(String),
}

/// Prefix cells a spreadsheet would evaluate as a formula.
fn neutralize(cell: &str) -> String {
    if cell.starts_with(['=', '+', '-', '@', '\t', '\r']) {
        format!("'{cell}")
    } else {
        cell.to_string()
    }
}

fn text_cell(value: Option<&str>) -> String {
    value.map(neutralize).unwrap_or_default()
}

/// Render events as CSV.
///
/// User-supplied text columns are guarded against formula injection; ids,
/// types, numbers and timestamps are written as-is.
pub fn events_csv(events: &[Event]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for event in events {
        writer.write_record([
            event.id.to_string(),
            neutralize(&event.name),
            event.event_type.as_str().to_string(),
            event.revenue.map(|r| r.to_string()).unwrap_or_default(),
            text_cell(event.country.as_deref()),
            text_cell(event.device.as_deref()),
            text_cell(event.browser.as_deref()),
            text_cell(event.referrer.as_deref()),
            event.timestamp.to_rfc3339(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::Buffer(e.to_string()))
}

/// Render the analytics report PDF.
#[must_use]
pub fn events_pdf(events: &[Event], generated_at: DateTime<Utc>) -> Vec<u8> {
    const TOP: f64 = 20.0;
    const BOTTOM: f64 = 280.0;
    const COLUMNS: [f64; 5] = [20.0, 80.0, 120.0, 150.0, 180.0];

    let mut doc = PdfDocument::new();

    doc.text(20.0, 20.0, 20.0, "MetricFlow Analytics Report");
    doc.text(20.0, 30.0, 10.0, &format!("Generated: {}", generated_at.format("%Y-%m-%d")));
    doc.text(20.0, 36.0, 10.0, &format!("Total Events: {}", events.len()));

    let mut y = 50.0;
    for (x, title) in COLUMNS.iter().zip(["Name", "Type", "Revenue", "Country", "Date"]) {
        doc.text(*x, y, 8.0, title);
    }
    y += 6.0;

    for event in events {
        if y > BOTTOM {
            doc.add_page();
            y = TOP;
        }
        let name: String = event.name.chars().take(30).collect();
        let revenue = event.revenue.map_or_else(|| "-".to_string(), |r| r.to_string());
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let cells = [
            name.as_str(),
            event.event_type.as_str(),
            revenue.as_str(),
            event.country.as_deref().unwrap_or("-"),
            date.as_str(),
        ];
        for (x, cell) in COLUMNS.iter().zip(cells) {
            doc.text(*x, y, 8.0, cell);
        }
        y += 5.0;
    }

    doc.finish()
}

/// `YYYY-MM-DD` stamp used in export file names.
#[must_use]
pub fn file_date(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use metricflow_core::{EventId, EventType, ProjectId};

    fn event(name: &str) -> Event {
        Event {
            id: EventId::generate(),
            project_id: ProjectId::generate(),
            name: name.into(),
            event_type: EventType::Purchase,
            description: None,
            properties: None,
            revenue: Some(19.5),
            external_user_id: None,
            country: Some("=HYPERLINK(\"http://x\")".into()),
            device: None,
            browser: Some("firefox".into()),
            referrer: None,
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn csv_has_header_and_neutralized_cells() {
        let bytes = events_csv(&[event("@SUM(A1)"), event("checkout")]).unwrap();
        let mut reader = csv::Reader::from_reader(bytes.as_slice());

        let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(header, CSV_HEADER);

        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "'@SUM(A1)");
        assert_eq!(&rows[0][2], "PURCHASE");
        assert_eq!(&rows[0][3], "19.5");
        assert!(rows[0][4].starts_with("'="));
        assert_eq!(&rows[1][1], "checkout");
        assert_eq!(&rows[1][5], "");
    }

    #[test]
    fn control_prefixed_cells_are_neutralized() {
        assert_eq!(neutralize("\t=1+1"), "'\t=1+1");
        assert_eq!(neutralize("\r=1+1"), "'\r=1+1");
        assert_eq!(neutralize("+49 30"), "'+49 30");
        assert_eq!(neutralize("plain"), "plain");
    }

    #[test]
    fn pdf_is_a_pdf() {
        let events: Vec<Event> = (0..3).map(|i| event(&format!("e{i}"))).collect();
        let bytes = events_pdf(&events, Utc::now());
        assert!(bytes.starts_with(b"%PDF-1.4"));
        assert!(bytes.ends_with(b"%%EOF\n"));
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("(Total Events: 3)"));
        assert!(text.contains("/Count 1"));
    }

    #[test]
    fn long_reports_paginate() {
        let events: Vec<Event> = (0..100).map(|i| event(&format!("e{i}"))).collect();
        let text = String::from_utf8_lossy(&events_pdf(&events, Utc::now())).into_owned();
        assert!(text.contains("/Count 3 >>"));
    }
}
