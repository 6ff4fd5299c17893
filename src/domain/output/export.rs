//! Export of result payloads to downloadable files

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::classify::{cell_text, classify, Shape};
use super::render::{OutputRenderer, ViewMode};
use super::text_tables::TextBlock;
use crate::domain::text::html_escape;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
    Html,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Html => "html",
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
            ExportFormat::Html => "text/html",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "html" | "htm" => Ok(ExportFormat::Html),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExportedFile {
    pub filename: String,
    pub media_type: String,
    #[serde(skip)]
    pub content: Vec<u8>,
}

impl ExportedFile {
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

pub struct Exporter {
    basename: String,
}

impl Exporter {
    pub fn new(basename: impl Into<String>) -> Self {
        Self {
            basename: basename.into(),
        }
    }

    pub fn export(&self, payload: &Value, format: ExportFormat) -> Result<ExportedFile, ExportError> {
        let content = match format {
            ExportFormat::Json => serde_json::to_string_pretty(payload)?,
            ExportFormat::Csv => to_csv(payload),
            ExportFormat::Html => to_html_document(&self.basename, payload),
        };
        Ok(ExportedFile {
            filename: format!("{}.{}", self.basename, format.extension()),
            media_type: format.media_type().to_string(),
            content: content.into_bytes(),
        })
    }
}

/// Delimited text: plain header, every data field quoted, structured values
/// written as JSON text
pub fn to_csv(payload: &Value) -> String {
    let (header, rows) = csv_table(payload);
    let mut out = String::new();
    out.push_str(&header.iter().map(|h| header_field(h)).collect::<Vec<_>>().join(","));
    out.push('\n');
    for row in rows {
        out.push_str(&row.iter().map(|c| quoted(c)).collect::<Vec<_>>().join(","));
        out.push('\n');
    }
    out
}

fn csv_table(payload: &Value) -> (Vec<String>, Vec<Vec<String>>) {
    let value_column = || vec!["value".to_string()];
    match classify(payload) {
        Shape::Table { columns, rows } => {
            let body = rows
                .iter()
                .map(|row| {
                    columns
                        .iter()
                        .map(|c| row.get(c).map(cell_text).unwrap_or_default())
                        .collect()
                })
                .collect();
            (columns, body)
        }
        Shape::TextTables(blocks) => blocks
            .into_iter()
            .find_map(|b| match b {
                TextBlock::Table { header, rows } => Some((header, rows)),
                _ => None,
            })
            .unwrap_or_else(|| (value_column(), vec![vec![cell_text(payload)]])),
        Shape::List(items) => (value_column(), items.iter().map(|v| vec![cell_text(v)]).collect()),
        Shape::Cards(map) | Shape::KeyValue(map) => (
            map.keys().cloned().collect(),
            vec![map.values().map(cell_text).collect()],
        ),
        Shape::Primitive(Value::Array(items)) => {
            (value_column(), items.iter().map(|v| vec![cell_text(v)]).collect())
        }
        Shape::Primitive(other) => (value_column(), vec![vec![cell_text(other)]]),
    }
}

fn quoted(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Header names are only quoted when they would break the row
fn header_field(name: &str) -> String {
    if name.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        quoted(name)
    } else {
        name.to_string()
    }
}

fn to_html_document(title: &str, payload: &Value) -> String {
    let rendered = OutputRenderer::render(payload, ViewMode::Auto);
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        html_escape(title),
        rendered.view.to_html()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exporter() -> Exporter {
        Exporter::new("workflow-results")
    }

    #[test]
    fn test_csv_quotes_fields() {
        let file = exporter()
            .export(&json!([{ "name": "A", "qty": 1 }, { "name": "B", "qty": 2 }]), ExportFormat::Csv)
            .unwrap();
        assert_eq!(file.filename, "workflow-results.csv");
        assert_eq!(file.media_type, "text/csv");
        assert_eq!(file.text(), "name,qty\n\"A\",\"1\"\n\"B\",\"2\"\n");
    }

    #[test]
    fn test_csv_flattens_structured_values() {
        let csv = to_csv(&json!([{ "id": 1, "meta": { "k": "v" }, "note": "say \"hi\"" }]));
        assert_eq!(csv, "id,meta,note\n\"1\",\"{\"\"k\"\":\"\"v\"\"}\",\"say \"\"hi\"\"\"\n");

        assert_eq!(to_csv(&json!({ "total": 3, "ok": true })), "total,ok\n\"3\",\"true\"\n");
        assert_eq!(to_csv(&json!(["x", "y"])), "value\n\"x\"\n\"y\"\n");
        assert_eq!(to_csv(&json!([{ "a,b": null }])), "\"a,b\"\n\"\"\n");
    }

    #[test]
    fn test_csv_of_text_tables_uses_first_table() {
        let csv = to_csv(&json!("## T\n| A | B |\n|---|---|\n| 1 | 2 |"));
        assert_eq!(csv, "A,B\n\"1\",\"2\"\n");
    }

    #[test]
    fn test_json_is_verbatim() {
        let payload = json!({ "b": 1, "a": [true, null] });
        let file = exporter().export(&payload, ExportFormat::Json).unwrap();
        assert_eq!(file.media_type, "application/json");
        let back: Value = serde_json::from_slice(&file.content).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_html_reuses_renderer() {
        let file = exporter()
            .export(&json!([{ "name": "<A>" }]), ExportFormat::Html)
            .unwrap();
        let html = file.text();
        assert_eq!(file.filename, "workflow-results.html");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<table><thead><tr><th>name</th>"));
        assert!(html.contains("<td>&lt;A&gt;</td>"));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!(matches!(
            "xlsx".parse::<ExportFormat>(),
            Err(ExportError::UnsupportedFormat(f)) if f == "xlsx"
        ));
    }
}
