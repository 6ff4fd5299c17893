//! Output rendering
//!
//! Turns an arbitrary result payload into an [`OutputView`]. In `auto` mode
//! the view follows [`classify`]; a forced mode that does not fit the payload
//! degrades to a less specific view and reports it as a [`RenderFallback`].
//! Rendering never fails.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::classify::{cell_text, classify, is_primitive, table_columns, Shape};
use super::text_tables::TextBlock;
use crate::domain::text::{html_escape, labelize};

/// Title of the card holding an object's scalar properties
const SUMMARY_TITLE: &str = "Summary";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Auto,
    Table,
    Cards,
    Raw,
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ViewMode::Auto),
            "table" => Ok(ViewMode::Table),
            "cards" | "card" => Ok(ViewMode::Cards),
            "raw" | "json" => Ok(ViewMode::Raw),
            other => Err(format!("unknown view mode '{}'", other)),
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViewMode::Auto => "auto",
            ViewMode::Table => "table",
            ViewMode::Cards => "cards",
            ViewMode::Raw => "raw",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum OutputView {
    Sections { blocks: Vec<TextBlock> },
    Table { columns: Vec<String>, rows: Vec<Vec<String>> },
    List { items: Vec<String> },
    Cards { cards: Vec<Card> },
    Raw { json: String },
    Primitive { text: String },
}

impl OutputView {
    pub fn kind(&self) -> &'static str {
        match self {
            OutputView::Sections { .. } => "sections",
            OutputView::Table { .. } => "table",
            OutputView::List { .. } => "list",
            OutputView::Cards { .. } => "cards",
            OutputView::Raw { .. } => "raw",
            OutputView::Primitive { .. } => "primitive",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Card {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub body: CardBody,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "body", rename_all = "snake_case")]
pub enum CardBody {
    Fields { entries: Vec<(String, String)> },
    Nested { view: Box<OutputView> },
}

/// A forced view mode that did not fit the payload
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RenderFallback {
    pub requested: ViewMode,
    pub rendered: &'static str,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RenderedOutput {
    pub mode: ViewMode,
    pub view: OutputView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<RenderFallback>,
}

pub struct OutputRenderer;

impl OutputRenderer {
    pub fn render(payload: &Value, mode: ViewMode) -> RenderedOutput {
        let (view, reason) = match mode {
            ViewMode::Auto => (auto_view(payload), None),
            ViewMode::Raw => (raw_view(payload), None),
            ViewMode::Table => forced_table(payload),
            ViewMode::Cards => forced_cards(payload),
        };

        let fallback = reason.map(|reason| RenderFallback {
            requested: mode,
            rendered: view.kind(),
            reason,
        });
        if let Some(fb) = &fallback {
            tracing::debug!(requested = %fb.requested, rendered = fb.rendered, "Output view fell back");
        }

        RenderedOutput {
            mode,
            view,
            fallback,
        }
    }
}

fn auto_view(payload: &Value) -> OutputView {
    match classify(payload) {
        Shape::TextTables(blocks) => OutputView::Sections { blocks },
        Shape::Table { columns, rows } => table_view(columns, rows),
        Shape::List(items) => list_view(items),
        Shape::Cards(map) => OutputView::Cards {
            cards: grouped_cards(map),
        },
        Shape::KeyValue(map) => OutputView::Cards {
            cards: vec![fields_card(None, map)],
        },
        Shape::Primitive(value) if is_primitive(value) => OutputView::Primitive {
            text: cell_text(value),
        },
        Shape::Primitive(value) => raw_view(value),
    }
}

fn forced_table(payload: &Value) -> (OutputView, Option<String>) {
    match classify(payload) {
        Shape::Table { columns, rows } => (table_view(columns, rows), None),
        Shape::TextTables(blocks) => (OutputView::Sections { blocks }, None),
        Shape::List(items) => (
            list_view(items),
            Some("list of plain values has no columns".to_string()),
        ),
        Shape::Primitive(value) if is_primitive(value) => (
            OutputView::Primitive {
                text: cell_text(value),
            },
            Some("single value has no rows".to_string()),
        ),
        _ => (
            raw_view(payload),
            Some("payload is not a list of records".to_string()),
        ),
    }
}

fn forced_cards(payload: &Value) -> (OutputView, Option<String>) {
    match payload {
        Value::Object(map) if map.values().any(Value::is_array) => (
            OutputView::Cards {
                cards: grouped_cards(map),
            },
            None,
        ),
        Value::Object(map) => (
            OutputView::Cards {
                cards: vec![fields_card(None, map)],
            },
            None,
        ),
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
            let cards = items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| {
                    item.as_object()
                        .map(|map| fields_card(Some(format!("#{}", i + 1)), map))
                })
                .collect();
            (OutputView::Cards { cards }, None)
        }
        Value::Array(items) if items.iter().all(is_primitive) => (
            list_view(items),
            Some("list of plain values has no fields".to_string()),
        ),
        _ => (auto_view(payload), Some("payload has no fields to group".to_string())),
    }
}

fn raw_view(payload: &Value) -> OutputView {
    OutputView::Raw {
        json: serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string()),
    }
}

fn table_view(columns: Vec<String>, rows: &[Value]) -> OutputView {
    let rows = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(c).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();
    OutputView::Table { columns, rows }
}

fn list_view(items: &[Value]) -> OutputView {
    OutputView::List {
        items: items.iter().map(cell_text).collect(),
    }
}

fn fields_card(title: Option<String>, map: &Map<String, Value>) -> Card {
    Card {
        title,
        body: CardBody::Fields {
            entries: map
                .iter()
                .map(|(k, v)| (labelize(k), cell_text(v)))
                .collect(),
        },
    }
}

/// Scalar properties share a summary card; every array or object property
/// gets a card of its own
fn grouped_cards(map: &Map<String, Value>) -> Vec<Card> {
    let scalars: Map<String, Value> = map
        .iter()
        .filter(|(_, v)| is_primitive(v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut cards = Vec::new();
    if !scalars.is_empty() {
        cards.push(fields_card(Some(SUMMARY_TITLE.to_string()), &scalars));
    }
    for (key, value) in map.iter().filter(|(_, v)| !is_primitive(v)) {
        cards.push(Card {
            title: Some(labelize(key)),
            body: CardBody::Nested {
                view: Box::new(auto_view(value)),
            },
        });
    }
    cards
}

// ============================================================================
// HTML
// ============================================================================

impl OutputView {
    /// Escaped markup; every payload-derived string goes through
    /// [`html_escape`]
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        self.write_html(&mut html);
        html
    }

    fn write_html(&self, html: &mut String) {
        match self {
            OutputView::Sections { blocks } => {
                html.push_str("<div class=\"sections\">");
                for block in blocks {
                    match block {
                        TextBlock::Heading { level, text } => {
                            html.push_str(&format!("<h{0}>{1}</h{0}>", level, html_escape(text)))
                        }
                        TextBlock::Table { header, rows } => write_table(html, header, rows),
                        TextBlock::Paragraph { text } => {
                            html.push_str(&format!("<p>{}</p>", html_escape(text)))
                        }
                    }
                }
                html.push_str("</div>");
            }
            OutputView::Table { columns, rows } => write_table(html, columns, rows),
            OutputView::List { items } => {
                html.push_str("<ul class=\"list\">");
                for item in items {
                    html.push_str(&format!("<li>{}</li>", html_escape(item)));
                }
                html.push_str("</ul>");
            }
            OutputView::Cards { cards } => {
                html.push_str("<div class=\"cards\">");
                for card in cards {
                    html.push_str("<div class=\"card\">");
                    if let Some(title) = &card.title {
                        html.push_str(&format!("<h3>{}</h3>", html_escape(title)));
                    }
                    match &card.body {
                        CardBody::Fields { entries } => {
                            html.push_str("<dl>");
                            for (key, value) in entries {
                                html.push_str(&format!(
                                    "<dt>{}</dt><dd>{}</dd>",
                                    html_escape(key),
                                    html_escape(value)
                                ));
                            }
                            html.push_str("</dl>");
                        }
                        CardBody::Nested { view } => view.write_html(html),
                    }
                    html.push_str("</div>");
                }
                html.push_str("</div>");
            }
            OutputView::Raw { json } => {
                html.push_str(&format!("<pre class=\"raw\">{}</pre>", html_escape(json)))
            }
            OutputView::Primitive { text } => {
                html.push_str(&format!("<div class=\"value\">{}</div>", html_escape(text)))
            }
        }
    }
}

fn write_table(html: &mut String, header: &[String], rows: &[Vec<String>]) {
    html.push_str("<table><thead><tr>");
    for column in header {
        html.push_str(&format!("<th>{}</th>", html_escape(column)));
    }
    html.push_str("</tr></thead><tbody>");
    for row in rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<td>{}</td>", html_escape(cell)));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
}
