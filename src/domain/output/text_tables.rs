//! Headed sections and pipe-delimited tables embedded in plain text
//!
//! ```text
//! ## Title
//! | Col1 | Col2 |
//! |---|---|
//! | x | y |
//! ```

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "block", rename_all = "snake_case")]
pub enum TextBlock {
    Heading { level: u8, text: String },
    Table { header: Vec<String>, rows: Vec<Vec<String>> },
    Paragraph { text: String },
}

/// True when the text carries at least one pipe row plus a heading or a
/// divider line
pub fn looks_like_text_tables(text: &str) -> bool {
    let mut has_row = false;
    let mut has_marker = false;
    for line in text.lines().map(str::trim) {
        if let Some(cells) = pipe_cells(line) {
            if is_divider(&cells) {
                has_marker = true;
            } else {
                has_row = true;
            }
        } else if heading(line).is_some() {
            has_marker = true;
        }
    }
    has_row && has_marker
}

/// Split text into heading, table and paragraph blocks, line by line.
///
/// A pipe row outside a table opens one with that row as header; divider
/// rows are skipped; any other line closes the open table.
pub fn parse_text_tables(text: &str) -> Vec<TextBlock> {
    let mut blocks = Vec::new();
    let mut table: Option<(Vec<String>, Vec<Vec<String>>)> = None;

    for line in text.lines().map(str::trim) {
        if let Some(cells) = pipe_cells(line) {
            if is_divider(&cells) {
                continue;
            }
            match table.as_mut() {
                Some((_, rows)) => rows.push(cells),
                None => table = Some((cells, Vec::new())),
            }
            continue;
        }

        if let Some((header, rows)) = table.take() {
            blocks.push(TextBlock::Table { header, rows });
        }
        if line.is_empty() {
            continue;
        }
        match heading(line) {
            Some((level, text)) => blocks.push(TextBlock::Heading {
                level,
                text: text.to_string(),
            }),
            None => blocks.push(TextBlock::Paragraph {
                text: line.to_string(),
            }),
        }
    }

    if let Some((header, rows)) = table {
        blocks.push(TextBlock::Table { header, rows });
    }
    blocks
}

fn pipe_cells(line: &str) -> Option<Vec<String>> {
    if line.len() < 2 || !line.starts_with('|') || !line.ends_with('|') {
        return None;
    }
    Some(
        line[1..line.len() - 1]
            .split('|')
            .map(|s| s.trim().to_string())
            .collect(),
    )
}

/// `|---|:---:|` style header/body separator
fn is_divider(cells: &[String]) -> bool {
    cells
        .iter()
        .all(|c| c.contains('-') && c.chars().all(|ch| ch == '-' || ch == ':'))
}

fn heading(line: &str) -> Option<(u8, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &line[level..];
    if !rest.starts_with(' ') {
        return None;
    }
    Some((level as u8, rest.trim()))
}
