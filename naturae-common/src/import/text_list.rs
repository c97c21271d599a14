//! Pasted spreadsheet text parsing
//!
//! One card per line, front and back separated by a tab, semicolon or comma.
//! An optional third column holds a scientific name; when the back column
//! itself looks like one it is used as the scientific name too.

use super::{collapse_whitespace, is_scientific_name};
use serde::Serialize;

/// Words that mark the first line as a header row
const HEADER_WORDS: &[&str] = &[
    "front", "back", "voorkant", "achterkant", "name", "naam", "question", "answer", "vraag",
    "antwoord", "term", "definition", "definitie", "dutch", "nederlands", "scientific",
    "wetenschappelijk", "wetenschappelijke naam", "latin", "latijn",
];

/// Column separator of a pasted list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Separator {
    Tab,
    Semicolon,
    Comma,
    None,
}

impl Separator {
    fn as_char(self) -> Option<char> {
        match self {
            Separator::Tab => Some('\t'),
            Separator::Semicolon => Some(';'),
            Separator::Comma => Some(','),
            Separator::None => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextListRow {
    /// 1-based line number in the pasted text
    pub line: usize,
    pub front_text: String,
    pub back_text: String,
    pub scientific_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLine {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextListPreview {
    pub separator: Separator,
    pub rows: Vec<TextListRow>,
    pub skipped: Vec<SkippedLine>,
}

/// Detect the column separator
///
/// A tab anywhere wins. Otherwise the separator present on more non-blank
/// lines wins, semicolon on a tie.
pub fn detect_separator(text: &str) -> Separator {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();

    if lines.iter().any(|l| l.contains('\t')) {
        return Separator::Tab;
    }

    let semicolons = lines.iter().filter(|l| l.contains(';')).count();
    let commas = lines.iter().filter(|l| l.contains(',')).count();

    match (semicolons, commas) {
        (0, 0) => Separator::None,
        (s, c) if s >= c => Separator::Semicolon,
        _ => Separator::Comma,
    }
}

/// Split a line on `separator`, honouring double-quoted fields
///
/// `""` inside a quoted field is an escaped quote.
fn split_fields(line: &str, separator: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' if in_quotes => in_quotes = false,
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            c if c == separator && !in_quotes => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    fields.push(current);

    fields.into_iter().map(|f| collapse_whitespace(&f)).collect()
}

fn is_header(fields: &[String]) -> bool {
    fields
        .first()
        .map(|f| HEADER_WORDS.contains(&f.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Parse pasted text into card rows
pub fn parse_text_list(text: &str) -> TextListPreview {
    let separator = detect_separator(text);
    let mut rows = Vec::new();
    let mut skipped = Vec::new();
    let mut first_content_line = true;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        if raw.trim().is_empty() {
            continue;
        }

        let fields = match separator.as_char() {
            Some(sep) => split_fields(raw, sep),
            None => vec![collapse_whitespace(raw.trim().trim_matches('"'))],
        };

        if first_content_line {
            first_content_line = false;
            if is_header(&fields) {
                continue;
            }
        }

        let front = fields.first().cloned().unwrap_or_default();
        let back = fields.get(1).cloned().unwrap_or_default();

        if front.is_empty() {
            skipped.push(SkippedLine {
                line,
                reason: "Missing front text".to_string(),
            });
            continue;
        }
        if back.is_empty() {
            skipped.push(SkippedLine {
                line,
                reason: "Missing back text".to_string(),
            });
            continue;
        }

        let scientific_name = fields
            .get(2)
            .filter(|f| is_scientific_name(f))
            .cloned()
            .or_else(|| is_scientific_name(&back).then(|| back.clone()));

        rows.push(TextListRow {
            line,
            front_text: front,
            back_text: back,
            scientific_name,
        });
    }

    TextListPreview {
        separator,
        rows,
        skipped,
    }
}
