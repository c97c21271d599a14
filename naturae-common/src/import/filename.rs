//! Media filename parsing
//!
//! Patterns are tried in order; the first match wins:
//!
//! | pattern           | example                                                   |
//! |-------------------|-----------------------------------------------------------|
//! | `numbered_full`   | `12. Zangvogels - Gierzwaluwen - Gierzwaluw - Apus apus`   |
//! | `numbered_group`  | `12. Zangvogels - Gierzwaluw - Apus apus`                  |
//! | `numbered`        | `12. Gierzwaluw - Apus apus`, `12 - ...`, `12_...`         |
//! | `xeno_canto`      | `XC123456 - Gierzwaluw - Apus apus`                        |
//! | `named`           | `Gierzwaluw - Apus apus`                                   |
//! | `scientific`      | `Apus_apus_03`, `Apus apus`                                |
//! | `numbered_name`   | `12. Gierzwaluw`                                           |
//! | `plain`           | anything else: the whole stem is taken as the Dutch name   |

use super::{collapse_whitespace, SCIENTIFIC_NAME};
use crate::db::MediaType;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Leading track number: `12.`, `12)`, `12 -`, `12_`
const POSITION: &str = r"(?P<pos>\d{1,4}) ?[.)_-]? ?";

static NUMBERED_FULL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^{POSITION}(?P<group>.+?) - (?P<subgroup>.+?) - (?P<dutch>.+?) - (?P<sci>{SCIENTIFIC_NAME})$"
    ))
    .expect("NUMBERED_FULL regex is valid")
});

static NUMBERED_GROUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^{POSITION}(?P<group>.+?) - (?P<dutch>.+?) - (?P<sci>{SCIENTIFIC_NAME})$"
    ))
    .expect("NUMBERED_GROUP regex is valid")
});

static NUMBERED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^{POSITION}(?P<dutch>.+?) - (?P<sci>{SCIENTIFIC_NAME})$"))
        .expect("NUMBERED regex is valid")
});

static XENO_CANTO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?i:XC)(?P<xc>\d+) ?- ?(?P<dutch>.+?) - (?P<sci>{SCIENTIFIC_NAME})$"
    ))
    .expect("XENO_CANTO regex is valid")
});

static NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(?P<dutch>.+?) - (?P<sci>{SCIENTIFIC_NAME})$")).expect("NAMED regex is valid")
});

static SCIENTIFIC_ONLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<sci>[A-Z][a-z]+(?:[ _][a-z]+(?:-[a-z]+)?){1,2})(?:[ _-]\d+)?$")
        .expect("SCIENTIFIC_ONLY regex is valid")
});

static NUMBERED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^{POSITION}(?P<dutch>\D.*)$")).expect("NUMBERED_NAME regex is valid")
});

/// Which pattern produced a parse result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilenamePattern {
    NumberedFull,
    NumberedGroup,
    Numbered,
    XenoCanto,
    Named,
    Scientific,
    NumberedName,
    Plain,
}

/// Structured fields extracted from a filename
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedFilename {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subgroup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dutch_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scientific_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xeno_canto_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(skip)]
    pub pattern: Option<FilenamePattern>,
}

impl ParsedFilename {
    /// Card front: the Dutch name, falling back to the scientific name
    pub fn front_text(&self) -> String {
        self.dutch_name
            .clone()
            .or_else(|| self.scientific_name.clone())
            .unwrap_or_default()
    }

    /// Card back: the scientific name when the front shows the Dutch name
    pub fn back_text(&self) -> String {
        match (&self.dutch_name, &self.scientific_name) {
            (Some(_), Some(sci)) => sci.clone(),
            _ => String::new(),
        }
    }
}

/// Media type for a file extension (case-insensitive)
pub fn media_type_for_extension(extension: &str) -> Option<MediaType> {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" | "png" | "webp" | "gif" | "heic" | "avif" => Some(MediaType::Image),
        "mp3" | "wav" | "ogg" | "oga" | "m4a" | "flac" | "aac" | "opus" => Some(MediaType::Audio),
        _ => None,
    }
}

/// MIME type for a file extension, for stored uploads
pub fn content_type_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "avif" => "image/avif",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "m4a" | "aac" => "audio/mp4",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

/// Split off a short alphanumeric extension
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && !ext.chars().all(|c| c.is_ascii_digit()) =>
        {
            (stem, Some(ext))
        }
        _ => (name, None),
    }
}

fn capture(caps: &regex::Captures<'_>, name: &str) -> Option<String> {
    caps.name(name)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a media filename into structured fields
///
/// Any directory part is ignored. Never fails: unrecognised names fall back
/// to the `plain` pattern.
pub fn parse_filename(name: &str) -> ParsedFilename {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let (stem, extension) = split_extension(base.trim());
    let stem = collapse_whitespace(stem);

    let mut parsed = ParsedFilename {
        extension: extension.map(|e| e.to_ascii_lowercase()),
        media_type: extension.and_then(media_type_for_extension),
        ..ParsedFilename::default()
    };

    let position = |caps: &regex::Captures<'_>| caps.name("pos").and_then(|m| m.as_str().parse().ok());

    if let Some(caps) = NUMBERED_FULL.captures(&stem) {
        parsed.position = position(&caps);
        parsed.group = capture(&caps, "group");
        parsed.subgroup = capture(&caps, "subgroup");
        parsed.dutch_name = capture(&caps, "dutch");
        parsed.scientific_name = capture(&caps, "sci");
        parsed.pattern = Some(FilenamePattern::NumberedFull);
    } else if let Some(caps) = NUMBERED_GROUP.captures(&stem) {
        parsed.position = position(&caps);
        parsed.group = capture(&caps, "group");
        parsed.dutch_name = capture(&caps, "dutch");
        parsed.scientific_name = capture(&caps, "sci");
        parsed.pattern = Some(FilenamePattern::NumberedGroup);
    } else if let Some(caps) = NUMBERED.captures(&stem) {
        parsed.position = position(&caps);
        parsed.dutch_name = capture(&caps, "dutch");
        parsed.scientific_name = capture(&caps, "sci");
        parsed.pattern = Some(FilenamePattern::Numbered);
    } else if let Some(caps) = XENO_CANTO.captures(&stem) {
        parsed.xeno_canto_id = capture(&caps, "xc");
        parsed.dutch_name = capture(&caps, "dutch");
        parsed.scientific_name = capture(&caps, "sci");
        parsed.pattern = Some(FilenamePattern::XenoCanto);
    } else if let Some(caps) = NAMED.captures(&stem) {
        parsed.dutch_name = capture(&caps, "dutch");
        parsed.scientific_name = capture(&caps, "sci");
        parsed.pattern = Some(FilenamePattern::Named);
    } else if let Some(caps) = SCIENTIFIC_ONLY.captures(&stem) {
        parsed.scientific_name = capture(&caps, "sci").map(|s| s.replace('_', " "));
        parsed.pattern = Some(FilenamePattern::Scientific);
    } else if let Some(caps) = NUMBERED_NAME.captures(&stem) {
        parsed.position = position(&caps);
        parsed.dutch_name = capture(&caps, "dutch").map(|d| d.replace('_', " "));
        parsed.pattern = Some(FilenamePattern::NumberedName);
    } else {
        let plain = collapse_whitespace(&stem.replace('_', " "));
        parsed.dutch_name = Some(plain).filter(|s| !s.is_empty());
        parsed.pattern = Some(FilenamePattern::Plain);
    }

    parsed
}

/// Preview row for one file of a bulk import
#[derive(Debug, Clone, Serialize)]
pub struct FilenamePreview {
    pub filename: String,
    pub parsed: ParsedFilename,
    pub pattern: FilenamePattern,
    pub front_text: String,
    pub back_text: String,
    pub warnings: Vec<String>,
}

/// Parse a batch of filenames into preview rows, in input order
pub fn preview_filenames<S: AsRef<str>>(names: &[S]) -> Vec<FilenamePreview> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            let parsed = parse_filename(name);

            let mut warnings = Vec::new();
            if parsed.media_type.is_none() {
                warnings.push("Unsupported file type; expected an image or audio file".to_string());
            }
            if parsed.scientific_name.is_none() {
                warnings.push("No scientific name found; the card will not be linked to a species".to_string());
            }
            if parsed.front_text().is_empty() {
                warnings.push("No name found in filename".to_string());
            }

            FilenamePreview {
                filename: name.to_string(),
                pattern: parsed.pattern.unwrap_or(FilenamePattern::Plain),
                front_text: parsed.front_text(),
                back_text: parsed.back_text(),
                parsed,
                warnings,
            }
        })
        .collect()
}
