//! Bulk import parsers
//!
//! Turns raw input into per-row previews the user can confirm before any
//! card is created:
//! - [`filename`]: media file names such as
//!   `12. Zangvogels - Gierzwaluwen - Gierzwaluw - Apus apus.mp3`
//! - [`text_list`]: text pasted from a spreadsheet (tab, semicolon or comma
//!   separated)

pub mod filename;
pub mod text_list;

pub use filename::{parse_filename, preview_filenames, FilenamePattern, FilenamePreview, ParsedFilename};
pub use text_list::{detect_separator, parse_text_list, Separator, SkippedLine, TextListPreview, TextListRow};

use once_cell::sync::Lazy;
use regex::Regex;

/// Binomial or trinomial scientific name: capitalised genus, lowercase epithets
pub(crate) const SCIENTIFIC_NAME: &str = r"[A-Z][a-z]+(?: [a-z]+(?:-[a-z]+)?){1,2}";

static SCIENTIFIC_NAME_EXACT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^{}$", SCIENTIFIC_NAME)).expect("SCIENTIFIC_NAME regex is valid")
});

/// Whether `value` looks like a scientific name
pub fn is_scientific_name(value: &str) -> bool {
    SCIENTIFIC_NAME_EXACT.is_match(&collapse_whitespace(value))
}

/// Trim and collapse runs of whitespace to a single space
pub(crate) fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
