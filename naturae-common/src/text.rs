//! Text helpers: field validation, slugs and extract truncation

use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 500;
pub const MAX_DISPLAY_NAME_CHARS: usize = 50;
pub const MAX_CARD_TEXT_CHARS: usize = 500;

/// Length Wikipedia extracts are cut to
pub const EXTRACT_MAX_CHARS: usize = 500;

static USERNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_]{3,30}$").expect("USERNAME regex is valid"));

static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("NON_SLUG regex is valid"));

/// Shorten an article extract to at most `max_chars` characters plus an ellipsis
///
/// Prefers to end at a sentence boundary when that keeps at least half of the
/// allowed length, otherwise cuts at the last whitespace.
pub fn truncate_extract(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut: String = text.chars().take(max_chars).collect();

    // `cut` is a prefix of `text`, so a terminator on the last kept char is
    // checked against the char that follows it in the full text
    let sentence_end = cut
        .char_indices()
        .filter(|(i, c)| {
            let rest = &text[i + c.len_utf8()..];
            matches!(c, '.' | '!' | '?') && (rest.is_empty() || rest.starts_with(char::is_whitespace))
        })
        .map(|(i, c)| i + c.len_utf8())
        .last();

    if let Some(end) = sentence_end {
        if cut[..end].chars().count() * 2 >= max_chars {
            return cut[..end].to_string();
        }
    }

    let base = match cut.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => &cut[..idx],
        _ => cut.as_str(),
    };
    format!("{}…", base.trim_end_matches(|c: char| c.is_whitespace() || c == ',' || c == ';'))
}

/// Trimmed deck title of 1-100 characters
pub fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::InvalidInput("Title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(Error::InvalidInput(format!(
            "Title must be at most {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(title.to_string())
}

/// Trimmed optional description; blank becomes `None`
pub fn validate_description(description: Option<&str>) -> Result<Option<String>> {
    let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(Error::InvalidInput(format!(
            "Description must be at most {} characters",
            MAX_DESCRIPTION_CHARS
        )));
    }
    Ok(Some(description.to_string()))
}

/// Lowercase username of 3-30 characters from `[a-z0-9_]`
pub fn validate_username(username: &str) -> Result<String> {
    let username = username.trim();
    if !USERNAME.is_match(username) {
        return Err(Error::InvalidInput(
            "Username must be 3-30 characters: lowercase letters, digits or underscores".to_string(),
        ));
    }
    Ok(username.to_string())
}

/// Trimmed display name of at most 50 characters
pub fn validate_display_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(Error::InvalidInput(format!(
            "Display name must be at most {} characters",
            MAX_DISPLAY_NAME_CHARS
        )));
    }
    Ok(name.to_string())
}

/// Trimmed card sides; the front is required
pub fn validate_card_text(front: &str, back: &str) -> Result<(String, String)> {
    let front = front.trim();
    let back = back.trim();
    if front.is_empty() {
        return Err(Error::InvalidInput("Card front text is required".to_string()));
    }
    if front.chars().count() > MAX_CARD_TEXT_CHARS || back.chars().count() > MAX_CARD_TEXT_CHARS {
        return Err(Error::InvalidInput(format!(
            "Card text must be at most {} characters per side",
            MAX_CARD_TEXT_CHARS
        )));
    }
    Ok((front.to_string(), back.to_string()))
}

/// URL/file-name friendly version of a title
pub fn slugify(value: &str) -> String {
    let lower = value.to_lowercase();
    let slug = NON_SLUG.replace_all(&lower, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "deck".to_string()
    } else {
        slug.chars().take(60).collect::<String>().trim_end_matches('-').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_extract_unchanged() {
        assert_eq!(truncate_extract("  De gierzwaluw is een vogel.  ", 500), "De gierzwaluw is een vogel.");
    }

    #[test]
    fn test_truncate_at_sentence_boundary() {
        let text = "First sentence is here. Second sentence is a bit longer than that. Third.";
        assert_eq!(truncate_extract(text, 40), "First sentence is here.");
    }

    #[test]
    fn test_truncate_keeps_sentence_ending_exactly_at_limit() {
        assert_eq!(truncate_extract("Ab cdefgh. More text follows here", 10), "Ab cdefgh.");
        // A dot inside a token is not a sentence end
        assert_eq!(truncate_extract("Ab cdefgh.ij more text", 10), "Ab…");
    }

    #[test]
    fn test_truncate_at_word_when_sentence_too_short() {
        let text = "Hi. This is a very long sentence without any early stop at all";
        let out = truncate_extract(text, 30);
        assert_eq!(out, "Hi. This is a very long…");
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        let text = "ééééé ééééé ééééé";
        let out = truncate_extract(text, 12);
        assert_eq!(out, "ééééé ééééé…");
    }

    #[test]
    fn test_validate_title() {
        assert_eq!(validate_title("  Vogels  ").unwrap(), "Vogels");
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_description_blank_is_none() {
        assert_eq!(validate_description(Some("  ")).unwrap(), None);
        assert_eq!(validate_description(None).unwrap(), None);
        assert!(validate_description(Some(&"x".repeat(501))).is_err());
    }

    #[test]
    fn test_validate_username() {
        assert_eq!(validate_username("vogel_fan42").unwrap(), "vogel_fan42");
        assert!(validate_username("ab").is_err());
        assert!(validate_username("Vogel").is_err());
        assert!(validate_username("vogel-fan").is_err());
    }

    #[test]
    fn test_validate_card_text() {
        let (front, back) = validate_card_text(" Gierzwaluw ", " Apus apus ").unwrap();
        assert_eq!(front, "Gierzwaluw");
        assert_eq!(back, "Apus apus");
        assert!(validate_card_text("", "back").is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Vogels van Nederland!"), "vogels-van-nederland");
        assert_eq!(slugify("***"), "deck");
    }
}
