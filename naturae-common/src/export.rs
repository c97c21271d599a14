//! Deck export document
//!
//! Portable JSON representation of a deck, used for download and for
//! re-importing into another account. Uploaded media are referenced by URL;
//! the files themselves are not embedded.

use crate::annotations::{self, Annotation};
use crate::db::{Card, CardMedia, Deck, MediaType};
use crate::text::{self, slugify};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub const EXPORT_VERSION: &str = "1.0";

/// Largest deck accepted by import
pub const MAX_IMPORT_CARDS: usize = 5000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub deck: ExportDeck,
    pub cards: Vec<ExportCard>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDeck {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportCard {
    pub front_text: String,
    #[serde(default)]
    pub back_text: String,
    pub position: i64,
    #[serde(default)]
    pub media: Vec<ExportMedia>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMedia {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub url: String,
    pub position: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<Annotation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotated_url: Option<String>,
}

impl From<&CardMedia> for ExportMedia {
    fn from(media: &CardMedia) -> Self {
        Self {
            media_type: media.media_type,
            url: media.url.clone(),
            position: media.position,
            annotations: (!media.annotations.is_empty()).then(|| media.annotations.clone()),
            annotated_url: media.annotated_url.clone(),
        }
    }
}

/// Assemble the export document for a deck
///
/// `media` maps card id to that card's media, as returned by
/// [`crate::db::media::list_media_for_deck`]. Cards are emitted in position order.
pub fn build_export(
    deck: &Deck,
    cards: &[Card],
    media: &HashMap<Uuid, Vec<CardMedia>>,
    exported_at: DateTime<Utc>,
) -> ExportDocument {
    let mut sorted: Vec<&Card> = cards.iter().collect();
    sorted.sort_by_key(|c| c.position);

    let cards = sorted
        .into_iter()
        .map(|card| {
            let mut items: Vec<ExportMedia> = media
                .get(&card.id)
                .map(|list| list.iter().map(ExportMedia::from).collect())
                .unwrap_or_default();
            items.sort_by_key(|m| m.position);

            ExportCard {
                front_text: card.front_text.clone(),
                back_text: card.back_text.clone(),
                position: card.position,
                media: items,
            }
        })
        .collect();

    ExportDocument {
        version: EXPORT_VERSION.to_string(),
        exported_at,
        deck: ExportDeck {
            title: deck.title.clone(),
            description: deck.description.clone(),
            is_public: deck.is_public,
        },
        cards,
    }
}

/// Absolute http(s) URL or a same-site path
///
/// Protocol-relative forms (`//host`, `/\host`) point off-site and are refused.
fn is_allowed_media_url(url: &str) -> bool {
    if url.starts_with("https://") || url.starts_with("http://") {
        return true;
    }
    url.starts_with('/') && !url.starts_with("//") && !url.starts_with("/\\")
}

/// Check a document before it is imported
pub fn validate_import(doc: &ExportDocument) -> Result<()> {
    if doc.version != EXPORT_VERSION {
        return Err(Error::InvalidInput(format!(
            "Unsupported export version '{}', expected '{}'",
            doc.version, EXPORT_VERSION
        )));
    }

    text::validate_title(&doc.deck.title)?;
    text::validate_description(doc.deck.description.as_deref())?;

    if doc.cards.len() > MAX_IMPORT_CARDS {
        return Err(Error::InvalidInput(format!(
            "Deck has {} cards; at most {} can be imported",
            doc.cards.len(),
            MAX_IMPORT_CARDS
        )));
    }

    for (index, card) in doc.cards.iter().enumerate() {
        text::validate_card_text(&card.front_text, &card.back_text)
            .map_err(|e| Error::InvalidInput(format!("Card {}: {}", index + 1, e)))?;

        for item in &card.media {
            let annotated_ok = item.annotated_url.as_deref().map_or(true, is_allowed_media_url);
            if !is_allowed_media_url(&item.url) || !annotated_ok {
                return Err(Error::InvalidInput(format!("Card {}: invalid media url", index + 1)));
            }
            if let Some(list) = &item.annotations {
                annotations::validate(list)?;
            }
        }
    }

    Ok(())
}

/// Download file name for an exported deck
pub fn export_filename(title: &str) -> String {
    format!("{}.naturae.json", slugify(title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deck() -> Deck {
        Deck {
            id: Uuid::new_v4(),
            user_id: "u1".to_string(),
            title: "Vogels van Nederland".to_string(),
            description: Some("Algemene tuinvogels".to_string()),
            is_public: true,
            card_count: 2,
            like_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn card(deck_id: Uuid, position: i64, front: &str, back: &str) -> Card {
        Card {
            id: Uuid::new_v4(),
            deck_id,
            front_text: front.to_string(),
            back_text: back.to_string(),
            position,
            species_id: None,
            species_display: None,
        }
    }

    #[test]
    fn test_build_export_orders_cards_and_media() {
        let d = deck();
        let first = card(d.id, 1, "Merel", "Turdus merula");
        let second = card(d.id, 2, "Koolmees", "Parus major");

        let mut media = HashMap::new();
        media.insert(
            first.id,
            vec![
                CardMedia {
                    id: Uuid::new_v4(),
                    card_id: first.id,
                    media_type: MediaType::Audio,
                    url: "/media/u1/b.mp3".to_string(),
                    position: 2,
                    annotations: Vec::new(),
                    annotated_url: None,
                    size_bytes: 10,
                    storage_path: Some("u1/b.mp3".to_string()),
                },
                CardMedia {
                    id: Uuid::new_v4(),
                    card_id: first.id,
                    media_type: MediaType::Image,
                    url: "https://static.inaturalist.org/photos/1/large.jpg".to_string(),
                    position: 1,
                    annotations: Vec::new(),
                    annotated_url: None,
                    size_bytes: 0,
                    storage_path: None,
                },
            ],
        );

        let doc = build_export(&d, &[second, first], &media, Utc::now());
        assert_eq!(doc.version, "1.0");
        assert_eq!(doc.cards[0].front_text, "Merel");
        assert_eq!(doc.cards[0].media[0].media_type, MediaType::Image);
        assert!(doc.cards[1].media.is_empty());

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["deck"]["title"], json!("Vogels van Nederland"));
        assert_eq!(value["cards"][0]["media"][1]["type"], json!("audio"));
        assert!(value["cards"][0]["media"][0].get("annotations").is_none());
    }

    #[test]
    fn test_validate_import_accepts_minimal_document() {
        let doc: ExportDocument = serde_json::from_value(json!({
            "version": "1.0",
            "exported_at": "2024-05-01T10:00:00Z",
            "deck": {"title": "Bomen"},
            "cards": [{"front_text": "Eik", "back_text": "Quercus robur", "position": 1}]
        }))
        .unwrap();
        assert!(validate_import(&doc).is_ok());
        assert!(!doc.deck.is_public);
    }

    #[test]
    fn test_validate_import_rejects_wrong_version() {
        let doc: ExportDocument = serde_json::from_value(json!({
            "version": "2.0",
            "exported_at": "2024-05-01T10:00:00Z",
            "deck": {"title": "Bomen"},
            "cards": []
        }))
        .unwrap();
        assert!(matches!(validate_import(&doc), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_validate_import_rejects_blank_title_and_card() {
        let mut doc = build_export(&deck(), &[], &HashMap::new(), Utc::now());
        doc.deck.title = "  ".to_string();
        assert!(validate_import(&doc).is_err());

        doc.deck.title = "Bomen".to_string();
        doc.cards.push(ExportCard {
            front_text: "".to_string(),
            back_text: "x".to_string(),
            position: 1,
            media: Vec::new(),
        });
        assert!(validate_import(&doc).is_err());
    }

    #[test]
    fn test_validate_import_rejects_javascript_url() {
        let mut doc = build_export(&deck(), &[], &HashMap::new(), Utc::now());
        doc.cards.push(ExportCard {
            front_text: "Eik".to_string(),
            back_text: String::new(),
            position: 1,
            media: vec![ExportMedia {
                media_type: MediaType::Image,
                url: "javascript:alert(1)".to_string(),
                position: 1,
                annotations: None,
                annotated_url: None,
            }],
        });
        assert!(validate_import(&doc).is_err());
    }

    #[test]
    fn test_validate_import_rejects_protocol_relative_url() {
        for url in ["//evil.example/x.jpg", "/\\evil.example/x.jpg"] {
            let mut doc = build_export(&deck(), &[], &HashMap::new(), Utc::now());
            doc.cards.push(ExportCard {
                front_text: "Eik".to_string(),
                back_text: String::new(),
                position: 1,
                media: vec![ExportMedia {
                    media_type: MediaType::Image,
                    url: url.to_string(),
                    position: 1,
                    annotations: None,
                    annotated_url: None,
                }],
            });
            assert!(validate_import(&doc).is_err(), "{url} should be rejected");
        }
        assert!(is_allowed_media_url("/media/alice/abc.jpg"));
    }

    #[test]
    fn test_export_filename() {
        assert_eq!(export_filename("Vogels van Nederland"), "vogels-van-nederland.naturae.json");
    }
}
