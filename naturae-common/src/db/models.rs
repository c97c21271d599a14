//! Database models

use crate::annotations::Annotation;
use crate::quota::PlanType;
use crate::review::Rating;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// User profile (one per authenticated account)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub storage_used_bytes: i64,
    pub plan_type: PlanType,
    pub created_at: DateTime<Utc>,
}

/// Deck of flashcards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub card_count: i64,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Deck {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    /// Public decks are readable by anyone, private decks by their owner only
    pub fn is_readable_by(&self, user_id: Option<&str>) -> bool {
        self.is_public || user_id.is_some_and(|u| self.is_owned_by(u))
    }
}

/// Flashcard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub deck_id: Uuid,
    pub front_text: String,
    pub back_text: String,
    pub position: i64,
    pub species_id: Option<Uuid>,
    pub species_display: Option<String>,
}

/// Kind of media attached to a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Audio,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Audio => "audio",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "image" => Some(MediaType::Image),
            "audio" => Some(MediaType::Audio),
            _ => None,
        }
    }
}

/// Image or audio attached to a card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardMedia {
    pub id: Uuid,
    pub card_id: Uuid,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub url: String,
    pub position: i64,
    pub annotations: Vec<Annotation>,
    pub annotated_url: Option<String>,
    pub size_bytes: i64,
    #[serde(skip)]
    pub storage_path: Option<String>,
}

/// Taxonomic classification copied from GBIF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Taxonomy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kingdom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phylum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genus: Option<String>,
}

/// Species record, sourced from GBIF or entered manually
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Species {
    pub id: Uuid,
    pub scientific_name: String,
    pub canonical_name: Option<String>,
    /// Language code -> common name
    pub common_names: BTreeMap<String, String>,
    pub taxonomy: Taxonomy,
    pub gbif_key: Option<i64>,
}

impl Species {
    /// Manually entered species without GBIF data
    pub fn manual(scientific_name: &str, dutch_name: Option<&str>) -> Self {
        let mut common_names = BTreeMap::new();
        if let Some(name) = dutch_name {
            common_names.insert("nl".to_string(), name.to_string());
        }
        Self {
            id: Uuid::new_v4(),
            scientific_name: scientific_name.to_string(),
            canonical_name: Some(scientific_name.to_string()),
            common_names,
            taxonomy: Taxonomy::default(),
            gbif_key: None,
        }
    }

    /// Label shown on cards: Dutch common name, then English, then canonical
    pub fn display_name(&self) -> String {
        self.common_names
            .get("nl")
            .or_else(|| self.common_names.get("en"))
            .cloned()
            .or_else(|| self.canonical_name.clone())
            .unwrap_or_else(|| self.scientific_name.clone())
    }
}

/// Per-user study progress on a card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProgress {
    pub card_id: Uuid,
    pub user_id: String,
    pub times_seen: i64,
    pub times_correct: i64,
    pub next_review: Option<DateTime<Utc>>,
    pub last_rating: Option<Rating>,
}

impl UserProgress {
    /// Progress row for a card the user has never reviewed
    pub fn unseen(card_id: Uuid, user_id: &str) -> Self {
        Self {
            card_id,
            user_id: user_id.to_string(),
            times_seen: 0,
            times_correct: 0,
            next_review: None,
            last_rating: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deck(owner: &str, is_public: bool) -> Deck {
        Deck {
            id: Uuid::new_v4(),
            user_id: owner.to_string(),
            title: "Vogels".to_string(),
            description: None,
            is_public,
            card_count: 0,
            like_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_private_deck_only_readable_by_owner() {
        let d = deck("alice", false);
        assert!(d.is_readable_by(Some("alice")));
        assert!(!d.is_readable_by(Some("bob")));
        assert!(!d.is_readable_by(None));
    }

    #[test]
    fn test_public_deck_readable_by_anyone() {
        let d = deck("alice", true);
        assert!(d.is_readable_by(Some("bob")));
        assert!(d.is_readable_by(None));
    }

    #[test]
    fn test_species_display_name_fallbacks() {
        let mut s = Species::manual("Apus apus", Some("Gierzwaluw"));
        assert_eq!(s.display_name(), "Gierzwaluw");

        s.common_names.clear();
        s.common_names.insert("en".to_string(), "Common Swift".to_string());
        assert_eq!(s.display_name(), "Common Swift");

        s.common_names.clear();
        assert_eq!(s.display_name(), "Apus apus");
    }
}
