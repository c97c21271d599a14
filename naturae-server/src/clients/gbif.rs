//! GBIF API client
//!
//! Species matching, vernacular names and occurrence photos from
//! <https://api.gbif.org/v1>.

use super::{check_status, http_client, ClientError};
use naturae_common::db::{Species, Taxonomy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Occurrence pages requested per photo search; one occurrence can carry several photos
const OCCURRENCE_PAGE: u32 = 50;

/// Photo attached to a GBIF occurrence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GbifMedia {
    pub url: String,
    pub creator: Option<String>,
    pub license: Option<String>,
    pub publisher: Option<String>,
    pub references: Option<String>,
}

/// Matched GBIF taxon
#[derive(Debug, Clone, Serialize)]
pub struct GbifSpecies {
    pub key: i64,
    pub scientific_name: String,
    pub canonical_name: Option<String>,
    pub rank: Option<String>,
    pub taxonomy: Taxonomy,
    pub common_names: BTreeMap<String, String>,
}

impl GbifSpecies {
    /// Species record for local storage
    pub fn to_species(&self) -> Species {
        Species {
            id: Uuid::new_v4(),
            scientific_name: self
                .canonical_name
                .clone()
                .unwrap_or_else(|| self.scientific_name.clone()),
            canonical_name: self.canonical_name.clone(),
            common_names: self.common_names.clone(),
            taxonomy: self.taxonomy.clone(),
            gbif_key: Some(self.key),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchResponse {
    usage_key: Option<i64>,
    scientific_name: Option<String>,
    canonical_name: Option<String>,
    rank: Option<String>,
    match_type: Option<String>,
    kingdom: Option<String>,
    phylum: Option<String>,
    class: Option<String>,
    order: Option<String>,
    family: Option<String>,
    genus: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VernacularResponse {
    #[serde(default)]
    results: Vec<VernacularName>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VernacularName {
    vernacular_name: String,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OccurrenceResponse {
    #[serde(default)]
    results: Vec<Occurrence>,
}

#[derive(Debug, Deserialize)]
struct Occurrence {
    #[serde(default)]
    media: Vec<OccurrenceMedia>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OccurrenceMedia {
    #[serde(rename = "type")]
    media_type: Option<String>,
    identifier: Option<String>,
    creator: Option<String>,
    license: Option<String>,
    publisher: Option<String>,
    references: Option<String>,
    rights_holder: Option<String>,
}

/// ISO 639-2 codes used by GBIF mapped to the two-letter codes stored locally
fn language_code(iso639_2: &str) -> Option<&'static str> {
    match iso639_2 {
        "nld" | "dut" | "nl" => Some("nl"),
        "eng" | "en" => Some("en"),
        "deu" | "ger" | "de" => Some("de"),
        "fra" | "fre" | "fr" => Some("fr"),
        _ => None,
    }
}

/// First name per supported language
fn collect_common_names(names: Vec<VernacularName>) -> BTreeMap<String, String> {
    let mut common_names = BTreeMap::new();
    for name in names {
        let Some(lang) = name.language.as_deref().and_then(language_code) else {
            continue;
        };
        let value = name.vernacular_name.trim();
        if !value.is_empty() {
            common_names.entry(lang.to_string()).or_insert_with(|| value.to_string());
        }
    }
    common_names
}

/// Unique still images, up to `limit`
fn collect_media(occurrences: Vec<Occurrence>, limit: usize) -> Vec<GbifMedia> {
    let mut seen = std::collections::HashSet::new();
    occurrences
        .into_iter()
        .flat_map(|o| o.media)
        .filter(|m| m.media_type.as_deref().map_or(true, |t| t == "StillImage"))
        .filter_map(|m| {
            let url = m.identifier?.trim().to_string();
            if !url.starts_with("http") || !seen.insert(url.clone()) {
                return None;
            }
            Some(GbifMedia {
                url,
                creator: m.creator.or(m.rights_holder),
                license: m.license,
                publisher: m.publisher,
                references: m.references,
            })
        })
        .take(limit)
        .collect()
}

/// GBIF API client
pub struct GbifClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl GbifClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ClientError> {
        Ok(Self {
            http_client: http_client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Match a name against the GBIF backbone, with vernacular names
    ///
    /// Returns `None` when GBIF has no match.
    pub async fn match_species(&self, name: &str) -> Result<Option<GbifSpecies>, ClientError> {
        let url = format!("{}/species/match", self.base_url);
        tracing::debug!(name = %name, url = %url, "Querying GBIF species match");

        let response = self
            .http_client
            .get(&url)
            .query(&[("name", name), ("strict", "false")])
            .send()
            .await?;
        let matched: MatchResponse = check_status(response, "GBIF species").await?.json().await?;

        let (Some(key), Some(scientific_name)) = (matched.usage_key, matched.scientific_name) else {
            tracing::info!(name = %name, "No GBIF match");
            return Ok(None);
        };
        if matched.match_type.as_deref() == Some("NONE") {
            return Ok(None);
        }

        let common_names = self.vernacular_names(key).await?;

        tracing::info!(
            name = %name,
            gbif_key = key,
            scientific_name = %scientific_name,
            "Matched species on GBIF"
        );

        Ok(Some(GbifSpecies {
            key,
            scientific_name,
            canonical_name: matched.canonical_name,
            rank: matched.rank,
            taxonomy: Taxonomy {
                kingdom: matched.kingdom,
                phylum: matched.phylum,
                class: matched.class,
                order: matched.order,
                family: matched.family,
                genus: matched.genus,
            },
            common_names,
        }))
    }

    /// Common names of a taxon keyed by two-letter language code
    pub async fn vernacular_names(&self, key: i64) -> Result<BTreeMap<String, String>, ClientError> {
        let url = format!("{}/species/{}/vernacularNames", self.base_url, key);

        let response = self.http_client.get(&url).query(&[("limit", "200")]).send().await?;
        let names: VernacularResponse = check_status(response, "GBIF species").await?.json().await?;

        Ok(collect_common_names(names.results))
    }

    /// Photos from occurrences of a taxon
    pub async fn occurrence_media(&self, taxon_key: i64, limit: usize) -> Result<Vec<GbifMedia>, ClientError> {
        let url = format!("{}/occurrence/search", self.base_url);
        tracing::debug!(taxon_key, limit, "Querying GBIF occurrence photos");

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("taxonKey", taxon_key.to_string()),
                ("mediaType", "StillImage".to_string()),
                ("limit", OCCURRENCE_PAGE.to_string()),
            ])
            .send()
            .await?;
        let page: OccurrenceResponse = check_status(response, "GBIF occurrences").await?.json().await?;

        let media = collect_media(page.results, limit);
        tracing::info!(taxon_key, count = media.len(), "Retrieved GBIF photos");
        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collect_media_dedupes_and_limits() {
        let page: OccurrenceResponse = serde_json::from_value(json!({
            "results": [
                {"media": [
                    {"type": "StillImage", "identifier": "https://inaturalist-open-data.s3.amazonaws.com/photos/1/original.jpg",
                     "rightsHolder": "Jan", "license": "http://creativecommons.org/licenses/by/4.0/"},
                    {"type": "Sound", "identifier": "https://example.org/a.mp3"}
                ]},
                {"media": [
                    {"type": "StillImage", "identifier": "https://inaturalist-open-data.s3.amazonaws.com/photos/1/original.jpg"},
                    {"type": "StillImage", "identifier": "https://observation.org/photos/2.jpg", "creator": "Piet"}
                ]},
                {}
            ]
        }))
        .unwrap();

        let media = collect_media(page.results, 10);
        assert_eq!(media.len(), 2);
        assert_eq!(media[0].creator.as_deref(), Some("Jan"));
        assert_eq!(media[1].url, "https://observation.org/photos/2.jpg");

        let page: OccurrenceResponse = serde_json::from_value(json!({
            "results": [{"media": [
                {"type": "StillImage", "identifier": "https://observation.org/1.jpg"},
                {"type": "StillImage", "identifier": "https://observation.org/2.jpg"}
            ]}]
        }))
        .unwrap();
        assert_eq!(collect_media(page.results, 1).len(), 1);
    }

    #[test]
    fn test_collect_common_names_first_per_language() {
        let names: VernacularResponse = serde_json::from_value(json!({
            "results": [
                {"vernacularName": "Gierzwaluw", "language": "nld"},
                {"vernacularName": "Zwaluw", "language": "nld"},
                {"vernacularName": "Common Swift", "language": "eng"},
                {"vernacularName": "Tornselya", "language": "kat"},
                {"vernacularName": "Swift"}
            ]
        }))
        .unwrap();

        let map = collect_common_names(names.results);
        assert_eq!(map.len(), 2);
        assert_eq!(map["nl"], "Gierzwaluw");
        assert_eq!(map["en"], "Common Swift");
    }

    #[test]
    fn test_to_species_prefers_canonical_name() {
        let species = GbifSpecies {
            key: 5228676,
            scientific_name: "Apus apus (Linnaeus, 1758)".to_string(),
            canonical_name: Some("Apus apus".to_string()),
            rank: Some("SPECIES".to_string()),
            taxonomy: Taxonomy::default(),
            common_names: BTreeMap::new(),
        }
        .to_species();

        assert_eq!(species.scientific_name, "Apus apus");
        assert_eq!(species.gbif_key, Some(5228676));
    }
}
