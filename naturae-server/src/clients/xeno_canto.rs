//! xeno-canto client: bird sound recordings
//!
//! Search uses API v3 when a key is configured and falls back to v2 otherwise.
//! Recordings are streamed through `/api/xeno-canto/stream/:id` so the
//! client never talks to xeno-canto directly.

use super::{check_status, http_client, ClientError, MediaStream};
use serde::{Deserialize, Serialize};

/// Recording as returned to the client
#[derive(Debug, Clone, Serialize)]
pub struct Recording {
    pub id: String,
    pub scientific_name: String,
    pub english_name: Option<String>,
    pub recordist: Option<String>,
    pub country: Option<String>,
    pub location: Option<String>,
    pub sound_type: Option<String>,
    pub quality: Option<String>,
    pub length: Option<String>,
    pub license: Option<String>,
    pub page_url: String,
    pub stream_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    recordings: Vec<RawRecording>,
}

#[derive(Debug, Deserialize)]
struct RawRecording {
    id: String,
    #[serde(default)]
    gen: String,
    #[serde(default)]
    sp: String,
    #[serde(default)]
    ssp: String,
    en: Option<String>,
    rec: Option<String>,
    cnt: Option<String>,
    loc: Option<String>,
    #[serde(rename = "type")]
    sound_type: Option<String>,
    q: Option<String>,
    length: Option<String>,
    lic: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl RawRecording {
    fn into_recording(self, base_url: &str) -> Recording {
        let scientific_name = [self.gen.as_str(), self.sp.as_str(), self.ssp.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        let license = non_empty(self.lic).map(|l| {
            if l.starts_with("//") {
                format!("https:{}", l)
            } else {
                l
            }
        });

        Recording {
            page_url: format!("{}/{}", base_url, self.id),
            stream_url: format!("/api/xeno-canto/stream/{}", self.id),
            id: self.id,
            scientific_name,
            english_name: non_empty(self.en),
            recordist: non_empty(self.rec),
            country: non_empty(self.cnt),
            location: non_empty(self.loc),
            sound_type: non_empty(self.sound_type),
            quality: non_empty(self.q),
            length: non_empty(self.length),
            license,
        }
    }
}

pub struct XenoCantoClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl XenoCantoClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_secs: u64) -> Result<Self, ClientError> {
        Ok(Self {
            http_client: http_client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    /// Recordings of a species, best quality first
    pub async fn search(&self, scientific_name: &str, limit: usize) -> Result<Vec<Recording>, ClientError> {
        let name = scientific_name.trim();
        let request = match &self.api_key {
            Some(key) => self
                .http_client
                .get(format!("{}/api/3/recordings", self.base_url))
                .query(&[("query", format!("sp:\"{}\"", name)), ("key", key.clone())]),
            None => self
                .http_client
                .get(format!("{}/api/2/recordings", self.base_url))
                .query(&[("query", name)]),
        };

        tracing::debug!(name = %name, "Querying xeno-canto recordings");

        let response = request.send().await?;
        let page: SearchResponse = check_status(response, "xeno-canto recordings").await?.json().await?;

        let mut recordings: Vec<Recording> = page
            .recordings
            .into_iter()
            .map(|r| r.into_recording(&self.base_url))
            .collect();
        recordings.sort_by(|a, b| quality_rank(&a.quality).cmp(&quality_rank(&b.quality)));
        recordings.truncate(limit);

        tracing::info!(name = %name, count = recordings.len(), "Retrieved xeno-canto recordings");
        Ok(recordings)
    }

    /// Open the audio file of a recording for streaming
    pub async fn stream(&self, id: &str) -> Result<MediaStream, ClientError> {
        let url = format!("{}/{}/download", self.base_url, id);
        tracing::debug!(recording_id = %id, "Streaming xeno-canto recording");

        let response = self.http_client.get(&url).send().await?;
        let response = check_status(response, &format!("xeno-canto recording {}", id)).await?;
        Ok(MediaStream::new(response, "audio/mpeg"))
    }
}

/// Sort key for xeno-canto quality grades A (best) to E; ungraded last
fn quality_rank(quality: &Option<String>) -> u8 {
    match quality.as_deref() {
        Some("A") => 0,
        Some("B") => 1,
        Some("C") => 2,
        Some("D") => 3,
        Some("E") => 4,
        _ => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recording_mapping() {
        let raw: RawRecording = serde_json::from_value(json!({
            "id": "745123",
            "gen": "Apus",
            "sp": "apus",
            "ssp": "",
            "en": "Common Swift",
            "rec": "Jan Jansen",
            "cnt": "Netherlands",
            "loc": "",
            "type": "call",
            "q": "A",
            "length": "0:42",
            "lic": "//creativecommons.org/licenses/by-nc-sa/4.0/"
        }))
        .unwrap();

        let recording = raw.into_recording("https://xeno-canto.org");
        assert_eq!(recording.scientific_name, "Apus apus");
        assert_eq!(recording.location, None);
        assert_eq!(recording.stream_url, "/api/xeno-canto/stream/745123");
        assert_eq!(recording.page_url, "https://xeno-canto.org/745123");
        assert_eq!(
            recording.license.as_deref(),
            Some("https://creativecommons.org/licenses/by-nc-sa/4.0/")
        );
    }

    #[test]
    fn test_quality_ordering() {
        let mut grades = vec![Some("C".to_string()), None, Some("A".to_string())];
        grades.sort_by_key(quality_rank);
        assert_eq!(grades, vec![Some("A".to_string()), Some("C".to_string()), None]);
    }
}
