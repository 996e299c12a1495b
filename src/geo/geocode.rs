//! Geocoding gateway backed by the BAN address API
//! (api-adresse.data.gouv.fr).
//!
//! All lookups degrade to "not found" on service failure - callers decide
//! whether that is fatal (the user's own address) or a per-record skip.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// A WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// A fully resolved address: best-match postal code plus coordinates.
#[derive(Debug, Clone)]
pub struct ResolvedAddress {
    pub label: String,
    pub postal_code: String,
    pub coordinates: Coordinates,
}

/// Errors from a single geocoding call. Absorbed inside the gateway;
/// never returned to callers.
#[derive(Debug, Error)]
enum GeocodeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("geocoding service returned {0}")]
    Status(reqwest::StatusCode),
}

/// BAN search response (GeoJSON feature collection).
#[derive(Debug, Deserialize)]
struct SearchResponse {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: FeatureProperties,
    geometry: FeatureGeometry,
}

#[derive(Debug, Deserialize)]
struct FeatureProperties {
    label: String,
    postcode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeatureGeometry {
    /// `[lon, lat]` per GeoJSON.
    coordinates: Vec<f64>,
}

impl Feature {
    fn coordinates(&self) -> Option<Coordinates> {
        match self.geometry.coordinates.as_slice() {
            [lon, lat, ..] => Some(Coordinates {
                lat: *lat,
                lon: *lon,
            }),
            _ => None,
        }
    }
}

/// Gateway to the BAN geocoding service, with a session-lifetime cache of
/// successful resolutions keyed by normalized address text.
pub struct Geocoder {
    client: reqwest::Client,
    base_url: String,
    cache: Mutex<HashMap<String, Coordinates>>,
}

impl Geocoder {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Resolve a free-text address to coordinates. Cached per session;
    /// network failure and no-match both come back as `None`.
    pub async fn resolve(&self, address: &str) -> Option<Coordinates> {
        let key = normalize_key(address);
        if key.is_empty() {
            return None;
        }

        // Read-check, drop the guard, fetch, write-on-miss. The lock is
        // never held across an await.
        if let Some(hit) = self.cache.lock().expect("address cache poisoned").get(&key) {
            debug!("cache hit for {:?}", key);
            return Some(*hit);
        }

        let coords = self.best_match(address).await?.coordinates()?;
        self.cache
            .lock()
            .expect("address cache poisoned")
            .insert(key, coords);

        Some(coords)
    }

    /// Resolve a free-text address to its best-match postal code and
    /// coordinates. Used once per estimation run, for the target address.
    pub async fn resolve_with_postal_code(&self, address: &str) -> Option<ResolvedAddress> {
        let feature = self.best_match(address).await?;
        let coordinates = feature.coordinates()?;
        let postal_code = feature.properties.postcode?;

        // Prime the coordinate cache so a later plain resolve is free.
        self.cache
            .lock()
            .expect("address cache poisoned")
            .insert(normalize_key(address), coordinates);

        Some(ResolvedAddress {
            label: feature.properties.label,
            postal_code,
            coordinates,
        })
    }

    /// Ranked address-label suggestions for partial input. One-shot
    /// lookup; failure is an empty list.
    pub async fn suggest(&self, partial: &str, limit: usize) -> Vec<String> {
        if partial.trim().is_empty() {
            return Vec::new();
        }

        match self.search(partial, limit).await {
            Ok(resp) => resp
                .features
                .into_iter()
                .map(|f| f.properties.label)
                .collect(),
            Err(e) => {
                warn!("address suggestion failed for {:?}: {}", partial, e);
                Vec::new()
            }
        }
    }

    async fn best_match(&self, address: &str) -> Option<Feature> {
        match self.search(address, 1).await {
            Ok(resp) => resp.features.into_iter().next(),
            Err(e) => {
                warn!("geocoding failed for {:?}: {}", address, e);
                None
            }
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<SearchResponse, GeocodeError> {
        let limit = limit.to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("q", query), ("limit", limit.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status));
        }

        Ok(resp.json::<SearchResponse>().await?)
    }
}

/// Cache key normalization: trimmed, case-folded.
fn normalize_key(address: &str) -> String {
    address.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> SearchResponse {
        serde_json::from_value(serde_json::json!({
            "features": [{
                "properties": {
                    "label": "10 Rue de la République 13001 Marseille",
                    "postcode": "13001",
                    "city": "Marseille"
                },
                "geometry": {
                    "type": "Point",
                    "coordinates": [5.3698, 43.2998]
                }
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_ban_feature() {
        let resp = sample_response();
        let feature = resp.features.into_iter().next().unwrap();

        let coords = feature.coordinates().unwrap();
        assert!((coords.lat - 43.2998).abs() < 1e-9);
        assert!((coords.lon - 5.3698).abs() < 1e-9);
        assert_eq!(feature.properties.postcode.as_deref(), Some("13001"));
    }

    #[test]
    fn test_parse_empty_feature_collection() {
        let resp: SearchResponse =
            serde_json::from_value(serde_json::json!({ "features": [] })).unwrap();
        assert!(resp.features.is_empty());
    }

    #[test]
    fn test_malformed_coordinates_rejected() {
        let resp: SearchResponse = serde_json::from_value(serde_json::json!({
            "features": [{
                "properties": { "label": "somewhere" },
                "geometry": { "coordinates": [5.3698] }
            }]
        }))
        .unwrap();

        let feature = resp.features.into_iter().next().unwrap();
        assert!(feature.coordinates().is_none());
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(
            normalize_key("  12 Rue Paradis, Marseille  "),
            "12 rue paradis, marseille"
        );
        assert_eq!(normalize_key(""), "");
    }

    #[tokio::test]
    #[ignore] // Ignore by default since it hits the real API
    async fn test_resolve_live() {
        let geocoder = Geocoder::new("https://api-adresse.data.gouv.fr/search/").unwrap();
        let resolved = geocoder
            .resolve_with_postal_code("1 Rue de la République Marseille")
            .await;
        assert!(resolved.is_some());
        assert_eq!(resolved.unwrap().postal_code, "13002");
    }
}
