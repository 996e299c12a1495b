//! Proximity enrichment - nearby amenities via the Overpass API
//!
//! Thin, outward-facing layer: query shops and amenities around the
//! subject property, rank them by distance. Service failure degrades to
//! an empty set.

use crate::geo::haversine_km;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

/// One amenity near the subject property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyPlace {
    pub name: String,
    pub category: String,
    pub distance_km: f64,
}

/// Amenities sorted by distance plus the mean distance over them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximityReport {
    pub places: Vec<NearbyPlace>,
    pub proximity_score_km: Option<f64>,
}

impl ProximityReport {
    pub fn empty() -> Self {
        ProximityReport {
            places: Vec::new(),
            proximity_score_km: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Overpass client for the fixed shop/amenity query.
pub struct PoiClient {
    client: reqwest::Client,
    base_url: String,
}

impl PoiClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Nearby amenities within `radius_m` meters, closest first. An
    /// unreachable service yields an empty report.
    pub async fn nearby(&self, lat: f64, lon: f64, radius_m: u32) -> ProximityReport {
        let query = overpass_query(lat, lon, radius_m);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("data", query.as_str())])
            .send()
            .await;

        let parsed = match response {
            Ok(resp) => resp.json::<OverpassResponse>().await,
            Err(e) => {
                warn!("POI lookup failed: {e}");
                return ProximityReport::empty();
            }
        };

        match parsed {
            Ok(body) => build_report(lat, lon, body),
            Err(e) => {
                warn!("POI response parsing failed: {e}");
                ProximityReport::empty()
            }
        }
    }
}

fn overpass_query(lat: f64, lon: f64, radius_m: u32) -> String {
    format!(
        "[out:json];(\
         node[\"shop\"~\"bakery|supermarket\"](around:{radius_m},{lat},{lon});\
         node[\"amenity\"~\"pharmacy|school|station\"](around:{radius_m},{lat},{lon});\
         );out;"
    )
}

fn build_report(lat: f64, lon: f64, body: OverpassResponse) -> ProximityReport {
    let mut places: Vec<NearbyPlace> = body
        .elements
        .into_iter()
        .filter_map(|el| {
            let (el_lat, el_lon) = (el.lat?, el.lon?);
            let tag = el
                .tags
                .get("shop")
                .or_else(|| el.tags.get("amenity"))
                .map(String::as_str)
                .unwrap_or("default");
            let category = category_label(tag);
            let name = el
                .tags
                .get("name")
                .cloned()
                .unwrap_or_else(|| category.clone());
            let distance_km = haversine_km(lat, lon, el_lat, el_lon);

            Some(NearbyPlace {
                name,
                category,
                distance_km: (distance_km * 100.0).round() / 100.0,
            })
        })
        .collect();

    places.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

    let proximity_score_km = if places.is_empty() {
        None
    } else {
        let mean =
            places.iter().map(|p| p.distance_km).sum::<f64>() / places.len() as f64;
        Some((mean * 100.0).round() / 100.0)
    };

    ProximityReport {
        places,
        proximity_score_km,
    }
}

/// Maps an OSM category tag to its display label. Total: unknown tags
/// fall through to a title-cased rendering of the tag itself.
pub fn category_label(tag: &str) -> String {
    match tag {
        "bakery" => "Boulangerie".to_string(),
        "supermarket" => "Supermarché".to_string(),
        "pharmacy" => "Pharmacie".to_string(),
        "school" => "École".to_string(),
        "station" => "Gare".to_string(),
        "default" => "Commerce".to_string(),
        "Charging_Station" => "Borne de recharge".to_string(),
        "Driving_School" => "Auto-Ecole".to_string(),
        "Music_School" => "Ecole de musique".to_string(),
        other => title_case(other),
    }
}

/// Uppercases the first letter of each alphabetic run, lowercases the
/// rest: `"car_wash"` becomes `"Car_Wash"`.
fn title_case(tag: &str) -> String {
    let mut out = String::with_capacity(tag.len());
    let mut at_word_start = true;
    for c in tag.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_labels() {
        assert_eq!(category_label("bakery"), "Boulangerie");
        assert_eq!(category_label("pharmacy"), "Pharmacie");
        assert_eq!(category_label("default"), "Commerce");
        assert_eq!(category_label("Charging_Station"), "Borne de recharge");
    }

    #[test]
    fn test_category_label_default_branch() {
        assert_eq!(category_label("car_wash"), "Car_Wash");
        assert_eq!(category_label("KIOSK"), "Kiosk");
    }

    #[test]
    fn test_overpass_query_shape() {
        let q = overpass_query(43.2965, 5.3698, 2000);
        assert!(q.starts_with("[out:json];"));
        assert!(q.contains("around:2000,43.2965,5.3698"));
        assert!(q.ends_with("out;"));
    }

    fn fixture() -> OverpassResponse {
        serde_json::from_value(serde_json::json!({
            "elements": [
                {
                    "lat": 43.3065, "lon": 5.3698,
                    "tags": { "amenity": "pharmacy", "name": "Pharmacie Centrale" }
                },
                {
                    "lat": 43.2975, "lon": 5.3698,
                    "tags": { "shop": "bakery" }
                },
                {
                    // No coordinates: skipped
                    "tags": { "shop": "supermarket", "name": "Super U" }
                },
                {
                    "lat": 43.2995, "lon": 5.3698,
                    "tags": { "amenity": "school", "name": "École Saint-Charles" }
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_build_report_sorts_by_distance() {
        let report = build_report(43.2965, 5.3698, fixture());

        assert_eq!(report.places.len(), 3);
        // Closest first: the unnamed bakery (~0.11 km).
        assert_eq!(report.places[0].category, "Boulangerie");
        assert_eq!(report.places[0].name, "Boulangerie"); // name falls back to the label
        assert_eq!(report.places[1].name, "École Saint-Charles");
        assert_eq!(report.places[2].name, "Pharmacie Centrale");

        let distances: Vec<f64> = report.places.iter().map(|p| p.distance_km).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_proximity_score_is_mean_distance() {
        let report = build_report(43.2965, 5.3698, fixture());
        let expected = report.places.iter().map(|p| p.distance_km).sum::<f64>()
            / report.places.len() as f64;
        let score = report.proximity_score_km.unwrap();
        assert!((score - (expected * 100.0).round() / 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_elements() {
        let report = build_report(
            43.2965,
            5.3698,
            serde_json::from_value(serde_json::json!({ "elements": [] })).unwrap(),
        );
        assert!(report.places.is_empty());
        assert!(report.proximity_score_km.is_none());
    }
}
