//! Core data types for the estimation pipeline
//! Pure data structures with no behavior

use crate::geo::Coordinates;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Property categories recognized by the DVF bulk files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Apartment,
    House,
}

impl PropertyKind {
    /// The `Type local` label used in DVF files.
    pub fn dvf_label(&self) -> &'static str {
        match self {
            PropertyKind::Apartment => "Appartement",
            PropertyKind::House => "Maison",
        }
    }
}

impl std::fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dvf_label())
    }
}

/// Declared condition of the target property, drives the estimate band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyCondition {
    NewOrRenovated,
    NeedsRenovation,
}

/// The subject of an estimation run. Built from user input plus one
/// geocoding call; immutable afterwards.
#[derive(Debug, Clone)]
pub struct TargetProperty {
    pub coordinates: Coordinates,
    pub postal_code: String,
    pub kind: PropertyKind,
    pub floor_area_sqm: f64,
}

/// One historical sale row as found in a DVF yearly file, after
/// categorical filtering. Price and built area stay raw here: DVF uses
/// comma decimal separators and malformed values are common, so numeric
/// parsing happens in the aggregation fold where a failure is a counted
/// per-record skip.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub postal_code: String,
    pub kind_label: String,
    pub nature: String,
    pub street: String,
    pub municipality: String,
    pub sale_date: Option<NaiveDate>,
    pub price_raw: String,
    pub built_area_raw: String,
}

impl TransactionRecord {
    /// Composite address used for geocoding: street, postal code,
    /// municipality. The postal code pins the lookup to the right
    /// municipality when street names repeat across France.
    pub fn composite_address(&self) -> String {
        format!(
            "{}, {} {}",
            self.street.trim(),
            self.postal_code.trim(),
            self.municipality.trim()
        )
    }
}

/// One evidence row: a geographically eligible comparable sale. The
/// table keeps every in-radius sale regardless of statistical trimming.
/// Monetary-per-area and distance figures are rounded to two decimals,
/// matching what the row is for (display).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparableSale {
    pub address: String,
    pub price_per_sqm: f64,
    pub area_sqm: f64,
    pub price_eur: f64,
    pub distance_km: f64,
    pub sale_date: Option<NaiveDate>,
}

/// Output of one estimation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimationResult {
    /// Trimmed-mean price per m², `None` when no comparable sale
    /// survived the radius filter.
    pub price_per_sqm: Option<f64>,
    /// Sample size after trimming.
    pub sample_size: usize,
    pub evidence: Vec<ComparableSale>,
    pub skips: SkipStats,
}

/// Per-record skip counters. Individual skips are silent; these feed a
/// single aggregated advisory log line per run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SkipStats {
    pub unparseable: usize,
    pub geocode_failed: usize,
    pub implausible: usize,
    pub out_of_radius: usize,
}

impl SkipStats {
    pub fn total(&self) -> usize {
        self.unparseable + self.geocode_failed + self.implausible + self.out_of_radius
    }
}

impl std::fmt::Display for SkipStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unparseable: {}, geocode failed: {}, implausible: {}, out of radius: {}",
            self.unparseable, self.geocode_failed, self.implausible, self.out_of_radius
        )
    }
}
