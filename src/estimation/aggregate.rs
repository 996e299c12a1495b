//! Comparable-sales aggregator - the estimation core
//!
//! Folds yearly DVF records into a trimmed-mean price per m²: parse,
//! geocode, radius-filter, accumulate, trim, average. Every per-record
//! failure is a counted, silent skip; a missing year is a silent skip at
//! the year level. Nothing in here aborts the run.

use crate::estimation::source::SaleRecordSource;
use crate::estimation::types::{ComparableSale, EstimationResult, SkipStats, TargetProperty};
use crate::geo::{haversine_km, Coordinates, Geocoder};
use std::future::Future;
use tracing::{debug, warn};

/// Seam over the geocoding gateway so the fold can be exercised against
/// deterministic resolvers in tests.
pub trait AddressResolver {
    fn resolve(&self, address: &str) -> impl Future<Output = Option<Coordinates>> + Send;
}

impl AddressResolver for Geocoder {
    async fn resolve(&self, address: &str) -> Option<Coordinates> {
        Geocoder::resolve(self, address).await
    }
}

/// Runs one estimation over the requested years.
///
/// `max_plausible_km`, when set, drops records whose geocoded point lies
/// farther from the target than the guard - the address most likely
/// resolved to the wrong municipality. Guard hits surface as one
/// aggregated advisory, never per record.
pub async fn estimate<S, R>(
    source: &S,
    resolver: &R,
    target: &TargetProperty,
    years: &[i32],
    radius_km: f64,
    max_plausible_km: Option<f64>,
) -> EstimationResult
where
    S: SaleRecordSource,
    R: AddressResolver,
{
    let mut sample: Vec<f64> = Vec::new();
    let mut evidence: Vec<ComparableSale> = Vec::new();
    let mut skips = SkipStats::default();

    for &year in years {
        let records = match source.load_year(&target.postal_code, target.kind, year) {
            Ok(Some(records)) => records,
            Ok(None) => continue,
            Err(e) => {
                warn!("skipping {year}: source failed to load: {e}");
                continue;
            }
        };

        for record in records {
            let (price, area) = match (
                parse_decimal(&record.price_raw),
                parse_decimal(&record.built_area_raw),
            ) {
                (Some(price), Some(area)) if area > 0.0 => (price, area),
                _ => {
                    skips.unparseable += 1;
                    continue;
                }
            };

            let coords = match resolver.resolve(&record.composite_address()).await {
                Some(coords) => coords,
                None => {
                    skips.geocode_failed += 1;
                    continue;
                }
            };

            let distance_km = haversine_km(
                target.coordinates.lat,
                target.coordinates.lon,
                coords.lat,
                coords.lon,
            );

            if let Some(max_km) = max_plausible_km {
                if distance_km > max_km {
                    skips.implausible += 1;
                    continue;
                }
            }

            if distance_km > radius_km {
                skips.out_of_radius += 1;
                continue;
            }

            let price_per_sqm = price / area;
            sample.push(price_per_sqm);
            evidence.push(ComparableSale {
                address: format!("{}, {}", record.street, record.municipality),
                price_per_sqm: round2(price_per_sqm),
                area_sqm: area,
                price_eur: price,
                distance_km: round2(distance_km),
                sale_date: record.sale_date,
            });
        }
    }

    if let Some(max_km) = max_plausible_km {
        if skips.implausible > 0 {
            warn!(
                "{} sales geocoded more than {max_km} km from the target; their addresses \
                 likely resolved to the wrong municipality",
                skips.implausible
            );
        }
    }
    if skips.total() > 0 {
        debug!("skipped records: {skips}");
    }

    if sample.is_empty() {
        return EstimationResult {
            price_per_sqm: None,
            sample_size: 0,
            evidence,
            skips,
        };
    }

    let trimmed = trim_outliers(&sample);

    EstimationResult {
        price_per_sqm: Some(mean(&trimmed)),
        sample_size: trimmed.len(),
        evidence,
        skips,
    }
}

/// Parses a DVF numeric field, accepting the comma decimal separator.
fn parse_decimal(raw: &str) -> Option<f64> {
    raw.trim().replace(',', ".").parse::<f64>().ok()
}

/// Discards values outside the [p10, p90] band of the distribution.
/// Falls back to the untrimmed sample when the trim would empty it.
/// Accumulation order is preserved; ties count as separate entries.
fn trim_outliers(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let p10 = percentile(&sorted, 0.10);
    let p90 = percentile(&sorted, 0.90);

    let trimmed: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| *v >= p10 && *v <= p90)
        .collect();

    if trimmed.is_empty() {
        values.to_vec()
    } else {
        trimmed
    }
}

/// Percentile with linear interpolation between ranks. `sorted` must be
/// non-empty and ascending.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
