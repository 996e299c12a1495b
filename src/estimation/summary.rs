//! Market summary reporter - descriptive statistics over the evidence table

use crate::estimation::types::ComparableSale;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// Absolute tolerance band, in €/m², around a zero year-over-year delta.
/// An absolute band rather than a relative one: small samples make
/// relative moves too noisy to label.
const TREND_BAND_EUR_SQM: f64 = 50.0;

/// Coarse direction of the local market across the sampled years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Rising,
    Falling,
    Stable,
    InsufficientData,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Rising => write!(f, "Hausse des prix"),
            Trend::Falling => write!(f, "Baisse des prix"),
            Trend::Stable => write!(f, "Prix stables"),
            Trend::InsufficientData => write!(f, "Données insuffisantes"),
        }
    }
}

/// Descriptive statistics derived from one estimation's evidence table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSummary {
    pub min_price_per_sqm: f64,
    pub max_price_per_sqm: f64,
    pub std_dev: f64,
    pub last_sale_date: Option<NaiveDate>,
    pub trend: Trend,
}

/// Summarizes the evidence table. `None` when the table is empty.
pub fn summarize(evidence: &[ComparableSale]) -> Option<MarketSummary> {
    if evidence.is_empty() {
        return None;
    }

    let prices: Vec<f64> = evidence.iter().map(|row| row.price_per_sqm).collect();
    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let last_sale_date = evidence.iter().filter_map(|row| row.sale_date).max();

    Some(MarketSummary {
        min_price_per_sqm: min,
        max_price_per_sqm: max,
        std_dev: sample_std_dev(&prices),
        last_sale_date,
        trend: trend(evidence),
    })
}

/// Sample standard deviation (n − 1 divisor). Zero for fewer than two
/// values.
fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values
        .iter()
        .map(|v| (v - mean).powi(2))
        .sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Compares the earliest sampled year's mean price/m² against the
/// latest year's. Undated rows do not contribute.
fn trend(evidence: &[ComparableSale]) -> Trend {
    let mut by_year: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for row in evidence {
        if let Some(date) = row.sale_date {
            let entry = by_year.entry(date.year()).or_insert((0.0, 0));
            entry.0 += row.price_per_sqm;
            entry.1 += 1;
        }
    }

    let yearly_means: Vec<f64> = by_year
        .values()
        .map(|&(sum, count)| sum / count as f64)
        .collect();

    let (Some(earliest), Some(latest)) = (yearly_means.first(), yearly_means.last()) else {
        return Trend::InsufficientData;
    };
    if yearly_means.len() < 2 {
        return Trend::InsufficientData;
    }

    let delta = *latest - *earliest;
    if delta > TREND_BAND_EUR_SQM {
        Trend::Rising
    } else if delta < -TREND_BAND_EUR_SQM {
        Trend::Falling
    } else {
        Trend::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(price_per_sqm: f64, date: Option<(i32, u32, u32)>) -> ComparableSale {
        ComparableSale {
            address: "RUE PARADIS, MARSEILLE 1ER".to_string(),
            price_per_sqm,
            area_sqm: 50.0,
            price_eur: price_per_sqm * 50.0,
            distance_km: 0.4,
            sale_date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
        }
    }

    #[test]
    fn test_empty_evidence_has_no_summary() {
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn test_min_max_and_last_sale() {
        let summary = summarize(&[
            row(3200.0, Some((2022, 3, 1))),
            row(2800.0, Some((2023, 11, 20))),
            row(3000.0, Some((2023, 5, 4))),
        ])
        .unwrap();

        assert!((summary.min_price_per_sqm - 2800.0).abs() < 1e-9);
        assert!((summary.max_price_per_sqm - 3200.0).abs() < 1e-9);
        assert_eq!(
            summary.last_sale_date,
            NaiveDate::from_ymd_opt(2023, 11, 20)
        );
    }

    #[test]
    fn test_std_dev() {
        let summary = summarize(&[
            row(3000.0, None),
            row(3100.0, None),
            row(3200.0, None),
        ])
        .unwrap();

        // Sample std dev of {3000, 3100, 3200} is 100.
        assert!((summary.std_dev - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_std_dev_single_row_is_zero() {
        let summary = summarize(&[row(3000.0, Some((2023, 1, 1)))]).unwrap();
        assert!(summary.std_dev.abs() < 1e-9);
    }

    #[test]
    fn test_trend_insufficient_with_one_year() {
        let summary = summarize(&[
            row(3000.0, Some((2023, 1, 1))),
            row(3400.0, Some((2023, 9, 1))),
        ])
        .unwrap();
        assert_eq!(summary.trend, Trend::InsufficientData);
    }

    #[test]
    fn test_trend_insufficient_without_dates() {
        let summary = summarize(&[row(3000.0, None), row(3400.0, None)]).unwrap();
        assert_eq!(summary.trend, Trend::InsufficientData);
    }

    #[test]
    fn test_trend_rising() {
        let summary = summarize(&[
            row(3000.0, Some((2021, 6, 1))),
            row(3200.0, Some((2023, 6, 1))),
        ])
        .unwrap();
        assert_eq!(summary.trend, Trend::Rising);
    }

    #[test]
    fn test_trend_falling() {
        let summary = summarize(&[
            row(3200.0, Some((2021, 6, 1))),
            row(3000.0, Some((2023, 6, 1))),
        ])
        .unwrap();
        assert_eq!(summary.trend, Trend::Falling);
    }

    #[test]
    fn test_trend_band_edge_is_stable() {
        // Delta of exactly +50 stays inside the band.
        let summary = summarize(&[
            row(3000.0, Some((2021, 6, 1))),
            row(3050.0, Some((2023, 6, 1))),
        ])
        .unwrap();
        assert_eq!(summary.trend, Trend::Stable);
    }

    #[test]
    fn test_trend_uses_yearly_means() {
        // 2021 mean 3000, 2023 mean 3075: rising despite one flat sale.
        let summary = summarize(&[
            row(3000.0, Some((2021, 2, 1))),
            row(3150.0, Some((2023, 3, 1))),
            row(3000.0, Some((2023, 8, 1))),
        ])
        .unwrap();
        assert_eq!(summary.trend, Trend::Rising);
    }

    #[test]
    fn test_trend_labels() {
        assert_eq!(Trend::Rising.to_string(), "Hausse des prix");
        assert_eq!(Trend::Stable.to_string(), "Prix stables");
    }
}
