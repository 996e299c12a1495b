// Library module for testable functions

pub mod estimation;
pub mod geo;
pub mod leads;
pub mod pois;

use estimation::types::PropertyCondition;
use serde::Serialize;

/// Reference rent used for the rental projection, in €/m² per month.
pub const REFERENCE_RENT_EUR_SQM: f64 = 12.0;

/// Low/high estimate band around a raw estimate, adjusted by condition:
/// a property needing renovation discounts the low bound, a renovated
/// one stretches the high bound.
pub fn estimate_range(estimate_eur: f64, condition: PropertyCondition) -> (f64, f64) {
    match condition {
        PropertyCondition::NeedsRenovation => (estimate_eur * 0.9, estimate_eur),
        PropertyCondition::NewOrRenovated => (estimate_eur, estimate_eur * 1.1),
    }
}

/// Estimated notary fees: 7.5% on existing stock, 3% on new builds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NotaryFees {
    pub existing_eur: f64,
    pub new_build_eur: f64,
}

pub fn notary_fees(estimate_eur: f64) -> NotaryFees {
    NotaryFees {
        existing_eur: estimate_eur * 0.075,
        new_build_eur: estimate_eur * 0.03,
    }
}

/// Rental projection at the reference rent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RentalProjection {
    pub monthly_rent_eur: f64,
    pub gross_yield_pct: f64,
}

/// Gross yield formula: (monthly_rent × 12 / estimate) × 100
pub fn rental_projection(floor_area_sqm: f64, estimate_eur: f64) -> Option<RentalProjection> {
    if estimate_eur <= 0.0 {
        return None;
    }
    let monthly_rent_eur = floor_area_sqm * REFERENCE_RENT_EUR_SQM;
    Some(RentalProjection {
        monthly_rent_eur,
        gross_yield_pct: (monthly_rent_eur * 12.0 / estimate_eur) * 100.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_range_renovated() {
        let (low, high) = estimate_range(200_000.0, PropertyCondition::NewOrRenovated);
        assert!((low - 200_000.0).abs() < 1e-9);
        assert!((high - 220_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_range_needs_renovation() {
        let (low, high) = estimate_range(200_000.0, PropertyCondition::NeedsRenovation);
        assert!((low - 180_000.0).abs() < 1e-9);
        assert!((high - 200_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_notary_fees() {
        let fees = notary_fees(200_000.0);
        assert!((fees.existing_eur - 15_000.0).abs() < 1e-9);
        assert!((fees.new_build_eur - 6_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_rental_projection() {
        // 50 m² at 12 €/m² = 600 €/month; (600 × 12 / 240000) × 100 = 3%
        let projection = rental_projection(50.0, 240_000.0).unwrap();
        assert!((projection.monthly_rent_eur - 600.0).abs() < 1e-9);
        assert!((projection.gross_yield_pct - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_rental_projection_zero_estimate() {
        assert!(rental_projection(50.0, 0.0).is_none());
    }

    #[test]
    fn test_rental_projection_negative_estimate() {
        assert!(rental_projection(50.0, -100.0).is_none());
    }
}
