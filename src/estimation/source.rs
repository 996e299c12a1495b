//! Transaction record source - yearly DVF bulk files
//!
//! DVF ("Demandes de valeurs foncières") ships as one pipe-delimited text
//! file per year. Rows are noisy: ragged lines, empty fields, locale
//! decimal separators. Row-level problems never abort a load.

use crate::estimation::types::{PropertyKind, TransactionRecord};
use anyhow::Result;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Transaction nature of an eligible record.
const NATURE_SALE: &str = "Vente";

/// Yields one year's worth of sale records matching the categorical
/// filters, or `None` when the year has no data available.
pub trait SaleRecordSource {
    fn load_year(
        &self,
        postal_code: &str,
        kind: PropertyKind,
        year: i32,
    ) -> Result<Option<Vec<TransactionRecord>>>;
}

/// DVF row structure. Only the columns we read are named; the bulk files
/// carry ~40 others that the reader skips by header name.
#[derive(Debug, Deserialize)]
struct DvfRow {
    #[serde(rename = "Code postal")]
    postal_code: Option<String>,

    #[serde(rename = "Type local")]
    kind_label: Option<String>,

    #[serde(rename = "Nature mutation")]
    nature: Option<String>,

    #[serde(rename = "Surface reelle bati")]
    built_area: Option<String>,

    #[serde(rename = "Valeur fonciere")]
    price: Option<String>,

    #[serde(rename = "Voie")]
    street: Option<String>,

    #[serde(rename = "Commune")]
    municipality: Option<String>,

    #[serde(rename = "Date mutation")]
    sale_date: Option<String>, // Format: DD/MM/YYYY
}

/// File-backed source reading `ValeursFoncieres-{year}.txt` from a
/// data directory.
#[derive(Debug, Clone)]
pub struct DvfDirectory {
    dir: PathBuf,
}

impl DvfDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn year_path(&self, year: i32) -> PathBuf {
        self.dir.join(format!("ValeursFoncieres-{year}.txt"))
    }
}

impl SaleRecordSource for DvfDirectory {
    fn load_year(
        &self,
        postal_code: &str,
        kind: PropertyKind,
        year: i32,
    ) -> Result<Option<Vec<TransactionRecord>>> {
        let path = self.year_path(year);
        if !path.exists() {
            // Partial coverage is expected; absence is not an error.
            info!("no DVF file for {year} at {:?}", path);
            return Ok(None);
        }

        Ok(Some(read_dvf_file(&path, postal_code, kind)?))
    }
}

fn read_dvf_file(path: &Path, postal_code: &str, kind: PropertyKind) -> Result<Vec<TransactionRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let mut records = Vec::new();
    let mut row_errors = 0;

    for (idx, result) in reader.deserialize::<DvfRow>().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                row_errors += 1;
                if row_errors <= 5 {
                    // Only log first 5 errors
                    warn!("failed to deserialize row {} of {:?}: {}", idx, path, e);
                }
                continue;
            }
        };

        if let Some(record) = eligible_record(row, postal_code, kind) {
            records.push(record);
        }
    }

    info!(
        "loaded {} candidate sales from {:?} ({} row errors)",
        records.len(),
        path,
        row_errors
    );

    Ok(records)
}

/// Applies the categorical filters: postal code exact match, property
/// type exact match, nature = sale, price and built area both present.
fn eligible_record(row: DvfRow, postal_code: &str, kind: PropertyKind) -> Option<TransactionRecord> {
    let row_postal = non_empty(row.postal_code)?;
    if row_postal != postal_code {
        return None;
    }

    let kind_label = non_empty(row.kind_label)?;
    if kind_label != kind.dvf_label() {
        return None;
    }

    let nature = non_empty(row.nature)?;
    if nature != NATURE_SALE {
        return None;
    }

    let price_raw = non_empty(row.price)?;
    let built_area_raw = non_empty(row.built_area)?;

    Some(TransactionRecord {
        postal_code: row_postal,
        kind_label,
        nature,
        street: row.street.unwrap_or_default().trim().to_string(),
        municipality: row.municipality.unwrap_or_default().trim().to_string(),
        sale_date: row.sale_date.as_deref().and_then(parse_date),
        price_raw,
        built_area_raw,
    })
}

fn non_empty(field: Option<String>) -> Option<String> {
    let value = field?.trim().to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Parse date string in DD/MM/YYYY format
fn parse_date(date_str: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), "%d/%m/%Y").ok()
}
