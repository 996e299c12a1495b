//! Lead capture - append-only CSV store
//!
//! One flat file, one row per submission. The schema grows by adding
//! columns: rows are always projected onto the header found in the
//! file, and columns a file predates are backfilled as empty on read.
//! Rows are never mutated except by explicit deletion or reset.

use crate::estimation::types::{PropertyCondition, PropertyKind};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Current column set, in write order. Append-only: new columns go at
/// the end so older files stay readable.
const COLUMNS: &[&str] = &[
    "name",
    "email",
    "phone",
    "address",
    "property_kind",
    "project",
    "condition",
    "floor_area_sqm",
    "estimate_eur",
    "asking_price_eur",
    "callback_requested",
    "submitted_at",
];

/// A captured contact submission tied to one estimation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub property_kind: Option<PropertyKind>,
    pub project: String,
    pub condition: Option<PropertyCondition>,
    pub floor_area_sqm: Option<f64>,
    /// The estimate shown to the submitter, absent when no comparable
    /// sales were found.
    pub estimate_eur: Option<f64>,
    pub asking_price_eur: Option<f64>,
    #[serde(default)]
    pub callback_requested: bool,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Append-only store over one CSV file.
#[derive(Debug, Clone)]
pub struct LeadStore {
    path: PathBuf,
}

impl LeadStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one lead. Creates the file with the current header when
    /// absent; otherwise the row is projected onto the header already
    /// in the file.
    pub fn append(&self, lead: &Lead) -> Result<()> {
        if self.is_missing_or_empty() {
            let mut writer = csv::Writer::from_path(&self.path)
                .with_context(|| format!("creating lead store at {:?}", self.path))?;
            writer.write_record(COLUMNS)?;
            writer.write_record(COLUMNS.iter().map(|col| field_value(lead, col)))?;
            writer.flush()?;
            info!("created lead store at {:?}", self.path);
            return Ok(());
        }

        let header = self.read_header()?;
        let file = fs::OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(header.iter().map(|col| field_value(lead, col)))?;
        writer.flush()?;

        Ok(())
    }

    /// Reads every lead. Columns missing from the file come back empty.
    pub fn read_all(&self) -> Result<Vec<Lead>> {
        if self.is_missing_or_empty() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("opening lead store at {:?}", self.path))?;
        let header = reader.headers()?.clone();

        let mut leads = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            match result {
                Ok(record) => leads.push(lead_from_record(&header, &record)),
                Err(e) => warn!("skipping malformed lead row {idx}: {e}"),
            }
        }

        Ok(leads)
    }

    /// Deletes one row by position (0-based over data rows). Returns
    /// false when the index is out of range. Unknown columns in the
    /// file survive the rewrite untouched.
    pub fn delete_at(&self, index: usize) -> Result<bool> {
        if self.is_missing_or_empty() {
            return Ok(false);
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let header = reader.headers()?.clone();
        let mut rows: Vec<csv::StringRecord> =
            reader.records().collect::<std::result::Result<_, _>>()?;

        if index >= rows.len() {
            return Ok(false);
        }
        rows.remove(index);

        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(&header)?;
        for row in &rows {
            writer.write_record(row)?;
        }
        writer.flush()?;

        info!("deleted lead {} from {:?}", index, self.path);
        Ok(true)
    }

    /// Deletes every row, leaving the current header.
    pub fn reset(&self) -> Result<()> {
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(COLUMNS)?;
        writer.flush()?;

        info!("reset lead store at {:?}", self.path);
        Ok(())
    }

    fn is_missing_or_empty(&self) -> bool {
        fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true)
    }

    fn read_header(&self) -> Result<csv::StringRecord> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        Ok(reader.headers()?.clone())
    }
}

/// Serializes one field for the given column name. Columns this build
/// does not know about are written empty.
fn field_value(lead: &Lead, column: &str) -> String {
    match column {
        "name" => lead.name.clone(),
        "email" => lead.email.clone(),
        "phone" => lead.phone.clone(),
        "address" => lead.address.clone(),
        "property_kind" => lead.property_kind.map(kind_token).unwrap_or_default().to_string(),
        "project" => lead.project.clone(),
        "condition" => lead
            .condition
            .map(condition_token)
            .unwrap_or_default()
            .to_string(),
        "floor_area_sqm" => lead
            .floor_area_sqm
            .map(|v| v.to_string())
            .unwrap_or_default(),
        "estimate_eur" => lead.estimate_eur.map(|v| v.to_string()).unwrap_or_default(),
        "asking_price_eur" => lead
            .asking_price_eur
            .map(|v| v.to_string())
            .unwrap_or_default(),
        "callback_requested" => if lead.callback_requested { "true" } else { "false" }.to_string(),
        "submitted_at" => lead
            .submitted_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn column_value<'a>(
    header: &csv::StringRecord,
    record: &'a csv::StringRecord,
    column: &str,
) -> &'a str {
    header
        .iter()
        .position(|h| h == column)
        .and_then(|idx| record.get(idx))
        .unwrap_or("")
}

fn lead_from_record(header: &csv::StringRecord, record: &csv::StringRecord) -> Lead {
    let get = |column: &str| column_value(header, record, column);

    Lead {
        name: get("name").to_string(),
        email: get("email").to_string(),
        phone: get("phone").to_string(),
        address: get("address").to_string(),
        property_kind: kind_from_token(get("property_kind")),
        project: get("project").to_string(),
        condition: condition_from_token(get("condition")),
        floor_area_sqm: get("floor_area_sqm").parse().ok(),
        estimate_eur: get("estimate_eur").parse().ok(),
        asking_price_eur: get("asking_price_eur").parse().ok(),
        callback_requested: get("callback_requested") == "true",
        submitted_at: DateTime::parse_from_rfc3339(get("submitted_at"))
            .ok()
            .map(|t| t.with_timezone(&Utc)),
    }
}

fn kind_token(kind: PropertyKind) -> &'static str {
    match kind {
        PropertyKind::Apartment => "apartment",
        PropertyKind::House => "house",
    }
}

fn kind_from_token(token: &str) -> Option<PropertyKind> {
    match token {
        "apartment" => Some(PropertyKind::Apartment),
        "house" => Some(PropertyKind::House),
        _ => None,
    }
}

fn condition_token(condition: PropertyCondition) -> &'static str {
    match condition {
        PropertyCondition::NewOrRenovated => "new_or_renovated",
        PropertyCondition::NeedsRenovation => "needs_renovation",
    }
}

fn condition_from_token(token: &str) -> Option<PropertyCondition> {
    match token {
        "new_or_renovated" => Some(PropertyCondition::NewOrRenovated),
        "needs_renovation" => Some(PropertyCondition::NeedsRenovation),
        _ => None,
    }
}
