use std::fmt;

use chrono::{Days, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Day 25569 in spreadsheet serial counting is the Unix epoch.
const SERIAL_EPOCH_OFFSET: i64 = 25569;

/// Inclusive date range rows are billed for.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
pub struct Period {
    pub from: NaiveDate,
    pub until: NaiveDate,
}

impl Period {
    pub fn new(from: NaiveDate, until: NaiveDate) -> Self {
        Self { from, until }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.until
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} — {}", self.from, self.until)
    }
}

/// One raw spreadsheet cell as the sheet API hands it over.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(untagged)]
pub enum Cell {
    Bool(bool),
    Number(Decimal),
    Text(String),
}

/// An unparsed sheet row. The index is the 1-based sheet row number and
/// stays attached through the whole pipeline for the billed write-back.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct RawRow {
    pub index: u32,
    pub cells: Vec<Cell>,
}

/// A normalized time-tracking record.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct SpreadsheetRow {
    pub row_index: u32,
    pub date: NaiveDate,
    pub client: String,
    pub project: String,
    pub description: String,
    pub hours: Decimal,
    pub price_per_hour: Decimal,
    /// Informational only; line totals are recomputed downstream.
    pub total: Decimal,
    pub billed: bool,
}

/// Converts a raw row into a typed one.
///
/// The date cell is either an ISO string or a serial day count. Missing or
/// blank numeric cells default to zero and a missing billed flag to false;
/// a present but unparseable numeric value is an error.
pub fn normalize(raw: &RawRow) -> Result<SpreadsheetRow, SyncError> {
    Ok(SpreadsheetRow {
        row_index: raw.index,
        date: date_cell(raw, 0)?,
        client: text_cell(raw, 1),
        project: text_cell(raw, 2),
        description: text_cell(raw, 3),
        hours: number_cell(raw, 4)?,
        price_per_hour: number_cell(raw, 5)?,
        total: number_cell(raw, 6)?,
        billed: bool_cell(raw, 7),
    })
}

/// Keeps rows inside the period whose billed flag matches `billed`.
pub fn select_in_range(
    rows: Vec<SpreadsheetRow>,
    period: &Period,
    billed: bool,
) -> Vec<SpreadsheetRow> {
    rows.into_iter()
        .filter(|row| period.contains(row.date) && row.billed == billed)
        .collect()
}

fn date_cell(raw: &RawRow, column: usize) -> Result<NaiveDate, SyncError> {
    let invalid = |value: &dyn fmt::Debug| SyncError::InvalidDate {
        row: raw.index,
        value: format!("{:?}", value),
    };

    match raw.cells.get(column) {
        Some(Cell::Text(text)) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map_err(|_| invalid(text)),
        Some(Cell::Number(serial)) => serial_to_date(*serial)
            .ok_or_else(|| invalid(serial)),
        Some(Cell::Bool(flag)) => Err(invalid(flag)),
        None => Err(invalid(&"")),
    }
}

/// `date = epoch + (serial - 25569) days`; fractional day parts (time of
/// day) are dropped.
fn serial_to_date(serial: Decimal) -> Option<NaiveDate> {
    let days = serial.floor().to_i64()? - SERIAL_EPOCH_OFFSET;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    if days >= 0 {
        epoch.checked_add_days(Days::new(days as u64))
    } else {
        epoch.checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

fn text_cell(raw: &RawRow, column: usize) -> String {
    match raw.cells.get(column) {
        Some(Cell::Text(text)) => text.clone(),
        Some(Cell::Number(number)) => number.to_string(),
        Some(Cell::Bool(flag)) => flag.to_string(),
        None => String::new(),
    }
}

fn number_cell(raw: &RawRow, column: usize) -> Result<Decimal, SyncError> {
    let invalid = |value: &dyn fmt::Debug| SyncError::InvalidNumber {
        row: raw.index,
        value: format!("{:?}", value),
    };

    match raw.cells.get(column) {
        Some(Cell::Number(number)) => Ok(*number),
        Some(Cell::Text(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Ok(Decimal::ZERO)
            } else {
                trimmed.parse().map_err(|_| invalid(text))
            }
        }
        Some(Cell::Bool(flag)) => Err(invalid(flag)),
        None => Ok(Decimal::ZERO),
    }
}

fn bool_cell(raw: &RawRow, column: usize) -> bool {
    match raw.cells.get(column) {
        Some(Cell::Bool(flag)) => *flag,
        Some(Cell::Text(text)) => text.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
