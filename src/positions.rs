use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::VariantNames;
use strum_macros::{Display, EnumString, VariantNames};

use crate::error::SyncError;
use crate::rows::SpreadsheetRow;

/// One billable group of rows sharing client and project.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Position {
    pub client: String,
    pub project: String,
    /// Date of the first row in the group.
    pub date: NaiveDate,
    /// Bullet list of the contributing row descriptions, in row order.
    pub description: String,
    pub hours: Decimal,
    /// Rate of the first row in the group; it prices the whole group.
    pub price_per_hour: Decimal,
    pub total: Decimal,
    /// Sheet rows folded into this position, for the billed write-back.
    pub row_indexes: Vec<u32>,
}

impl Position {
    fn seed(row: &SpreadsheetRow) -> Self {
        Self {
            client: row.client.clone(),
            project: row.project.clone(),
            date: row.date,
            description: format!("- {}\n", row.description),
            hours: row.hours,
            price_per_hour: row.price_per_hour,
            total: row.total,
            row_indexes: vec![row.row_index],
        }
    }

    fn fold(&mut self, row: &SpreadsheetRow) {
        self.description.push_str(&format!("- {}\n", row.description));
        self.hours += row.hours;
        self.total += row.total;
        self.row_indexes.push(row.row_index);
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}: {} ({} h @ {})",
            self.client, self.project, self.hours, self.price_per_hour
        )
    }
}

/// Keeps only rows whose client is in the allow-list.
pub fn filter_by_clients(
    rows: Vec<SpreadsheetRow>,
    clients: &[String],
) -> Vec<SpreadsheetRow> {
    rows.into_iter()
        .filter(|row| clients.contains(&row.client))
        .collect()
}

/// Groups rows into positions by (client, project), preserving first-seen
/// group order and the row order within each group.
pub fn aggregate(rows: &[SpreadsheetRow]) -> Vec<Position> {
    let mut positions: Vec<Position> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for row in rows {
        let key = (row.client.clone(), row.project.clone());
        match index.get(&key) {
            Some(&at) => positions[at].fold(row),
            None => {
                index.insert(key, positions.len());
                positions.push(Position::seed(row));
            }
        }
    }
    positions
}

/// The closed set of fields positions may be ordered by.
#[derive(
    Display,
    EnumString,
    VariantNames,
    Serialize,
    Deserialize,
    Debug,
    PartialEq,
    Clone,
    Copy,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    None,
    Date,
    Client,
    Project,
    Hours,
    PricePerHour,
    Total,
}

impl SortKey {
    /// Parses a configured key, rejecting anything outside the closed set
    /// at configuration time rather than at sort time.
    pub fn parse(value: &str) -> Result<Self, SyncError> {
        Self::from_str(value).map_err(|_| SyncError::UnknownSortKey {
            given: value.to_string(),
            allowed: Self::VARIANTS.join(", "),
        })
    }
}

/// Stably orders positions ascending by the given key. `none` keeps the
/// aggregation order untouched.
pub fn order(mut positions: Vec<Position>, key: SortKey) -> Vec<Position> {
    match key {
        SortKey::None => {}
        SortKey::Date => positions.sort_by(|a, b| a.date.cmp(&b.date)),
        SortKey::Client => {
            positions.sort_by(|a, b| natural_cmp(&a.client, &b.client))
        }
        SortKey::Project => {
            positions.sort_by(|a, b| natural_cmp(&a.project, &b.project))
        }
        SortKey::Hours => positions.sort_by(|a, b| a.hours.cmp(&b.hours)),
        SortKey::PricePerHour => positions
            .sort_by(|a, b| a.price_per_hour.cmp(&b.price_per_hour)),
        SortKey::Total => positions.sort_by(|a, b| a.total.cmp(&b.total)),
    }
    positions
}

/// Case-folded comparison that orders embedded digit runs numerically,
/// so "Client 2" sorts before "Client 10".
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().flat_map(char::to_lowercase).peekable();
    let mut right = b.chars().flat_map(char::to_lowercase).peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(lc), Some(rc)) => {
                if lc.is_ascii_digit() && rc.is_ascii_digit() {
                    let ln = take_number(&mut left);
                    let rn = take_number(&mut right);
                    match ln.cmp(&rn) {
                        Ordering::Equal => {}
                        unequal => return unequal,
                    }
                } else {
                    left.next();
                    right.next();
                    match lc.cmp(&rc) {
                        Ordering::Equal => {}
                        unequal => return unequal,
                    }
                }
            }
        }
    }
}

fn take_number<I: Iterator<Item = char>>(
    chars: &mut std::iter::Peekable<I>,
) -> u64 {
    let mut value: u64 = 0;
    while let Some(c) = chars.peek().copied() {
        let Some(digit) = c.to_digit(10) else { break };
        value = value.saturating_mul(10).saturating_add(digit as u64);
        chars.next();
    }
    value
}
