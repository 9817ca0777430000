use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::error::SyncError;
use crate::orders::{Order, OrderPayload};
use crate::rows::RawRow;
use crate::tax::TaxDefinition;
use crate::translate;

/// List envelope the accounting service wraps collection responses in.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Envelope<T> {
    #[serde(default)]
    pub total: Option<u64>,
    pub data: T,
}

/// A person orders can be billed to.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Associate {
    pub id: i64,
    pub name: String,
}

/// An order category; its singular name labels the synthesized order.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    /// May arrive in the multilingual wrapper format.
    pub name_singular: String,
    #[serde(default)]
    pub due_days: Option<i64>,
}

impl Category {
    pub fn label(&self, lang: &str) -> String {
        translate::resolve(&self.name_singular, lang)
    }
}

/// A quantity unit, e.g. hours.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Unit {
    pub id: i64,
    /// May arrive in the multilingual wrapper format.
    pub name: String,
}

impl Unit {
    pub fn label(&self, lang: &str) -> String {
        translate::resolve(&self.name, lang)
    }
}

#[derive(Display, Debug, PartialEq, Clone, Copy)]
#[strum(serialize_all = "UPPERCASE")]
pub enum SubmitMode {
    Create,
    Update,
}

/// What the accounting service reports back for a submitted order.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub success: bool,
    #[serde(default)]
    pub insert_id: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    /// Structured error detail, passed along verbatim on rejection.
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

/// Already-authenticated read/write primitives the pipeline consumes. How
/// the data is transported is of no concern here.
pub trait Remote {
    fn fetch_rows(&mut self) -> Result<Vec<RawRow>, SyncError>;
    fn list_taxes(&mut self) -> Result<Vec<TaxDefinition>, SyncError>;
    fn list_units(&mut self) -> Result<Vec<Unit>, SyncError>;
    fn list_associates(&mut self) -> Result<Vec<Associate>, SyncError>;
    fn list_categories(&mut self) -> Result<Vec<Category>, SyncError>;
    fn fetch_order(&mut self, id: i64) -> Result<Order, SyncError>;
    fn submit_order(
        &mut self,
        payload: &OrderPayload,
        mode: SubmitMode,
    ) -> Result<SubmitOutcome, SyncError>;
    /// One batched call flagging all given sheet rows as billed.
    fn flag_rows_billed(&mut self, rows: &[u32]) -> Result<(), SyncError>;
}

/// Credentials for one run, passed explicitly to the transport layer.
#[derive(Debug, Clone)]
pub struct Session {
    /// Accounting service subdomain.
    pub domain: String,
    pub api_key: String,
    pub spreadsheet_id: String,
    pub sheet_name: String,
    /// Token for the spreadsheet service, obtained out of band.
    pub sheet_token: String,
    pub sheet_token_expiry: Option<DateTime<Utc>>,
}

impl Session {
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        self.sheet_token_expiry
            .map(|expiry| expiry <= now)
            .unwrap_or(false)
    }

    /// Call-site check before each spreadsheet request.
    pub fn ensure_fresh(&self) -> Result<(), SyncError> {
        if self.expired(Utc::now()) {
            return Err(SyncError::transport(
                "sheets",
                "access token expired, re-authorize and retry",
            ));
        }
        Ok(())
    }
}

/// Finds a unit whose translated name contains the configured filter.
pub fn find_unit<'a>(
    units: &'a [Unit],
    filter: &str,
    lang: &str,
) -> Result<&'a Unit, SyncError> {
    units
        .iter()
        .find(|unit| unit.label(lang).contains(filter))
        .ok_or_else(|| SyncError::NotFound {
            kind: "unit",
            wanted: filter.to_string(),
            available: join_names(units.iter().map(|u| u.label(lang))),
        })
}

pub fn find_tax<'a>(
    taxes: &'a [TaxDefinition],
    id: i64,
    lang: &str,
) -> Result<&'a TaxDefinition, SyncError> {
    taxes.iter().find(|tax| tax.id == id).ok_or_else(|| {
        SyncError::NotFound {
            kind: "tax",
            wanted: id.to_string(),
            available: join_names(
                taxes.iter().map(|t| {
                    format!("{} ({})", t.display_name(lang), t.id)
                }),
            ),
        }
    })
}

pub fn find_category<'a>(
    categories: &'a [Category],
    id: i64,
    lang: &str,
) -> Result<&'a Category, SyncError> {
    categories.iter().find(|c| c.id == id).ok_or_else(|| {
        SyncError::NotFound {
            kind: "category",
            wanted: id.to_string(),
            available: join_names(
                categories
                    .iter()
                    .map(|c| format!("{} ({})", c.label(lang), c.id)),
            ),
        }
    })
}

fn join_names(names: impl Iterator<Item = String>) -> String {
    let joined: Vec<String> = names.collect();
    if joined.is_empty() {
        "none".to_string()
    } else {
        joined.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn units() -> Vec<Unit> {
        vec![
            Unit {
                id: 3,
                name: "<values><de>Pauschale</de></values>".to_string(),
            },
            Unit {
                id: 4,
                name: "<values><de>Std.</de><en>hrs</en></values>"
                    .to_string(),
            },
        ]
    }

    #[test]
    fn unit_lookup_matches_translated_name() {
        let units = units();
        assert_eq!(find_unit(&units, "Std", "de").unwrap().id, 4);
        assert_eq!(find_unit(&units, "hrs", "en").unwrap().id, 4);
    }

    #[test]
    fn unit_lookup_reports_alternatives() {
        let error = find_unit(&units(), "kg", "de").unwrap_err();
        let message = error.to_string();
        assert!(message.contains("Pauschale"));
        assert!(message.contains("Std."));
    }

    #[test]
    fn tax_lookup_by_id() {
        use crate::tax::CalcType;
        use rust_decimal_macros::dec;

        let taxes = vec![TaxDefinition {
            id: 7,
            name: "MwSt. 8.1%".to_string(),
            percentage: dec!(8.1),
            calc_type: CalcType::Gross,
        }];
        assert_eq!(find_tax(&taxes, 7, "de").unwrap().id, 7);
        assert!(find_tax(&taxes, 8, "de").is_err());
    }

    #[test]
    fn session_expiry_is_checked_against_now() {
        let expiry = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let session = Session {
            domain: "example".to_string(),
            api_key: "key".to_string(),
            spreadsheet_id: "sheet".to_string(),
            sheet_name: "Rechnungen".to_string(),
            sheet_token: "token".to_string(),
            sheet_token_expiry: Some(expiry),
        };
        assert!(!session
            .expired(Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap()));
        assert!(session
            .expired(Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap()));

        let mut open_ended = session.clone();
        open_ended.sheet_token_expiry = None;
        assert!(!open_ended.expired(Utc::now()));
    }
}
