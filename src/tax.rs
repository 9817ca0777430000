use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::SyncError;
use crate::translate;

/// Whether tax is added on top of (NET) or already contained in (GROSS) a
/// submitted unit price.
#[derive(
    Display,
    EnumString,
    Serialize,
    Deserialize,
    Debug,
    PartialEq,
    Clone,
    Copy,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum CalcType {
    Net,
    Gross,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TaxDefinition {
    pub id: i64,
    /// May arrive in the multilingual wrapper format.
    pub name: String,
    pub percentage: Decimal,
    pub calc_type: CalcType,
}

impl TaxDefinition {
    pub fn display_name(&self, lang: &str) -> String {
        translate::resolve(&self.name, lang)
    }
}

impl fmt::Display for TaxDefinition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({}% {})", self.name, self.percentage, self.calc_type)
    }
}

/// Computes the unit price to submit for one position.
///
/// GROSS prices carry the tax themselves, so the configured rate is
/// inflated by the percentage; NET prices go out unchanged and the remote
/// system adds tax. No currency rounding happens here.
pub fn effective_unit_price(
    price_per_hour: Decimal,
    tax: &TaxDefinition,
) -> Result<Decimal, SyncError> {
    if tax.percentage.is_sign_negative() {
        return Err(SyncError::InvalidTax {
            name: tax.name.clone(),
            reason: format!("negative percentage {}", tax.percentage),
        });
    }
    Ok(match tax.calc_type {
        CalcType::Net => price_per_hour,
        CalcType::Gross => {
            price_per_hour
                * (Decimal::ONE + tax.percentage / Decimal::ONE_HUNDRED)
        }
    })
}
