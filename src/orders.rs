use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{Display, EnumString};

use crate::error::SyncError;
use crate::positions::Position;
use crate::rows::Period;
use crate::tax::{self, TaxDefinition};

/// One priced, taxed entry of an order.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub account_id: i64,
    pub name: String,
    pub description: String,
    pub quantity: Decimal,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub unit_price: Decimal,
    pub unit_id: i64,
    pub tax_id: i64,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum ItemType {
    Article,
    Text,
    Pagebreak,
    Subtotal,
    Title,
    Optiontotal,
}

/// The items collection as the remote system may deliver it: already an
/// array, or the same array packed into a JSON string.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(untagged)]
pub enum ItemsField {
    Decoded(Vec<LineItem>),
    Encoded(String),
}

impl ItemsField {
    /// Canonical in-memory form; the encoded variant is parsed once here
    /// at the boundary.
    pub fn into_items(self) -> Result<Vec<LineItem>, SyncError> {
        match self {
            ItemsField::Decoded(items) => Ok(items),
            ItemsField::Encoded(text) => Ok(serde_json::from_str(&text)?),
        }
    }
}

/// Packs line items into the string form every outbound payload carries.
pub fn encode_items(items: &[LineItem]) -> Result<String, SyncError> {
    Ok(serde_json::to_string(items)?)
}

/// A remote order, partially modeled. Fields this engine never touches are
/// kept verbatim in `rest` so an update does not clobber them.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    #[serde(default)]
    pub nr: Option<String>,
    pub associate_id: i64,
    pub category_id: i64,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_days: Option<i64>,
    #[serde(default)]
    pub items: Option<ItemsField>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// The payload handed to the write collaborator.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    /// Present only when updating an existing order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub associate_id: i64,
    pub category_id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub due_days: i64,
    /// Always the encoded string form on the wire.
    pub items: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// How line items of an existing order and a fresh synthesis combine.
#[derive(Display, EnumString, Debug, PartialEq, Clone, Copy)]
#[strum(serialize_all = "lowercase")]
pub enum MergeMode {
    Append,
    Replace,
}

/// Everything the synthesizer needs besides the positions themselves.
pub struct Synthesis<'a> {
    pub associate_id: i64,
    pub category_id: i64,
    /// Category label with its translation already resolved.
    pub category_label: String,
    pub period: Period,
    pub account_id: i64,
    pub unit_id: i64,
    pub tax: &'a TaxDefinition,
    pub language: String,
    pub due_days: i64,
    pub notes: Option<String>,
    pub today: NaiveDate,
}

impl Synthesis<'_> {
    fn line_item(&self, position: &Position) -> Result<LineItem, SyncError> {
        Ok(LineItem {
            account_id: self.account_id,
            name: format!("{}: {}", position.client, position.project),
            description: position.description.clone(),
            quantity: position.hours,
            item_type: ItemType::Article,
            unit_price: tax::effective_unit_price(
                position.price_per_hour,
                self.tax,
            )?,
            unit_id: self.unit_id,
            tax_id: self.tax.id,
        })
    }

    fn description(&self) -> String {
        format!(
            "{} {}-{}",
            self.category_label,
            localized_date(self.period.from, &self.language),
            localized_date(self.period.until, &self.language),
        )
    }
}

/// Builds a create payload from aggregated positions.
pub fn synthesize(
    positions: &[Position],
    ctx: &Synthesis,
) -> Result<OrderPayload, SyncError> {
    let items: Vec<LineItem> = positions
        .iter()
        .map(|position| ctx.line_item(position))
        .collect::<Result<_, _>>()?;

    Ok(OrderPayload {
        id: None,
        associate_id: ctx.associate_id,
        category_id: ctx.category_id,
        date: ctx.today,
        description: ctx.description(),
        due_days: ctx.due_days,
        items: encode_items(&items)?,
        language: ctx.language.to_uppercase(),
        notes: ctx.notes.clone(),
        rest: Map::new(),
    })
}

/// Folds a fresh payload into an existing remote order. Fields this engine
/// does not model travel through `rest` untouched in both modes.
///
/// REPLACE takes the fresh run fields and items wholesale; APPEND keeps
/// every existing field except description, date, notes and items, and
/// concatenates the existing items (stored order first) with the fresh
/// ones.
pub fn merge(
    existing: Order,
    fresh: OrderPayload,
    mode: MergeMode,
) -> Result<OrderPayload, SyncError> {
    match mode {
        MergeMode::Replace => Ok(OrderPayload {
            id: Some(existing.id),
            rest: existing.rest,
            ..fresh
        }),
        MergeMode::Append => {
            let mut items = match existing.items {
                Some(field) => field.into_items()?,
                None => Vec::new(),
            };
            let fresh_items: Vec<LineItem> =
                serde_json::from_str(&fresh.items)?;
            items.extend(fresh_items);

            Ok(OrderPayload {
                id: Some(existing.id),
                associate_id: existing.associate_id,
                category_id: existing.category_id,
                date: fresh.date,
                description: fresh.description,
                due_days: existing.due_days.unwrap_or(fresh.due_days),
                items: encode_items(&items)?,
                language: existing.language.unwrap_or(fresh.language),
                notes: fresh.notes,
                rest: existing.rest,
            })
        }
    }
}

/// Long-form date the way the original tool printed it for the order
/// description, e.g. "31. Januar 2025" for German.
pub fn localized_date(date: NaiveDate, lang: &str) -> String {
    let month = date.month0() as usize;
    match lang.to_lowercase().as_str() {
        "de" => format!(
            "{}. {} {}",
            date.day(),
            MONTHS_DE[month],
            date.year()
        ),
        "en" => format!(
            "{} {}, {}",
            MONTHS_EN[month],
            date.day(),
            date.year()
        ),
        "fr" => format!("{} {} {}", date.day(), MONTHS_FR[month], date.year()),
        "it" => format!("{} {} {}", date.day(), MONTHS_IT[month], date.year()),
        _ => date.to_string(),
    }
}

const MONTHS_DE: [&str; 12] = [
    "Januar", "Februar", "März", "April", "Mai", "Juni", "Juli", "August",
    "September", "Oktober", "November", "Dezember",
];
const MONTHS_EN: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August",
    "September", "October", "November", "December",
];
const MONTHS_FR: [&str; 12] = [
    "janvier", "février", "mars", "avril", "mai", "juin", "juillet", "août",
    "septembre", "octobre", "novembre", "décembre",
];
const MONTHS_IT: [&str; 12] = [
    "gennaio", "febbraio", "marzo", "aprile", "maggio", "giugno", "luglio",
    "agosto", "settembre", "ottobre", "novembre", "dicembre",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::CalcType;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn tax() -> TaxDefinition {
        TaxDefinition {
            id: 7,
            name: "MwSt. 8.1%".to_string(),
            percentage: dec!(8.1),
            calc_type: CalcType::Gross,
        }
    }

    fn item(name: &str) -> LineItem {
        LineItem {
            account_id: 3200,
            name: name.to_string(),
            description: "- work\n".to_string(),
            quantity: dec!(1),
            item_type: ItemType::Article,
            unit_price: dec!(108.1),
            unit_id: 4,
            tax_id: 7,
        }
    }

    fn position() -> Position {
        Position {
            client: "Acme".to_string(),
            project: "Website".to_string(),
            date: ymd(2025, 1, 10),
            description: "- Design\n- Dev\n".to_string(),
            hours: dec!(5),
            price_per_hour: dec!(100),
            total: dec!(500),
            row_indexes: vec![2, 3],
        }
    }

    fn synthesis(tax: &TaxDefinition) -> Synthesis {
        Synthesis {
            associate_id: 12,
            category_id: 4,
            category_label: "Rechnung".to_string(),
            period: Period::new(ymd(2025, 1, 1), ymd(2025, 1, 31)),
            account_id: 3200,
            unit_id: 4,
            tax,
            language: "de".to_string(),
            due_days: 10,
            notes: Some("created by billsync".to_string()),
            today: ymd(2025, 2, 3),
        }
    }

    #[test]
    fn synthesizes_taxed_line_items() {
        let tax = tax();
        let payload = synthesize(&[position()], &synthesis(&tax)).unwrap();

        assert_eq!(payload.date, ymd(2025, 2, 3));
        assert_eq!(
            payload.description,
            "Rechnung 1. Januar 2025-31. Januar 2025"
        );
        assert_eq!(payload.language, "DE");

        let items: Vec<LineItem> =
            serde_json::from_str(&payload.items).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Acme: Website");
        assert_eq!(items[0].quantity, dec!(5));
        assert_eq!(items[0].unit_price, dec!(108.1));
        assert_eq!(items[0].item_type, ItemType::Article);
    }

    #[test]
    fn append_keeps_existing_items_first() {
        let existing = Order {
            id: 55,
            nr: Some("RE-7".to_string()),
            associate_id: 12,
            category_id: 4,
            date: ymd(2025, 1, 5),
            description: Some("old".to_string()),
            due_days: Some(30),
            items: Some(ItemsField::Decoded(vec![item("A"), item("B")])),
            language: Some("DE".to_string()),
            notes: Some("keep me? no".to_string()),
            rest: Map::new(),
        };
        let tax = tax();
        let mut fresh = synthesize(&[position()], &synthesis(&tax)).unwrap();
        fresh.items =
            encode_items(&[item("C"), item("D")]).unwrap();

        let merged = merge(existing, fresh.clone(), MergeMode::Append)
            .unwrap();
        let names: Vec<String> =
            serde_json::from_str::<Vec<LineItem>>(&merged.items)
                .unwrap()
                .into_iter()
                .map(|i| i.name)
                .collect();

        assert_eq!(names, vec!["A", "B", "C", "D"]);
        assert_eq!(merged.id, Some(55));
        // synthesized values win for the run-scoped fields
        assert_eq!(merged.description, fresh.description);
        assert_eq!(merged.date, fresh.date);
        assert_eq!(merged.notes, fresh.notes);
        // everything else stays with the existing order
        assert_eq!(merged.due_days, 30);
    }

    #[test]
    fn append_decodes_pre_serialized_items() {
        let encoded =
            serde_json::to_string(&vec![item("A"), item("B")]).unwrap();
        let existing = Order {
            id: 55,
            nr: None,
            associate_id: 12,
            category_id: 4,
            date: ymd(2025, 1, 5),
            description: None,
            due_days: None,
            items: Some(ItemsField::Encoded(encoded)),
            language: None,
            notes: None,
            rest: Map::new(),
        };
        let tax = tax();
        let mut fresh = synthesize(&[position()], &synthesis(&tax)).unwrap();
        fresh.items = encode_items(&[item("C")]).unwrap();

        let merged = merge(existing, fresh, MergeMode::Append).unwrap();
        let items: Vec<LineItem> =
            serde_json::from_str(&merged.items).unwrap();
        let names: Vec<&str> =
            items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn replace_takes_fresh_items_wholesale() {
        let existing = Order {
            id: 55,
            nr: None,
            associate_id: 99,
            category_id: 9,
            date: ymd(2025, 1, 5),
            description: None,
            due_days: Some(30),
            items: Some(ItemsField::Decoded(vec![item("A"), item("B")])),
            language: None,
            notes: None,
            rest: Map::new(),
        };
        let tax = tax();
        let mut fresh = synthesize(&[position()], &synthesis(&tax)).unwrap();
        fresh.items = encode_items(&[item("C"), item("D")]).unwrap();

        let merged = merge(existing, fresh.clone(), MergeMode::Replace)
            .unwrap();
        assert_eq!(merged.id, Some(55));
        assert_eq!(merged.items, fresh.items);
        assert_eq!(merged.associate_id, fresh.associate_id);
        assert_eq!(merged.due_days, fresh.due_days);
    }

    #[test]
    fn replace_preserves_unmodeled_fields() {
        let mut rest = Map::new();
        rest.insert("statusId".to_string(), json!(18));
        rest.insert("currencyCode".to_string(), json!("CHF"));
        let existing = Order {
            id: 55,
            nr: None,
            associate_id: 12,
            category_id: 4,
            date: ymd(2025, 1, 5),
            description: None,
            due_days: None,
            items: Some(ItemsField::Decoded(vec![item("A")])),
            language: None,
            notes: None,
            rest,
        };
        let tax = tax();
        let fresh = synthesize(&[position()], &synthesis(&tax)).unwrap();

        let merged = merge(existing, fresh, MergeMode::Replace).unwrap();
        assert_eq!(merged.rest.get("statusId"), Some(&json!(18)));
        assert_eq!(merged.rest.get("currencyCode"), Some(&json!("CHF")));
    }

    #[test]
    fn append_preserves_unmodeled_fields() {
        let mut rest = Map::new();
        rest.insert("statusId".to_string(), json!(18));
        rest.insert("currencyCode".to_string(), json!("CHF"));
        let existing = Order {
            id: 55,
            nr: None,
            associate_id: 12,
            category_id: 4,
            date: ymd(2025, 1, 5),
            description: None,
            due_days: None,
            items: None,
            language: None,
            notes: None,
            rest,
        };
        let tax = tax();
        let fresh = synthesize(&[position()], &synthesis(&tax)).unwrap();

        let merged = merge(existing, fresh, MergeMode::Append).unwrap();
        assert_eq!(merged.rest.get("statusId"), Some(&json!(18)));
        assert_eq!(merged.rest.get("currencyCode"), Some(&json!("CHF")));
    }

    #[test]
    fn order_roundtrips_items_variants() {
        let order: Order = serde_json::from_value(json!({
            "id": 55,
            "associateId": 12,
            "categoryId": 4,
            "date": "2025-01-05",
            "items": "[{\"accountId\":3200,\"name\":\"A\",\
                \"description\":\"d\",\"quantity\":1.0,\
                \"type\":\"ARTICLE\",\"unitPrice\":108.1,\
                \"unitId\":4,\"taxId\":7}]",
            "statusId": 18
        }))
        .unwrap();

        let items = order.items.clone().unwrap().into_items().unwrap();
        assert_eq!(items[0].name, "A");
        assert_eq!(order.rest.get("statusId"), Some(&json!(18)));
    }

    #[test]
    fn localized_dates_by_language() {
        let date = ymd(2025, 1, 31);
        assert_eq!(localized_date(date, "de"), "31. Januar 2025");
        assert_eq!(localized_date(date, "en"), "January 31, 2025");
        assert_eq!(localized_date(date, "fr"), "31 janvier 2025");
        assert_eq!(localized_date(date, "nl"), "2025-01-31");
    }
}
