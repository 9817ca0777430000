use std::fmt;

use chrono::Local;
use inquire::{
    error::InquireError, Confirm, CustomType, DateSelect, MultiSelect,
    Select, Text,
};

use crate::orders::MergeMode;
use crate::remote::{Associate, Category};
use crate::rows::Period;
use crate::run::Target;

type InputResult<T> = Result<T, InquireError>;

pub fn select_period() -> InputResult<Period> {
    let today = Local::now().date_naive();
    let from = DateSelect::new("Bill from:").with_max_date(today).prompt()?;
    let until = DateSelect::new("until:")
        .with_default(today)
        .with_min_date(from)
        .with_max_date(today)
        .prompt()?;
    Ok(Period::new(from, until))
}

pub fn select_clients(clients: Vec<String>) -> InputResult<Vec<String>> {
    MultiSelect::new("Select clients", clients)
        .with_all_selected_by_default()
        .with_page_size(20)
        .prompt()
}

struct Choice {
    id: i64,
    label: String,
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

pub fn select_associate(associates: &[Associate]) -> InputResult<i64> {
    let choices = associates
        .iter()
        .map(|associate| Choice {
            id: associate.id,
            label: associate.name.clone(),
        })
        .collect();
    Select::new("Select client", choices)
        .with_page_size(20)
        .prompt()
        .map(|choice| choice.id)
}

pub fn select_category(
    categories: &[Category],
    lang: &str,
    default_id: i64,
) -> InputResult<i64> {
    let cursor = categories
        .iter()
        .position(|category| category.id == default_id)
        .unwrap_or(0);
    let choices = categories
        .iter()
        .map(|category| Choice {
            id: category.id,
            label: category.label(lang),
        })
        .collect();
    Select::new("Select category", choices)
        .with_starting_cursor(cursor)
        .prompt()
        .map(|choice| choice.id)
}

const TARGET_CREATE: &str = "Create a new order";
const TARGET_APPEND: &str = "Append items to an existing order";
const TARGET_REPLACE: &str = "Replace items of an existing order";

pub fn select_target() -> InputResult<Target> {
    let choice = Select::new(
        "Target:",
        vec![TARGET_CREATE, TARGET_APPEND, TARGET_REPLACE],
    )
    .prompt()?;

    if choice == TARGET_CREATE {
        return Ok(Target::Create);
    }
    let order_id: i64 = CustomType::new("Order id:")
        .with_error_message("Please type a numeric order id")
        .prompt()?;
    let mode = if choice == TARGET_APPEND {
        MergeMode::Append
    } else {
        MergeMode::Replace
    };
    Ok(Target::Merge { order_id, mode })
}

pub fn prompt_value(key: &str) -> InputResult<String> {
    Text::new(&format!("Please enter {}:", key)).prompt()
}

pub fn confirm() -> InputResult<bool> {
    Confirm::new("Confirm").with_default(true).prompt()
}
