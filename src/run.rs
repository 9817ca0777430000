use chrono::Local;

use crate::config::Config;
use crate::error::SyncError;
use crate::orders::{self, MergeMode, Synthesis};
use crate::positions::{self, Position, SortKey};
use crate::remote::{self, Remote, SubmitMode, SubmitOutcome};
use crate::rows::{self, Period, SpreadsheetRow};

/// Where human-readable progress goes. The pipeline itself stays free of
/// console I/O so it can run quietly under tests.
pub trait Reporter {
    fn note(&self, message: &str);
}

/// Prints progress to stdout.
pub struct Console;

impl Reporter for Console {
    fn note(&self, message: &str) {
        println!("{}", message);
    }
}

/// Swallows all progress output.
pub struct Silent;

impl Reporter for Silent {
    fn note(&self, _message: &str) {}
}

/// What the submitted order targets: a fresh document, or an existing one
/// merged in the given mode.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Target {
    Create,
    Merge { order_id: i64, mode: MergeMode },
}

/// One reconciliation run, fully described.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub period: Period,
    pub clients: Vec<String>,
    pub associate_id: i64,
    pub category_id: i64,
    pub target: Target,
    pub notes: Option<String>,
}

/// Fetches, normalizes and keeps the unbilled rows inside the period.
pub fn collect_rows(
    remote: &mut dyn Remote,
    period: &Period,
) -> Result<Vec<SpreadsheetRow>, SyncError> {
    let raw = remote.fetch_rows()?;
    let normalized = raw
        .iter()
        .map(rows::normalize)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows::select_in_range(normalized, period, false))
}

/// Filters by the selected clients, aggregates and orders the positions.
pub fn build_positions(
    rows: Vec<SpreadsheetRow>,
    clients: &[String],
    sort: SortKey,
) -> Result<Vec<Position>, SyncError> {
    let aggregated =
        positions::aggregate(&positions::filter_by_clients(rows, clients));
    if aggregated.is_empty() {
        return Err(SyncError::NothingToBill);
    }
    Ok(positions::order(aggregated, sort))
}

/// The whole run: rows → positions → priced payload → submit → flag rows.
pub fn run_sync(
    remote: &mut dyn Remote,
    config: &Config,
    request: &SyncRequest,
    reporter: &dyn Reporter,
) -> Result<SubmitOutcome, SyncError> {
    let rows = collect_rows(remote, &request.period)?;
    reporter.note(&format!(
        "{} unbilled rows in {}",
        rows.len(),
        request.period
    ));

    let positions =
        build_positions(rows, &request.clients, config.items_order)?;
    reporter.note(&format!("{} positions to bill", positions.len()));

    submit_positions(remote, config, request, &positions, reporter)
}

/// Prices the positions, resolves the target and submits.
///
/// A submitted order is never rolled back; when the billed write-back
/// fails afterwards, that failure is reported on top of the successful
/// submission.
pub fn submit_positions(
    remote: &mut dyn Remote,
    config: &Config,
    request: &SyncRequest,
    positions: &[Position],
    reporter: &dyn Reporter,
) -> Result<SubmitOutcome, SyncError> {
    let tax_id = config.default_tax.ok_or(SyncError::MissingConfig {
        key: "CASHCTRL_DEFAULT_TAX".to_string(),
    })?;
    let taxes = remote.list_taxes()?;
    let tax = remote::find_tax(&taxes, tax_id, &config.language)?;
    let units = remote.list_units()?;
    let unit =
        remote::find_unit(&units, &config.unit_filter, &config.language)?;
    let categories = remote.list_categories()?;
    let category = remote::find_category(
        &categories,
        request.category_id,
        &config.language,
    )?;

    let ctx = Synthesis {
        associate_id: request.associate_id,
        category_id: category.id,
        category_label: category.label(&config.language),
        period: request.period,
        account_id: config.default_account,
        unit_id: unit.id,
        tax,
        language: config.language.clone(),
        due_days: category.due_days.unwrap_or(config.due_days),
        notes: request.notes.clone(),
        today: Local::now().date_naive(),
    };
    let fresh = orders::synthesize(positions, &ctx)?;

    let (payload, mode) = match request.target {
        Target::Create => (fresh, SubmitMode::Create),
        Target::Merge { order_id, mode } => {
            let existing = remote.fetch_order(order_id)?;
            reporter.note(&format!(
                "merging into order {} ({})",
                order_id, mode
            ));
            (orders::merge(existing, fresh, mode)?, SubmitMode::Update)
        }
    };

    let outcome = remote.submit_order(&payload, mode)?;
    if !outcome.success {
        return Err(SyncError::Rejected {
            message: outcome
                .message
                .unwrap_or_else(|| "no detail provided".to_string()),
            errors: outcome.errors,
        });
    }
    reporter.note(&format!(
        "order submitted ({}{})",
        mode,
        outcome
            .insert_id
            .map(|id| format!(", id {}", id))
            .unwrap_or_default(),
    ));

    let billed: Vec<u32> = positions
        .iter()
        .flat_map(|position| position.row_indexes.iter().copied())
        .collect();
    if let Err(source) = remote.flag_rows_billed(&billed) {
        return Err(SyncError::FlagAfterSubmit {
            source: Box::new(source),
        });
    }
    reporter.note(&format!("{} rows flagged as billed", billed.len()));

    Ok(outcome)
}
