use std::env;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use billsync::cli::{Command, MergeArg, Opts};
use billsync::config::{self, Config};
use billsync::error::SyncError;
use billsync::orders::MergeMode;
use billsync::remote::{Remote, Session};
use billsync::rows::SpreadsheetRow;
use billsync::run::{self, Console, SyncRequest, Target};
use billsync::transport::HttpRemote;
use billsync::{input, translate};

fn main() -> ExitCode {
    let opts = Opts::parse();

    if let Err(error) = run_cmd(opts) {
        eprintln!("{}", error);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run_cmd(opts: Opts) -> Result<(), SyncError> {
    config::load_env_file(&opts.env_file)?;
    let config = ensure_config(&opts.env_file)?;
    let session = Session {
        domain: config.domain.clone(),
        api_key: config.api_key.clone(),
        spreadsheet_id: config.spreadsheet_id.clone(),
        sheet_name: config.sheet_name.clone(),
        sheet_token: config.sheet_token.clone(),
        sheet_token_expiry: None,
    };
    let mut remote = HttpRemote::new(&session)?;

    match opts.subcommand {
        Command::Sync {
            order,
            mode,
            notes,
            yes,
        } => sync(&mut remote, &config, order, mode, notes, yes),
        Command::Preview => preview(&mut remote, &config),
        Command::Taxes => taxes(&mut remote, &config),
    }
}

/// Prompts for any still-missing required setting and persists the answer,
/// so the next run starts without questions.
fn ensure_config(env_file: &Path) -> Result<Config, SyncError> {
    loop {
        match Config::from_env() {
            Ok(config) => return Ok(config),
            Err(SyncError::MissingConfig { key }) => {
                let value = input::prompt_value(&key)?;
                config::update_env_file(env_file, &key, &value)?;
                env::set_var(&key, &value);
            }
            Err(other) => return Err(other),
        }
    }
}

fn sync(
    remote: &mut dyn Remote,
    config: &Config,
    order: Option<i64>,
    mode: Option<MergeArg>,
    notes: Option<String>,
    yes: bool,
) -> Result<(), SyncError> {
    let period = input::select_period()?;
    let rows = run::collect_rows(remote, &period)?;
    let clients = unique_clients(&rows);
    if clients.is_empty() {
        return Err(SyncError::NothingToBill);
    }
    let clients = input::select_clients(clients)?;
    let positions =
        run::build_positions(rows, &clients, config.items_order)?;

    println!("\nPositions for {}:", period);
    for position in &positions {
        println!("{}", position);
    }

    let associates = remote.list_associates()?;
    let associate_id = input::select_associate(&associates)?;
    let categories = remote.list_categories()?;
    let category_id = input::select_category(
        &categories,
        &config.language,
        config.default_category,
    )?;
    let target = match order {
        Some(order_id) => Target::Merge {
            order_id,
            mode: merge_mode(mode.unwrap_or(MergeArg::Append)),
        },
        None => input::select_target()?,
    };

    if !yes && !input::confirm()? {
        println!("Nothing submitted.");
        return Ok(());
    }

    let request = SyncRequest {
        period,
        clients,
        associate_id,
        category_id,
        target,
        notes: notes.or_else(|| Some("created by billsync".to_string())),
    };
    run::submit_positions(remote, config, &request, &positions, &Console)?;
    Ok(())
}

fn preview(
    remote: &mut dyn Remote,
    config: &Config,
) -> Result<(), SyncError> {
    let period = input::select_period()?;
    let rows = run::collect_rows(remote, &period)?;
    let clients = unique_clients(&rows);
    let positions =
        run::build_positions(rows, &clients, config.items_order)?;

    println!("\nPositions for {}:", period);
    for position in &positions {
        println!("{}", position);
        print!("{}", position.description);
    }
    Ok(())
}

fn taxes(
    remote: &mut dyn Remote,
    config: &Config,
) -> Result<(), SyncError> {
    for tax in remote.list_taxes()? {
        println!(
            "#{} {} ({}% {})",
            tax.id,
            translate::resolve(&tax.name, &config.language),
            tax.percentage,
            tax.calc_type,
        );
    }
    Ok(())
}

fn unique_clients(rows: &[SpreadsheetRow]) -> Vec<String> {
    let mut clients: Vec<String> = Vec::new();
    for row in rows {
        if !clients.contains(&row.client) {
            clients.push(row.client.clone());
        }
    }
    clients
}

fn merge_mode(arg: MergeArg) -> MergeMode {
    match arg {
        MergeArg::Append => MergeMode::Append,
        MergeArg::Replace => MergeMode::Replace,
    }
}
