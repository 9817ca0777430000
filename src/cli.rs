use clap::{Parser, ValueEnum, ValueHint};
use std::path::PathBuf;

/* Argument Structure
 *
 * sync [--order <id> --mode (append | replace)] [--notes <text>] [--yes]
 * preview
 * taxes
 */

#[derive(Parser)]
#[command(
    name = "billsync",
    about = "Reconcile time-tracking rows into accounting orders"
)]
pub struct Opts {
    #[clap(short, long, default_value=".env",
        value_hint=ValueHint::FilePath)]
    pub env_file: PathBuf,

    #[clap(subcommand)]
    pub subcommand: Command,
}

#[derive(Parser)]
pub enum Command {
    /// Aggregate unbilled rows and submit them as an order
    Sync {
        /// Merge into this existing order instead of creating a new one
        #[clap(long)]
        order: Option<i64>,

        /// How items combine with the existing order
        #[clap(long, value_enum)]
        mode: Option<MergeArg>,

        /// Note stored on the order
        #[clap(long)]
        notes: Option<String>,

        /// Skip the confirmation prompt
        #[clap(short, long)]
        yes: bool,
    },

    /// Show the aggregated positions without submitting anything
    Preview,

    /// List the tax definitions of the accounting service
    Taxes,
}

#[derive(ValueEnum, Debug, PartialEq, Clone, Copy)]
pub enum MergeArg {
    /// Keep the existing items and add the new ones after them
    Append,
    /// Drop the existing items in favor of the new ones
    Replace,
}
