//! Command line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use packline::{Category, LineStatus};

#[derive(Parser, Debug)]
#[command(
    name = "packline",
    version,
    about = "Warehouse order ingestion and pick workflow",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Config file (JSON). Missing means defaults.
    #[arg(long, global = true, value_name = "FILE", default_value = "packline.json")]
    pub config: PathBuf,

    /// Database file, overriding the config
    #[arg(long, global = true, value_name = "FILE")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest an order sheet (xlsx, csv, tsv)
    Ingest {
        file: PathBuf,
        /// Show the detected columns and lines without storing them
        #[arg(long)]
        dry_run: bool,
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List order lines
    Lines(LinesArgs),
    /// Pick a quantity of one line
    Pick {
        line_id: String,
        quantity: u32,
        /// Name stamped on the line; defaults to the configured actor
        #[arg(long)]
        actor: Option<String>,
    },
    /// Resolve a scanned code against a role's board and pick it
    Scan {
        code: String,
        #[arg(long, value_enum)]
        role: RoleArg,
        /// Quantity to pick; defaults to the whole line
        #[arg(long)]
        quantity: Option<u32>,
        #[arg(long)]
        actor: Option<String>,
    },
    /// Show a role's board: portal groups and open units per master SKU
    Board {
        #[arg(long, value_enum)]
        role: RoleArg,
        /// Restrict to one portal
        #[arg(long)]
        portal: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Manage child-code to master-SKU mappings
    Mappings {
        #[command(subcommand)]
        action: MappingsAction,
    },
    /// Show recent uploads
    Uploads {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Delete every order line
    Reset {
        /// Must be the literal word RESET
        #[arg(long)]
        confirm: String,
    },
    /// Print snapshot updates and ingest sheets dropped into the inbox
    Watch {
        /// Inbox directory, overriding the config
        #[arg(long, value_name = "DIR")]
        inbox: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct LinesArgs {
    #[arg(long, value_enum)]
    pub category: Option<RoleArg>,
    #[arg(long, value_enum)]
    pub status: Option<StatusArg>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum MappingsAction {
    /// Import a mapping sheet (master / FG SKU / SFG SKU columns)
    Import { file: PathBuf },
    /// Remove every mapping
    Clear,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum RoleArg {
    Fg,
    Sfg,
    Wip,
}

impl From<RoleArg> for Category {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Fg => Category::FinishedGoods,
            RoleArg::Sfg => Category::SemiFinished,
            RoleArg::Wip => Category::Wip,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum StatusArg {
    Pending,
    WipProcessing,
    Completed,
}

impl From<StatusArg> for LineStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Pending => LineStatus::Pending,
            StatusArg::WipProcessing => LineStatus::WipProcessing,
            StatusArg::Completed => LineStatus::Completed,
        }
    }
}
