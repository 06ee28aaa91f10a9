use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};

pub mod dedupe;
pub mod display;
pub mod import;
pub mod load;
pub mod show;

pub use dedupe::run_dedupe;
pub use display::print_full_contact;
pub use import::run_import;
pub use load::run_load;
pub use show::run_show;

use crate::book::AddressBook;
use crate::config::BookConfig;
use crate::db::Database;
use crate::reconcile::MergePolicy;

#[derive(Parser)]
#[command(name = "gcontact")]
#[command(about = "Google Contacts address book tools for the command line")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to <config dir>/gcontact/config.json)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Cache a fetched contacts feed (JSON)
    Load(LoadArgs),
    /// Show full details for a contact
    Show(ShowArgs),
    /// List likely duplicate contacts
    Dedupe,
    /// Reconcile a connections CSV export against the cached contacts
    Import(ImportArgs),
}

#[derive(Args)]
pub struct LoadArgs {
    /// Path to the feed document
    pub file: String,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Contact id or name
    pub identifier: String,
}

#[derive(Args)]
pub struct ImportArgs {
    pub file: String,
    #[arg(short, long)]
    pub dry_run: bool,
    /// Which side wins on a match: existing-wins or incoming-wins
    #[arg(short, long)]
    pub policy: Option<MergePolicy>,
}

/// Build the address book from the cached feed.
pub(crate) fn load_book(db: &Database, config: BookConfig) -> Result<AddressBook> {
    let entries = db
        .load_entries()?
        .ok_or_else(|| anyhow!("No cached contacts. Run `gcontact load <feed.json>` first."))?;
    Ok(AddressBook::from_entries(&entries, config)?)
}
