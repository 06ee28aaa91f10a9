use std::path::Path;

use clap::Parser;
use gcontact::cli::{run_dedupe, run_import, run_load, run_show, Cli, Commands};
use gcontact::{BookConfig, Database};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match cli.config.as_deref() {
        Some(path) => BookConfig::load_from(Path::new(path))?,
        None => BookConfig::load()?,
    };
    let mut db = Database::open()?;

    match cli.command {
        Commands::Load(args) => {
            run_load(&mut db, &args.file)?;
        }
        Commands::Show(args) => {
            run_show(&db, config, &args.identifier)?;
        }
        Commands::Dedupe => {
            run_dedupe(&db, config)?;
        }
        Commands::Import(args) => {
            run_import(&mut db, config, &args.file, args.dry_run, args.policy)?;
        }
    }

    Ok(())
}
