use std::fs::{self, File};
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::book::{AddressBook, SyncAction};
use crate::config::BookConfig;
use crate::db::Database;
use crate::models::ContactRecord;
use crate::reconcile::MergePolicy;

/// A row from a LinkedIn-style connections export.
///
/// Headers may be the snake_case field names or the export's own labels
/// (`First Name`, `E-mail Address`, ...). Empty strings become `None`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionRow {
    /// Honorific (Mr., Dr., ...)
    #[serde(default, alias = "Title", deserialize_with = "empty_string_as_none")]
    pub title: Option<String>,

    #[serde(default, alias = "First Name", deserialize_with = "empty_string_as_none")]
    pub first_name: Option<String>,

    #[serde(default, alias = "Middle Name", deserialize_with = "empty_string_as_none")]
    pub middle_name: Option<String>,

    #[serde(default, alias = "Last Name", deserialize_with = "empty_string_as_none")]
    pub last_name: Option<String>,

    #[serde(default, alias = "Suffix", deserialize_with = "empty_string_as_none")]
    pub suffix: Option<String>,

    #[serde(default, alias = "Company", deserialize_with = "empty_string_as_none")]
    pub company: Option<String>,

    #[serde(default, alias = "Job Title", deserialize_with = "empty_string_as_none")]
    pub job_title: Option<String>,

    #[serde(default, alias = "E-mail Address", deserialize_with = "empty_string_as_none")]
    pub e_mail: Option<String>,
}

impl ConnectionRow {
    /// `[Title] First [Middle] Last [Suffix]`, skipping missing parts.
    pub fn full_name(&self) -> String {
        [
            &self.title,
            &self.first_name,
            &self.middle_name,
            &self.last_name,
            &self.suffix,
        ]
        .into_iter()
        .filter_map(|part| part.as_deref())
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// Stable id derived from the row's identifying fields.
    pub fn id(&self) -> String {
        let key = [
            self.full_name(),
            self.company.clone().unwrap_or_default(),
            self.job_title.clone().unwrap_or_default(),
            self.e_mail.clone().unwrap_or_default(),
        ]
        .join(" ");
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    /// Feed-shaped entry for this row.
    pub fn to_entry(&self, updated: DateTime<Utc>) -> Value {
        let wrap = |v: &Option<String>| json!({ "$t": v.clone().unwrap_or_default() });

        let mut entry = json!({
            "id": { "$t": self.id() },
            "title": { "$t": self.full_name() },
            "updated": { "$t": updated.to_rfc3339() },
            "gd$name": {
                "gd$givenName": wrap(&self.first_name),
                "gd$additionalName": wrap(&self.middle_name),
                "gd$familyName": wrap(&self.last_name),
                "gd$namePrefix": wrap(&self.title),
                "gd$nameSuffix": wrap(&self.suffix),
            },
        });

        if self.company.is_some() || self.job_title.is_some() {
            entry["gd$organization"] = json!([{
                "gd$orgName": wrap(&self.company),
                "gd$orgTitle": wrap(&self.job_title),
                "primary": "true",
            }]);
        }
        if let Some(email) = &self.e_mail {
            entry["gd$email"] = json!([{ "address": email, "primary": "true" }]);
        }

        entry
    }
}

/// Deserialize empty strings as None.
fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
}

/// Read a connections export into records. Every record's `updated`
/// is the file's modification time. Rows that fail to parse or have no
/// name are skipped with a warning.
pub fn load_csv(path: &Path) -> Result<Vec<ContactRecord>> {
    let modified: DateTime<Utc> = fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::from)
        .unwrap_or_else(|_| Utc::now());

    let reader = File::open(path).context("Failed to open CSV file")?;
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();

    for (idx, result) in csv_reader.deserialize::<ConnectionRow>().enumerate() {
        let line = idx + 2; // CSV line number (1-indexed, skip header)

        let row = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(line, error = %e, "skipping unparseable row");
                continue;
            }
        };

        if row.full_name().is_empty() {
            warn!(line, "skipping row without a name");
            continue;
        }

        records.push(ContactRecord::from_entry(&row.to_entry(modified))?);
    }

    info!(path = %path.display(), records = records.len(), "csv loaded");
    Ok(records)
}

/// Import results summary.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub created: u32,
    pub updated: u32,
    pub unchanged: u32,
}

/// Execute the import command.
pub fn run_import(
    db: &mut Database,
    config: BookConfig,
    file: &str,
    dry_run: bool,
    policy: Option<MergePolicy>,
) -> Result<ImportStats> {
    let path = Path::new(file);
    if !path.exists() {
        bail!("File not found: {}", file);
    }

    let config = match policy {
        Some(policy) => config.with_merge_policy(policy),
        None => config,
    };

    let entries = db.load_entries()?.unwrap_or_default();
    let mut book = AddressBook::from_entries(&entries, config)?;
    let incoming = load_csv(path)?;

    if dry_run {
        println!("Dry run: {} ({} policy)", file, book.config().merge_policy);
    } else {
        println!("Importing: {} ({} policy)", file, book.config().merge_policy);
    }

    let actions = book.plan_import(incoming)?;
    let mut stats = ImportStats::default();

    for action in &actions {
        match action {
            SyncAction::Create(record) => {
                stats.created += 1;
                println!("  + {}", record.title());
            }
            SyncAction::Update { id, changes, .. } if changes.is_empty() => {
                stats.unchanged += 1;
                println!("  = {} (no changes)", book.get(id)?.title());
            }
            SyncAction::Update {
                id,
                policy: MergePolicy::ExistingWins,
                ..
            } => {
                stats.unchanged += 1;
                println!("  = {} (kept existing)", book.get(id)?.title());
            }
            SyncAction::Update { id, changes, .. } => {
                stats.updated += 1;
                println!("  ~ {}", book.get(id)?.title());
                for change in changes {
                    println!("      {}", change);
                }
            }
        }
    }

    if !dry_run {
        for action in actions {
            book.apply(action)?;
        }
        db.save_entries(&book.to_entries())?;
    }

    print_summary(&stats, dry_run);
    Ok(stats)
}

fn print_summary(stats: &ImportStats, dry_run: bool) {
    let (create, update) = if dry_run {
        ("Would create", "would update")
    } else {
        ("Created", "updated")
    };

    println!("\n{} {} contacts, {} {}", create, stats.created, update, stats.updated);

    if stats.unchanged > 0 {
        println!("Unchanged: {}", stats.unchanged);
    }
}
