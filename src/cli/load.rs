use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::db::Database;
use crate::feed::{feed_etag, parse_feed, records_from_entries};

/// Cache a fetched contacts feed document. Returns the number of entries kept.
pub fn run_load(db: &mut Database, file: &str) -> Result<usize> {
    let path = Path::new(file);
    if !path.exists() {
        bail!("File not found: {}", file);
    }

    let body = fs::read_to_string(path).context("Failed to read feed file")?;
    let entries = parse_feed(&body)?;
    let etag = feed_etag(&body)?;

    // Only entries that parse into records are cached.
    let records = records_from_entries(&entries);
    let kept: Vec<_> = records.iter().map(|r| r.to_entry()).collect();

    db.save_entries(&kept)?;
    db.set_etag(etag.as_deref())?;
    info!(entries = kept.len(), etag = ?etag, "feed cached");

    let skipped = entries.len() - kept.len();
    if skipped > 0 {
        println!("Cached {} contacts ({} skipped)", kept.len(), skipped);
    } else {
        println!("Cached {} contacts", kept.len());
    }
    Ok(kept.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn caches_valid_entries_and_etag() {
        let mut db = Database::open_memory().unwrap();
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "feed": {{ "gd$etag": "abc", "entry": [
                {{ "id": {{ "$t": "base/1" }}, "title": {{ "$t": "Jane Doe" }} }},
                {{ "title": {{ "$t": "No Id" }} }}
            ] }} }}"#
        )
        .unwrap();

        let kept = run_load(&mut db, file.path().to_str().unwrap()).unwrap();

        assert_eq!(kept, 1);
        assert_eq!(db.entry_count().unwrap(), 1);
        assert_eq!(db.etag().unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn rejects_non_feed_documents() {
        let mut db = Database::open_memory().unwrap();
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[1, 2, 3]").unwrap();

        assert!(run_load(&mut db, file.path().to_str().unwrap()).is_err());
        assert!(db.load_entries().unwrap().is_none());
    }
}
