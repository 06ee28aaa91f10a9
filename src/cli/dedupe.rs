use anyhow::Result;

use crate::config::BookConfig;
use crate::db::Database;
use super::load_book;

/// List every pair of near-duplicate contacts in the cache.
pub fn run_dedupe(db: &Database, config: BookConfig) -> Result<usize> {
    let book = load_book(db, config)?;
    let mut count = 0;

    for (a, b) in book.duplicate_pairs() {
        let distance = book.fingerprint(a).distance(&book.fingerprint(b));
        println!(
            "{} [{}]  ~  {} [{}]  (distance {})",
            a.title(),
            a.short_id(),
            b.title(),
            b.short_id(),
            distance
        );
        count += 1;
    }

    if count == 0 {
        println!("No duplicates.");
    } else {
        println!("\n{} possible duplicate pairs", count);
    }
    Ok(count)
}
