use anyhow::{anyhow, Result};

use crate::book::AddressBook;
use crate::config::BookConfig;
use crate::db::Database;
use crate::models::ContactRecord;
use super::display::print_full_contact;
use super::load_book;

/// Records matching `identifier`: an exact id or title, otherwise every
/// title containing all of its words (case-insensitive).
pub fn find_contacts<'a>(book: &'a AddressBook, identifier: &str) -> Vec<&'a ContactRecord> {
    if let Ok(record) = book.lookup(identifier) {
        return vec![record];
    }

    let words: Vec<String> = identifier
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();
    book.iter()
        .filter(|r| {
            let title = r.title().to_lowercase();
            words.iter().all(|w| title.contains(w.as_str()))
        })
        .collect()
}

/// Execute the show command
pub fn run_show(db: &Database, config: BookConfig, identifier: &str) -> Result<()> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(anyhow!("Identifier cannot be empty."));
    }

    let book = load_book(db, config)?;
    let results = find_contacts(&book, identifier);

    match results.len() {
        0 => println!("No matches."),
        1 => {
            let record = results[0];
            print_full_contact(record);

            let dupes: Vec<_> = book.find_duplicates(record).collect();
            if !dupes.is_empty() {
                println!("\n  Possible duplicates:");
                for dupe in dupes {
                    println!("    {}  [{}]", dupe.title(), dupe.short_id());
                }
            }
        }
        n => {
            println!("{} matches:", n);
            for record in results {
                println!("  {}  [{}]", record.title(), record.short_id());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> AddressBook {
        AddressBook::from_records(
            vec![
                ContactRecord::new("base/1", "Jane Doe"),
                ContactRecord::new("base/2", "John Doe"),
                ContactRecord::new("base/3", "Robert Smith"),
            ],
            BookConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn exact_id_or_title_wins() {
        let book = book();
        let by_id = find_contacts(&book, "3");
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].title(), "Robert Smith");

        assert_eq!(find_contacts(&book, "Jane Doe")[0].short_id(), "1");
    }

    #[test]
    fn falls_back_to_word_search() {
        let book = book();
        assert_eq!(find_contacts(&book, "doe").len(), 2);
        assert_eq!(find_contacts(&book, "doe jo").len(), 1);
        assert!(find_contacts(&book, "nobody").is_empty());
    }

    #[test]
    fn empty_cache_is_an_error() {
        let db = Database::open_memory().unwrap();
        let err = run_show(&db, BookConfig::default(), "Jane").unwrap_err();
        assert!(err.to_string().contains("gcontact load"));
    }
}
