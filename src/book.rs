use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::BookConfig;
use crate::error::{ContactError, Result};
use crate::fingerprint::{compute_fingerprint, Fingerprint, FingerprintIndex};
use crate::models::ContactRecord;
use crate::reconcile::{self, Decision, FieldChange, MergeField, MergePolicy};

/// What the persistence/API side should do with one reconciled record.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    Create(ContactRecord),
    /// Matched record `id`. Under [`MergePolicy::IncomingWins`] each
    /// change's new value is written onto it; under
    /// [`MergePolicy::ExistingWins`] the book already holds the winning
    /// values and the changes only describe the incoming side.
    Update {
        id: String,
        policy: MergePolicy,
        changes: Vec<FieldChange>,
    },
}

/// The primary address book: records keyed by short id plus a fingerprint
/// index that is rebuilt whenever a record changes.
#[derive(Debug, Clone)]
pub struct AddressBook {
    config: BookConfig,
    records: Vec<ContactRecord>,
    positions: HashMap<String, usize>,
    index: FingerprintIndex,
}

impl AddressBook {
    pub fn new(config: BookConfig) -> Result<Self> {
        config.validate()?;
        let index = FingerprintIndex::new(config.index_settings())?;
        Ok(Self {
            config,
            records: Vec::new(),
            positions: HashMap::new(),
            index,
        })
    }

    pub fn from_records(records: Vec<ContactRecord>, config: BookConfig) -> Result<Self> {
        let mut book = Self::new(config)?;
        for record in records {
            book.push(record)?;
        }
        book.rebuild_index()?;
        Ok(book)
    }

    /// Build from feed entries. Any entry missing its identity fails the load.
    pub fn from_entries(entries: &[Value], config: BookConfig) -> Result<Self> {
        let records = entries
            .iter()
            .map(ContactRecord::from_entry)
            .collect::<Result<Vec<_>>>()?;
        Self::from_records(records, config)
    }

    pub fn config(&self) -> &BookConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContactRecord> {
        self.records.iter()
    }

    /// Record by short id.
    pub fn get(&self, short_id: &str) -> Result<&ContactRecord> {
        self.positions
            .get(short_id)
            .map(|&pos| &self.records[pos])
            .ok_or_else(|| ContactError::NotFound(short_id.to_string()))
    }

    /// First record with exactly this title.
    pub fn by_name(&self, title: &str) -> Result<&ContactRecord> {
        self.records
            .iter()
            .find(|r| r.title() == title)
            .ok_or_else(|| ContactError::NotFound(title.to_string()))
    }

    pub fn by_name_all<'a>(&'a self, title: &'a str) -> impl Iterator<Item = &'a ContactRecord> {
        self.records.iter().filter(move |r| r.title() == title)
    }

    /// Short id first, then title.
    pub fn lookup(&self, identifier: &str) -> Result<&ContactRecord> {
        self.get(identifier).or_else(|_| self.by_name(identifier))
    }

    pub fn fingerprint(&self, record: &ContactRecord) -> Fingerprint {
        compute_fingerprint(record, &self.config.hash_keys, self.config.bits)
    }

    pub fn fingerprints(&self) -> Vec<Fingerprint> {
        self.records.iter().map(|r| self.fingerprint(r)).collect()
    }

    pub fn index(&self) -> &FingerprintIndex {
        &self.index
    }

    /// Records close to `record`, nearest first, excluding `record` itself.
    pub fn find_duplicates<'a>(
        &'a self,
        record: &'a ContactRecord,
    ) -> impl Iterator<Item = &'a ContactRecord> + 'a {
        let fingerprint = self.fingerprint(record);
        let own_id = record.short_id();
        self.index
            .find_duplicates(&fingerprint)
            .filter(move |cid| *cid != own_id)
            .filter_map(move |cid| self.get(cid).ok())
    }

    /// Every pair of near-duplicates in the book, each reported once.
    pub fn duplicate_pairs(&self) -> impl Iterator<Item = (&ContactRecord, &ContactRecord)> + '_ {
        self.index
            .find_all_duplicate_pairs()
            .filter_map(move |(a, b)| Some((self.get(a).ok()?, self.get(b).ok()?)))
    }

    pub fn create(&mut self, record: ContactRecord) -> Result<()> {
        self.push(record)?;
        self.rebuild_index()
    }

    /// Mutate one record in place and refresh the index.
    pub fn update<F>(&mut self, short_id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut ContactRecord),
    {
        let pos = *self
            .positions
            .get(short_id)
            .ok_or_else(|| ContactError::NotFound(short_id.to_string()))?;
        f(&mut self.records[pos]);
        self.rebuild_index()
    }

    /// Reconcile `incoming` using the configured merge policy.
    pub fn reconcile(&self, incoming: &mut ContactRecord) -> Result<Decision> {
        reconcile::reconcile(incoming, self, self.config.merge_policy)
    }

    /// Clean and reconcile each incoming record, producing the actions the
    /// API side should carry out. The book is not modified. Incoming records
    /// repeating an id already seen in this batch are dropped, and an
    /// unmatched record whose id is already in the book is not created again.
    pub fn plan_import(&self, incoming: Vec<ContactRecord>) -> Result<Vec<SyncAction>> {
        let mut seen = HashSet::new();
        let mut actions = Vec::with_capacity(incoming.len());

        for mut record in incoming {
            if !seen.insert(record.short_id().to_string()) {
                warn!(id = record.short_id(), "skipping repeated incoming record");
                continue;
            }

            record.clean();
            match self.reconcile(&mut record)? {
                Decision::Create if self.positions.contains_key(record.short_id()) => {
                    warn!(id = record.short_id(), "incoming id already in book");
                }
                Decision::Create => actions.push(SyncAction::Create(record)),
                Decision::Update {
                    matched_id,
                    policy,
                    changes,
                    ..
                } => actions.push(SyncAction::Update {
                    id: matched_id,
                    policy,
                    changes,
                }),
            }
        }

        Ok(actions)
    }

    pub fn apply(&mut self, action: SyncAction) -> Result<()> {
        match action {
            SyncAction::Create(record) => self.create(record),
            SyncAction::Update {
                policy: MergePolicy::ExistingWins,
                ..
            } => Ok(()),
            SyncAction::Update { changes, .. } if changes.is_empty() => Ok(()),
            SyncAction::Update { id, changes, .. } => {
                let home_domains = self.config.home_domains.clone();
                self.update(&id, |record| {
                    for change in &changes {
                        match change.field {
                            MergeField::Organization => record.set_organization(&change.new),
                            MergeField::Email => record.set_email(&change.new, &home_domains),
                        }
                    }
                })
            }
        }
    }

    /// Entries for the cache, in book order.
    pub fn to_entries(&self) -> Vec<Value> {
        self.records.iter().map(ContactRecord::to_entry).collect()
    }

    fn push(&mut self, record: ContactRecord) -> Result<()> {
        let short_id = record.short_id().to_string();
        if self.positions.contains_key(&short_id) {
            return Err(ContactError::MalformedInput(format!(
                "duplicate contact id: {}",
                short_id
            )));
        }
        self.positions.insert(short_id, self.records.len());
        self.records.push(record);
        Ok(())
    }

    /// Build a fresh index and swap it in.
    fn rebuild_index(&mut self) -> Result<()> {
        let index = FingerprintIndex::build(self.fingerprints(), self.config.index_settings())?;
        debug!(records = self.records.len(), "address book reindexed");
        self.index = index;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a AddressBook {
    type Item = &'a ContactRecord;
    type IntoIter = std::slice::Iter<'a, ContactRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::default_home_domains;
    use serde_json::json;

    fn contact(id: &str, title: &str, email: &str, organization: &str) -> ContactRecord {
        let mut record = ContactRecord::new(id, title);
        if !organization.is_empty() {
            record.set_organization(organization);
        }
        if !email.is_empty() {
            record.set_email(email, &default_home_domains());
        }
        record
    }

    fn title_only() -> BookConfig {
        BookConfig::default().with_hash_keys(Vec::new())
    }

    fn sample_book(config: BookConfig) -> AddressBook {
        AddressBook::from_records(
            vec![
                contact("feeds/base/j1", "Jane Doe", "jane@acme.com", "CEO at Acme"),
                contact("feeds/base/b2", "Robert Smith", "bob@example.org", ""),
                contact("feeds/base/j3", "JANE DOE", "jdoe@gmail.com", ""),
            ],
            config,
        )
        .unwrap()
    }

    #[test]
    fn lookup_by_id_and_name() {
        let book = sample_book(title_only());
        assert_eq!(book.len(), 3);
        assert_eq!(book.get("b2").unwrap().title(), "Robert Smith");
        assert_eq!(book.by_name("Jane Doe").unwrap().short_id(), "j1");
        assert_eq!(book.lookup("Robert Smith").unwrap().short_id(), "b2");
        assert_eq!(book.lookup("j3").unwrap().title(), "JANE DOE");
    }

    #[test]
    fn missing_lookups_are_not_found() {
        let book = sample_book(title_only());
        assert!(matches!(book.get("nope"), Err(ContactError::NotFound(_))));
        assert!(matches!(book.by_name("Nobody"), Err(ContactError::NotFound(_))));
        assert!(matches!(
            AddressBook::new(title_only()).unwrap().update("x", |_| {}),
            Err(ContactError::NotFound(_))
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let result = AddressBook::from_records(
            vec![contact("a/1", "A", "", ""), contact("b/1", "B", "", "")],
            title_only(),
        );
        assert!(matches!(result, Err(ContactError::MalformedInput(_))));
    }

    #[test]
    fn from_entries_fails_on_missing_identity() {
        let entries = vec![json!({ "id": "x/1", "title": "Ok" }), json!({ "title": "No id" })];
        assert!(matches!(
            AddressBook::from_entries(&entries, title_only()),
            Err(ContactError::MalformedInput(_))
        ));
    }

    #[test]
    fn duplicates_exclude_the_record_itself() {
        let book = sample_book(title_only());
        let jane = book.get("j1").unwrap();
        let dupes: Vec<&str> = book.find_duplicates(jane).map(|r| r.short_id()).collect();
        assert_eq!(dupes, vec!["j3"]);
    }

    #[test]
    fn duplicate_pairs_use_configured_hash_keys() {
        let by_title = sample_book(title_only());
        let pairs: Vec<(&str, &str)> = by_title
            .duplicate_pairs()
            .map(|(a, b)| (a.short_id(), b.short_id()))
            .collect();
        assert_eq!(pairs, vec![("j1", "j3")]);

        // With emails in the text the two Janes no longer collide.
        let by_email = sample_book(BookConfig::default());
        assert_eq!(by_email.duplicate_pairs().count(), 0);
    }

    #[test]
    fn update_reindexes() {
        let mut book = sample_book(title_only());
        book.update("b2", |r| r.set_title("Jane Doe")).unwrap();

        assert_eq!(book.by_name_all("Jane Doe").count(), 2);
        assert_eq!(book.duplicate_pairs().count(), 3);
    }

    #[test]
    fn plan_and_apply_import() {
        let config = title_only().with_merge_policy(MergePolicy::IncomingWins);
        let mut book = AddressBook::from_records(
            vec![contact("base/j1", "Jane Doe", "jane@acme.com", "CEO at Acme")],
            config,
        )
        .unwrap();

        let incoming = vec![
            contact("csv-1", "Jane A. Doe", "jane.doe@gmail.com", "VP at Other"),
            contact("csv-2", "Xavier Quentin", "xq@zeta.io", ""),
        ];
        let actions = book.plan_import(incoming).unwrap();

        assert_eq!(actions.len(), 2);
        assert!(matches!(&actions[0], SyncAction::Update { id, changes, .. } if id == "j1" && changes.len() == 2));
        assert!(matches!(&actions[1], SyncAction::Create(r) if r.short_id() == "csv-2"));

        for action in actions {
            book.apply(action).unwrap();
        }

        let jane = book.get("j1").unwrap();
        assert_eq!(jane.email(), "jane.doe@gmail.com");
        assert_eq!(jane.organization(), "VP at Other");
        assert_eq!(book.len(), 2);
        assert!(book.get("csv-2").is_ok());
    }

    #[test]
    fn empty_book_has_no_duplicates() {
        let book = AddressBook::new(BookConfig::default()).unwrap();
        let stranger = contact("p", "Jane Doe", "jane@acme.com", "");
        assert!(book.is_empty());
        assert_eq!(book.find_duplicates(&stranger).count(), 0);
        assert_eq!(book.duplicate_pairs().count(), 0);
    }

    #[test]
    fn by_name_accepts_a_temporary_title() {
        let book = sample_book(title_only());
        let found = book.by_name(&format!("{} {}", "Robert", "Smith")).unwrap();
        assert_eq!(found.short_id(), "b2");
    }

    #[test]
    fn existing_wins_apply_keeps_existing_details() {
        let existing = ContactRecord::from_entry(&json!({
            "id": "base/j1",
            "title": "Jane Doe",
            "gd$organization": [{
                "rel": "http://schemas.google.com/g/2005#work",
                "primary": "true",
                "gd$orgName": { "$t": "Acme" },
                "gd$orgTitle": { "$t": "CEO" },
                "gd$orgDepartment": { "$t": "Exec" }
            }],
            "gd$email": [{
                "address": "jane@acme.com",
                "label": "Assistant desk",
                "primary": "true"
            }]
        }))
        .unwrap();
        let mut book = AddressBook::from_records(vec![existing.clone()], title_only()).unwrap();

        let incoming = vec![contact("csv-1", "Jane A. Doe", "jane.doe@gmail.com", "VP at Other")];
        let actions = book.plan_import(incoming).unwrap();
        assert!(matches!(
            &actions[..],
            [SyncAction::Update { policy: MergePolicy::ExistingWins, changes, .. }] if !changes.is_empty()
        ));

        for action in actions {
            book.apply(action).unwrap();
        }
        assert_eq!(book.get("j1").unwrap(), &existing);
    }

    #[test]
    fn repeated_incoming_records_are_planned_once() {
        let book = AddressBook::new(title_only()).unwrap();
        let incoming = vec![
            contact("csv-1", "Jane Doe", "jane@acme.com", ""),
            contact("csv-1", "Jane Doe", "jane@acme.com", ""),
        ];

        let actions = book.plan_import(incoming).unwrap();
        assert_eq!(actions.len(), 1);
        assert!(matches!(&actions[0], SyncAction::Create(r) if r.short_id() == "csv-1"));
    }

    #[test]
    fn entries_round_trip_through_book() {
        let book = sample_book(title_only());
        let again = AddressBook::from_entries(&book.to_entries(), title_only()).unwrap();
        assert_eq!(again.len(), book.len());
        assert_eq!(again.get("j1").unwrap(), book.get("j1").unwrap());
    }
}
