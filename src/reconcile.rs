//! Matching an incoming record against an address book and computing the
//! field-level merge diff.
//!
//! Each call is a single step: the incoming record is either unmatched
//! ([`Decision::Create`]) or matched to the nearest indexed record
//! ([`Decision::Update`]). Nothing here performs I/O.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::book::AddressBook;
use crate::error::{ContactError, Result};
use crate::models::ContactRecord;
use crate::normalize::HomeDomains;

/// Which side's organization and email survive a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// The address book is authoritative: the existing record's values are
    /// copied onto the incoming one.
    #[default]
    ExistingWins,
    /// Incoming values replace the existing record's.
    IncomingWins,
}

impl MergePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExistingWins => "existing-wins",
            Self::IncomingWins => "incoming-wins",
        }
    }
}

impl FromStr for MergePolicy {
    type Err = ContactError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "existing-wins" | "existing" => Ok(Self::ExistingWins),
            "incoming-wins" | "incoming" => Ok(Self::IncomingWins),
            other => Err(ContactError::InvalidConfiguration(format!(
                "unknown merge policy '{}' (expected existing-wins or incoming-wins)",
                other
            ))),
        }
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeField {
    Email,
    Organization,
}

impl MergeField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Organization => "organization",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: MergeField,
    pub old: String,
    pub new: String,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "changed {}: {} -> {}", self.field.as_str(), self.old, self.new)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// No indexed record is close enough.
    Create,
    /// Matched `matched_id`. Under [`MergePolicy::ExistingWins`] the changes
    /// describe (and have been applied to) the incoming record; under
    /// [`MergePolicy::IncomingWins`] they describe what the existing record
    /// would become.
    Update {
        matched_id: String,
        distance: u32,
        policy: MergePolicy,
        changes: Vec<FieldChange>,
    },
}

impl Decision {
    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create)
    }

    pub fn changes(&self) -> &[FieldChange] {
        match self {
            Self::Create => &[],
            Self::Update { changes, .. } => changes,
        }
    }
}

/// Find the closest duplicate of `incoming` in `book` and merge per `policy`.
pub fn reconcile(
    incoming: &mut ContactRecord,
    book: &AddressBook,
    policy: MergePolicy,
) -> Result<Decision> {
    let fingerprint = book.fingerprint(incoming);
    let nearest = book
        .index()
        .find_duplicates(&fingerprint)
        .with_distance()
        .next()
        .map(|m| (m.cid.to_string(), m.distance));

    let Some((matched_id, distance)) = nearest else {
        info!(title = incoming.title(), "no duplicate found");
        return Ok(Decision::Create);
    };

    let existing = book.get(&matched_id)?;
    debug!(
        incoming = incoming.title(),
        existing = existing.title(),
        distance,
        "duplicate found"
    );

    let home_domains = &book.config().home_domains;
    let changes = match policy {
        MergePolicy::ExistingWins => {
            let before = snapshot(incoming);
            copy_merge_fields(existing, incoming, home_domains);
            diff(&before, &snapshot(incoming))
        }
        MergePolicy::IncomingWins => {
            let mut preview = existing.clone();
            copy_merge_fields(incoming, &mut preview, home_domains);
            diff(&snapshot(existing), &snapshot(&preview))
        }
    };

    if changes.is_empty() {
        info!(matched_id = %matched_id, "no changes");
    }
    for change in &changes {
        info!(matched_id = %matched_id, "{}", change);
    }

    Ok(Decision::Update {
        matched_id,
        distance,
        policy,
        changes,
    })
}

/// Organization first so the email relation is inferred against the new
/// organization.
fn copy_merge_fields(source: &ContactRecord, target: &mut ContactRecord, home_domains: &HomeDomains) {
    let organization = source.organization();
    if !organization.is_empty() {
        target.set_organization(&organization);
    }

    let email = source.email();
    if !email.is_empty() {
        target.set_email(email, home_domains);
    }
}

struct Snapshot {
    email: String,
    organization: String,
}

fn snapshot(record: &ContactRecord) -> Snapshot {
    Snapshot {
        email: record.email().to_string(),
        organization: record.organization(),
    }
}

fn diff(before: &Snapshot, after: &Snapshot) -> Vec<FieldChange> {
    [
        (MergeField::Email, &before.email, &after.email),
        (MergeField::Organization, &before.organization, &after.organization),
    ]
    .into_iter()
    .filter(|(_, old, new)| old != new)
    .map(|(field, old, new)| FieldChange {
        field,
        old: old.clone(),
        new: new.clone(),
    })
    .collect()
}
