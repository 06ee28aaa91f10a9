use serde::{Deserialize, Serialize};

/// A repeated field group on a contact record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldGroup {
    Email,
    Phone,
    Organization,
    Im,
    Address,
}

impl FieldGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Organization => "organization",
            Self::Im => "im",
            Self::Address => "address",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "email" => Some(Self::Email),
            "phone" => Some(Self::Phone),
            "organization" | "org" => Some(Self::Organization),
            "im" => Some(Self::Im),
            "address" => Some(Self::Address),
            _ => None,
        }
    }

    /// Keys readable through [`FieldEntry::field`] for this group.
    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            Self::Email => &["address", "label", "rel"],
            Self::Phone => &["number", "uri", "label", "rel"],
            Self::Organization => &[
                "name",
                "title",
                "department",
                "job_description",
                "symbol",
                "where",
                "label",
                "rel",
            ],
            Self::Im => &["address", "protocol", "label", "rel"],
            Self::Address => &[
                "formatted",
                "street",
                "city",
                "region",
                "postcode",
                "country",
                "label",
                "rel",
            ],
        }
    }
}

/// One entry of a repeated field group.
pub trait FieldEntry {
    fn is_primary(&self) -> bool;

    fn set_primary(&mut self, primary: bool);

    /// Value of a named key, `None` when unset or unknown.
    fn field(&self, key: &str) -> Option<&str>;
}

/// The primary entry, or the first one when none is flagged.
pub fn primary_entry<T: FieldEntry>(entries: &[T]) -> Option<&T> {
    entries
        .iter()
        .find(|e| e.is_primary())
        .or_else(|| entries.first())
}

/// Prepend `new`, dropping entries equal to it and demoting the old primary
/// when `new` is primary.
pub fn insert_with_displacement<T, F>(entries: &mut Vec<T>, new: T, same: F)
where
    T: FieldEntry,
    F: Fn(&T) -> bool,
{
    let new_is_primary = new.is_primary();
    let mut kept: Vec<T> = Vec::with_capacity(entries.len() + 1);
    kept.push(new);

    for mut entry in entries.drain(..) {
        if same(&entry) {
            continue;
        }
        if new_is_primary {
            entry.set_primary(false);
        }
        kept.push(entry);
    }

    *entries = kept;
}

/// Keep only the first primary flag of a group.
pub fn enforce_single_primary<T: FieldEntry>(entries: &mut [T]) {
    let mut seen = false;
    for entry in entries.iter_mut() {
        if entry.is_primary() {
            if seen {
                entry.set_primary(false);
            }
            seen = true;
        }
    }
}
