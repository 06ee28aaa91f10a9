//! Similarity fingerprints for near-duplicate detection.
//!
//! A fingerprint is a simhash over the lowercased text
//! `title + primary value of each hash key`. Records whose token sets mostly
//! overlap end up a few bits apart; unrelated records land about half the
//! width apart.

mod index;

pub use index::{Duplicates, FingerprintIndex, IndexSettings, Match};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ContactError, Result};
use crate::models::{ContactRecord, FieldGroup};

pub const DEFAULT_BITS: u32 = 64;

/// Tokens shorter than this are ignored (initials, stray punctuation).
const MIN_TOKEN_CHARS: usize = 2;

/// A `(group, field)` pair whose primary value feeds the fingerprint text.
/// Written `group.field`, e.g. `email.address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HashKey {
    pub group: FieldGroup,
    pub field: String,
}

impl HashKey {
    pub fn new(group: FieldGroup, field: &str) -> Result<Self> {
        if !group.keys().contains(&field) {
            return Err(ContactError::InvalidConfiguration(format!(
                "unknown field '{}' for group '{}' (expected one of: {})",
                field,
                group.as_str(),
                group.keys().join(", ")
            )));
        }

        Ok(Self {
            group,
            field: field.to_string(),
        })
    }
}

impl FromStr for HashKey {
    type Err = ContactError;

    fn from_str(s: &str) -> Result<Self> {
        let (group, field) = s.trim().split_once('.').ok_or_else(|| {
            ContactError::InvalidConfiguration(format!(
                "hash key '{}' must look like group.field",
                s
            ))
        })?;
        let group = FieldGroup::parse(group).ok_or_else(|| {
            ContactError::InvalidConfiguration(format!("unknown field group '{}'", group))
        })?;

        Self::new(group, field)
    }
}

impl TryFrom<String> for HashKey {
    type Error = ContactError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<HashKey> for String {
    fn from(key: HashKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group.as_str(), self.field)
    }
}

/// `[email.address, phone.uri]`
pub fn default_hash_keys() -> Vec<HashKey> {
    vec![
        HashKey {
            group: FieldGroup::Email,
            field: "address".into(),
        },
        HashKey {
            group: FieldGroup::Phone,
            field: "uri".into(),
        },
    ]
}

/// A fixed-width similarity hash tagged with the short id of its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    value: u64,
    bits: u32,
    cid: String,
}

impl Fingerprint {
    pub fn from_text(text: &str, bits: u32, cid: impl Into<String>) -> Self {
        let bits = bits.clamp(1, 64);
        let mut weights = vec![0i64; bits as usize];

        for token in tokens(text) {
            let hash = token_hash(token);
            for (i, weight) in weights.iter_mut().enumerate() {
                if (hash >> i) & 1 == 1 {
                    *weight += 1;
                } else {
                    *weight -= 1;
                }
            }
        }

        let value = weights
            .iter()
            .enumerate()
            .filter(|(_, w)| **w > 0)
            .fold(0u64, |acc, (i, _)| acc | (1 << i));

        Self {
            value,
            bits,
            cid: cid.into(),
        }
    }

    /// Wrap a precomputed hash, keeping only the low `bits` bits.
    pub fn from_value(value: u64, bits: u32, cid: impl Into<String>) -> Self {
        let bits = bits.clamp(1, 64);
        let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
        Self {
            value: value & mask,
            bits,
            cid: cid.into(),
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Short id of the record this fingerprint was computed from.
    pub fn cid(&self) -> &str {
        &self.cid
    }

    pub fn distance(&self, other: &Fingerprint) -> u32 {
        hamming_distance(self.value, other.value)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.bits.div_ceil(4) as usize;
        write!(f, "{:0width$x}", self.value, width = width)
    }
}

pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Lowercased `title` followed by the primary value of each hash key.
/// Keys with no value contribute nothing.
pub fn hash_text(record: &ContactRecord, hash_keys: &[HashKey]) -> String {
    std::iter::once(record.title())
        .chain(
            hash_keys
                .iter()
                .map(|key| record.get_primary(key.group, &key.field, "")),
        )
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn compute_fingerprint(record: &ContactRecord, hash_keys: &[HashKey], bits: u32) -> Fingerprint {
    Fingerprint::from_text(&hash_text(record, hash_keys), bits, record.short_id())
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
}

fn token_hash(token: &str) -> u64 {
    let digest = Sha256::digest(token.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::default_home_domains;

    fn jane(title: &str, email: &str) -> ContactRecord {
        let mut r = ContactRecord::new(title.to_lowercase().replace(' ', "-"), title);
        if !email.is_empty() {
            r.set_email(email, &default_home_domains());
        }
        r
    }

    #[test]
    fn hash_key_parses_group_and_field() {
        let key: HashKey = "email.address".parse().unwrap();
        assert_eq!(key.group, FieldGroup::Email);
        assert_eq!(key.field, "address");
        assert_eq!(key.to_string(), "email.address");
    }

    #[test]
    fn malformed_hash_keys_are_rejected() {
        for bad in ["email", "fax.number", "email.uri", ""] {
            let err = bad.parse::<HashKey>().unwrap_err();
            assert!(matches!(err, ContactError::InvalidConfiguration(_)), "{}", bad);
        }
    }

    #[test]
    fn hash_text_joins_title_and_primaries() {
        let r = jane("Jane Doe", "Jane@Acme.com");
        assert_eq!(hash_text(&r, &default_hash_keys()), "jane doe jane@acme.com");
        assert_eq!(hash_text(&r, &[]), "jane doe");
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let r = jane("Jane Doe", "jane@acme.com");
        let keys = default_hash_keys();
        assert_eq!(compute_fingerprint(&r, &keys, 64), compute_fingerprint(&r, &keys, 64));
    }

    #[test]
    fn empty_record_has_stable_zero_fingerprint() {
        let r = ContactRecord::new("empty", "");
        let fp = compute_fingerprint(&r, &default_hash_keys(), 64);
        assert_eq!(fp.value(), 0);
        assert_eq!(fp.cid(), "empty");
        assert_eq!(fp.to_string(), "0000000000000000");
    }

    #[test]
    fn middle_initial_and_case_stay_close() {
        let a = compute_fingerprint(&jane("Jane Doe", ""), &[], 64);
        let b = compute_fingerprint(&jane("JANE A. DOE", ""), &[], 64);
        assert!(a.distance(&b) <= 3, "distance {}", a.distance(&b));
    }

    #[test]
    fn full_middle_name_is_not_a_near_duplicate() {
        let a = compute_fingerprint(&jane("Jane Doe", ""), &[], 64);
        let b = compute_fingerprint(&jane("Jane Anne Doe", ""), &[], 64);
        assert!(a.distance(&b) > 3, "distance {}", a.distance(&b));
    }

    #[test]
    fn disjoint_records_are_far_apart() {
        let keys = default_hash_keys();
        let a = compute_fingerprint(&jane("Jane Doe", "jane@acme.com"), &keys, 64);
        let b = compute_fingerprint(&jane("Robert Smith", "bob@example.org"), &keys, 64);
        assert!(a.distance(&b) > 3, "distance {}", a.distance(&b));
    }

    #[test]
    fn narrow_fingerprints_fit_their_width() {
        let fp = Fingerprint::from_text("jane doe", 16, "x");
        assert!(fp.value() < 1 << 16);
        assert_eq!(fp.bits(), 16);
    }

    #[test]
    fn hamming_counts_differing_bits() {
        assert_eq!(hamming_distance(0b1010, 0b0110), 2);
        assert_eq!(hamming_distance(u64::MAX, 0), 64);
    }
}
