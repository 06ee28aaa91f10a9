//! Field normalization: IM protocol canonicalization, email relation
//! inference and per-record deduplication of repeated entries.

use std::collections::{BTreeSet, HashSet};

use crate::models::{Email, ImHandle, Relation, GOOGLE_NS};

/// Domains whose addresses are treated as personal (`home`) mail.
pub type HomeDomains = BTreeSet<String>;

pub const DEFAULT_HOME_DOMAINS: &[&str] = &["gmail.com", "yahoo.com", "comcast.net"];

/// Label given to `.edu` addresses that matched neither work nor home.
pub const SCHOOL_LABEL: &str = "School";

/// Protocol aliases → GData protocol names.
/// See https://developers.google.com/gdata/docs/2.0/elements#gdIm
const IM_PROTOCOLS: &[(&str, &str)] = &[
    ("aim", "AIM"),
    ("gtalk", "GOOGLE_TALK"),
    ("googletalk", "GOOGLE_TALK"),
    ("google", "GOOGLE_TALK"),
    ("icq", "ICQ"),
    ("jabber", "JABBER"),
    ("msn", "MSN"),
    ("qq", "QQ"),
    ("skype", "SKYPE"),
    ("yahoo", "YAHOO"),
];

pub fn default_home_domains() -> HomeDomains {
    DEFAULT_HOME_DOMAINS.iter().map(|d| d.to_string()).collect()
}

/// Canonicalize an IM protocol. Namespace URIs are kept as-is, known aliases
/// become `http://schemas.google.com/g/2005#<PROTOCOL>`, anything else passes
/// through unchanged.
pub fn normalize_protocol(raw: &str) -> String {
    if raw.starts_with("http://schemas") {
        return raw.to_string();
    }

    let lowered: String = raw.to_lowercase().chars().filter(|c| *c != ' ').collect();
    let stripped = lowered.strip_suffix("chat").unwrap_or(&lowered);
    let alias: String = stripped.chars().filter(|c| *c != '-' && *c != '_').collect();

    IM_PROTOCOLS
        .iter()
        .find(|(a, _)| *a == alias)
        .map(|(_, proto)| format!("{}#{}", GOOGLE_NS, proto))
        .unwrap_or_else(|| raw.to_string())
}

/// Normalize protocols and drop repeated (protocol, address) pairs, keeping
/// the first occurrence.
pub fn clean_ims(ims: &[ImHandle]) -> Vec<ImHandle> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut cleaned = Vec::with_capacity(ims.len());

    for im in ims {
        let protocol = normalize_protocol(&im.protocol);
        if seen.insert((protocol.clone(), im.address.clone())) {
            cleaned.push(ImHandle {
                protocol,
                ..im.clone()
            });
        }
    }

    cleaned
}

/// Drop repeated addresses (case-insensitive), keeping the first occurrence.
/// A dropped duplicate's primary flag moves to the survivor.
pub fn dedupe_emails(emails: &[Email]) -> Vec<Email> {
    let mut kept: Vec<Email> = Vec::with_capacity(emails.len());
    let mut has_primary = false;

    for email in emails {
        let key = email.address.to_lowercase();
        let promote = email.is_primary && !has_primary;

        match kept.iter_mut().find(|e| e.address.to_lowercase() == key) {
            Some(existing) => {
                if promote {
                    existing.is_primary = true;
                    has_primary = true;
                }
            }
            None => {
                let mut email = email.clone();
                email.is_primary = promote;
                has_primary |= promote;
                kept.push(email);
            }
        }
    }

    kept
}

/// Outlook-style exports tag personal mail with an "Internet Email" label
/// and no relation; those become `home`.
pub fn label_internet_emails(emails: &mut [Email]) {
    for email in emails.iter_mut() {
        let internet = email
            .label
            .as_deref()
            .is_some_and(|l| l.eq_ignore_ascii_case("internet email"));

        if internet && email.relation.is_none() {
            email.relation = Some(Relation::Home);
        }
    }
}

/// Relation (and an optional label) for an address given the record's
/// current organization string.
pub fn infer_email_relation(
    address: &str,
    organization: &str,
    home_domains: &HomeDomains,
) -> (Relation, Option<&'static str>) {
    let domain = address
        .rsplit_once('@')
        .map(|(_, d)| d.to_lowercase())
        .unwrap_or_default();
    let host = domain.split('.').next().unwrap_or_default();
    let org: String = organization
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if !host.is_empty() && org.contains(host) {
        (Relation::Work, None)
    } else if home_domains.contains(&domain) {
        (Relation::Home, None)
    } else if domain.contains(".edu") {
        (Relation::Other, Some(SCHOOL_LABEL))
    } else {
        (Relation::Other, None)
    }
}
