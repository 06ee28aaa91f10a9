//! Contacts feed documents: format selection, request URLs and extraction of
//! entries from a fetched JSON feed. Transport and auth live elsewhere.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::error::{ContactError, Result};
use crate::models::ContactRecord;

pub const CONTACTS_API_URL: &str = "https://www.google.com/m8/feeds";
pub const DEFAULT_MAX_RESULTS: u32 = 8192;

/// Feed document format requested from the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FeedFormat {
    #[default]
    Json,
    Atom,
    Rss,
}

impl FeedFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Atom => "atom",
            Self::Rss => "rss",
        }
    }
}

impl FromStr for FeedFormat {
    type Err = ContactError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "atom" => Ok(Self::Atom),
            "rss" => Ok(Self::Rss),
            other => Err(ContactError::InvalidConfiguration(format!(
                "unsupported feed format '{}' (expected json, atom or rss)",
                other
            ))),
        }
    }
}

impl TryFrom<String> for FeedFormat {
    type Error = ContactError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<FeedFormat> for String {
    fn from(format: FeedFormat) -> Self {
        format.as_str().to_string()
    }
}

impl fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a contacts feed request.
#[derive(Debug, Clone)]
pub struct FeedQuery {
    pub user_email: String,
    pub contact_id: Option<String>,
    pub batch: bool,
    pub format: FeedFormat,
    pub max_results: u32,
}

impl FeedQuery {
    pub fn new(user_email: impl Into<String>) -> Self {
        Self {
            user_email: user_email.into(),
            contact_id: None,
            batch: false,
            format: FeedFormat::default(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn url(&self) -> Result<Url> {
        let mut path = format!("{}/contacts/{}/full/", CONTACTS_API_URL, self.user_email);
        if self.batch {
            path.push_str("batch/");
        } else if let Some(id) = &self.contact_id {
            path.push_str(id);
            path.push('/');
        }

        let mut url = Url::parse(&path)
            .map_err(|e| ContactError::InvalidConfiguration(format!("bad feed url: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("alt", self.format.as_str())
            .append_pair("max-results", &self.max_results.to_string());
        Ok(url)
    }
}

/// Entries of a JSON feed document. A feed without `entry` has none.
pub fn parse_feed(json: &str) -> Result<Vec<Value>> {
    let doc: Value = serde_json::from_str(json)?;
    let feed = doc
        .get("feed")
        .ok_or_else(|| ContactError::MalformedInput("document has no feed".into()))?;

    match feed.get("entry") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(entries)) => Ok(entries.clone()),
        Some(_) => Err(ContactError::MalformedInput("feed.entry is not a list".into())),
    }
}

/// The feed-level etag, if any.
pub fn feed_etag(json: &str) -> Result<Option<String>> {
    let doc: Value = serde_json::from_str(json)?;
    Ok(doc
        .pointer("/feed/gd$etag")
        .and_then(Value::as_str)
        .map(String::from))
}

/// Records for a fetched document. Only JSON feeds are decoded; other
/// formats yield no records. Entries that fail to parse are skipped.
pub fn records_from_document(body: &str, format: FeedFormat) -> Result<Vec<ContactRecord>> {
    if format != FeedFormat::Json {
        return Ok(Vec::new());
    }

    Ok(records_from_entries(&parse_feed(body)?))
}

pub fn records_from_entries(entries: &[Value]) -> Vec<ContactRecord> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(position, entry)| match ContactRecord::from_entry(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(position, error = %e, "skipping feed entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"{
        "feed": {
            "gd$etag": "W/\"CUMBRHo_fip7I2A9WhJXGE0.\"",
            "entry": [
                { "id": { "$t": "http://www.google.com/m8/feeds/contacts/me/base/1" }, "title": { "$t": "Jane Doe" } },
                { "title": { "$t": "No Id" } },
                { "id": { "$t": "http://www.google.com/m8/feeds/contacts/me/base/2" }, "title": { "$t": "Bob" } }
            ]
        }
    }"#;

    #[test]
    fn format_parsing() {
        assert_eq!("JSON".parse::<FeedFormat>().unwrap(), FeedFormat::Json);
        assert_eq!("rss".parse::<FeedFormat>().unwrap(), FeedFormat::Rss);
        assert!(matches!(
            "xml".parse::<FeedFormat>(),
            Err(ContactError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn feed_urls() {
        let mut query = FeedQuery::new("me@gmail.com");
        assert_eq!(
            query.url().unwrap().as_str(),
            "https://www.google.com/m8/feeds/contacts/me@gmail.com/full/?alt=json&max-results=8192"
        );

        query.contact_id = Some("abc".into());
        query.max_results = 1;
        assert!(query.url().unwrap().path().ends_with("/full/abc/"));

        query.batch = true;
        assert!(query.url().unwrap().path().ends_with("/full/batch/"));
    }

    #[test]
    fn parse_feed_entries_and_etag() {
        assert_eq!(parse_feed(FEED).unwrap().len(), 3);
        assert_eq!(
            feed_etag(FEED).unwrap().as_deref(),
            Some("W/\"CUMBRHo_fip7I2A9WhJXGE0.\"")
        );
    }

    #[test]
    fn feed_without_entries_is_empty() {
        assert!(parse_feed(r#"{ "feed": {} }"#).unwrap().is_empty());
        assert!(feed_etag(r#"{ "feed": {} }"#).unwrap().is_none());
    }

    #[test]
    fn document_without_feed_is_malformed() {
        assert!(matches!(
            parse_feed(r#"{ "entries": [] }"#),
            Err(ContactError::MalformedInput(_))
        ));
    }

    #[test]
    fn bad_entries_are_skipped() {
        let records = records_from_document(FEED, FeedFormat::Json).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.short_id()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn non_json_formats_yield_nothing() {
        assert!(records_from_document("<feed/>", FeedFormat::Atom).unwrap().is_empty());
    }
}
