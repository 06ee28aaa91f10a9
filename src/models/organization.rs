use serde::{Deserialize, Serialize};

use super::field::FieldEntry;
use super::relation::Relation;

const TITLE_SEPARATOR: &str = " at ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Organization {
    pub name: Option<String>,
    pub title: Option<String>,
    pub department: Option<String>,
    pub job_description: Option<String>,
    pub symbol: Option<String>,
    pub location: Option<String>,
    pub relation: Option<Relation>,
    pub label: Option<String>,
    pub is_primary: bool,
}

impl Organization {
    /// Parse `"<title> at <org>"`; a value without the separator is an org name.
    pub fn parse(value: &str) -> Self {
        let (title, name) = match value.split_once(TITLE_SEPARATOR) {
            Some((t, n)) => (non_empty(t), non_empty(n)),
            None => (None, non_empty(value)),
        };

        Self {
            name,
            title,
            relation: Some(Relation::Work),
            ..Self::default()
        }
    }

    /// `"<title> at <org>"`, or whichever part is present.
    pub fn display(&self) -> String {
        join_title(self.title.as_deref(), self.name.as_deref())
    }
}

/// Join a job title and an organization name the way organizations display.
pub fn join_title(title: Option<&str>, name: Option<&str>) -> String {
    [title, name]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(TITLE_SEPARATOR)
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

impl FieldEntry for Organization {
    fn is_primary(&self) -> bool {
        self.is_primary
    }

    fn set_primary(&mut self, primary: bool) {
        self.is_primary = primary;
    }

    fn field(&self, key: &str) -> Option<&str> {
        match key {
            "name" => self.name.as_deref(),
            "title" => self.title.as_deref(),
            "department" => self.department.as_deref(),
            "job_description" => self.job_description.as_deref(),
            "symbol" => self.symbol.as_deref(),
            "where" => self.location.as_deref(),
            "label" => self.label.as_deref(),
            "rel" => self.relation.as_ref().map(|r| r.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_title_at_org() {
        let org = Organization::parse("CEO at Acme");
        assert_eq!(org.title.as_deref(), Some("CEO"));
        assert_eq!(org.name.as_deref(), Some("Acme"));
        assert_eq!(org.display(), "CEO at Acme");
    }

    #[test]
    fn parse_bare_org_name() {
        let org = Organization::parse("Acme Corp");
        assert!(org.title.is_none());
        assert_eq!(org.display(), "Acme Corp");
    }

    #[test]
    fn display_skips_empty_parts() {
        assert_eq!(join_title(Some(""), Some("Acme")), "Acme");
        assert_eq!(join_title(Some("CTO"), None), "CTO");
        assert_eq!(join_title(None, None), "");
    }
}
