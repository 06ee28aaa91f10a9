use serde::{Deserialize, Serialize};

use super::field::FieldEntry;
use super::relation::Relation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    pub number: String,
    /// RFC 3966 form (`tel:+1-555-...`) when the feed provides one.
    pub uri: Option<String>,
    pub relation: Option<Relation>,
    pub label: Option<String>,
    pub is_primary: bool,
}

impl Phone {
    pub fn new(number: String) -> Self {
        Self {
            number,
            uri: None,
            relation: None,
            label: None,
            is_primary: false,
        }
    }
}

impl FieldEntry for Phone {
    fn is_primary(&self) -> bool {
        self.is_primary
    }

    fn set_primary(&mut self, primary: bool) {
        self.is_primary = primary;
    }

    fn field(&self, key: &str) -> Option<&str> {
        match key {
            "number" => Some(self.number.as_str()),
            "uri" => self.uri.as_deref(),
            "label" => self.label.as_deref(),
            "rel" => self.relation.as_ref().map(|r| r.as_str()),
            _ => None,
        }
    }
}
