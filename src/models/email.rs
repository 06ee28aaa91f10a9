use serde::{Deserialize, Serialize};

use super::field::FieldEntry;
use super::relation::Relation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub address: String,
    pub relation: Option<Relation>,
    pub label: Option<String>,
    pub is_primary: bool,
}

impl Email {
    pub fn new(address: String) -> Self {
        Self {
            address,
            relation: None,
            label: None,
            is_primary: false,
        }
    }

    /// Domain part of the address, lowercased. Empty when there is no `@`.
    pub fn domain(&self) -> String {
        self.address
            .rsplit_once('@')
            .map(|(_, d)| d.to_lowercase())
            .unwrap_or_default()
    }
}

impl FieldEntry for Email {
    fn is_primary(&self) -> bool {
        self.is_primary
    }

    fn set_primary(&mut self, primary: bool) {
        self.is_primary = primary;
    }

    fn field(&self, key: &str) -> Option<&str> {
        match key {
            "address" => Some(self.address.as_str()),
            "label" => self.label.as_deref(),
            "rel" => self.relation.as_ref().map(|r| r.as_str()),
            _ => None,
        }
    }
}
