use serde::{Deserialize, Serialize};

use super::relation::Relation;

/// An instant-messaging handle. `protocol` holds either a GData namespace URI
/// or whatever alias the source supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImHandle {
    pub address: String,
    pub protocol: String,
    pub relation: Option<Relation>,
    pub label: Option<String>,
}

impl ImHandle {
    pub fn new(address: String, protocol: String) -> Self {
        Self {
            address,
            protocol,
            relation: None,
            label: None,
        }
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        match key {
            "address" => Some(self.address.as_str()),
            "protocol" => Some(self.protocol.as_str()),
            "label" => self.label.as_deref(),
            "rel" => self.relation.as_ref().map(|r| r.as_str()),
            _ => None,
        }
    }
}
