use serde::{Deserialize, Serialize};

use super::field::FieldEntry;
use super::relation::Relation;

/// A postal address, either free text (`formatted` only) or structured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PostalAddress {
    pub formatted: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
    pub relation: Option<Relation>,
    pub label: Option<String>,
    pub is_primary: bool,
}

impl PostalAddress {
    pub fn formatted(text: String) -> Self {
        Self {
            formatted: Some(text),
            ..Self::default()
        }
    }

    pub fn is_structured(&self) -> bool {
        self.street.is_some()
            || self.city.is_some()
            || self.region.is_some()
            || self.postcode.is_some()
            || self.country.is_some()
    }

    /// Equality ignoring the primary flag.
    pub fn same_place(&self, other: &Self) -> bool {
        self.formatted == other.formatted
            && self.street == other.street
            && self.city == other.city
            && self.region == other.region
            && self.postcode == other.postcode
            && self.country == other.country
    }

    pub fn city_region(&self) -> Option<String> {
        match (&self.city, &self.region) {
            (Some(c), Some(r)) => Some(format!("{}, {}", c, r)),
            (Some(c), None) => Some(c.clone()),
            (None, Some(r)) => Some(r.clone()),
            (None, None) => None,
        }
    }
}

impl FieldEntry for PostalAddress {
    fn is_primary(&self) -> bool {
        self.is_primary
    }

    fn set_primary(&mut self, primary: bool) {
        self.is_primary = primary;
    }

    fn field(&self, key: &str) -> Option<&str> {
        match key {
            "formatted" => self.formatted.as_deref(),
            "street" => self.street.as_deref(),
            "city" => self.city.as_deref(),
            "region" => self.region.as_deref(),
            "postcode" => self.postcode.as_deref(),
            "country" => self.country.as_deref(),
            "label" => self.label.as_deref(),
            "rel" => self.relation.as_ref().map(|r| r.as_str()),
            _ => None,
        }
    }
}
