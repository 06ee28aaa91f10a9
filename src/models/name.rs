use serde::{Deserialize, Serialize};

/// Structured name parts, all optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Name {
    pub given: Option<String>,
    pub additional: Option<String>,
    pub family: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

impl Name {
    pub fn is_empty(&self) -> bool {
        self.parts().next().is_none()
    }

    /// `[Prefix] Given [Additional] Family [Suffix]`
    pub fn full_name(&self) -> String {
        self.parts().collect::<Vec<_>>().join(" ")
    }

    fn parts(&self) -> impl Iterator<Item = &str> {
        [
            self.prefix.as_deref(),
            self.given.as_deref(),
            self.additional.as_deref(),
            self.family.as_deref(),
            self.suffix.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_orders_parts() {
        let name = Name {
            given: Some("Jane".into()),
            additional: Some("A.".into()),
            family: Some("Doe".into()),
            prefix: Some("Dr.".into()),
            suffix: None,
        };
        assert_eq!(name.full_name(), "Dr. Jane A. Doe");
    }

    #[test]
    fn empty_parts_are_ignored() {
        let name = Name {
            given: Some(String::new()),
            ..Name::default()
        };
        assert!(name.is_empty());
        assert_eq!(name.full_name(), "");
    }
}
