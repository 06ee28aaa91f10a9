use serde::{Deserialize, Serialize};

/// Namespace prefix GData uses for relation and protocol URIs.
pub const GOOGLE_NS: &str = "http://schemas.google.com/g/2005";

/// Context tag of a contact-detail entry (the GData `rel` attribute).
///
/// Rels outside the modelled set are kept verbatim in `Custom` so they are
/// written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Home,
    Work,
    #[default]
    Other,
    Mobile,
    Main,
    Fax,
    Custom(String),
}

const MODELLED: [Relation; 6] = [
    Relation::Home,
    Relation::Work,
    Relation::Other,
    Relation::Mobile,
    Relation::Main,
    Relation::Fax,
];

impl Relation {
    /// Short name; the URI fragment for `Custom`.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Home => "home",
            Self::Work => "work",
            Self::Other => "other",
            Self::Mobile => "mobile",
            Self::Main => "main",
            Self::Fax => "fax",
            Self::Custom(uri) => uri.rsplit('#').next().unwrap_or(uri),
        }
    }

    /// Parse a user-facing name. Unknown names become `Other`.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "home" => Self::Home,
            "work" => Self::Work,
            "mobile" | "cell" => Self::Mobile,
            "main" => Self::Main,
            "fax" => Self::Fax,
            _ => Self::Other,
        }
    }

    /// Parse a `rel` URI such as `http://schemas.google.com/g/2005#work`.
    pub fn from_uri(uri: &str) -> Self {
        MODELLED
            .into_iter()
            .find(|rel| rel.uri() == uri)
            .unwrap_or_else(|| Self::Custom(uri.to_string()))
    }

    pub fn uri(&self) -> String {
        match self {
            Self::Custom(uri) => uri.clone(),
            rel => format!("{}#{}", GOOGLE_NS, rel.as_str()),
        }
    }
}
