use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An entity tag: the opaque version marker the store assigns on every write.
///
/// Only ever compared for equality. The content is never parsed or ordered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ETag(String);

impl ETag {
    /// Matches any current version.
    pub const WILDCARD: &'static str = "*";

    /// Creates an entity tag, returning `None` if the value is empty or blank.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let v = value.into();
        match v.trim() {
            "" => None,
            Self::WILDCARD => Some(Self::any()),
            _ => Some(Self(v)),
        }
    }

    pub fn any() -> Self {
        Self(Self::WILDCARD.to_string())
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == Self::WILDCARD
    }

    /// True if this tag, used as a precondition, accepts `current`.
    pub fn matches(&self, current: &ETag) -> bool {
        self.is_wildcard() || self == current
    }

    /// A fresh, quoted tag for a new revision.
    pub(crate) fn generate() -> Self {
        Self(format!("\"{}\"", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ETag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
