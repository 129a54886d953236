use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Label used when an entity has no extracted type.
pub const DEFAULT_ENTITY_TYPE: &str = "Entity";

static RELATION_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("relation type pattern"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Entity ids are the extracted surface string, trimmed and de-quoted.
pub fn clean_entity_id(raw: &str) -> String {
    raw.trim().replace('"', "").trim().to_string()
}

/// Trimmed entity type, falling back to [`DEFAULT_ENTITY_TYPE`].
pub fn clean_entity_type(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        DEFAULT_ENTITY_TYPE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// A relationship type name that is safe to splice into query text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationType(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRelationType(pub String);

impl fmt::Display for InvalidRelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid relationship type: {:?}", self.0)
    }
}

impl std::error::Error for InvalidRelationType {}

impl RelationType {
    /// Uppercase, spaces to underscores, then check the allowed character set.
    pub fn normalize(raw: &str) -> Result<Self, InvalidRelationType> {
        let collapsed = WHITESPACE.replace_all(raw.trim(), "_");
        let normalized = collapsed.to_uppercase();

        if RELATION_TYPE.is_match(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(InvalidRelationType(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
