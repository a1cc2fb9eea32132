use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TopicError {
    #[error("module id cannot be empty")]
    EmptyModule,
    #[error("section name cannot be empty")]
    EmptySection,
}

/// Validated module identifier (trimmed, non-empty).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// # Errors
    ///
    /// Returns `TopicError::EmptyModule` if the id is empty after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, TopicError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TopicError::EmptyModule);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validated section name within a module (trimmed, non-empty).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SectionName(String);

impl SectionName {
    /// # Errors
    ///
    /// Returns `TopicError::EmptySection` if the name is empty after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, TopicError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TopicError::EmptySection);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The unit a single practice session covers: one section of one module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TopicKey {
    module_id: ModuleId,
    section: SectionName,
}

impl TopicKey {
    #[must_use]
    pub fn new(module_id: ModuleId, section: SectionName) -> Self {
        Self { module_id, section }
    }

    /// Build a key from raw strings.
    ///
    /// # Errors
    ///
    /// Returns `TopicError` if either part is blank.
    pub fn parse(module_id: &str, section: &str) -> Result<Self, TopicError> {
        Ok(Self::new(ModuleId::new(module_id)?, SectionName::new(section)?))
    }

    #[must_use]
    pub fn module_id(&self) -> &ModuleId {
        &self.module_id
    }

    #[must_use]
    pub fn section(&self) -> &SectionName {
        &self.section
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.module_id, self.section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_parts_are_trimmed() {
        let key = TopicKey::parse("  photosynthesis ", " Light reactions ").unwrap();
        assert_eq!(key.module_id().as_str(), "photosynthesis");
        assert_eq!(key.section().as_str(), "Light reactions");
        assert_eq!(key.to_string(), "photosynthesis/Light reactions");
    }

    #[test]
    fn blank_parts_are_rejected() {
        assert_eq!(TopicKey::parse(" ", "a"), Err(TopicError::EmptyModule));
        assert_eq!(TopicKey::parse("m", ""), Err(TopicError::EmptySection));
    }
}
