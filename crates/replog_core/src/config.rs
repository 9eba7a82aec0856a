//! Change-log configuration.

/// Configuration for a [`ChangeLog`](crate::ChangeLog).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeLogConfig {
    /// Entity fields copied into each log entry so readers can filter
    /// without fetching the entity.
    pub projection: Vec<String>,
    /// Collections whose writes are never logged.
    pub excluded_collections: Vec<String>,
}

impl ChangeLogConfig {
    /// Creates a configuration without projection or exclusions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a projected field.
    pub fn with_projection(mut self, field: impl Into<String>) -> Self {
        self.projection.push(field.into());
        self
    }

    /// Excludes a collection from the log.
    pub fn with_excluded_collection(mut self, collection: impl Into<String>) -> Self {
        self.excluded_collections.push(collection.into());
        self
    }

    /// Returns `true` if writes to `collection` are not logged.
    pub fn is_excluded(&self, collection: &str) -> bool {
        self.excluded_collections.iter().any(|c| c == collection)
    }
}
