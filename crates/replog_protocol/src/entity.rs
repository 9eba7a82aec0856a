//! Entity write contract.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A document stored under a primary key.
///
/// Primary keys are unique per store, across collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Collection the entity belongs to.
    pub collection: String,
    /// Primary key.
    pub id: String,
    /// Field values.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Entity {
    /// Creates an entity with no fields.
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Sets a field and returns the entity.
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Sets a field.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Returns a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Where a write comes from. Decides how the change log records it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteSource {
    /// An application write. Logged.
    #[default]
    User,
    /// A derived write. Never logged.
    Computed,
    /// A change pulled from the peer and applied here. Never logged, and
    /// retires any pending entry for the same entity.
    ReplicationApply,
    /// A change pushed here by a peer. Logged under the pusher's origin so
    /// other peers of this store receive it.
    ReplicationPush,
}

impl WriteSource {
    /// Returns the wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            WriteSource::User => "user",
            WriteSource::Computed => "computed",
            WriteSource::ReplicationApply => "replicationApply",
            WriteSource::ReplicationPush => "replicationPush",
        }
    }
}

impl fmt::Display for WriteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WriteSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(WriteSource::User),
            "computed" => Ok(WriteSource::Computed),
            "replicationApply" => Ok(WriteSource::ReplicationApply),
            "replicationPush" => Ok(WriteSource::ReplicationPush),
            other => Err(format!("unknown write source '{other}'")),
        }
    }
}

/// Options carried by entity writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Origin of the write.
    pub source: WriteSource,
    /// Store where the change was first made. Defaults to the written store.
    pub origin_store_id: Option<String>,
    /// Insert when the entity does not exist yet.
    pub create_if_missing: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            source: WriteSource::User,
            origin_store_id: None,
            create_if_missing: true,
        }
    }
}

impl WriteOptions {
    /// Options for an application write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a derived write.
    pub fn computed() -> Self {
        Self {
            source: WriteSource::Computed,
            ..Self::default()
        }
    }

    /// Options for applying a pulled change that originated in `origin`.
    pub fn replication_apply(origin: impl Into<String>) -> Self {
        Self {
            source: WriteSource::ReplicationApply,
            origin_store_id: Some(origin.into()),
            create_if_missing: true,
        }
    }

    /// Options for pushing a change that originated in `origin`.
    pub fn replication_push(origin: impl Into<String>) -> Self {
        Self {
            source: WriteSource::ReplicationPush,
            origin_store_id: Some(origin.into()),
            create_if_missing: true,
        }
    }

    /// Only update existing entities.
    pub fn update_only(mut self) -> Self {
        self.create_if_missing = false;
        self
    }
}

/// Entity access shared by local stores and remote proxies.
pub trait EntityStore {
    /// Error returned by every operation.
    type Error;

    /// Returns the stable identity of the store.
    fn store_id(&self) -> Result<String, Self::Error>;

    /// Reads an entity by primary key.
    fn get_by_id(&self, id: &str) -> Result<Option<Entity>, Self::Error>;

    /// Inserts or replaces an entity.
    fn save(&self, entity: &Entity, options: &WriteOptions) -> Result<(), Self::Error>;

    /// Deletes an entity, returning whether it existed.
    fn delete(&self, id: &str, options: &WriteOptions) -> Result<bool, Self::Error>;
}
