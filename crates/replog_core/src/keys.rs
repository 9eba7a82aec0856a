//! Key layout of one store.
//!
//! ```text
//! [name, "$record"]                    store record
//! [name, "$items", id]                 entity documents
//! [name, "$log:primaryKey", id]        pending entry of an entity
//! [name, "$log:sequence", sequence]    the log itself
//! ```

use replog_storage::KeyBuilder;

#[derive(Debug, Clone)]
pub(crate) struct StoreKeys {
    name: String,
}

impl StoreKeys {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub(crate) fn root(&self) -> Vec<u8> {
        KeyBuilder::new().text(&self.name).build()
    }

    pub(crate) fn record(&self) -> Vec<u8> {
        KeyBuilder::new().text(&self.name).text("$record").build()
    }

    pub(crate) fn items(&self) -> Vec<u8> {
        KeyBuilder::new().text(&self.name).text("$items").build()
    }

    pub(crate) fn item(&self, id: &str) -> Vec<u8> {
        KeyBuilder::new()
            .text(&self.name)
            .text("$items")
            .text(id)
            .build()
    }

    pub(crate) fn primary_key_index(&self) -> Vec<u8> {
        KeyBuilder::new()
            .text(&self.name)
            .text("$log:primaryKey")
            .build()
    }

    pub(crate) fn primary_key_entry(&self, id: &str) -> Vec<u8> {
        KeyBuilder::new()
            .text(&self.name)
            .text("$log:primaryKey")
            .text(id)
            .build()
    }

    pub(crate) fn sequence_index(&self) -> Vec<u8> {
        KeyBuilder::new()
            .text(&self.name)
            .text("$log:sequence")
            .build()
    }

    pub(crate) fn sequence_entry(&self, sequence: u64) -> Vec<u8> {
        KeyBuilder::new()
            .text(&self.name)
            .text("$log:sequence")
            .uint(sequence)
            .build()
    }
}
