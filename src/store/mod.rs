//! # Store
//!
//! The document engine behind both collections.
//!
//! Records travel as loose JSON documents keyed by `_id`. Engines only need
//! to offer single-document atomic writes. Nothing here spans two
//! documents, so creating a food item and linking it to its dog is two
//! independent writes.
//!
//! ## Engines
//! - [`MemoryStore`]: process-local, used by tests and `STORE_BACKEND=memory`
//! - [`RedisStore`](crate::database::RedisStore): one Redis hash per collection
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod memory;

pub use memory::MemoryStore;

use crate::{
    id::RecordId,
    models::{DOG_FOOD_LIST, ID},
    query::Selection,
};

pub type Document = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Dogs,
    Foods,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Dogs => "dogs",
            Collection::Foods => "foods",
        }
    }

    /// Top-level fields holding arrays of keys.
    pub fn array_fields(self) -> &'static [&'static str] {
        match self {
            Collection::Dogs => &[DOG_FOOD_LIST],
            Collection::Foods => &[],
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Malformed document: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Document in {0} has no valid _id")]
    MissingKey(&'static str),

    #[error("E11000 duplicate key error collection: {collection} _id: {id}")]
    DuplicateKey {
        collection: &'static str,
        id: RecordId,
    },

    #[error("No document found for _id {id} in {collection}")]
    DocumentNotFound {
        collection: &'static str,
        id: RecordId,
    },

    #[error("Field `{field}` of {id} is not an array")]
    NotAnArray { id: RecordId, field: String },
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Whether `raw` looks like a key this engine could have issued.
    fn parse_key(&self, raw: &str) -> Option<RecordId> {
        raw.parse().ok()
    }

    /// Stores `document` under its `_id`, returning it as written.
    async fn insert(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<Document, StoreError>;

    async fn find_by_id(
        &self,
        collection: Collection,
        id: &RecordId,
    ) -> Result<Option<Document>, StoreError>;

    /// Documents for whichever of `ids` exist, in the order given.
    async fn find_by_ids(
        &self,
        collection: Collection,
        ids: &[RecordId],
    ) -> Result<Vec<Document>, StoreError>;

    async fn find(
        &self,
        collection: Collection,
        selection: &Selection,
    ) -> Result<Vec<Document>, StoreError>;

    /// Overwrites the given top-level fields, returning the updated document.
    async fn update_by_id(
        &self,
        collection: Collection,
        id: &RecordId,
        fields: Document,
    ) -> Result<Option<Document>, StoreError>;

    /// Appends `value` to the array at `field` unless already present. An
    /// append bumps `__v`.
    async fn push_unique(
        &self,
        collection: Collection,
        id: &RecordId,
        field: &str,
        value: Value,
    ) -> Result<Option<Document>, StoreError>;

    /// Removes the document, returning its last state.
    async fn delete_by_id(
        &self,
        collection: Collection,
        id: &RecordId,
    ) -> Result<Option<Document>, StoreError>;
}

pub fn document_id(collection: Collection, document: &Document) -> Result<RecordId, StoreError> {
    document
        .get(ID)
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse().ok())
        .ok_or(StoreError::MissingKey(collection.name()))
}

pub fn to_document<T: Serialize>(record: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(document) => Ok(document),
        _ => Err(StoreError::MissingKey("record")),
    }
}

pub fn from_document<T: DeserializeOwned>(document: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(document))?)
}
