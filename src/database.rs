//! # Redis
//!
//! Persistent engine for both collections.
//!
//! ## Layout
//! - One Redis hash per collection: `<namespace>:dogs`, `<namespace>:foods`
//! - Hash field: record key, value: the JSON document
//!
//! ## Atomicity
//! Every single-document write (update, push, delete) runs as a Lua script,
//! so Redis applies it in one step. Two writes are never grouped.
//!
//! ## Queries
//! Filtering, sorting and paging happen in-process over `HVALS`. Collections
//! here are small, one dog owning a handful of food items.
//!
//! ## Notes
//! - Lua's cjson writes an empty array as `{}`. Array fields are put back to
//!   `[]` when a document is read.
use std::{sync::LazyLock, time::Duration};

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client, RedisError, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde_json::Value;
use tracing::info;

use crate::{
    id::RecordId,
    query::Selection,
    store::{Collection, Document, Store, StoreError, document_id},
};

static UPDATE: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        local raw = redis.call('HGET', KEYS[1], ARGV[1])
        if not raw then return false end
        local document = cjson.decode(raw)
        for key, value in pairs(cjson.decode(ARGV[2])) do
            document[key] = value
        end
        raw = cjson.encode(document)
        redis.call('HSET', KEYS[1], ARGV[1], raw)
        return raw
        ",
    )
});

static PUSH_UNIQUE: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        local raw = redis.call('HGET', KEYS[1], ARGV[1])
        if not raw then return false end
        local document = cjson.decode(raw)
        local items = document[ARGV[2]]
        if items == nil or items == cjson.null then
            items = {}
            document[ARGV[2]] = items
        end
        if type(items) ~= 'table' then
            return redis.error_reply('NOTARRAY field is not an array')
        end
        local value = cjson.decode(ARGV[3])
        for _, item in ipairs(items) do
            if item == value then return raw end
        end
        table.insert(items, value)
        document['__v'] = (tonumber(document['__v']) or 0) + 1
        raw = cjson.encode(document)
        redis.call('HSET', KEYS[1], ARGV[1], raw)
        return raw
        ",
    )
});

static DELETE: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        local raw = redis.call('HGET', KEYS[1], ARGV[1])
        if raw then redis.call('HDEL', KEYS[1], ARGV[1]) end
        return raw
        ",
    )
});

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, RedisError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    info!("Connected to Redis");

    Ok(connection_manager)
}

pub struct RedisStore {
    connection: ConnectionManager,
    namespace: String,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager, namespace: impl Into<String>) -> Self {
        Self {
            connection,
            namespace: namespace.into(),
        }
    }

    pub async fn connect(redis_url: &str, namespace: &str) -> Result<Self, RedisError> {
        Ok(Self::new(init_redis(redis_url).await?, namespace))
    }

    fn key(&self, collection: Collection) -> String {
        format!("{}:{}", self.namespace, collection.name())
    }
}

fn decode(collection: Collection, raw: &str) -> Result<Document, StoreError> {
    let mut document: Document = serde_json::from_str(raw)?;

    for &field in collection.array_fields() {
        if let Some(value) = document.get_mut(field) {
            if value.as_object().is_some_and(|map| map.is_empty()) {
                *value = Value::Array(Vec::new());
            }
        }
    }

    Ok(document)
}

fn decode_optional(
    collection: Collection,
    raw: Option<String>,
) -> Result<Option<Document>, StoreError> {
    raw.map(|raw| decode(collection, &raw)).transpose()
}

#[async_trait]
impl Store for RedisStore {
    async fn insert(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<Document, StoreError> {
        let id = document_id(collection, &document)?;
        let raw = serde_json::to_string(&document)?;

        let mut connection = self.connection.clone();
        let created: bool = connection
            .hset_nx(self.key(collection), id.as_str(), raw)
            .await?;

        if !created {
            return Err(StoreError::DuplicateKey {
                collection: collection.name(),
                id,
            });
        }

        Ok(document)
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: &RecordId,
    ) -> Result<Option<Document>, StoreError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection.hget(self.key(collection), id.as_str()).await?;

        decode_optional(collection, raw)
    }

    async fn find_by_ids(
        &self,
        collection: Collection,
        ids: &[RecordId],
    ) -> Result<Vec<Document>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let fields: Vec<&str> = ids.iter().map(RecordId::as_str).collect();

        let mut connection = self.connection.clone();
        let raws: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(self.key(collection))
            .arg(fields)
            .query_async(&mut connection)
            .await?;

        raws.into_iter()
            .flatten()
            .map(|raw| decode(collection, &raw))
            .collect()
    }

    async fn find(
        &self,
        collection: Collection,
        selection: &Selection,
    ) -> Result<Vec<Document>, StoreError> {
        let mut connection = self.connection.clone();
        let raws: Vec<String> = connection.hvals(self.key(collection)).await?;

        let documents = raws
            .iter()
            .map(|raw| decode(collection, raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(selection.apply(&documents))
    }

    async fn update_by_id(
        &self,
        collection: Collection,
        id: &RecordId,
        fields: Document,
    ) -> Result<Option<Document>, StoreError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = UPDATE
            .key(self.key(collection))
            .arg(id.as_str())
            .arg(serde_json::to_string(&fields)?)
            .invoke_async(&mut connection)
            .await?;

        decode_optional(collection, raw)
    }

    async fn push_unique(
        &self,
        collection: Collection,
        id: &RecordId,
        field: &str,
        value: Value,
    ) -> Result<Option<Document>, StoreError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = PUSH_UNIQUE
            .key(self.key(collection))
            .arg(id.as_str())
            .arg(field)
            .arg(serde_json::to_string(&value)?)
            .invoke_async(&mut connection)
            .await?;

        decode_optional(collection, raw)
    }

    async fn delete_by_id(
        &self,
        collection: Collection,
        id: &RecordId,
    ) -> Result<Option<Document>, StoreError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = DELETE
            .key(self.key(collection))
            .arg(id.as_str())
            .invoke_async(&mut connection)
            .await?;

        decode_optional(collection, raw)
    }
}
