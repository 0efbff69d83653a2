use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header::{HeaderMap, HeaderValue}, Method};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_models::entities::{EntityType, Record};

use crate::error::DatabaseError;
use crate::query::Query;
use crate::supabase::SupabaseClient;

/// Row-oriented CRUD over the backing store's entity collections.
#[async_trait]
pub trait BackingStore: Send + Sync {
    async fn select_rows(&self, entity: EntityType, query: &Query) -> Result<Vec<Value>, DatabaseError>;

    async fn insert_row(&self, entity: EntityType, row: Value) -> Result<Value, DatabaseError>;

    async fn update_row(&self, entity: EntityType, id: Uuid, patch: Value) -> Result<Value, DatabaseError>;

    async fn delete_row(&self, entity: EntityType, id: Uuid) -> Result<(), DatabaseError>;
}

/// `BackingStore` bound to one authenticated session.
pub struct SupabaseStore {
    supabase: Arc<SupabaseClient>,
    auth_token: String,
}

impl SupabaseStore {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: impl Into<String>) -> Self {
        Self {
            supabase,
            auth_token: auth_token.into(),
        }
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    fn single_row(entity: EntityType, mut rows: Vec<Value>) -> Result<Value, DatabaseError> {
        if rows.is_empty() {
            return Err(DatabaseError::NotFound(format!("no {} row returned", entity)));
        }
        Ok(rows.swap_remove(0))
    }
}

#[async_trait]
impl BackingStore for SupabaseStore {
    async fn select_rows(&self, entity: EntityType, query: &Query) -> Result<Vec<Value>, DatabaseError> {
        let path = query.to_path(entity.table_name());
        self.supabase.request(
            Method::GET,
            &path,
            Some(&self.auth_token),
            None,
        ).await
    }

    async fn insert_row(&self, entity: EntityType, row: Value) -> Result<Value, DatabaseError> {
        let path = Query::new().to_path(entity.table_name());
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            &path,
            Some(&self.auth_token),
            Some(Value::Array(vec![row])),
            Some(Self::representation_headers()),
        ).await?;

        Self::single_row(entity, rows)
    }

    async fn update_row(&self, entity: EntityType, id: Uuid, patch: Value) -> Result<Value, DatabaseError> {
        let path = Query::new().eq("id", id).to_path(entity.table_name());
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(&self.auth_token),
            Some(patch),
            Some(Self::representation_headers()),
        ).await?;

        Self::single_row(entity, rows)
    }

    async fn delete_row(&self, entity: EntityType, id: Uuid) -> Result<(), DatabaseError> {
        let path = Query::new().eq("id", id).to_path(entity.table_name());
        let _: Value = self.supabase.request(
            Method::DELETE,
            &path,
            Some(&self.auth_token),
            None,
        ).await?;

        debug!("Deleted {} row {}", entity, id);
        Ok(())
    }
}

// ==============================================================================
// TYPED ACCESS
// ==============================================================================

/// Decodes one row into `T`, then checks the record's own invariants.
pub fn decode_row<T: Record>(row: Value) -> Result<T, DatabaseError> {
    let record: T = serde_json::from_value(row).map_err(|e| DatabaseError::Decode {
        table: T::ENTITY.to_string(),
        message: e.to_string(),
    })?;

    record.validate().map_err(|message| DatabaseError::Decode {
        table: T::ENTITY.to_string(),
        message,
    })?;

    Ok(record)
}

/// All-or-nothing: one malformed row fails the whole batch.
pub fn decode_rows<T: Record>(rows: Vec<Value>) -> Result<Vec<T>, DatabaseError> {
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            decode_row::<T>(row).map_err(|e| match e {
                DatabaseError::Decode { table, message } => DatabaseError::Decode {
                    table,
                    message: format!("row {}: {}", index, message),
                },
                other => other,
            })
        })
        .collect()
}

pub async fn fetch_all<T: Record>(store: &dyn BackingStore, query: &Query) -> Result<Vec<T>, DatabaseError> {
    let rows = store.select_rows(T::ENTITY, query).await?;
    decode_rows(rows)
}

pub async fn fetch_by_id<T: Record>(store: &dyn BackingStore, id: Uuid) -> Result<T, DatabaseError> {
    let query = Query::new().eq("id", id).limit(1);
    let mut records: Vec<T> = fetch_all(store, &query).await?;

    if records.is_empty() {
        return Err(DatabaseError::NotFound(format!("{} {} not found", T::ENTITY, id)));
    }
    Ok(records.swap_remove(0))
}

pub async fn insert_record<T: Record>(store: &dyn BackingStore, row: Value) -> Result<T, DatabaseError> {
    let inserted = store.insert_row(T::ENTITY, row).await?;
    decode_row(inserted)
}

pub async fn update_record<T: Record>(store: &dyn BackingStore, id: Uuid, patch: Value) -> Result<T, DatabaseError> {
    let updated = store.update_row(T::ENTITY, id, patch).await?;
    decode_row(updated)
}
