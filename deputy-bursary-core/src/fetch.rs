//! Paginated resource fetcher and the thin mutating API on top of [`Transport`].
//!
//! # Pagination
//! `resource/<Name>/QUERY` returns at most [`PAGE_SIZE`] records per call.
//! Pages are requested strictly in offset order, one at a time. A full page
//! always triggers one more request; the first short page (including an
//! empty one) ends the fetch. Any failure aborts the whole fetch and nothing
//! collected so far is returned.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::contract::{FetchProgress, Method, ProgressFn, Transport};
use crate::error::{DeputyError, Result};
use crate::query::ResourceQuery;
use crate::record::{Me, RecordKey};

/// Fixed by the Deputy API, not configurable.
pub const PAGE_SIZE: usize = 500;

/// Records keyed by the query's key field, in the order the API returned
/// them (i.e. sorted by the query's sort field).
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceCollection<R> {
    records: IndexMap<RecordKey, R>,
}

impl<R> Default for ResourceCollection<R> {
    fn default() -> Self {
        Self {
            records: IndexMap::new(),
        }
    }
}

impl<R> ResourceCollection<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later inserts under an existing key replace the earlier record.
    pub fn insert(&mut self, key: RecordKey, record: R) -> Option<R> {
        self.records.insert(key, record)
    }

    pub fn get(&self, key: impl Into<RecordKey>) -> Option<&R> {
        self.records.get(&key.into())
    }

    pub fn contains(&self, key: impl Into<RecordKey>) -> bool {
        self.records.contains_key(&key.into())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &RecordKey> {
        self.records.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &R> {
        self.records.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RecordKey, &R)> {
        self.records.iter()
    }
}

impl<R> IntoIterator for ResourceCollection<R> {
    type Item = (RecordKey, R);
    type IntoIter = indexmap::map::IntoIter<RecordKey, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// The only place the core reaches the Deputy API.
pub struct ResourceClient<T> {
    transport: T,
    progress: Option<ProgressFn>,
}

impl<T: Transport> ResourceClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn report(&self, resource: &str, position: usize, finished: bool) {
        if let Some(progress) = &self.progress {
            progress(&FetchProgress {
                resource: resource.to_string(),
                position,
                finished,
            });
        }
    }

    /// Fetch every page of `query` and key the records by `query.key`.
    pub async fn fetch<R: DeserializeOwned>(
        &self,
        query: &ResourceQuery,
    ) -> Result<ResourceCollection<R>> {
        let path = query.path();
        let mut result = ResourceCollection::new();
        let mut position = 0;

        loop {
            self.report(&query.resource, position, false);
            debug!(resource = %query.resource, start = position, "Requesting resource page");

            let response = self
                .transport
                .request(Method::Post, &path, Some(query.body(position)))
                .await
                .map_err(|e| {
                    error!(resource = %query.resource, start = position, error = %e, "Resource page failed");
                    e
                })?;

            let page = match response {
                Value::Array(page) => page,
                other => {
                    return Err(DeputyError::ResponseParse {
                        path,
                        detail: format!("expected a JSON array of records, got {}", kind_of(&other)),
                    })
                }
            };
            let page_len = page.len();

            for raw in page {
                let key = raw
                    .get(&query.key)
                    .and_then(RecordKey::from_value)
                    .ok_or_else(|| DeputyError::ResponseParse {
                        path: path.clone(),
                        detail: format!("record without usable key field {}", query.key),
                    })?;
                let record = serde_json::from_value::<R>(raw).map_err(|e| DeputyError::ResponseParse {
                    path: path.clone(),
                    detail: format!("{} record {key}: {e}", query.resource),
                })?;
                result.insert(key, record);
            }

            if page_len == PAGE_SIZE {
                position += PAGE_SIZE;
            } else {
                break;
            }
        }

        self.report(&query.resource, result.len(), true);
        info!(resource = %query.resource, records = result.len(), "Fetched resource");
        Ok(result)
    }

    /// Raw GET of any API path, e.g. `me` or `resource/EmployeeRole`.
    pub async fn api(&self, path: &str) -> Result<Value> {
        self.transport.request(Method::Get, path, None).await
    }

    pub async fn me(&self) -> Result<Me> {
        let value = self.api("me").await?;
        serde_json::from_value(value).map_err(|e| DeputyError::ResponseParse {
            path: "me".to_string(),
            detail: e.to_string(),
        })
    }

    /// `POST resource/<Name>` with a field map.
    pub async fn create(&self, resource: &str, fields: Map<String, Value>) -> Result<Value> {
        let path = format!("resource/{resource}");
        info!(resource, ?fields, "Creating resource");
        self.transport
            .request(Method::Post, &path, Some(Value::Object(fields)))
            .await
    }

    /// `POST resource/<Name>/<id>` partial update with a field map.
    pub async fn update(&self, resource: &str, id: i64, fields: Map<String, Value>) -> Result<Value> {
        let path = format!("resource/{resource}/{id}");
        info!(resource, id, ?fields, "Updating resource");
        self.transport
            .request(Method::Post, &path, Some(Value::Object(fields)))
            .await
    }

    /// `DELETE resource/<Name>/<id>`.
    pub async fn delete(&self, resource: &str, id: i64) -> Result<Value> {
        let path = format!("resource/{resource}/{id}");
        info!(resource, id, "Deleting resource");
        self.transport.request(Method::Delete, &path, None).await
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
