//! Object store access
//!
//! The engine talks to storage through the [`ObjectStore`] trait. The
//! production implementation, [`OpenDalStore`], holds one OpenDAL operator per
//! container (an S3 bucket, or a directory for the filesystem backend).

use crate::error::{StoreError, StoreErrorKind, StoreOp};
use crate::key::StoreLocation;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use bytes::Bytes;
use opendal::Operator;
use std::collections::HashMap;

/// The four calls the rollup engine needs from an object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every object key in `container` that starts with `prefix`, at any
    /// depth. The prefix is a plain key prefix and may end partway through a
    /// file or folder name. Directory markers are not returned.
    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Full object content. Missing objects fail with [`StoreErrorKind::NotFound`].
    async fn get(&self, location: &StoreLocation) -> Result<Bytes, StoreError>;

    /// Replace the object content.
    async fn put(&self, location: &StoreLocation, content: Bytes) -> Result<(), StoreError>;

    /// Delete the object. Deleting a missing object succeeds.
    async fn delete(&self, location: &StoreLocation) -> Result<(), StoreError>;
}

/// OpenDAL-backed store addressing several containers
#[derive(Clone, Default)]
pub struct OpenDalStore {
    operators: HashMap<String, Operator>,
    retry: RetryPolicy,
}

impl OpenDalStore {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            operators: HashMap::new(),
            retry,
        }
    }

    /// Register the operator serving `container`.
    pub fn with_container(mut self, container: impl Into<String>, operator: Operator) -> Self {
        self.operators.insert(container.into(), operator);
        self
    }

    pub fn containers(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(String::as_str)
    }

    fn operator(&self, op: StoreOp, container: &str) -> Result<&Operator, StoreError> {
        self.operators.get(container).ok_or_else(|| {
            StoreError::new(
                StoreErrorKind::Other,
                op,
                container,
                "no storage operator configured for this container",
            )
        })
    }
}

/// Directory to list for a key prefix: everything up to and including the
/// last `/`, or the root when the prefix has no folder part.
fn list_path(prefix: &str) -> &str {
    match prefix.rfind('/') {
        Some(idx) => &prefix[..=idx],
        None => "/",
    }
}

#[async_trait]
impl ObjectStore for OpenDalStore {
    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        let operator = self.operator(StoreOp::List, container)?;
        let prefix = prefix.trim_start_matches('/');
        let path = list_path(prefix);
        let label = format!("{}/{}", container, prefix);
        let label = label.as_str();

        let listed = self
            .retry
            .run(move || async move {
                operator
                    .list_with(path)
                    .recursive(true)
                    .await
                    .map_err(|e| StoreError::from_opendal(StoreOp::List, label, e))
            })
            .await;

        let entries = match listed {
            Ok(entries) => entries,
            // A prefix with no objects under it is an empty listing
            Err(err) if err.is_not_found() => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        Ok(entries
            .into_iter()
            .filter(|entry| !entry.metadata().mode().is_dir())
            .map(|entry| entry.path().to_string())
            .filter(|key| key.starts_with(prefix))
            .collect())
    }

    async fn get(&self, location: &StoreLocation) -> Result<Bytes, StoreError> {
        let operator = self.operator(StoreOp::Get, &location.container)?;
        self.retry
            .run(move || async move {
                operator
                    .read(&location.path)
                    .await
                    .map(|buffer| buffer.to_bytes())
                    .map_err(|e| StoreError::from_opendal(StoreOp::Get, location.to_string(), e))
            })
            .await
    }

    async fn put(&self, location: &StoreLocation, content: Bytes) -> Result<(), StoreError> {
        let operator = self.operator(StoreOp::Put, &location.container)?;
        let content = &content;
        self.retry
            .run(move || async move {
                operator
                    .write(&location.path, content.clone())
                    .await
                    .map(|_| ())
                    .map_err(|e| StoreError::from_opendal(StoreOp::Put, location.to_string(), e))
            })
            .await
    }

    async fn delete(&self, location: &StoreLocation) -> Result<(), StoreError> {
        let operator = self.operator(StoreOp::Delete, &location.container)?;
        let result = self
            .retry
            .run(move || async move {
                operator
                    .delete(&location.path)
                    .await
                    .map_err(|e| StoreError::from_opendal(StoreOp::Delete, location.to_string(), e))
            })
            .await;

        match result {
            Err(err) if err.is_not_found() => Ok(()),
            other => other,
        }
    }
}
