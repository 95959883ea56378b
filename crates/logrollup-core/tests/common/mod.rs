// Shared helpers for rollup integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use logrollup_core::opendal::{services, Operator};
use logrollup_core::{
    build_plan, execute_plan, ExecutionPolicy, Granularity, ObjectStore, OpenDalStore,
    ParseFailurePolicy, RetryPolicy, RunSummary, StoreError, StoreErrorKind, StoreLocation,
    StoreOp,
};
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory store with one operator per container
pub fn memory_store(containers: &[&str]) -> OpenDalStore {
    containers
        .iter()
        .fold(OpenDalStore::new(RetryPolicy::none()), |store, name| {
            let op = Operator::new(services::Memory::default())
                .expect("Failed to create memory operator")
                .finish();
            store.with_container(*name, op)
        })
}

pub fn loc(raw: &str) -> StoreLocation {
    StoreLocation::parse(raw).expect("valid test location")
}

pub async fn put(store: &dyn ObjectStore, raw: &str, content: &str) {
    store
        .put(&loc(raw), Bytes::copy_from_slice(content.as_bytes()))
        .await
        .expect("Failed to seed object");
}

/// Object content as a string, or None when the object does not exist
pub async fn read(store: &dyn ObjectStore, raw: &str) -> Option<String> {
    match store.get(&loc(raw)).await {
        Ok(bytes) => Some(String::from_utf8(bytes.to_vec()).expect("utf8 test content")),
        Err(err) if err.is_not_found() => None,
        Err(err) => panic!("unexpected store error: {err}"),
    }
}

pub async fn run(
    store: &dyn ObjectStore,
    granularity: Granularity,
    source: &str,
    dest: &str,
    policy: ExecutionPolicy,
) -> logrollup_core::Result<RunSummary> {
    let plan = build_plan(store, granularity, source, dest, ParseFailurePolicy::Skip).await?;
    execute_plan(store, &plan, policy, 1).await
}

/// Wraps a store and fails selected calls with a chosen error kind
pub struct FaultyStore<S> {
    inner: S,
    faults: Mutex<HashMap<(StoreOp, String), StoreErrorKind>>,
}

impl<S: ObjectStore> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Mutex::new(HashMap::new()),
        }
    }

    pub fn fail(&self, op: StoreOp, raw: &str, kind: StoreErrorKind) {
        self.faults
            .lock()
            .unwrap()
            .insert((op, loc(raw).to_string()), kind);
    }

    fn check(&self, op: StoreOp, location: &StoreLocation) -> Result<(), StoreError> {
        let key = (op, location.to_string());
        match self.faults.lock().unwrap().get(&key) {
            Some(kind) => Err(StoreError::new(*kind, op, key.1, "injected fault")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for FaultyStore<S> {
    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.inner.list(container, prefix).await
    }

    async fn get(&self, location: &StoreLocation) -> Result<Bytes, StoreError> {
        self.check(StoreOp::Get, location)?;
        self.inner.get(location).await
    }

    async fn put(&self, location: &StoreLocation, content: Bytes) -> Result<(), StoreError> {
        self.check(StoreOp::Put, location)?;
        self.inner.put(location, content).await
    }

    async fn delete(&self, location: &StoreLocation) -> Result<(), StoreError> {
        self.check(StoreOp::Delete, location)?;
        self.inner.delete(location).await
    }
}
