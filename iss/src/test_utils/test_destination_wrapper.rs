use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::destination::Destination;
use crate::error::{ErrorKind, IssResult};
use crate::iss_error;
use crate::types::{Reading, SourceId};

#[derive(Debug)]
struct Inner<D> {
    wrapped_destination: D,
    write_calls: Vec<SourceId>,
    written: Vec<SourceId>,
    injected_failures: HashMap<SourceId, ErrorKind>,
    prepare_calls: u64,
    existing_source_ids_calls: u64,
    shutdown_called: bool,
}

/// Test wrapper for [`Destination`] implementations that tracks all operations.
///
/// Records every call made through it and can make writes of chosen readings fail with a
/// given [`ErrorKind`] before they reach the wrapped destination.
#[derive(Debug, Clone)]
pub struct TestDestinationWrapper<D> {
    inner: Arc<RwLock<Inner<D>>>,
}

impl<D> TestDestinationWrapper<D> {
    /// Creates a new test wrapper around any destination implementation.
    pub fn wrap(destination: D) -> Self {
        let inner = Inner {
            wrapped_destination: destination,
            write_calls: Vec::new(),
            written: Vec::new(),
            injected_failures: HashMap::new(),
            prepare_calls: 0,
            existing_source_ids_calls: 0,
            shutdown_called: false,
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Makes every write of the reading identified by `id` fail with `kind`.
    pub async fn fail_writes_for(&self, id: impl Into<SourceId>, kind: ErrorKind) {
        let mut inner = self.inner.write().await;
        inner.injected_failures.insert(id.into(), kind);
    }

    /// Returns the identifiers of every attempted write, in call order.
    pub async fn write_calls(&self) -> Vec<SourceId> {
        self.inner.read().await.write_calls.clone()
    }

    /// Returns the identifiers of every successful write, in call order.
    pub async fn written(&self) -> Vec<SourceId> {
        self.inner.read().await.written.clone()
    }

    pub async fn prepare_calls(&self) -> u64 {
        self.inner.read().await.prepare_calls
    }

    pub async fn existing_source_ids_calls(&self) -> u64 {
        self.inner.read().await.existing_source_ids_calls
    }

    /// Returns whether the shutdown method was called on the destination.
    pub async fn shutdown_called(&self) -> bool {
        self.inner.read().await.shutdown_called
    }
}

impl<D> Destination for TestDestinationWrapper<D>
where
    D: Destination + Send + Sync + Clone,
{
    fn name() -> &'static str {
        "wrapper"
    }

    async fn shutdown(&self) -> IssResult<()> {
        let destination = {
            let inner = self.inner.read().await;
            inner.wrapped_destination.clone()
        };

        let result = destination.shutdown().await;

        self.inner.write().await.shutdown_called = true;

        result
    }

    async fn prepare(&self) -> IssResult<()> {
        let destination = {
            let mut inner = self.inner.write().await;
            inner.prepare_calls += 1;
            inner.wrapped_destination.clone()
        };

        destination.prepare().await
    }

    async fn existing_source_ids(&self) -> IssResult<HashSet<SourceId>> {
        let destination = {
            let mut inner = self.inner.write().await;
            inner.existing_source_ids_calls += 1;
            inner.wrapped_destination.clone()
        };

        destination.existing_source_ids().await
    }

    async fn write_reading(&self, reading: &Reading, created_at: DateTime<Utc>) -> IssResult<()> {
        let (destination, injected_failure) = {
            let mut inner = self.inner.write().await;
            inner.write_calls.push(reading.id.clone());
            (
                inner.wrapped_destination.clone(),
                inner.injected_failures.get(&reading.id).copied(),
            )
        };

        if let Some(kind) = injected_failure {
            return Err(iss_error!(kind, "Injected write failure", reading.id));
        }

        let result = destination.write_reading(reading, created_at).await;

        if result.is_ok() {
            self.inner.write().await.written.push(reading.id.clone());
        }

        result
    }
}
