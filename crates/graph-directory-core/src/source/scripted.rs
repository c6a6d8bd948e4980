//! Test double over [`InMemorySource`] for concurrency and partial-failure
//! tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Barrier;

use crate::error::TransportError;
use crate::models::{Page, Record};

use super::memory::InMemorySource;
use super::{PageRequest, PageSource};

/// How long a gated test waits before deciding fetches were serialized.
pub(crate) const GATE_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) struct ScriptedSource {
    inner: InMemorySource,
    /// The first `n` fetches block until all `n` are in flight.
    gate: Option<(usize, Barrier)>,
    arrivals: AtomicUsize,
    /// First-page requests projecting this attribute fail.
    failing_select: Option<String>,
}

impl ScriptedSource {
    pub(crate) fn new(records: Vec<Record>) -> Self {
        Self {
            inner: InMemorySource::new(records),
            gate: None,
            arrivals: AtomicUsize::new(0),
            failing_select: None,
        }
    }

    pub(crate) fn gate_first(mut self, n: usize) -> Self {
        self.gate = Some((n, Barrier::new(n)));
        self
    }

    pub(crate) fn fail_select(mut self, attribute: &str) -> Self {
        self.failing_select = Some(attribute.to_string());
        self
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.inner.fetch_count()
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    async fn fetch(&self, request: &PageRequest) -> Result<Page, TransportError> {
        if let Some((n, barrier)) = &self.gate {
            if self.arrivals.fetch_add(1, Ordering::SeqCst) < *n {
                barrier.wait().await;
            }
        }
        if let (Some(attribute), PageRequest::Fresh(desc)) = (&self.failing_select, request) {
            if desc.select().iter().any(|s| s == attribute) {
                return Err(TransportError::Offline);
            }
        }
        self.inner.fetch(request).await
    }
}
