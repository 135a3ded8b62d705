use super::diff::SegmentDiff;
use crate::core::{ReconcileError, Result};
use crate::topology::TopologySnapshot;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Access to the segment configuration catalog.
///
/// The reconciler only decides what to change; transaction discipline and the
/// actual SQL belong to the implementation.
#[async_trait]
pub trait SegmentCatalog: Send + Sync {
    /// Reads the segment configuration as currently recorded.
    async fn load_current(&self) -> Result<TopologySnapshot>;

    /// Writes a validated diff. Errors are surfaced unchanged to the caller.
    async fn apply(&self, diff: &SegmentDiff) -> Result<()>;
}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    snapshot: TopologySnapshot,
    fail_next_apply: Option<String>,
    applied: usize,
}

/// A catalog kept in memory, for tests and dry runs.
///
/// Applies a diff by removing, replacing and inserting records in its snapshot.
#[derive(Debug, Clone, Default)]
pub struct InMemorySegmentCatalog {
    state: Arc<Mutex<InMemoryCatalogState>>,
}

impl InMemorySegmentCatalog {
    pub fn new(snapshot: TopologySnapshot) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryCatalogState {
                snapshot,
                ..Default::default()
            })),
        }
    }

    pub async fn snapshot(&self) -> TopologySnapshot {
        self.state.lock().await.snapshot.clone()
    }

    /// Number of successful `apply` calls.
    pub async fn applied_count(&self) -> usize {
        self.state.lock().await.applied
    }

    /// Makes the next `apply` fail with a catalog error carrying `message`.
    pub async fn fail_next_apply(&self, message: impl Into<String>) {
        self.state.lock().await.fail_next_apply = Some(message.into());
    }
}

#[async_trait]
impl SegmentCatalog for InMemorySegmentCatalog {
    async fn load_current(&self) -> Result<TopologySnapshot> {
        Ok(self.state.lock().await.snapshot.clone())
    }

    async fn apply(&self, diff: &SegmentDiff) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(message) = state.fail_next_apply.take() {
            return Err(ReconcileError::Catalog(message));
        }

        let mut next = state.snapshot.clone();
        for seg in diff.mirror_to_remove().iter().chain(diff.primary_to_remove()) {
            next = next.without(seg.dbid());
        }
        for seg in diff
            .primary_to_add()
            .iter()
            .chain(diff.mirror_to_add())
            .chain(diff.mirror_to_remove_and_add())
            .chain(diff.segment_to_update())
        {
            next = next.with_segment(seg.clone());
        }

        state.snapshot = next;
        state.applied += 1;
        Ok(())
    }
}
