//! Progress events emitted while compressing.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during compression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompressionEvent {
    /// The historical prefix was split into `total` chunks.
    ChunksPlanned { total: usize },
    /// A chunk summary arrived.
    ChunkSummarized { ordinal: usize },
    /// A chunk summary failed and will use the verbatim fallback.
    ChunkFailed { ordinal: usize, error: String },
    /// A reduce level started over `inputs` summaries.
    ReduceLevelStarted { level: usize, inputs: usize, is_final: bool },
    /// A reduce call failed and will use the concatenated fallback.
    ReduceFailed { level: usize, error: String },
    /// Compression completed.
    Finished {
        history_tokens: usize,
        reinjected_fragments: usize,
    },
}

/// Optional event channel, shared by the pipeline stages.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventSink {
    tx: Option<mpsc::Sender<CompressionEvent>>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::Sender<CompressionEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Emit an event to the event channel if configured. A dropped receiver
    /// is ignored.
    pub(crate) async fn emit(&self, event: CompressionEvent) {
        if let Some(ref tx) = self.tx {
            tx.send(event).await.ok();
        }
    }
}
