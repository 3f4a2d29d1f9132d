use std::io;

use thiserror::Error;

use crate::{
    headers::HeaderError,
    keystream::KeystreamError,
    pipeline::{config::ConfigError, io::{SinkError, SourceError}, reorder::ReorderError},
};

/// Unified pipeline error covering startup, per-stage faults and run outcome.
/// - `From<T>` impls enable `?` across the stages.
/// - Messages carry the item index wherever one is known.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration rejected before anything was opened.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The source could not be opened. Nothing was produced.
    #[error("source unavailable: {0}")]
    SourceOpen(#[source] SourceError),

    /// The sink (or origin sink) could not be opened. Nothing was produced.
    #[error("sink unavailable: {0}")]
    SinkOpen(#[source] SinkError),

    #[error("source failed at item {index}: {source}")]
    SourceRead { index: u64, source: SourceError },

    #[error("sink failed at item {index}: {source}")]
    SinkCommit { index: u64, source: SinkError },

    #[error("sink failed to finish: {0}")]
    SinkFinish(#[source] SinkError),

    #[error("transform failed for item {index} after {attempts} attempt(s): {source}")]
    Transform { index: u64, attempts: u32, source: KeystreamError },

    #[error("reorder buffer error: {0}")]
    Reorder(#[from] ReorderError),

    /// An index never reached the reorder buffer; later items were retained.
    #[error("pipeline stalled: next expected index {next_expected}, {pending} item(s) retained")]
    Stalled { next_expected: u64, pending: usize },

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("failed to spawn {stage} thread: {source}")]
    Spawn { stage: String, source: io::Error },

    #[error("{stage} thread panicked")]
    StagePanicked { stage: String },

    #[error("header error: {0}")]
    Header(#[from] HeaderError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PipelineError {
    /// `Cancelled` is what every healthy stage reports after another stage
    /// aborted; the controller prefers any other error over it.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }
}
