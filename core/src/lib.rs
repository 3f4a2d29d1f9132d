//! framecrypt-core
//!
//! Ordered parallel frame transform engine.
//! A producer feeds indexed frames to a worker pool that XORs a per-frame
//! keystream into each payload; a reorder buffer restores index order
//! before the consumer commits frames to a sink.

#![forbid(unsafe_code)]

// Shared and top level
pub mod constants;
pub mod types;
pub mod utils;
pub mod logging;

// Building blocks
pub mod headers;
pub mod keystream;
pub mod telemetry;

// Pipeline
pub mod pipeline;

// -----------------------------------------------------------------------------
// Prelude (Rust users)
// -----------------------------------------------------------------------------
pub mod prelude {
    pub use crate::keystream::{KeystreamGenerator, KeystreamKind, MasterKey};
    pub use crate::pipeline::{
        transform_file, transform_stream, CancelHandle, ErrorPolicy, FrameGeometry, FrameSink,
        FrameSource, IdleStrategy, InputSource, MemorySink, OutputSink, PipelineConfig,
        PipelineController, QueueBound, StreamInfo,
    };
    pub use crate::telemetry::TelemetrySnapshot;
    pub use crate::types::PipelineError;
}
