//! Ordered parallel transform pipeline.
//!
//! Source → Producer → input queue → N workers → reorder buffer →
//! output queue → Consumer → Sink.
//!
//! Workers complete in any order; the reorder buffer releases items to the
//! output queue strictly by index, so the sink sees exactly the order the
//! producer generated.

pub mod config;
pub mod consumer;
pub mod controller;
pub mod core;
pub mod io;
pub mod item;
pub mod parallelism;
pub mod producer;
pub mod queue;
pub mod reorder;
pub mod state;
pub mod worker;

pub use config::{ConfigError, ErrorPolicy, IdleStrategy, PipelineConfig, QueueBound};
pub use consumer::{Consumer, ConsumerReport};
pub use controller::{CancelHandle, PipelineController, RunningPipeline};
pub use self::core::{transform_file, transform_stream, transform_stream_with_origin};
pub use io::{
    open_sink, open_source, ContainerFileSink, ContainerFileSource, FrameGeometry, FrameSink,
    FrameSource, InputSource, MemorySink, MemorySource, OutputSink, RawFileSink, RawFileSource,
    SinkError, SourceError, StreamInfo, SyntheticSource,
};
pub use item::{Completed, Slot, WorkItem};
pub use parallelism::ParallelismProfile;
pub use producer::{Producer, ProducerReport};
pub use queue::{BlockingQueue, PopTimeoutError, QueueClosed, TryPushError};
pub use reorder::{ReorderBuffer, ReorderError};
pub use state::PipelineState;
pub use worker::{TransformWorker, WorkerContext, WorkerPool, WorkerReport};
