use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::pipeline::io::{FrameSink, FrameSource, SourceError, StreamInfo};
use crate::pipeline::item::WorkItem;
use crate::pipeline::state::{AbortOnPanic, PipelineState};
use crate::telemetry::{Stage, StageTimes, TelemetryCounters};
use crate::types::PipelineError;

/// What the producer hands back to the controller.
#[derive(Debug, Default)]
pub struct ProducerReport {
    pub counters: TelemetryCounters,
    pub stage_times: StageTimes,
    pub items: u64,
}

/// Sets `finished` on every exit path, including unwinding.
struct FinishGuard<'a>(&'a PipelineState);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.0.mark_finished();
    }
}

/// Pulls frames from an opened source and feeds the input queue.
pub struct Producer {
    state: Arc<PipelineState>,
    source: Box<dyn FrameSource>,
    origin: Option<Box<dyn FrameSink>>,
    info: StreamInfo,
    max_items: Option<u64>,
}

impl Producer {
    /// `source` (and `origin`, if any) must already be open; `info` is what
    /// the source declared.
    pub fn new(
        state: Arc<PipelineState>,
        source: Box<dyn FrameSource>,
        origin: Option<Box<dyn FrameSink>>,
        info: StreamInfo,
        max_items: Option<u64>,
    ) -> Self {
        Self { state, source, origin, info, max_items }
    }

    pub fn run(mut self) -> Result<ProducerReport, PipelineError> {
        let state = Arc::clone(&self.state);
        let _finish = FinishGuard(&state);
        let _panic = AbortOnPanic(&state);

        let result = self.produce();
        if let Err(e) = &result {
            if !e.is_cancellation() {
                error!("[PRODUCER] {}", e);
                state.abort();
            }
        }
        result
    }

    fn produce(&mut self) -> Result<ProducerReport, PipelineError> {
        let mut report = ProducerReport::default();
        let mut index: u64 = 0;

        loop {
            if self.state.is_cancelled() {
                debug!("[PRODUCER] cancelled at index {}", index);
                return Err(PipelineError::Cancelled);
            }
            if self.max_items.is_some_and(|max| index >= max) {
                break;
            }

            let start = Instant::now();
            let payload = match self.source.next_frame() {
                Ok(Some(p)) => p,
                Ok(None) => break,
                Err(source) => return Err(PipelineError::SourceRead { index, source }),
            };

            if let Some(expected) = self.info.item_len {
                if payload.len() != expected {
                    return Err(PipelineError::SourceRead {
                        index,
                        source: SourceError::LengthMismatch { expected, got: payload.len() },
                    });
                }
            }

            if let Some(origin) = self.origin.as_mut() {
                origin
                    .commit(index, &payload)
                    .map_err(|source| PipelineError::SinkCommit { index, source })?;
            }

            report.counters.add_produced(payload.len());
            report.stage_times.add(Stage::Produce, start.elapsed());

            if self.state.input().push(WorkItem::new(index, payload)).is_err() {
                // Only a cancel closes the input queue before we finish.
                return Err(PipelineError::Cancelled);
            }
            index += 1;
        }

        self.state.mark_finished();
        report.items = index;
        info!("[PRODUCER] finished after {} item(s), {} bytes", index, report.counters.bytes_in);

        if let Some(origin) = self.origin.as_mut() {
            let start = Instant::now();
            origin.finish().map_err(PipelineError::SinkFinish)?;
            report.stage_times.add(Stage::Finish, start.elapsed());
        }

        Ok(report)
    }
}
