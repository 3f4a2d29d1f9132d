//! Run lifecycle: validate, open, spawn, join, report.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::keystream::KeystreamGenerator;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::consumer::{Consumer, ConsumerReport};
use crate::pipeline::io::{FrameSink, FrameSource, SourceError};
use crate::pipeline::producer::{Producer, ProducerReport};
use crate::pipeline::state::PipelineState;
use crate::pipeline::worker::{WorkerContext, WorkerPool, WorkerReport};
use crate::telemetry::{Stage, TelemetryCounters, TelemetrySnapshot, TelemetryTimer};
use crate::types::PipelineError;

/// Stops a running pipeline from any thread.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    state: Arc<PipelineState>,
}

impl CancelHandle {
    /// Every stage notices within one backoff interval and the run
    /// returns [`PipelineError::Cancelled`].
    pub fn cancel(&self) {
        if !self.state.is_cancelled() {
            info!("[PIPELINE] cancel requested");
        }
        self.state.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}

pub struct PipelineController {
    config: PipelineConfig,
    generator: Option<Arc<dyn KeystreamGenerator>>,
}

impl fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineController")
            .field("workers", &self.config.workers)
            .field("keystream", &self.generator.as_ref().map(|g| g.name()))
            .finish()
    }
}

impl PipelineController {
    /// Rejects an invalid configuration up front.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config, generator: None })
    }

    /// Use `generator` instead of the one named by `config.keystream`.
    pub fn with_keystream(
        config: PipelineConfig,
        generator: Arc<dyn KeystreamGenerator>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config, generator: Some(generator) })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(
        &self,
        source: Box<dyn FrameSource>,
        sink: Box<dyn FrameSink>,
    ) -> Result<TelemetrySnapshot, PipelineError> {
        self.start(source, sink)?.join()
    }

    pub fn start(
        &self,
        source: Box<dyn FrameSource>,
        sink: Box<dyn FrameSink>,
    ) -> Result<RunningPipeline, PipelineError> {
        self.start_with_origin(source, sink, None)
    }

    /// Open everything, then spawn the producer, the workers and the
    /// consumer. `origin`, when given, receives the untransformed frames.
    pub fn start_with_origin(
        &self,
        mut source: Box<dyn FrameSource>,
        mut sink: Box<dyn FrameSink>,
        mut origin: Option<Box<dyn FrameSink>>,
    ) -> Result<RunningPipeline, PipelineError> {
        let config = &self.config;
        config.validate()?;
        let key = config.key()?;
        let mut timer = TelemetryTimer::new();

        let open_start = Instant::now();
        let info = source.open().map_err(PipelineError::SourceOpen)?;

        let profile = config.profile(info.item_len);
        let workers = profile.workers;
        let generator = match &self.generator {
            Some(g) => Arc::clone(g),
            None => config.keystream.build(config.keystream_block_len),
        };

        if info.transformed && info.keystream_id != generator.id() {
            return Err(PipelineError::SourceOpen(SourceError::KeystreamMismatch {
                stream: info.keystream_id,
                configured: generator.id(),
            }));
        }

        let expected_count = match (info.item_count, config.max_items) {
            (Some(n), Some(max)) => Some(n.min(max)),
            (count, None) => count,
            (None, Some(_)) => None,
        };
        let out_info = info.toggled(generator.id(), expected_count);

        sink.open(&out_info).map_err(PipelineError::SinkOpen)?;
        if let Some(origin) = origin.as_mut() {
            origin.open(&info).map_err(PipelineError::SinkOpen)?;
        }
        timer.add_stage_time(Stage::Open, open_start.elapsed());

        let input_cap = config.input_queue.resolve(&profile);
        let output_cap = config.output_queue.resolve(&profile);
        let state = Arc::new(PipelineState::new(workers, input_cap, output_cap));

        info!(
            "[PIPELINE] starting: workers={} keystream={} item_len={:?} expected_items={:?} input_cap={:?} output_cap={:?} idle={:?}",
            workers,
            generator.name(),
            info.item_len,
            expected_count,
            input_cap,
            output_cap,
            config.idle
        );

        let producer = Producer::new(Arc::clone(&state), source, origin, info, config.max_items);
        let producer = spawn_stage("framecrypt-producer", move || producer.run()).map_err(|source| {
            state.abort();
            for _ in 0..workers {
                state.worker_exited();
            }
            PipelineError::Spawn { stage: "producer".into(), source }
        })?;

        let ctx = WorkerContext {
            generator,
            key,
            idle: config.idle,
            backoff: config.backoff(),
            transform_retries: config.transform_retries,
            on_error: config.on_transform_error,
        };
        let pool = match WorkerPool::spawn(&state, workers, &ctx) {
            Ok(pool) => pool,
            Err(e) => {
                let _ = producer.join();
                return Err(e);
            }
        };

        let consumer = Consumer::new(
            Arc::clone(&state),
            sink,
            config.idle,
            config.backoff(),
            config.progress_interval,
        );
        let consumer = match spawn_stage("framecrypt-consumer", move || consumer.run()) {
            Ok(handle) => handle,
            Err(source) => {
                state.abort();
                let _ = producer.join();
                let _ = pool.join();
                return Err(PipelineError::Spawn { stage: "consumer".into(), source });
            }
        };

        Ok(RunningPipeline { state, producer, pool, consumer, timer })
    }
}

fn spawn_stage<T, F>(name: &str, f: F) -> std::io::Result<JoinHandle<Result<T, PipelineError>>>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
{
    thread::Builder::new().name(name.to_string()).spawn(f)
}

fn join_stage<T>(handle: JoinHandle<Result<T, PipelineError>>, stage: &str) -> Result<T, PipelineError> {
    handle
        .join()
        .unwrap_or_else(|_| Err(PipelineError::StagePanicked { stage: stage.to_string() }))
}

fn record_error(first: &mut Option<PipelineError>, cancelled: &mut bool, err: PipelineError) {
    if err.is_cancellation() {
        *cancelled = true;
    } else if first.is_none() {
        *first = Some(err);
    }
}

/// A pipeline whose threads are running.
pub struct RunningPipeline {
    state: Arc<PipelineState>,
    producer: JoinHandle<Result<ProducerReport, PipelineError>>,
    pool: WorkerPool,
    consumer: JoinHandle<Result<ConsumerReport, PipelineError>>,
    timer: TelemetryTimer,
}

impl fmt::Debug for RunningPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningPipeline")
            .field("workers", &self.pool.len())
            .field("finished", &self.state.is_finished())
            .field("cancelled", &self.state.is_cancelled())
            .finish()
    }
}

impl RunningPipeline {
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle { state: Arc::clone(&self.state) }
    }

    /// Join producer, workers, consumer (in that order) and fold their
    /// reports into one snapshot.
    ///
    /// When several stages fail, the first error that is not a
    /// cancellation wins; other stages only report `Cancelled` because the
    /// failing stage aborted the run.
    pub fn join(self) -> Result<TelemetrySnapshot, PipelineError> {
        let RunningPipeline { state, producer, pool, consumer, mut timer } = self;

        let producer = join_stage(producer, "producer");
        let workers = pool.join();
        let consumer = join_stage(consumer, "consumer");
        timer.finish();

        let mut first_error: Option<PipelineError> = None;
        let mut cancelled = state.is_cancelled();

        let producer_report = producer
            .map_err(|e| record_error(&mut first_error, &mut cancelled, e))
            .ok();

        let mut worker_reports: Vec<WorkerReport> = Vec::with_capacity(workers.len());
        for result in workers {
            match result {
                Ok(r) => worker_reports.push(r),
                Err(e) => record_error(&mut first_error, &mut cancelled, e),
            }
        }

        let consumer_report = consumer
            .map_err(|e| record_error(&mut first_error, &mut cancelled, e))
            .ok();

        if let Some(err) = first_error {
            warn!("[PIPELINE] run failed: {}", err);
            return Err(err);
        }
        let (producer_report, consumer_report) = match (producer_report, consumer_report) {
            (Some(p), Some(c)) if !cancelled => (p, c),
            _ => {
                info!("[PIPELINE] run cancelled");
                return Err(PipelineError::Cancelled);
            }
        };

        let mut counters = TelemetryCounters::default();
        counters.merge(&producer_report.counters);
        timer.stage_times.merge(&producer_report.stage_times);
        for report in &worker_reports {
            counters.merge(&report.counters);
            timer.stage_times.merge(&report.stage_times);
        }
        counters.merge(&consumer_report.counters);
        timer.stage_times.merge(&consumer_report.stage_times);

        let per_worker: Vec<u64> = worker_reports.iter().map(|r| r.items).collect();
        let snapshot = TelemetrySnapshot::from(&counters, &timer)
            .with_workers(per_worker)
            .with_reorder_high_water(state.reorder().high_water())
            .with_output_digest(consumer_report.digest);

        debug!("[PIPELINE] stage times: {}", snapshot.stage_times.summary());
        info!(
            "[PIPELINE] done: produced={} committed={} skipped={} elapsed={:.3}s throughput={:.1} MiB/s",
            snapshot.items_produced,
            snapshot.items_committed,
            snapshot.items_skipped,
            snapshot.elapsed.as_secs_f64(),
            snapshot.throughput_bytes_per_sec / (1024.0 * 1024.0)
        );
        Ok(snapshot)
    }
}
