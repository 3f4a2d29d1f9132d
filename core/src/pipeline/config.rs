//! Run configuration.
//!
//! Everything except `master_key` has a default, so a minimal JSON config is
//! `{"master_key": 1234}`. Queue bounds are written as `"unbounded"`,
//! `"auto"` or `{"fixed": 32}`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    DEFAULT_BACKOFF_MS, DEFAULT_KEYSTREAM_BLOCK_LEN, DEFAULT_PROGRESS_INTERVAL,
    DEFAULT_TRANSFORM_RETRIES, MAX_WORKERS, MIN_KEYSTREAM_BLOCK_LEN,
};
use crate::keystream::{KeystreamKind, MasterKey};
use crate::pipeline::parallelism::ParallelismProfile;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("master_key is required")]
    MissingKey,

    #[error("invalid worker count {0}; must be between 1 and {max} (or 0 for auto)", max = MAX_WORKERS)]
    InvalidWorkers(usize),

    #[error("fixed queue bound must be at least 1")]
    InvalidQueueBound,

    #[error("keystream_block_len {0} is below the minimum of {min}", min = MIN_KEYSTREAM_BLOCK_LEN)]
    InvalidBlockLen(usize),

    #[error("progress_interval must be at least 1")]
    InvalidProgressInterval,

    #[error("max_items must be at least 1 when set")]
    InvalidMaxItems,

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config read error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a queue is bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueueBound {
    #[default]
    Unbounded,
    Fixed(usize),
    /// Sized from the parallelism profile's in-flight budget.
    Auto,
}

impl QueueBound {
    pub fn resolve(&self, profile: &ParallelismProfile) -> Option<usize> {
        match *self {
            QueueBound::Unbounded => None,
            QueueBound::Fixed(n) => Some(n.max(1)),
            QueueBound::Auto => Some(profile.inflight_items.max(1)),
        }
    }
}

/// What a stage does when its queue is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdleStrategy {
    /// Block on the queue for up to one backoff interval.
    #[default]
    Park,
    /// Non-blocking poll, spin/yield, then sleep one backoff interval.
    Poll,
}

/// What happens to an item whose transform failed for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    #[default]
    Abort,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub master_key: Option<u64>,
    /// 0 picks a count from the host.
    pub workers: usize,
    pub max_items: Option<u64>,
    pub keystream: KeystreamKind,
    pub keystream_block_len: usize,
    pub input_queue: QueueBound,
    pub output_queue: QueueBound,
    pub idle: IdleStrategy,
    pub backoff_ms: u64,
    pub transform_retries: u32,
    pub on_transform_error: ErrorPolicy,
    pub progress_interval: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            master_key: None,
            workers: 0,
            max_items: None,
            keystream: KeystreamKind::default(),
            keystream_block_len: DEFAULT_KEYSTREAM_BLOCK_LEN,
            input_queue: QueueBound::default(),
            output_queue: QueueBound::default(),
            idle: IdleStrategy::default(),
            backoff_ms: DEFAULT_BACKOFF_MS,
            transform_retries: DEFAULT_TRANSFORM_RETRIES,
            on_transform_error: ErrorPolicy::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl PipelineConfig {
    pub fn new(master_key: u64) -> Self {
        Self { master_key: Some(master_key), ..Default::default() }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_max_items(mut self, max_items: u64) -> Self {
        self.max_items = Some(max_items);
        self
    }

    pub fn with_keystream(mut self, keystream: KeystreamKind) -> Self {
        self.keystream = keystream;
        self
    }

    pub fn with_queues(mut self, input: QueueBound, output: QueueBound) -> Self {
        self.input_queue = input;
        self.output_queue = output;
        self
    }

    pub fn with_idle(mut self, idle: IdleStrategy) -> Self {
        self.idle = idle;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.on_transform_error = policy;
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.master_key.is_none() {
            return Err(ConfigError::MissingKey);
        }
        if self.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkers(self.workers));
        }
        for bound in [self.input_queue, self.output_queue] {
            if bound == QueueBound::Fixed(0) {
                return Err(ConfigError::InvalidQueueBound);
            }
        }
        if self.keystream_block_len < MIN_KEYSTREAM_BLOCK_LEN {
            return Err(ConfigError::InvalidBlockLen(self.keystream_block_len));
        }
        if self.progress_interval == 0 {
            return Err(ConfigError::InvalidProgressInterval);
        }
        if self.max_items == Some(0) {
            return Err(ConfigError::InvalidMaxItems);
        }
        Ok(())
    }

    pub fn key(&self) -> Result<MasterKey, ConfigError> {
        self.master_key.map(MasterKey::new).ok_or(ConfigError::MissingKey)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Resolve worker count and queue budget. An explicit worker count
    /// wins over the host-derived one.
    pub fn profile(&self, item_len: Option<usize>) -> ParallelismProfile {
        let needs_host = self.workers == 0
            || self.input_queue == QueueBound::Auto
            || self.output_queue == QueueBound::Auto;

        let mut profile = if needs_host {
            ParallelismProfile::for_item_len(item_len.unwrap_or(1))
        } else {
            ParallelismProfile::single_threaded()
        };
        if self.workers > 0 {
            profile.workers = self.workers;
        }
        profile
    }
}
