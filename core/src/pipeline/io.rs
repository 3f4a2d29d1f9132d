//! Frame sources and sinks.
//!
//! A source declares a [`StreamInfo`] at open and then yields raw frame
//! payloads until exhausted. A sink is opened with the info of the stream it
//! is about to receive, gets every committed frame in index order, and is
//! finished exactly once after a clean run.
//!
//! [`InputSource`] and [`OutputSink`] are plain descriptors; [`open_source`]
//! and [`open_sink`] turn them into boxed adapters without touching the
//! filesystem. Files are only opened by `FrameSource::open` /
//! `FrameSink::open`, which the controller calls before any thread starts.

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use thiserror::Error;

use crate::constants::{keystream_ids, REFERENCE_CHANNELS, REFERENCE_HEIGHT, REFERENCE_WIDTH};
use crate::headers::{decode_header_le, encode_header_le, ContainerHeader, HeaderError};
use crate::utils::read_exact_or_eof;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("source used before open")]
    NotOpen,

    #[error("truncated frame: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("frame has {got} bytes, stream declared {expected}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("source failed: {0}")]
    Failed(String),

    #[error("stream was transformed with keystream {stream:#06x}, run is configured for {configured:#06x}")]
    KeystreamMismatch { stream: u16, configured: u16 },

    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    #[error("sink used before open")]
    NotOpen,

    #[error("frame {index} has {got} bytes, container expects {expected}")]
    LengthMismatch { index: u64, expected: usize, got: usize },

    /// Positional outputs store frame `i` at slot `i` and cannot leave a hole.
    #[error("frame {index} was skipped; this output cannot record a missing frame")]
    Gap { index: u64 },

    #[error("sink failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// What a source declares about its stream at open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    /// Fixed payload size, when the source has one.
    pub item_len: Option<usize>,
    /// Number of frames, when known up front.
    pub item_count: Option<u64>,
    /// Payloads already carry the keystream.
    pub transformed: bool,
    /// Generator that produced the transformed payloads.
    pub keystream_id: u16,
}

impl StreamInfo {
    pub fn raw(item_len: Option<usize>, item_count: Option<u64>) -> Self {
        Self { item_len, item_count, transformed: false, keystream_id: keystream_ids::NONE }
    }

    /// Info of the stream after one more pass of the keystream `keystream_id`.
    /// Transforming a transformed stream with the same key yields the raw one.
    pub fn toggled(&self, keystream_id: u16, item_count: Option<u64>) -> Self {
        let transformed = !self.transformed;
        Self {
            item_len: self.item_len,
            item_count,
            transformed,
            keystream_id: if transformed { keystream_id } else { keystream_ids::NONE },
        }
    }
}

/// Raw frame geometry; one payload is `width * height * channels` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32, channels: u32) -> Self {
        Self { width, height, channels }
    }

    /// 1280x720 BGR.
    pub fn reference() -> Self {
        Self::new(REFERENCE_WIDTH, REFERENCE_HEIGHT, REFERENCE_CHANNELS)
    }

    pub fn item_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }
}

pub trait FrameSource: Send {
    /// Acquire the underlying resource. Called once, before production.
    fn open(&mut self) -> Result<StreamInfo, SourceError>;

    /// Next raw payload; `None` once exhausted.
    fn next_frame(&mut self) -> Result<Option<BytesMut>, SourceError>;
}

pub trait FrameSink: Send {
    fn open(&mut self, info: &StreamInfo) -> Result<(), SinkError>;

    fn commit(&mut self, index: u64, payload: &[u8]) -> Result<(), SinkError>;

    /// Frame `index` was dropped under the skip policy and will not be
    /// committed. Sinks that locate frames by position must refuse.
    fn skip(&mut self, index: u64, reason: &str) -> Result<(), SinkError> {
        let _ = (index, reason);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

// ================= Sources =================

/// Frames held in memory.
#[derive(Debug, Default)]
pub struct MemorySource {
    frames: VecDeque<BytesMut>,
    item_len: Option<usize>,
    item_count: u64,
}

impl MemorySource {
    /// `item_len` is declared only when every frame has the same length.
    pub fn new<I, B>(frames: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let frames: VecDeque<BytesMut> =
            frames.into_iter().map(|f| BytesMut::from(f.as_ref())).collect();
        let item_len = match frames.front() {
            Some(first) if frames.iter().all(|f| f.len() == first.len()) => Some(first.len()),
            _ => None,
        };
        let item_count = frames.len() as u64;
        Self { frames, item_len, item_count }
    }
}

impl FrameSource for MemorySource {
    fn open(&mut self) -> Result<StreamInfo, SourceError> {
        Ok(StreamInfo::raw(self.item_len, Some(self.item_count)))
    }

    fn next_frame(&mut self) -> Result<Option<BytesMut>, SourceError> {
        Ok(self.frames.pop_front())
    }
}

/// Seeded camera-like frames: a drifting gradient with sensor noise.
///
/// The same `(geometry, count, seed)` always yields the same frames.
pub struct SyntheticSource {
    geometry: FrameGeometry,
    count: u64,
    seed: u64,
    opened: bool,
    produced: u64,
}

impl fmt::Debug for SyntheticSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticSource")
            .field("geometry", &self.geometry)
            .field("count", &self.count)
            .field("seed", &self.seed)
            .field("produced", &self.produced)
            .finish()
    }
}

impl SyntheticSource {
    pub fn new(geometry: FrameGeometry, count: u64, seed: u64) -> Self {
        Self { geometry, count, seed, opened: false, produced: 0 }
    }

    /// Frame `index` of this source, generated independently of the cursor.
    /// Each frame has its own noise stream, so this costs one frame's work.
    pub fn frame(&self, index: u64) -> BytesMut {
        let mut buf = BytesMut::zeroed(self.geometry.item_len());
        Self::render(&self.geometry, self.seed, index, &mut buf);
        buf
    }

    fn render(geometry: &FrameGeometry, seed: u64, index: u64, buf: &mut [u8]) {
        StdRng::seed_from_u64(seed ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15)).fill_bytes(buf);
        let width = geometry.width.max(1) as usize;
        let channels = geometry.channels.max(1) as usize;
        let drift = (index as usize).wrapping_mul(3);
        for (i, px) in buf.iter_mut().enumerate() {
            let pixel = i / channels;
            let (x, y) = (pixel % width, pixel / width);
            let base = (x + y + drift + (i % channels) * 85) as u8;
            // Low two bits of noise on top of the gradient.
            *px = base.wrapping_add(*px & 0x03);
        }
    }
}

impl FrameSource for SyntheticSource {
    fn open(&mut self) -> Result<StreamInfo, SourceError> {
        if self.geometry.item_len() == 0 {
            return Err(SourceError::Unavailable(format!(
                "synthetic geometry {}x{}x{} has no pixels",
                self.geometry.width, self.geometry.height, self.geometry.channels
            )));
        }
        self.opened = true;
        self.produced = 0;
        Ok(StreamInfo::raw(Some(self.geometry.item_len()), Some(self.count)))
    }

    fn next_frame(&mut self) -> Result<Option<BytesMut>, SourceError> {
        if !self.opened {
            return Err(SourceError::NotOpen);
        }
        if self.produced >= self.count {
            return Ok(None);
        }
        let mut buf = BytesMut::zeroed(self.geometry.item_len());
        Self::render(&self.geometry, self.seed, self.produced, &mut buf);
        self.produced += 1;
        Ok(Some(buf))
    }
}

/// Headerless file of back-to-back `item_len`-byte records.
#[derive(Debug)]
pub struct RawFileSource {
    path: PathBuf,
    item_len: usize,
    reader: Option<BufReader<File>>,
}

impl RawFileSource {
    pub fn new(path: impl Into<PathBuf>, item_len: usize) -> Self {
        Self { path: path.into(), item_len, reader: None }
    }
}

impl FrameSource for RawFileSource {
    fn open(&mut self) -> Result<StreamInfo, SourceError> {
        if self.item_len == 0 {
            return Err(SourceError::Unavailable("raw records need a non-zero length".into()));
        }
        let file = File::open(&self.path).map_err(|e| {
            SourceError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let len = file.metadata()?.len();
        let count = (len % self.item_len as u64 == 0).then(|| len / self.item_len as u64);
        self.reader = Some(BufReader::new(file));
        Ok(StreamInfo::raw(Some(self.item_len), count))
    }

    fn next_frame(&mut self) -> Result<Option<BytesMut>, SourceError> {
        let reader = self.reader.as_mut().ok_or(SourceError::NotOpen)?;
        read_record(reader, self.item_len)
    }
}

/// File with a [`ContainerHeader`] followed by fixed-size frames.
#[derive(Debug)]
pub struct ContainerFileSource {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    header: Option<ContainerHeader>,
    read: u64,
}

impl ContainerFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), reader: None, header: None, read: 0 }
    }

    /// Header parsed at open.
    pub fn header(&self) -> Option<&ContainerHeader> {
        self.header.as_ref()
    }
}

impl FrameSource for ContainerFileSource {
    fn open(&mut self) -> Result<StreamInfo, SourceError> {
        let file = File::open(&self.path).map_err(|e| {
            SourceError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let mut reader = BufReader::new(file);

        let mut buf = [0u8; ContainerHeader::LEN];
        reader.read_exact(&mut buf)?;
        let header = decode_header_le(&buf)?;

        let info = StreamInfo {
            item_len: Some(header.item_len as usize),
            item_count: header.has_final_count().then_some(header.item_count),
            transformed: header.is_transformed(),
            keystream_id: header.keystream_id,
        };
        self.reader = Some(reader);
        self.header = Some(header);
        self.read = 0;
        Ok(info)
    }

    fn next_frame(&mut self) -> Result<Option<BytesMut>, SourceError> {
        let (reader, header) = match (self.reader.as_mut(), self.header.as_ref()) {
            (Some(r), Some(h)) => (r, h),
            _ => return Err(SourceError::NotOpen),
        };
        if header.has_final_count() && self.read >= header.item_count {
            return Ok(None);
        }
        if header.item_len == 0 && header.has_final_count() {
            self.read += 1;
            return Ok(Some(BytesMut::new()));
        }
        let frame = read_record(reader, header.item_len as usize)?;
        if frame.is_some() {
            self.read += 1;
        } else if header.has_final_count() {
            return Err(SourceError::Truncated {
                expected: header.item_len as usize,
                got: 0,
            });
        }
        Ok(frame)
    }
}

/// `None` at a clean EOF; a short record is an error.
fn read_record<R: Read>(reader: &mut R, item_len: usize) -> Result<Option<BytesMut>, SourceError> {
    let buf = read_exact_or_eof(reader, item_len)?;
    match buf.len() {
        0 => Ok(None),
        n if n == item_len => Ok(Some(buf)),
        n => Err(SourceError::Truncated { expected: item_len, got: n }),
    }
}

// ================= Sinks =================

#[derive(Debug, Default)]
struct MemorySinkInner {
    info: Option<StreamInfo>,
    frames: Vec<(u64, Vec<u8>)>,
    skipped: Vec<u64>,
    finished: bool,
}

/// Collects committed frames; clones share the same storage, so keep one
/// handle to inspect what the pipeline committed.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<MemorySinkInner>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Self {
        self.clone()
    }

    /// `(index, payload)` in commit order.
    pub fn frames(&self) -> Vec<(u64, Vec<u8>)> {
        self.inner.lock().frames.clone()
    }

    pub fn indices(&self) -> Vec<u64> {
        self.inner.lock().frames.iter().map(|(i, _)| *i).collect()
    }

    /// Indices reported through [`FrameSink::skip`], in order.
    pub fn skipped(&self) -> Vec<u64> {
        self.inner.lock().skipped.clone()
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.inner.lock().frames.iter().map(|(_, p)| p.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().frames.is_empty()
    }

    pub fn info(&self) -> Option<StreamInfo> {
        self.inner.lock().info
    }

    pub fn is_finished(&self) -> bool {
        self.inner.lock().finished
    }
}

impl FrameSink for MemorySink {
    fn open(&mut self, info: &StreamInfo) -> Result<(), SinkError> {
        let mut inner = self.inner.lock();
        inner.info = Some(*info);
        inner.frames.clear();
        inner.skipped.clear();
        inner.finished = false;
        Ok(())
    }

    fn commit(&mut self, index: u64, payload: &[u8]) -> Result<(), SinkError> {
        self.inner.lock().frames.push((index, payload.to_vec()));
        Ok(())
    }

    fn skip(&mut self, index: u64, _reason: &str) -> Result<(), SinkError> {
        self.inner.lock().skipped.push(index);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.inner.lock().finished = true;
        Ok(())
    }
}

/// Headerless output: payloads written back to back.
#[derive(Debug)]
pub struct RawFileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl RawFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), writer: None }
    }
}

impl FrameSink for RawFileSink {
    fn open(&mut self, _info: &StreamInfo) -> Result<(), SinkError> {
        let file = File::create(&self.path).map_err(|e| {
            SinkError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    fn commit(&mut self, _index: u64, payload: &[u8]) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::NotOpen)?;
        writer.write_all(payload)?;
        Ok(())
    }

    fn skip(&mut self, index: u64, _reason: &str) -> Result<(), SinkError> {
        Err(SinkError::Gap { index })
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::NotOpen)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }
}

/// Container output. The header is written at open with no final count and
/// rewritten by `finish` once the count is known.
#[derive(Debug)]
pub struct ContainerFileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    header: Option<ContainerHeader>,
    committed: u64,
}

impl ContainerFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), writer: None, header: None, committed: 0 }
    }
}

impl FrameSink for ContainerFileSink {
    fn open(&mut self, info: &StreamInfo) -> Result<(), SinkError> {
        let item_len = info.item_len.ok_or_else(|| {
            SinkError::Unavailable("container output needs a fixed frame length".into())
        })?;
        let item_len_u32 =
            u32::try_from(item_len).map_err(|_| HeaderError::ItemLenTooLarge { item_len })?;
        let header = ContainerHeader::new(item_len_u32, info.transformed, info.keystream_id);
        let bytes = encode_header_le(&header)?;

        let file = File::create(&self.path).map_err(|e| {
            SinkError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&bytes)?;

        self.writer = Some(writer);
        self.header = Some(header);
        self.committed = 0;
        Ok(())
    }

    fn commit(&mut self, index: u64, payload: &[u8]) -> Result<(), SinkError> {
        let (writer, header) = match (self.writer.as_mut(), self.header.as_ref()) {
            (Some(w), Some(h)) => (w, h),
            _ => return Err(SinkError::NotOpen),
        };
        let expected = header.item_len as usize;
        if payload.len() != expected {
            return Err(SinkError::LengthMismatch { index, expected, got: payload.len() });
        }
        writer.write_all(payload)?;
        self.committed += 1;
        Ok(())
    }

    fn skip(&mut self, index: u64, _reason: &str) -> Result<(), SinkError> {
        Err(SinkError::Gap { index })
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        let (writer, header) = match (self.writer.as_mut(), self.header.as_mut()) {
            (Some(w), Some(h)) => (w, h),
            _ => return Err(SinkError::NotOpen),
        };
        header.finalize_count(self.committed);
        let bytes = encode_header_le(header)?;

        writer.seek(SeekFrom::Start(0))?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }
}

// ================= Descriptors =================

/// Where frames come from.
pub enum InputSource {
    Memory(Vec<Vec<u8>>),
    Synthetic { geometry: FrameGeometry, count: u64, seed: u64 },
    RawFile { path: PathBuf, item_len: usize },
    ContainerFile(PathBuf),
    Custom(Box<dyn FrameSource>),
}

/// Where committed frames go.
pub enum OutputSink {
    /// Keep a handle to the sink to read the frames back.
    Memory(MemorySink),
    RawFile(PathBuf),
    ContainerFile(PathBuf),
    Custom(Box<dyn FrameSink>),
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Memory(frames) => write!(f, "Memory({} frames)", frames.len()),
            InputSource::Synthetic { geometry, count, seed } => f
                .debug_struct("Synthetic")
                .field("geometry", geometry)
                .field("count", count)
                .field("seed", seed)
                .finish(),
            InputSource::RawFile { path, item_len } => {
                write!(f, "RawFile({}, {} bytes)", path.display(), item_len)
            }
            InputSource::ContainerFile(path) => write!(f, "ContainerFile({})", path.display()),
            InputSource::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputSink::Memory(_) => f.write_str("Memory"),
            OutputSink::RawFile(path) => write!(f, "RawFile({})", path.display()),
            OutputSink::ContainerFile(path) => write!(f, "ContainerFile({})", path.display()),
            OutputSink::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Build the adapter for a descriptor. Nothing is opened yet.
pub fn open_source(src: InputSource) -> Box<dyn FrameSource> {
    match src {
        InputSource::Memory(frames) => Box::new(MemorySource::new(frames)),
        InputSource::Synthetic { geometry, count, seed } => {
            Box::new(SyntheticSource::new(geometry, count, seed))
        }
        InputSource::RawFile { path, item_len } => Box::new(RawFileSource::new(path, item_len)),
        InputSource::ContainerFile(path) => Box::new(ContainerFileSource::new(path)),
        InputSource::Custom(source) => source,
    }
}

/// Build the adapter for a descriptor. Nothing is opened yet.
pub fn open_sink(sink: OutputSink) -> Box<dyn FrameSink> {
    match sink {
        OutputSink::Memory(sink) => Box::new(sink),
        OutputSink::RawFile(path) => Box::new(RawFileSink::new(path)),
        OutputSink::ContainerFile(path) => Box::new(ContainerFileSink::new(path)),
        OutputSink::Custom(sink) => sink,
    }
}
