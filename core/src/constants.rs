/// Magic number for the frame container.
/// "FCP1" = Frame Container, Pipeline v1
pub const MAGIC_FCP1: [u8; 4] = *b"FCP1";
pub const CONTAINER_V1: u16 = 1;

/// Defaults when the config leaves a field unset.
pub const DEFAULT_BACKOFF_MS: u64 = 1;
pub const DEFAULT_TRANSFORM_RETRIES: u32 = 2;
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100;

/// Largest slice a single keystream call hands back before the caller
/// has to continue from the returned offset.
pub const DEFAULT_KEYSTREAM_BLOCK_LEN: usize = 1024 * 1024; // 1 MiB
pub const MIN_KEYSTREAM_BLOCK_LEN: usize = 64;

/// Reference capture run: 10 s of a 15 fps camera.
pub const REFERENCE_CAPTURE_SECONDS: u64 = 10;
pub const REFERENCE_FPS: u64 = 15;
pub const REFERENCE_MAX_ITEMS: u64 = REFERENCE_CAPTURE_SECONDS * REFERENCE_FPS;

/// Reference camera geometry (BGR, 8 bit per channel).
pub const REFERENCE_WIDTH: u32 = 1280;
pub const REFERENCE_HEIGHT: u32 = 720;
pub const REFERENCE_CHANNELS: u32 = 3;

/// Worker and queue sizing bounds.
pub const MAX_WORKERS: usize = 256;
pub const DEFAULT_INFLIGHT_CAP: usize = 64;
pub const DEFAULT_MEM_FRACTION: f64 = 0.25;

/// Keystream generator identifiers (mirrored in container headers).
pub mod keystream_ids {
    pub const NONE: u16     = 0x0000;
    pub const BLAKE3: u16   = 0x0001;
    pub const LOGISTIC: u16 = 0x0002;
}

/// Container flag bits.
pub mod flags {
    pub const TRANSFORMED: u16 = 0x0001;
    pub const COUNT_FINAL: u16 = 0x0002;
}
