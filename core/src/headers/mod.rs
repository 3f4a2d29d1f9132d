//! headers/mod.rs
//! Frame container header: the only persisted format the crate writes.
//!
//! A container is the header followed by `item_count` records of
//! `item_len` bytes each. The TRANSFORMED flag and keystream id record
//! whether the records currently carry keystream, so running the same
//! transform over a container flips it back.

pub mod types;
pub mod encode;
pub mod decode;

pub use types::*;
pub use encode::*;
pub use decode::*;
