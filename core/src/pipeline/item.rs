use bytes::BytesMut;

/// One indexed unit flowing from the producer to the workers.
///
/// The payload is moved, never copied, from stage to stage.
#[derive(Debug)]
pub struct WorkItem {
    pub index: u64,
    pub payload: BytesMut,
}

impl WorkItem {
    pub fn new(index: u64, payload: BytesMut) -> Self {
        Self { index, payload }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// What a worker deposits in the reorder buffer for an index.
#[derive(Debug)]
pub enum Slot {
    /// Transformed payload, ready to commit.
    Ready(BytesMut),
    /// Poison marker for an index that could not be transformed. The
    /// cursor advances past it; nothing is committed for it.
    Skipped { reason: String },
}

impl Slot {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Slot::Skipped { .. })
    }
}

/// An item released by the reorder buffer, in index order.
#[derive(Debug)]
pub struct Completed {
    pub index: u64,
    pub slot: Slot,
}
