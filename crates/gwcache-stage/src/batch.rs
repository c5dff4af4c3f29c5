//! Splitting a patch set into stage update calls.

use gwcache_core::patch::PatchOperation;

/// Most operations the gateway accepts in one stage update.
pub const MAX_OPERATIONS_PER_BATCH: usize = 80;

/// One stage update call's worth of operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchBatch {
    /// Zero-based position of this batch.
    pub index: usize,
    pub total: usize,
    pub operations: Vec<PatchOperation>,
}

impl PatchBatch {
    /// One-based position, for messages.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Split operations into ordered batches of at most `batch_size`. A size of
/// zero, or one above the gateway limit, is clamped to the limit.
pub fn chunk(operations: Vec<PatchOperation>, batch_size: usize) -> Vec<PatchBatch> {
    let size = match batch_size {
        0 => MAX_OPERATIONS_PER_BATCH,
        n => n.min(MAX_OPERATIONS_PER_BATCH),
    };
    let total = operations.len().div_ceil(size);

    let mut batches = Vec::with_capacity(total);
    let mut remaining = operations.into_iter().peekable();
    while remaining.peek().is_some() {
        let operations: Vec<PatchOperation> = remaining.by_ref().take(size).collect();
        batches.push(PatchBatch {
            index: batches.len(),
            total,
            operations,
        });
    }
    batches
}
