use std::collections::BTreeMap;

use crate::marks::engine::{MarkEngine, MarkOutcome, MarkRequest, NoOpReason, current_tags};
use crate::marks::policy::MarkPolicy;
use crate::marks::selection::{DocumentSelection, NavDirection, Selection, clamp_to_single_block};
use crate::marks::sequence::{BlockId, RunSequence};
use crate::marks::tag::TagSet;
use crate::marks::transaction::TransactionSink;

/// Supplies the current run sequence of a block
pub trait BlockResolver {
    fn resolve(&self, id: &BlockId) -> Option<&RunSequence>;
}

/// In-memory blocks keyed by id
#[derive(Debug, Clone, Default)]
pub struct BlockStore {
    blocks: BTreeMap<BlockId, RunSequence>,
}

impl BlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a block under its own id, returning the one it replaced
    pub fn insert(&mut self, sequence: RunSequence) -> Option<RunSequence> {
        self.blocks.insert(sequence.block_id().clone(), sequence)
    }

    pub fn get(&self, id: &BlockId) -> Option<&RunSequence> {
        self.blocks.get(id)
    }

    pub fn get_mut(&mut self, id: &BlockId) -> Option<&mut RunSequence> {
        self.blocks.get_mut(id)
    }

    pub fn remove(&mut self, id: &BlockId) -> Option<RunSequence> {
        self.blocks.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunSequence> {
        self.blocks.values()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl BlockResolver for BlockStore {
    fn resolve(&self, id: &BlockId) -> Option<&RunSequence> {
        self.get(id)
    }
}

impl FromIterator<RunSequence> for BlockStore {
    fn from_iter<I: IntoIterator<Item = RunSequence>>(iter: I) -> Self {
        let mut store = BlockStore::new();
        for sequence in iter {
            store.insert(sequence);
        }
        store
    }
}

/// Funnels every mark operation through one place: clamps the selection to
/// a block, applies the request and forwards real changes to the sink.
///
/// Taking `&mut self` per operation is what keeps two operations from
/// interleaving on the same block.
#[derive(Debug)]
pub struct MarkSession<S: TransactionSink> {
    store: BlockStore,
    engine: MarkEngine,
    sink: S,
    direction: NavDirection,
}

impl<S: TransactionSink> MarkSession<S> {
    pub fn new(store: BlockStore, policy: MarkPolicy, sink: S) -> Self {
        Self {
            store,
            engine: MarkEngine::new(policy),
            sink,
            direction: NavDirection::default(),
        }
    }

    /// Direction used to clamp selections that cross a block boundary
    pub fn set_direction(&mut self, direction: NavDirection) {
        self.direction = direction;
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_parts(self) -> (BlockStore, S) {
        (self.store, self.sink)
    }

    pub fn apply(
        &mut self,
        selection: &DocumentSelection,
        request: &MarkRequest,
    ) -> Result<MarkOutcome, NoOpReason> {
        let (block_id, clamped) = self.clamp(selection)?;
        let sequence = self
            .store
            .get_mut(&block_id)
            .ok_or_else(|| NoOpReason::UnknownBlock(block_id.clone()))?;
        let outcome = self.engine.apply(sequence, clamped, request);
        if !outcome.transaction.is_noop() {
            self.sink.submit(outcome.transaction.clone());
        }
        Ok(outcome)
    }

    /// Toolbar state for a selection; empty when it cannot be resolved
    pub fn current_tags(&self, selection: &DocumentSelection) -> TagSet {
        self.clamp(selection)
            .ok()
            .and_then(|(id, clamped)| {
                self.store
                    .resolve(&id)
                    .map(|sequence| current_tags(sequence, clamped))
            })
            .unwrap_or_default()
    }

    fn clamp(
        &self,
        selection: &DocumentSelection,
    ) -> Result<(BlockId, Selection), NoOpReason> {
        let start = self
            .store
            .resolve(&selection.start.block)
            .ok_or_else(|| NoOpReason::UnknownBlock(selection.start.block.clone()))?;
        let end = self
            .store
            .resolve(&selection.end.block)
            .ok_or_else(|| NoOpReason::UnknownBlock(selection.end.block.clone()))?;
        clamp_to_single_block(selection, self.direction, start, end)
            .ok_or(NoOpReason::EmptySelection)
    }
}
