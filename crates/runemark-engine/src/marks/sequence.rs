use std::fmt;

use serde::{Deserialize, Serialize};

use crate::marks::error::MarkError;
use crate::marks::run::{PLACEHOLDER, Run};

/// Identifier of the block that owns a run sequence
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id for blocks created locally
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Stable handle to a run: arena slot plus the generation it was issued for.
///
/// A handle whose run was merged away or removed goes stale; lookups then
/// return `None` rather than a different run that reused the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId {
    slot: u32,
    generation: u32,
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.slot, self.generation)
    }
}

/// Structural change recorded while a sequence is being rewritten.
///
/// The selection mapper replays these to carry anchors across the edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    /// `source` kept its first `at` characters, the rest moved to `right`
    Split { source: RunId, right: RunId, at: usize },
    /// `left` was cut to `keep_left` characters, then `right` minus its first
    /// `drop_right` characters was appended to it and `right` retired
    Absorb {
        left: RunId,
        right: RunId,
        keep_left: usize,
        drop_right: usize,
    },
    /// `run` was retired; `prev` carries the previous run and its length
    Remove {
        run: RunId,
        prev: Option<(RunId, usize)>,
        next: Option<RunId>,
    },
    /// `count` characters removed from `run` at `at`
    Delete { run: RunId, at: usize, count: usize },
    /// `count` characters inserted into `run` at `at`
    Insert { run: RunId, at: usize, count: usize },
    /// The whole text of `run` was replaced
    Retext {
        run: RunId,
        old_len: usize,
        new_len: usize,
    },
}

/// Outcome of [`RunSequence::split_at`]; splitting at either end leaves one side absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    pub left: Option<RunId>,
    pub right: Option<RunId>,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    run: Option<Run>,
}

/// Ordered runs of one block, stored in a generational arena.
///
/// `order` lists live handles left to right; the concatenated run texts are
/// the block's text. A sequence always holds at least one run.
#[derive(Debug, Clone)]
pub struct RunSequence {
    block_id: BlockId,
    slots: Vec<Slot>,
    order: Vec<RunId>,
    free: Vec<u32>,
    journal: Vec<Edit>,
}

impl RunSequence {
    /// A block holding a single empty plain run
    pub fn new(block_id: BlockId) -> Self {
        Self::from_runs(block_id, Vec::new())
    }

    pub fn from_runs(block_id: BlockId, runs: impl IntoIterator<Item = Run>) -> Self {
        let mut sequence = Self {
            block_id,
            slots: Vec::new(),
            order: Vec::new(),
            free: Vec::new(),
            journal: Vec::new(),
        };
        for run in runs {
            let id = sequence.alloc(run);
            sequence.order.push(id);
        }
        if sequence.order.is_empty() {
            let id = sequence.alloc(Run::plain(""));
            sequence.order.push(id);
        }
        sequence
    }

    pub fn block_id(&self) -> &BlockId {
        &self.block_id
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Live handles in document order
    pub fn ids(&self) -> &[RunId] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (RunId, &Run)> {
        self.order
            .iter()
            .filter_map(|&id| self.get(id).map(|run| (id, run)))
    }

    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.iter().map(|(_, run)| run)
    }

    pub fn to_runs(&self) -> Vec<Run> {
        self.runs().cloned().collect()
    }

    pub fn get(&self, id: RunId) -> Option<&Run> {
        self.slots
            .get(id.slot as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.run.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: RunId) -> Option<&mut Run> {
        self.slots
            .get_mut(id.slot as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.run.as_mut())
    }

    pub fn contains(&self, id: RunId) -> bool {
        self.get(id).is_some()
    }

    pub fn position(&self, id: RunId) -> Option<usize> {
        self.order.iter().position(|&other| other == id)
    }

    pub fn id_at(&self, position: usize) -> Option<RunId> {
        self.order.get(position).copied()
    }

    pub fn run_at(&self, position: usize) -> Option<&Run> {
        self.id_at(position).and_then(|id| self.get(id))
    }

    pub fn first(&self) -> Option<RunId> {
        self.order.first().copied()
    }

    pub fn last(&self) -> Option<RunId> {
        self.order.last().copied()
    }

    /// Concatenated text including placeholders
    pub fn text(&self) -> String {
        self.runs().map(Run::text).collect()
    }

    /// Concatenated text without placeholders
    pub fn visible_text(&self) -> String {
        self.runs().map(Run::visible_text).collect()
    }

    /// Character length of the whole block
    pub fn char_len(&self) -> usize {
        self.runs().map(Run::len).sum()
    }

    /// Validate a (run, offset) pair against the arena
    pub fn check(&self, id: RunId, offset: usize) -> Result<&Run, MarkError> {
        let run = self.get(id).ok_or(MarkError::StaleRun(id))?;
        let len = run.len();
        if offset > len {
            return Err(MarkError::OffsetOutOfRange {
                run: id,
                offset,
                len,
            });
        }
        Ok(run)
    }

    /// Block-level character offset of a (run, offset) pair
    pub fn char_offset(&self, id: RunId, offset: usize) -> Result<usize, MarkError> {
        self.check(id, offset)?;
        let before: usize = self
            .order
            .iter()
            .take_while(|&&other| other != id)
            .filter_map(|&other| self.get(other))
            .map(Run::len)
            .sum();
        Ok(before + offset)
    }

    /// Locate a block-level character offset.
    ///
    /// On a boundary between two runs, `prefer_next` picks the start of the
    /// following run instead of the end of the preceding one. Offsets past
    /// the end clamp to the end of the last run.
    pub fn locate(&self, offset: usize, prefer_next: bool) -> (RunId, usize) {
        let mut remaining = offset;
        let count = self.order.len();
        for (index, (id, run)) in self.iter().enumerate() {
            let len = run.len();
            let last = index + 1 == count;
            if remaining < len || (remaining == len && (!prefer_next || last)) {
                return (id, remaining);
            }
            remaining -= len;
        }
        let last = self.order[count - 1];
        (last, self.get(last).map(Run::len).unwrap_or(0))
    }

    /// Split a run at a character offset.
    ///
    /// Both halves keep the tags and payload of the original; the left half
    /// keeps the original handle. Splitting at 0 or at the end changes
    /// nothing and reports the missing side as `None`.
    pub fn split_at(&mut self, id: RunId, offset: usize) -> Result<Split, MarkError> {
        let len = self.check(id, offset)?.len();
        if offset == 0 {
            return Ok(Split {
                left: None,
                right: Some(id),
            });
        }
        if offset == len {
            return Ok(Split {
                left: Some(id),
                right: None,
            });
        }
        let right_run = match self.get_mut(id) {
            Some(run) => run.split_off(offset),
            None => return Err(MarkError::StaleRun(id)),
        };
        let position = self.position(id).ok_or(MarkError::StaleRun(id))?;
        let right = self.insert(position + 1, right_run);
        self.journal.push(Edit::Split {
            source: id,
            right,
            at: offset,
        });
        Ok(Split {
            left: Some(id),
            right: Some(right),
        })
    }

    /// Insert a new run at `position` in document order
    pub fn insert(&mut self, position: usize, run: Run) -> RunId {
        let id = self.alloc(run);
        let position = position.min(self.order.len());
        self.order.insert(position, id);
        id
    }

    /// Retire a run; the last remaining run of a block cannot be removed
    pub fn remove(&mut self, id: RunId) -> Option<Run> {
        if self.order.len() <= 1 {
            return None;
        }
        let position = self.position(id)?;
        let prev = position
            .checked_sub(1)
            .and_then(|p| self.id_at(p))
            .and_then(|p| self.get(p).map(|run| (p, run.len())));
        let next = self.id_at(position + 1);
        self.order.remove(position);
        let run = self.retire(id);
        self.journal.push(Edit::Remove { run: id, prev, next });
        run
    }

    /// Replace the pair at `position`/`position + 1` by `merged`, keeping
    /// the left handle.
    pub(crate) fn absorb_next(
        &mut self,
        position: usize,
        merged: Run,
        keep_left: usize,
        drop_right: usize,
    ) -> Option<RunId> {
        let left = self.id_at(position)?;
        let right = self.id_at(position + 1)?;
        *self.get_mut(left)? = merged;
        self.order.remove(position + 1);
        self.retire(right);
        self.journal.push(Edit::Absorb {
            left,
            right,
            keep_left,
            drop_right,
        });
        Some(left)
    }

    /// Fold every run from `first` through `last` into `first`, keeping its
    /// tags and payload.
    pub(crate) fn coalesce(&mut self, first: RunId, last: RunId) -> Option<RunId> {
        let start = self.position(first)?;
        let end = self.position(last)?;
        for _ in start..end {
            let left = self.run_at(start)?;
            let right = self.run_at(start + 1)?;
            let keep_left = left.len();
            let mut merged = left.clone();
            merged.set_text(format!("{}{}", left.text(), right.text()));
            self.absorb_next(start, merged, keep_left, 0)?;
        }
        Some(first)
    }

    pub(crate) fn delete_chars(&mut self, id: RunId, at: usize, count: usize) {
        if count == 0 {
            return;
        }
        if let Some(run) = self.get_mut(id) {
            run.delete_chars(at, count);
            self.journal.push(Edit::Delete { run: id, at, count });
        }
    }

    pub(crate) fn insert_placeholder(&mut self, id: RunId, at: usize) {
        if let Some(run) = self.get_mut(id) {
            run.insert_char(at, PLACEHOLDER);
            self.journal.push(Edit::Insert {
                run: id,
                at,
                count: 1,
            });
        }
    }

    pub(crate) fn replace_text(&mut self, id: RunId, text: String) {
        if let Some(run) = self.get_mut(id) {
            let old_len = run.len();
            run.set_text(text);
            let new_len = run.len();
            self.journal.push(Edit::Retext {
                run: id,
                old_len,
                new_len,
            });
        }
    }

    /// Structural edits recorded since the last call
    pub fn take_edits(&mut self) -> Vec<Edit> {
        std::mem::take(&mut self.journal)
    }

    fn alloc(&mut self, run: Run) -> RunId {
        match self.free.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot as usize];
                entry.run = Some(run);
                RunId {
                    slot,
                    generation: entry.generation,
                }
            }
            None => {
                let slot = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    run: Some(run),
                });
                RunId {
                    slot,
                    generation: 0,
                }
            }
        }
    }

    fn retire(&mut self, id: RunId) -> Option<Run> {
        let entry = self.slots.get_mut(id.slot as usize)?;
        if entry.generation != id.generation {
            return None;
        }
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.slot);
        entry.run.take()
    }
}

impl PartialEq for RunSequence {
    /// Sequences are equal when they belong to the same block and read the
    /// same runs; handles and arena layout are not compared.
    fn eq(&self, other: &Self) -> bool {
        self.block_id == other.block_id && self.runs().eq(other.runs())
    }
}

impl Eq for RunSequence {}
