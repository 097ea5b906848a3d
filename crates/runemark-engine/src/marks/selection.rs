use crate::marks::error::MarkError;
use crate::marks::run::PLACEHOLDER;
use crate::marks::sequence::{BlockId, Edit, RunId, RunSequence};

/// Which side of an edit an anchor sticks to when text appears or splits
/// exactly at its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gravity {
    /// Stay with the text before the anchor
    Left,
    /// Follow the text after the anchor
    Right,
}

/// A caret position: character offset into one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Anchor {
    pub run: RunId,
    pub offset: usize,
}

impl Anchor {
    pub fn new(run: RunId, offset: usize) -> Self {
        Self { run, offset }
    }
}

/// A selection inside a single block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection {
    pub start: Anchor,
    pub end: Anchor,
}

impl Selection {
    pub fn new(start: Anchor, end: Anchor) -> Self {
        Self { start, end }
    }

    pub fn collapsed(at: Anchor) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Build a selection from block-level character offsets.
    ///
    /// A non-empty range starts inside the run after a boundary and ends
    /// inside the run before it; a caret sits at the end of the preceding run.
    pub fn from_block_offsets(sequence: &RunSequence, start: usize, end: usize) -> Self {
        let (start, end) = (start.min(end), start.max(end));
        if start == end {
            let (run, offset) = sequence.locate(start, false);
            return Self::collapsed(Anchor::new(run, offset));
        }
        let (start_run, start_offset) = sequence.locate(start, true);
        let (end_run, end_offset) = sequence.locate(end, false);
        Self::new(
            Anchor::new(start_run, start_offset),
            Anchor::new(end_run, end_offset),
        )
    }

    /// Block-level character offsets of both anchors, in selection order
    pub fn block_offsets(&self, sequence: &RunSequence) -> Result<(usize, usize), MarkError> {
        Ok((
            sequence.char_offset(self.start.run, self.start.offset)?,
            sequence.char_offset(self.end.run, self.end.offset)?,
        ))
    }

    /// The same selection with `start` before `end`
    pub fn ordered(self, sequence: &RunSequence) -> Result<Self, MarkError> {
        let (start, end) = self.block_offsets(sequence)?;
        if start > end {
            Ok(Self::new(self.end, self.start))
        } else {
            Ok(self)
        }
    }

    /// Selected text, placeholders included
    pub fn text(&self, sequence: &RunSequence) -> Result<String, MarkError> {
        let (start, end) = self.block_offsets(sequence)?;
        let (start, end) = (start.min(end), start.max(end));
        Ok(sequence.text().chars().skip(start).take(end - start).collect())
    }

    /// True when nothing but placeholders is selected
    pub fn is_logically_empty(&self, sequence: &RunSequence) -> Result<bool, MarkError> {
        Ok(self.text(sequence)?.chars().all(|c| c == PLACEHOLDER))
    }
}

/// Carries a selection across the structural edits of one operation.
///
/// The start anchor follows the text after it and the end anchor the text
/// before it, so a split at either boundary keeps the selection on the
/// selected side. A caret keeps both anchors together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionMapper {
    start: Anchor,
    end: Anchor,
    start_gravity: Gravity,
}

impl SelectionMapper {
    pub fn new(selection: Selection) -> Self {
        let start_gravity = if selection.is_collapsed() {
            Gravity::Left
        } else {
            Gravity::Right
        };
        Self {
            start: selection.start,
            end: selection.end,
            start_gravity,
        }
    }

    pub fn replay(&mut self, edits: &[Edit]) {
        for edit in edits {
            self.start = map_anchor(self.start, self.start_gravity, edit);
            self.end = map_anchor(self.end, Gravity::Left, edit);
        }
    }

    pub fn selection(&self) -> Selection {
        Selection::new(self.start, self.end)
    }
}

/// Move one anchor across one edit
pub fn map_anchor(anchor: Anchor, gravity: Gravity, edit: &Edit) -> Anchor {
    let Anchor { run, offset } = anchor;
    match *edit {
        Edit::Split { source, right, at } if source == run => {
            if offset > at || (offset == at && gravity == Gravity::Right) {
                Anchor::new(right, offset - at)
            } else {
                anchor
            }
        }
        Edit::Absorb {
            left,
            right,
            keep_left,
            drop_right,
        } => {
            if run == right {
                Anchor::new(left, keep_left + offset.saturating_sub(drop_right))
            } else if run == left {
                Anchor::new(left, offset.min(keep_left))
            } else {
                anchor
            }
        }
        Edit::Remove {
            run: removed,
            prev,
            next,
        } if removed == run => match (prev, next) {
            (Some((prev, len)), _) => Anchor::new(prev, len),
            (None, Some(next)) => Anchor::new(next, 0),
            (None, None) => anchor,
        },
        Edit::Delete {
            run: target,
            at,
            count,
        } if target == run => {
            if offset >= at + count {
                Anchor::new(run, offset - count)
            } else if offset > at {
                Anchor::new(run, at)
            } else {
                anchor
            }
        }
        Edit::Insert {
            run: target,
            at,
            count,
        } if target == run => {
            if offset > at || (offset == at && gravity == Gravity::Right) {
                Anchor::new(run, offset + count)
            } else {
                anchor
            }
        }
        Edit::Retext {
            run: target,
            old_len,
            new_len,
        } if target == run => {
            if offset >= old_len {
                Anchor::new(run, new_len)
            } else {
                Anchor::new(run, offset.min(new_len))
            }
        }
        _ => anchor,
    }
}

/// Direction the caret was moving when a selection crossed a block boundary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NavDirection {
    #[default]
    Forward,
    Backward,
}

/// An anchor qualified by the block that owns its run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPoint {
    pub block: BlockId,
    pub anchor: Anchor,
}

/// A selection that may span two blocks, as reported by the editing surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSelection {
    pub start: BlockPoint,
    pub end: BlockPoint,
}

impl DocumentSelection {
    /// A selection inside one block
    pub fn within(block: BlockId, selection: Selection) -> Self {
        Self {
            start: BlockPoint {
                block: block.clone(),
                anchor: selection.start,
            },
            end: BlockPoint {
                block,
                anchor: selection.end,
            },
        }
    }

    pub fn is_cross_block(&self) -> bool {
        self.start.block != self.end.block
    }
}

/// Reduce a selection to a single block.
///
/// Moving forward keeps the part from the start anchor to the end of the
/// start block; moving backward keeps the part from the beginning of the end
/// block to the end anchor. `None` when the kept part is empty or an anchor
/// is stale.
pub fn clamp_to_single_block(
    selection: &DocumentSelection,
    direction: NavDirection,
    start_block: &RunSequence,
    end_block: &RunSequence,
) -> Option<(BlockId, Selection)> {
    if !selection.is_cross_block() {
        return Some((
            selection.start.block.clone(),
            Selection::new(selection.start.anchor, selection.end.anchor),
        ));
    }
    let (block, clamped) = match direction {
        NavDirection::Forward => {
            let last = start_block.last()?;
            let len = start_block.get(last)?.len();
            (
                start_block,
                Selection::new(selection.start.anchor, Anchor::new(last, len)),
            )
        }
        NavDirection::Backward => {
            let first = end_block.first()?;
            (
                end_block,
                Selection::new(Anchor::new(first, 0), selection.end.anchor),
            )
        }
    };
    let (start, end) = clamped.block_offsets(block).ok()?;
    if start >= end {
        return None;
    }
    Some((block.block_id().clone(), clamped))
}
