use std::fmt;

use log::{debug, trace};

use crate::marks::error::MarkError;
use crate::marks::exclusivity::resolve;
use crate::marks::merge::normalize;
use crate::marks::payload::PayloadValue;
use crate::marks::policy::MarkPolicy;
use crate::marks::run::{PLACEHOLDER, Run};
use crate::marks::sequence::{BlockId, RunId, RunSequence};
use crate::marks::selection::{Anchor, Gravity, Selection, SelectionMapper, map_anchor};
use crate::marks::tag::{Tag, TagSet};
use crate::marks::transaction::{Transaction, serialize_block};

/// Which tags a clear strips
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClearScope {
    /// Every style-like tag, font styling included
    #[default]
    Styles,
    /// Only the font styling carried by `text`
    FontStyle,
}

impl ClearScope {
    pub fn tags(self) -> TagSet {
        match self {
            ClearScope::Styles => TagSet::STYLE_LIKE,
            ClearScope::FontStyle => TagSet::single(Tag::Text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkMode {
    Add(Tag),
    Remove(Tag),
    Toggle(Tag),
    Clear(ClearScope),
}

impl MarkMode {
    /// The tag this mode targets; `None` for a clear
    pub fn tag(self) -> Option<Tag> {
        match self {
            MarkMode::Add(tag) | MarkMode::Remove(tag) | MarkMode::Toggle(tag) => Some(tag),
            MarkMode::Clear(_) => None,
        }
    }
}

/// One toolbar action: a mode plus the payload for tags that carry one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkRequest {
    pub mode: MarkMode,
    pub payload: Option<PayloadValue>,
}

impl MarkRequest {
    pub fn add(tag: Tag) -> Self {
        Self::from(MarkMode::Add(tag))
    }

    pub fn remove(tag: Tag) -> Self {
        Self::from(MarkMode::Remove(tag))
    }

    pub fn toggle(tag: Tag) -> Self {
        Self::from(MarkMode::Toggle(tag))
    }

    pub fn clear() -> Self {
        Self::from(MarkMode::Clear(ClearScope::Styles))
    }

    pub fn clear_font_style() -> Self {
        Self::from(MarkMode::Clear(ClearScope::FontStyle))
    }

    pub fn with_payload(mut self, payload: PayloadValue) -> Self {
        self.payload = Some(payload);
        self
    }
}

impl From<MarkMode> for MarkRequest {
    fn from(mode: MarkMode) -> Self {
        Self {
            mode,
            payload: None,
        }
    }
}

/// Popover the caller should open after the operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderKind {
    MathEditor,
    MemoEditor,
    LinkMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRequest {
    pub kind: RenderKind,
    pub run: RunId,
}

/// Why an operation left the block untouched
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NoOpReason {
    #[error(transparent)]
    Precondition(#[from] MarkError),
    #[error("Selection is empty after clamping to one block")]
    EmptySelection,
    #[error("Block {0} is not loaded")]
    UnknownBlock(BlockId),
    #[error("`{0}` is not removed by a generic clear")]
    ClearProtected(Tag),
    #[error("`{0}` is already applied at the cursor")]
    AlreadyApplied(Tag),
    #[error("`{0}` is not applied to the selection")]
    NotApplied(Tag),
    #[error("`{0}` needs a payload")]
    MissingPayload(Tag),
    #[error("Nothing changed")]
    Unchanged,
}

/// Result of one mark operation.
///
/// A skipped operation carries the original selection and a transaction
/// whose both sides are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkOutcome {
    pub selection: Selection,
    pub transaction: Transaction,
    pub render: Option<RenderRequest>,
    pub skipped: Option<NoOpReason>,
}

impl MarkOutcome {
    pub fn is_noop(&self) -> bool {
        self.skipped.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    BoundarySplit,
    AttributeRewrite,
    Normalize,
    AnchorRemap,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a range operation does to every covered run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Apply(Tag),
    Strip(Tag),
    Clear(TagSet),
}

struct Rewrite {
    selection: Selection,
    render: Option<RenderRequest>,
}

/// The mark state machine: split, rewrite attributes, normalize, remap.
#[derive(Debug, Clone, Default)]
pub struct MarkEngine {
    policy: MarkPolicy,
}

impl MarkEngine {
    pub fn new(policy: MarkPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MarkPolicy {
        &self.policy
    }

    /// Apply `request` to `selection`, rewriting `sequence` in place.
    ///
    /// Never fails: anything that cannot be applied leaves the sequence as it
    /// was and reports the reason in [`MarkOutcome::skipped`].
    pub fn apply(
        &self,
        sequence: &mut RunSequence,
        selection: Selection,
        request: &MarkRequest,
    ) -> MarkOutcome {
        let block_id = sequence.block_id().clone();
        let before = serialize_block(sequence);
        sequence.take_edits();
        let snapshot = sequence.clone();

        let reason = match self.rewrite(sequence, selection, request) {
            Ok(done) => {
                let after = serialize_block(sequence);
                if after != before {
                    enter(&block_id, Phase::Idle);
                    return MarkOutcome {
                        selection: done.selection,
                        transaction: Transaction::new(block_id, before, after),
                        render: done.render,
                        skipped: None,
                    };
                }
                NoOpReason::Unchanged
            }
            Err(reason) => reason,
        };

        debug!("Mark {:?} on block {block_id} skipped: {reason}", request.mode);
        *sequence = snapshot;
        MarkOutcome {
            selection,
            transaction: Transaction::unchanged(block_id, before),
            render: None,
            skipped: Some(reason),
        }
    }

    fn rewrite(
        &self,
        sequence: &mut RunSequence,
        selection: Selection,
        request: &MarkRequest,
    ) -> Result<Rewrite, NoOpReason> {
        let selection = selection.ordered(sequence)?;
        if let (Some(tag), Some(value)) = (request.mode.tag(), &request.payload)
            && value.tag() != tag
        {
            return Err(MarkError::PayloadMismatch {
                expected: tag,
                found: value.tag(),
            }
            .into());
        }
        if selection.is_logically_empty(sequence)? {
            self.at_cursor(sequence, selection, request)
        } else {
            self.over_range(sequence, selection, request)
        }
    }

    /// Set the pending input style at a caret
    fn at_cursor(
        &self,
        sequence: &mut RunSequence,
        selection: Selection,
        request: &MarkRequest,
    ) -> Result<Rewrite, NoOpReason> {
        let block_id = sequence.block_id().clone();
        let cursor = selection.end;
        let pending = pending_run(sequence, cursor);
        let context_id = pending.unwrap_or(cursor.run);
        let context_run = sequence
            .get(context_id)
            .ok_or(MarkError::StaleRun(context_id))?;
        let mut context = context_run.tags();
        if pending.is_none() && cursor.offset == context_run.len() {
            context = context.difference(self.policy.end_inheritance_suppressed);
        }
        let context_payload = context_run.payload().clone();

        let (tags, added) = match request.mode {
            MarkMode::Clear(scope) => {
                self.guard_clear(context)?;
                (context.difference(scope.tags()), None)
            }
            MarkMode::Remove(tag) => {
                if !context.contains(tag) {
                    return Err(NoOpReason::NotApplied(tag));
                }
                (self.without_inherited(context, tag), None)
            }
            MarkMode::Add(tag) if context.contains(tag) && request.payload.is_none() => {
                return Err(NoOpReason::AlreadyApplied(tag));
            }
            MarkMode::Toggle(tag) if context.contains(tag) && request.payload.is_none() => {
                (self.without_inherited(context, tag), None)
            }
            MarkMode::Add(tag) | MarkMode::Toggle(tag) => (resolve(context, tag), Some(tag)),
        };
        let value = match added {
            Some(tag) => self.payload_for(tag, request, String::new())?,
            None => None,
        };
        let is_link = added == Some(Tag::Link);

        enter(&block_id, Phase::AttributeRewrite);
        let id = match pending {
            Some(id) => {
                let run = sequence.get_mut(id).ok_or(MarkError::StaleRun(id))?;
                run.set_tags(tags);
                if let Some(value) = value {
                    run.payload_mut().insert(value);
                }
                run.settle();
                if is_link {
                    sequence.replace_text(id, self.policy.empty_link_text.clone());
                }
                id
            }
            None => {
                enter(&block_id, Phase::BoundarySplit);
                let text = if is_link {
                    self.policy.empty_link_text.clone()
                } else {
                    PLACEHOLDER.to_string()
                };
                let mut run = Run::new(text, tags);
                let mut payload = context_payload;
                payload.retain_tags(run.tags());
                if let Some(value) = value {
                    payload.insert(value);
                }
                *run.payload_mut() = payload;
                run.settle();

                let split = sequence.split_at(cursor.run, cursor.offset)?;
                let position = match split.left {
                    Some(left) => sequence.position(left).map(|p| p + 1),
                    None => sequence.position(cursor.run),
                }
                .ok_or(MarkError::StaleRun(cursor.run))?;
                sequence.insert(position, run)
            }
        };
        // edits so far happened before the caret was placed
        sequence.take_edits();

        let len = sequence.get(id).map(Run::len).unwrap_or(0);
        let selection = if is_link {
            Selection::new(Anchor::new(id, 0), Anchor::new(id, len))
        } else {
            Selection::collapsed(Anchor::new(id, len))
        };
        let render = sequence.get(id).and_then(|run| match added {
            Some(Tag::InlineMath) => Some(RenderKind::MathEditor),
            Some(Tag::InlineMemo) if run.payload().memo_content() == Some("") => {
                Some(RenderKind::MemoEditor)
            }
            Some(Tag::Link) if run.payload().href() == Some("") => Some(RenderKind::LinkMenu),
            _ => None,
        });
        let render = render.map(|kind| RenderRequest { kind, run: id });
        Ok(self.finish(sequence, SelectionMapper::new(selection), render))
    }

    /// Rewrite every run fully inside a non-empty range
    fn over_range(
        &self,
        sequence: &mut RunSequence,
        selection: Selection,
        request: &MarkRequest,
    ) -> Result<Rewrite, NoOpReason> {
        let block_id = sequence.block_id().clone();
        let (start, end) = selection.block_offsets(sequence)?;
        let mapper = SelectionMapper::new(selection);

        enter(&block_id, Phase::BoundarySplit);
        sequence.split_at(selection.end.run, selection.end.offset)?;
        sequence.split_at(selection.start.run, selection.start.offset)?;
        let mut covered: Vec<RunId> = covered_runs(sequence, start, end)
            .into_iter()
            .filter(|&id| sequence.get(id).is_some_and(|run| !run.is_placeholder()))
            .collect();
        let union = covered
            .iter()
            .filter_map(|&id| sequence.get(id))
            .fold(TagSet::EMPTY, |tags, run| tags.union(run.tags()));

        enter(&block_id, Phase::AttributeRewrite);
        let action = match request.mode {
            MarkMode::Clear(scope) => {
                self.guard_clear(union)?;
                Action::Clear(scope.tags())
            }
            MarkMode::Remove(tag) if !union.contains(tag) => {
                return Err(NoOpReason::NotApplied(tag));
            }
            MarkMode::Remove(tag) => Action::Strip(tag),
            MarkMode::Add(tag) | MarkMode::Toggle(tag) => {
                let everywhere = covered
                    .iter()
                    .all(|&id| sequence.get(id).is_some_and(|run| run.has(tag)));
                if everywhere && request.payload.is_none() {
                    Action::Strip(tag)
                } else {
                    Action::Apply(tag)
                }
            }
        };

        let mut render = None;
        match action {
            Action::Apply(tag) => {
                if self.policy.split_trailing_newlines {
                    covered = split_trailing_newlines(sequence, covered)?;
                }
                let (Some(&first), Some(&last)) = (covered.first(), covered.last()) else {
                    return Err(NoOpReason::Unchanged);
                };
                if coalesces(tag) && first != last {
                    let merged = sequence
                        .coalesce(first, last)
                        .ok_or(MarkError::StaleRun(first))?;
                    covered = vec![merged];
                }
                if tag == Tag::InlineMemo {
                    memo_over_math(sequence, &covered);
                }
                let visible: String = covered
                    .iter()
                    .filter_map(|&id| sequence.get(id))
                    .map(Run::visible_text)
                    .collect();
                let value = self.payload_for(tag, request, visible)?;
                for (index, &id) in covered.iter().enumerate() {
                    let Some(run) = sequence.get_mut(id) else {
                        continue;
                    };
                    let value = match &value {
                        // existing targets and memo text survive a re-apply
                        _ if request.payload.is_none() && run.has(tag) => None,
                        // memo content concatenates on merge
                        Some(PayloadValue::Memo { .. }) if index > 0 => {
                            Some(PayloadValue::memo(""))
                        }
                        other => other.clone(),
                    };
                    run.set_tag(tag, value);
                }
                render = editor_for(sequence, tag, &covered);
            }
            Action::Strip(tag) => {
                covered.extend(touching_placeholders(sequence, start, end));
                for &id in &covered {
                    if let Some(run) = sequence.get_mut(id) {
                        run.remove_tag(tag);
                    }
                }
            }
            Action::Clear(stripped) => {
                covered.extend(touching_placeholders(sequence, start, end));
                for &id in &covered {
                    if let Some(run) = sequence.get_mut(id) {
                        let tags = run.tags().difference(stripped);
                        run.set_tags(tags);
                    }
                }
            }
        }
        for &id in &covered {
            if let Some(run) = sequence.get_mut(id) {
                run.settle();
            }
        }
        Ok(self.finish(sequence, mapper, render))
    }

    /// Normalize and carry the selection and render target across it
    fn finish(
        &self,
        sequence: &mut RunSequence,
        mut mapper: SelectionMapper,
        render: Option<RenderRequest>,
    ) -> Rewrite {
        let block_id = sequence.block_id().clone();
        enter(&block_id, Phase::Normalize);
        let merges = normalize(sequence);
        trace!("Block {block_id}: {merges} merges");

        enter(&block_id, Phase::AnchorRemap);
        let edits = sequence.take_edits();
        mapper.replay(&edits);
        let render = render.map(|request| {
            let anchor = edits.iter().fold(Anchor::new(request.run, 0), |anchor, edit| {
                map_anchor(anchor, Gravity::Left, edit)
            });
            RenderRequest {
                kind: request.kind,
                run: anchor.run,
            }
        });
        Rewrite {
            selection: mapper.selection(),
            render,
        }
    }

    fn guard_clear(&self, tags: TagSet) -> Result<(), NoOpReason> {
        match tags.sole() {
            Some(tag) if self.policy.clear_guard.contains(tag) => {
                Err(NoOpReason::ClearProtected(tag))
            }
            _ => Ok(()),
        }
    }

    fn without_inherited(&self, tags: TagSet, tag: Tag) -> TagSet {
        tags.without(tag)
            .difference(self.policy.end_inheritance_suppressed)
    }

    /// The payload to attach when adding `tag`; `visible` is the covered text
    fn payload_for(
        &self,
        tag: Tag,
        request: &MarkRequest,
        visible: String,
    ) -> Result<Option<PayloadValue>, NoOpReason> {
        if let Some(value) = &request.payload {
            return Ok(Some(value.clone()));
        }
        match tag {
            Tag::Link => Ok(Some(PayloadValue::link(""))),
            Tag::InlineMath => Ok(Some(PayloadValue::math(visible))),
            Tag::InlineMemo => Ok(Some(PayloadValue::memo(""))),
            tag if tag.requires_payload() => Err(NoOpReason::MissingPayload(tag)),
            _ => Ok(None),
        }
    }
}

fn enter(block_id: &BlockId, phase: Phase) {
    trace!("Block {block_id}: {phase}");
}

/// Atomic kinds that become a single run when applied over several
fn coalesces(tag: Tag) -> bool {
    matches!(tag, Tag::BlockRef | Tag::InlineMath)
}

/// The placeholder-only run a caret is in or touching, if any
fn pending_run(sequence: &RunSequence, cursor: Anchor) -> Option<RunId> {
    let run = sequence.get(cursor.run)?;
    if run.is_placeholder() {
        return Some(cursor.run);
    }
    let position = sequence.position(cursor.run)?;
    let neighbour = if cursor.offset == run.len() {
        sequence.id_at(position + 1)
    } else if cursor.offset == 0 {
        position.checked_sub(1).and_then(|p| sequence.id_at(p))
    } else {
        None
    };
    neighbour.filter(|&id| sequence.get(id).is_some_and(Run::is_placeholder))
}

/// Runs lying entirely inside the block range `start..end`
fn covered_runs(sequence: &RunSequence, start: usize, end: usize) -> Vec<RunId> {
    let mut covered = Vec::new();
    let mut offset = 0;
    for (id, run) in sequence.iter() {
        let len = run.len();
        if offset >= start && offset + len <= end {
            covered.push(id);
        }
        offset += len;
    }
    covered
}

/// Split trailing line breaks off covered runs; runs that are nothing but
/// line breaks drop out.
fn split_trailing_newlines(
    sequence: &mut RunSequence,
    covered: Vec<RunId>,
) -> Result<Vec<RunId>, MarkError> {
    let mut kept = Vec::with_capacity(covered.len());
    for id in covered {
        let Some(run) = sequence.get(id) else {
            continue;
        };
        let len = run.len();
        let newlines = run.text().chars().rev().take_while(|&c| c == '\n').count();
        if newlines == len {
            continue;
        }
        if newlines > 0 {
            sequence.split_at(id, len - newlines)?;
        }
        kept.push(id);
    }
    Ok(kept)
}

/// Popover after a range add: the first link still lacking a target, or the
/// memo editor when none of the covered text has memo content yet
fn editor_for(sequence: &RunSequence, tag: Tag, covered: &[RunId]) -> Option<RenderRequest> {
    let runs: Vec<(RunId, &Run)> = covered
        .iter()
        .filter_map(|&id| sequence.get(id).map(|run| (id, run)))
        .collect();
    match tag {
        Tag::Link => runs
            .iter()
            .find(|(_, run)| run.payload().href() == Some(""))
            .map(|&(id, _)| RenderRequest {
                kind: RenderKind::LinkMenu,
                run: id,
            }),
        Tag::InlineMemo => {
            let (first, _) = runs.first()?;
            runs.iter()
                .all(|(_, run)| run.payload().memo_content().is_none_or(|c| c.is_empty()))
                .then_some(RenderRequest {
                    kind: RenderKind::MemoEditor,
                    run: *first,
                })
        }
        _ => None,
    }
}

/// Placeholder-only runs inside the block range `start..=end` or touching it
fn touching_placeholders(sequence: &RunSequence, start: usize, end: usize) -> Vec<RunId> {
    let mut found = Vec::new();
    let mut offset = 0;
    for (id, run) in sequence.iter() {
        let len = run.len();
        if run.is_placeholder() && offset + len >= start && offset <= end {
            found.push(id);
        }
        offset += len;
    }
    found
}

/// A memo placed over a formula shows the formula source as its text
fn memo_over_math(sequence: &mut RunSequence, covered: &[RunId]) {
    for &id in covered {
        let formula = sequence
            .get(id)
            .and_then(|run| run.payload().math_content())
            .filter(|content| !content.is_empty())
            .map(str::to_string);
        if let Some(formula) = formula {
            sequence.replace_text(id, formula);
        }
    }
}

/// Apply one mark request with the default policy, leaving the input intact
pub fn apply_mark(
    sequence: &RunSequence,
    selection: Selection,
    request: &MarkRequest,
) -> (RunSequence, MarkOutcome) {
    let mut next = sequence.clone();
    let outcome = MarkEngine::default().apply(&mut next, selection, request);
    (next, outcome)
}

/// Tags in effect at the selection, for toolbar state.
///
/// At a caret this is the pending style; over a range it is the union of
/// every run the range touches. Stale selections report no tags.
pub fn current_tags(sequence: &RunSequence, selection: Selection) -> TagSet {
    let tags_of = |id: RunId| sequence.get(id).map(Run::tags).unwrap_or_default();
    let Ok(selection) = selection.ordered(sequence) else {
        return TagSet::EMPTY;
    };
    let Ok((start, end)) = selection.block_offsets(sequence) else {
        return TagSet::EMPTY;
    };
    if start == end {
        let cursor = selection.end;
        return tags_of(pending_run(sequence, cursor).unwrap_or(cursor.run));
    }

    let mut tags = covered_runs(sequence, start, end)
        .into_iter()
        .map(tags_of)
        .fold(TagSet::EMPTY, TagSet::union);
    let start_len = sequence.get(selection.start.run).map(Run::len).unwrap_or(0);
    if selection.start.offset < start_len {
        tags = tags.union(tags_of(selection.start.run));
    }
    if selection.end.offset > 0 {
        tags = tags.union(tags_of(selection.end.run));
    }
    tags
}

/// [`current_tags`] restricted to kinds that have a toolbar button state
pub fn highlighted_tags(sequence: &RunSequence, selection: Selection) -> TagSet {
    current_tags(sequence, selection).difference(TagSet::NOT_HIGHLIGHTED)
}
