/*!
 * # Inline Mark Engine
 *
 * Applies, removes and toggles inline attributes (bold, links, references,
 * inline math and the rest) over a selection inside one block.
 *
 * ## Architecture Overview
 *
 * ### 1. Runs in a Generational Arena
 * - A block is a **`RunSequence`**: ordered **`Run`**s of styled text
 * - Runs live in arena slots addressed by **`RunId`** (slot + generation)
 * - A handle to a merged or removed run goes stale instead of aliasing
 *   whatever reused the slot
 *
 * ### 2. Rules as Data
 * - **`exclusivity`**: which tags cannot share a run, and `resolve`
 * - **`merge`**: the Merge Rule table deciding how payloads combine
 * - **`MarkPolicy`**: the clear guard and end-of-run inheritance lists
 *
 * ### 3. One Operation, Fixed Phases
 * `Idle → BoundarySplit → AttributeRewrite → Normalize → AnchorRemap`.
 * Every structural change is journaled as an **`Edit`**; the
 * **`SelectionMapper`** replays the journal to carry the caller's anchors
 * across splits and merges.
 *
 * ### 4. Silent No-ops
 * Stale anchors, out-of-range offsets and requests that change nothing
 * leave the block untouched and report a **`NoOpReason`**. Nothing here
 * panics or returns a hard error to the caller.
 *
 * ### 5. Transactions Out
 * Each applied operation yields a **`Transaction`**: the block serialized
 * before and after. History and persistence belong to whoever implements
 * **`TransactionSink`**.
 *
 * ## Usage Pattern
 *
 * ```rust
 * use runemark_engine::marks::*;
 *
 * let block = RunSequence::from_runs(BlockId::new("b1"), vec![Run::plain("hello world")]);
 * let selection = Selection::from_block_offsets(&block, 6, 11);
 *
 * let (block, outcome) = apply_mark(&block, selection, &MarkRequest::add(Tag::Strong));
 *
 * assert_eq!(block.to_runs(), vec![Run::plain("hello "), Run::new("world", [Tag::Strong])]);
 * assert_eq!(current_tags(&block, outcome.selection), TagSet::single(Tag::Strong));
 * ```
 */

pub mod engine;
pub mod error;
pub mod exclusivity;
pub mod merge;
pub mod payload;
mod placeholder;
pub mod policy;
pub mod run;
pub mod selection;
pub mod sequence;
pub mod session;
pub mod tag;
pub mod transaction;

pub use engine::{
    ClearScope, MarkEngine, MarkMode, MarkOutcome, MarkRequest, NoOpReason, RenderKind,
    RenderRequest, apply_mark, current_tags, highlighted_tags,
};
pub use error::MarkError;
pub use exclusivity::{exclusive, resolve};
pub use merge::{MergeRule, merge_if_equal, normalize};
pub use payload::{Payload, PayloadValue, RefSubtype, TextStyle};
pub use policy::MarkPolicy;
pub use run::{PLACEHOLDER, Run};
pub use selection::{
    Anchor, BlockPoint, DocumentSelection, Gravity, NavDirection, Selection, SelectionMapper,
    clamp_to_single_block,
};
pub use sequence::{BlockId, Edit, RunId, RunSequence, Split};
pub use session::{BlockResolver, BlockStore, MarkSession};
pub use tag::{Tag, TagSet, UnknownTag};
pub use transaction::{Transaction, TransactionSink, serialize_block};
