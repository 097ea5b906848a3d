use crate::marks::sequence::RunId;
use crate::marks::tag::Tag;

/// Precondition violations reported by the run-sequence primitives.
///
/// The engine never surfaces these as failures: they turn into a no-op
/// outcome and the caller re-reads the selection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarkError {
    #[error("Run {0} is no longer part of the block")]
    StaleRun(RunId),
    #[error("Offset {offset} is outside run {run} of length {len}")]
    OffsetOutOfRange { run: RunId, offset: usize, len: usize },
    #[error("Payload for `{found}` cannot be attached to `{expected}`")]
    PayloadMismatch { expected: Tag, found: Tag },
}
