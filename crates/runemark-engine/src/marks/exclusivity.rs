//! Which tags may not share a run.
//!
//! The rules are plain data so they can be read, and tested, without walking
//! through the engine.

use crate::marks::tag::{Tag, TagSet};

/// Pairs of tags that cannot coexist on one run
pub const EXCLUSIVE_PAIRS: &[(Tag, Tag)] = &[
    (Tag::Superscript, Tag::Subscript),
    (Tag::Link, Tag::BlockRef),
    (Tag::Link, Tag::FileAnnotationRef),
    (Tag::BlockRef, Tag::FileAnnotationRef),
    (Tag::InlineMath, Tag::InlineMemo),
];

/// Tags that must stand alone on their run
pub const EXCLUSIVE_OF_ALL: TagSet =
    TagSet::from_slice(&[Tag::Backslash, Tag::VirtualBlockRef, Tag::SearchMark]);

/// Symmetric exclusivity lookup
pub fn exclusive(a: Tag, b: Tag) -> bool {
    if a == b {
        return false;
    }
    if EXCLUSIVE_OF_ALL.contains(a) || EXCLUSIVE_OF_ALL.contains(b) {
        return true;
    }
    EXCLUSIVE_PAIRS
        .iter()
        .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
}

/// Every tag of `set` that would have to go to make room for `tag`
pub fn conflicts(set: TagSet, tag: Tag) -> TagSet {
    set.iter().filter(|&other| exclusive(other, tag)).collect()
}

/// Insert `tag` into `set`, first dropping anything exclusive with it.
pub fn resolve(set: TagSet, tag: Tag) -> TagSet {
    set.difference(conflicts(set, tag)).with(tag)
}

/// True when no two tags of `set` are exclusive with each other
pub fn is_consistent(set: TagSet) -> bool {
    let tags: Vec<Tag> = set.iter().collect();
    tags.iter().enumerate().all(|(i, &a)| {
        tags[i + 1..].iter().all(|&b| !exclusive(a, b))
    })
}

/// Rebuild a possibly inconsistent set by inserting its tags in order,
/// letting later tags win.
pub fn make_consistent(set: TagSet) -> TagSet {
    set.iter().fold(TagSet::EMPTY, resolve)
}
