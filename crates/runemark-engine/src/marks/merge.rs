//! Merge Rule table and the normalization pass.
//!
//! Two adjacent runs merge when their tag sets are equal and every tag they
//! carry agrees to it. What happens to the payload is decided per tag by
//! [`MERGE_RULES`]; tags missing from the table merge only when their payload
//! is identical.

use crate::marks::payload::{Payload, PayloadValue, RefSubtype};
use crate::marks::placeholder;
use crate::marks::run::Run;
use crate::marks::sequence::RunSequence;
use crate::marks::tag::Tag;

/// How one tag treats its payload when two runs carrying it merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// Runs carrying this tag never merge
    Never,
    /// Payloads must be identical; the left one is kept
    SamePayload,
    /// Content strings are concatenated left to right
    ConcatContent,
    /// Targets must match; the merged reference becomes static
    SameTarget,
}

pub const MERGE_RULES: &[(Tag, MergeRule)] = &[
    (Tag::Backslash, MergeRule::Never),
    (Tag::InlineMath, MergeRule::ConcatContent),
    (Tag::InlineMemo, MergeRule::ConcatContent),
    (Tag::BlockRef, MergeRule::SameTarget),
];

pub fn rule_for(tag: Tag) -> MergeRule {
    MERGE_RULES
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|&(_, rule)| rule)
        .unwrap_or(MergeRule::SamePayload)
}

/// A merged run plus how the two source texts were cut to produce it
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MergePlan {
    pub run: Run,
    pub keep_left: usize,
    pub drop_right: usize,
}

/// Merge `a` and `b` if their tags and payloads allow it.
///
/// Placeholders between the two texts are dropped: `a` loses its trailing
/// ones and `b` its leading ones.
pub fn merge_if_equal(a: &Run, b: &Run) -> Option<Run> {
    plan(a, b).map(|plan| plan.run)
}

pub(crate) fn plan(a: &Run, b: &Run) -> Option<MergePlan> {
    if a.tags() != b.tags() {
        return None;
    }
    let mut payload = a.payload().clone();
    for tag in a.tags().iter() {
        let merged = merge_payload(tag, a.payload(), b.payload())?;
        if let Some(value) = merged {
            payload.insert(value);
        }
    }

    let keep_left = if a.is_placeholder() {
        0
    } else {
        a.len() - a.trailing_placeholders()
    };
    let drop_right = if b.is_placeholder() {
        b.len()
    } else {
        b.leading_placeholders()
    };
    let text: String = a
        .text()
        .chars()
        .take(keep_left)
        .chain(b.text().chars().skip(drop_right))
        .collect();

    let mut run = a.clone();
    run.set_text(text);
    *run.payload_mut() = payload;
    Some(MergePlan {
        run,
        keep_left,
        drop_right,
    })
}

/// `None` refuses the merge; `Some(None)` keeps the left payload as is.
fn merge_payload(tag: Tag, a: &Payload, b: &Payload) -> Option<Option<PayloadValue>> {
    let (left, right) = (a.get(tag), b.get(tag));
    match rule_for(tag) {
        MergeRule::Never => None,
        MergeRule::SamePayload => (left == right).then_some(None),
        MergeRule::ConcatContent => match (left, right) {
            (Some(PayloadValue::Math { content: l }), Some(PayloadValue::Math { content: r })) => {
                Some(Some(PayloadValue::math(format!("{l}{r}"))))
            }
            (Some(PayloadValue::Memo { content: l }), Some(PayloadValue::Memo { content: r })) => {
                Some(Some(PayloadValue::memo(format!("{l}{r}"))))
            }
            (l, r) => (l == r).then_some(None),
        },
        MergeRule::SameTarget => match (left, right) {
            (
                Some(PayloadValue::BlockRef { id: l, .. }),
                Some(PayloadValue::BlockRef { id: r, .. }),
            ) if l == r => Some(Some(PayloadValue::BlockRef {
                id: l.clone(),
                subtype: RefSubtype::Static,
            })),
            (None, None) => Some(None),
            _ => None,
        },
    }
}

/// Merge adjacent runs in one cumulative left-to-right pass, then tidy
/// placeholders. Returns the number of merges performed.
pub fn normalize(sequence: &mut RunSequence) -> usize {
    let mut merges = 0;
    let mut position = 0;
    while position + 1 < sequence.len() {
        let planned = match (sequence.run_at(position), sequence.run_at(position + 1)) {
            (Some(left), Some(right)) => plan(left, right),
            _ => None,
        };
        match planned {
            Some(MergePlan {
                run,
                keep_left,
                drop_right,
            }) => {
                sequence.absorb_next(position, run, keep_left, drop_right);
                merges += 1;
            }
            None => position += 1,
        }
    }
    placeholder::tidy(sequence);
    merges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marks::run::PLACEHOLDER;
    use crate::marks::sequence::BlockId;
    use crate::marks::tag::TagSet;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(Tag::Backslash, MergeRule::Never)]
    #[case(Tag::InlineMath, MergeRule::ConcatContent)]
    #[case(Tag::InlineMemo, MergeRule::ConcatContent)]
    #[case(Tag::BlockRef, MergeRule::SameTarget)]
    #[case(Tag::Link, MergeRule::SamePayload)]
    #[case(Tag::Strong, MergeRule::SamePayload)]
    fn test_merge_rule_table(#[case] tag: Tag, #[case] expected: MergeRule) {
        assert_eq!(rule_for(tag), expected);
    }

    #[test]
    fn test_plain_runs_concatenate() {
        let merged = merge_if_equal(&Run::plain("foo"), &Run::plain("bar")).unwrap();
        assert_eq!(merged, Run::plain("foobar"));
    }

    #[test]
    fn test_different_tags_do_not_merge() {
        assert_eq!(
            merge_if_equal(&Run::plain("a"), &Run::new("b", [Tag::Em])),
            None
        );
    }

    #[test]
    fn test_block_refs_to_same_target_merge_as_static() {
        let a = Run::plain("foo").with_payload(PayloadValue::block_ref("42"));
        let b = Run::plain("bar").with_payload(PayloadValue::block_ref("42"));
        let merged = merge_if_equal(&a, &b).unwrap();
        assert_eq!(merged.text(), "foobar");
        assert_eq!(
            merged.payload().get(Tag::BlockRef),
            Some(&PayloadValue::BlockRef {
                id: "42".to_string(),
                subtype: RefSubtype::Static
            })
        );
    }

    #[test]
    fn test_block_refs_to_different_targets_stay_apart() {
        let a = Run::plain("foo").with_payload(PayloadValue::block_ref("42"));
        let b = Run::plain("bar").with_payload(PayloadValue::block_ref("43"));
        assert_eq!(merge_if_equal(&a, &b), None);
    }

    #[test]
    fn test_links_need_identical_targets() {
        let a = Run::plain("a").with_payload(PayloadValue::link("https://a.test"));
        let b = Run::plain("b").with_payload(PayloadValue::link("https://b.test"));
        assert_eq!(merge_if_equal(&a, &b), None);
        let c = Run::plain("c").with_payload(PayloadValue::link("https://a.test"));
        assert_eq!(merge_if_equal(&a, &c).unwrap().text(), "ac");
    }

    #[test]
    fn test_math_and_memo_concatenate_content() {
        let a = Run::plain("x").with_payload(PayloadValue::math("a+"));
        let b = Run::plain("y").with_payload(PayloadValue::math("b"));
        assert_eq!(
            merge_if_equal(&a, &b).unwrap().payload().math_content(),
            Some("a+b")
        );

        let a = Run::plain("x").with_payload(PayloadValue::memo("first "));
        let b = Run::plain("y").with_payload(PayloadValue::memo("second"));
        let merged = merge_if_equal(&a, &b).unwrap();
        assert_eq!(merged.payload().memo_content(), Some("first second"));
        assert_eq!(merged.text(), "xy");
    }

    #[test]
    fn test_backslash_never_merges() {
        let a = Run::new("\\", [Tag::Backslash]);
        assert_eq!(merge_if_equal(&a, &a.clone()), None);
    }

    #[test]
    fn test_placeholders_between_texts_are_dropped() {
        let a = Run::new(format!("ab{PLACEHOLDER}"), [Tag::Em]);
        let b = Run::new(format!("{PLACEHOLDER}cd"), [Tag::Em]);
        let plan = plan(&a, &b).unwrap();
        assert_eq!(plan.run.text(), "abcd");
        assert_eq!((plan.keep_left, plan.drop_right), (2, 1));
    }

    #[test]
    fn test_placeholder_run_is_absorbed_by_equal_neighbour() {
        let a = Run::new("abc", [Tag::Em]);
        let b = Run::placeholder([Tag::Em]);
        assert_eq!(merge_if_equal(&a, &b).unwrap().text(), "abc");
    }

    #[test]
    fn test_normalize_merges_cumulatively() {
        let mut seq = RunSequence::from_runs(
            BlockId::new("b"),
            vec![
                Run::plain("a"),
                Run::plain("b"),
                Run::plain("c"),
                Run::new("d", [Tag::Strong]),
                Run::new("e", [Tag::Strong]),
            ],
        );
        assert_eq!(normalize(&mut seq), 3);
        assert_eq!(seq.to_runs(), vec![Run::plain("abc"), Run::new("de", [Tag::Strong])]);
        assert_eq!(normalize(&mut seq), 0);
    }

    #[test]
    fn test_normalize_keeps_pending_style_placeholder() {
        let mut seq = RunSequence::from_runs(
            BlockId::new("b"),
            vec![
                Run::new("abc", [Tag::Em]),
                Run::placeholder(TagSet::from([Tag::Em, Tag::Strong])),
            ],
        );
        assert_eq!(normalize(&mut seq), 0);
        assert_eq!(seq.len(), 2);
    }
}
