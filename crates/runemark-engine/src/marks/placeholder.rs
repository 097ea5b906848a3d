//! Placeholder bookkeeping around marker kinds (code, kbd, tag).
//!
//! A marker run keeps exactly one leading placeholder when it opens the
//! block or a line, so the caret before it does not pick up its style. The
//! run right after a marker run starts with one placeholder for the same
//! reason, and a block never ends on a marker run. Everywhere else stray
//! placeholders at run edges are removed.

use crate::marks::run::{PLACEHOLDER, Run};
use crate::marks::sequence::RunSequence;

pub(crate) fn tidy(sequence: &mut RunSequence) {
    let ids = sequence.ids().to_vec();
    for (position, &id) in ids.iter().enumerate() {
        let Some(run) = sequence.get(id) else {
            continue;
        };
        if run.is_placeholder() {
            continue;
        }
        let prev = position
            .checked_sub(1)
            .and_then(|p| ids.get(p))
            .and_then(|&p| sequence.get(p));
        let next = ids.get(position + 1).and_then(|&n| sequence.get(n));

        let wanted_leading = if run.needs_marker() {
            usize::from(prev.is_none_or(|p| p.text().ends_with('\n')))
        } else {
            usize::from(prev.is_some_and(|p| p.needs_marker() && !p.is_placeholder()))
        };
        let strip_trailing = next.is_some_and(|n| n.needs_marker() && !n.is_placeholder());

        let leading = run.leading_placeholders();
        let trailing = run.trailing_placeholders();
        let len = run.len();

        if strip_trailing && trailing > 0 {
            sequence.delete_chars(id, len - trailing, trailing);
        }
        if leading > wanted_leading {
            sequence.delete_chars(id, 0, leading - wanted_leading);
        } else if leading < wanted_leading {
            sequence.insert_placeholder(id, 0);
        }
    }

    let ends_on_marker = sequence
        .last()
        .and_then(|id| sequence.get(id))
        .is_some_and(|run| run.needs_marker() && !run.is_placeholder());
    if ends_on_marker {
        sequence.insert(sequence.len(), Run::plain(PLACEHOLDER.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marks::sequence::BlockId;
    use crate::marks::tag::Tag;
    use pretty_assertions::assert_eq;

    fn tidied(runs: Vec<Run>) -> Vec<String> {
        let mut seq = RunSequence::from_runs(BlockId::new("b"), runs);
        tidy(&mut seq);
        seq.runs().map(|r| r.text().replace(PLACEHOLDER, "|")).collect()
    }

    #[test]
    fn test_leading_code_gets_one_marker_and_trailing_plain_run() {
        assert_eq!(
            tidied(vec![Run::new("fn", [Tag::Code])]),
            vec!["|fn", "|"]
        );
    }

    #[test]
    fn test_code_after_text_loses_markers() {
        assert_eq!(
            tidied(vec![
                Run::plain("see "),
                Run::new("\u{200b}\u{200b}x", [Tag::Code]),
                Run::plain("after"),
            ]),
            vec!["see ", "x", "|after"]
        );
    }

    #[test]
    fn test_code_after_line_break_keeps_marker() {
        assert_eq!(
            tidied(vec![
                Run::plain("one\n"),
                Run::new("kbd", [Tag::Kbd]),
                Run::plain(" two"),
            ]),
            vec!["one\n", "|kbd", "| two"]
        );
    }

    #[test]
    fn test_plain_runs_drop_stray_markers() {
        assert_eq!(
            tidied(vec![Run::plain("\u{200b}abc"), Run::new("\u{200b}de", [Tag::Em])]),
            vec!["abc", "de"]
        );
    }

    #[test]
    fn test_text_before_marker_run_drops_trailing_placeholder() {
        assert_eq!(
            tidied(vec![
                Run::plain("ab\u{200b}"),
                Run::new("t", [Tag::Hashtag]),
                Run::plain("c"),
            ]),
            vec!["ab", "t", "|c"]
        );
    }

    #[test]
    fn test_placeholder_runs_are_left_alone() {
        assert_eq!(
            tidied(vec![Run::plain("abc"), Run::placeholder([Tag::Code])]),
            vec!["abc", "|"]
        );
    }
}
