use pretty_assertions::assert_eq;
use rstest::rstest;
use runemark_engine::marks::exclusivity::is_consistent;
use runemark_engine::marks::*;

fn block(runs: Vec<Run>) -> RunSequence {
    RunSequence::from_runs(BlockId::new("20240101-abc"), runs)
}

fn select(seq: &RunSequence, start: usize, end: usize) -> Selection {
    Selection::from_block_offsets(seq, start, end)
}

#[test]
fn test_strong_over_second_word() {
    let seq = block(vec![Run::plain("hello world")]);

    let (next, outcome) = apply_mark(&seq, select(&seq, 6, 11), &MarkRequest::add(Tag::Strong));

    assert_eq!(
        next.to_runs(),
        vec![Run::plain("hello "), Run::new("world", [Tag::Strong])]
    );
    let second = next.ids()[1];
    assert_eq!(
        outcome.selection,
        Selection::new(Anchor::new(second, 0), Anchor::new(second, 5))
    );
    assert_eq!(outcome.transaction.block_id, BlockId::new("20240101-abc"));
    assert_eq!(
        outcome.transaction.before,
        "<div data-node-id=\"20240101-abc\">hello world</div>"
    );
    assert_eq!(
        outcome.transaction.after,
        "<div data-node-id=\"20240101-abc\">hello <span data-type=\"strong\">world</span></div>"
    );
}

#[test]
fn test_toggle_removes_tag_present_on_whole_run() {
    let seq = block(vec![Run::new("hello", [Tag::Strong])]);

    let (next, outcome) = apply_mark(&seq, select(&seq, 0, 5), &MarkRequest::toggle(Tag::Strong));

    assert_eq!(next.to_runs(), vec![Run::plain("hello")]);
    assert!(!outcome.is_noop());
}

#[test]
fn test_caret_add_creates_pending_placeholder_that_typing_inherits() {
    let seq = block(vec![Run::new("abc", [Tag::Em])]);

    let (next, outcome) = apply_mark(&seq, select(&seq, 3, 3), &MarkRequest::add(Tag::Strong));

    assert_eq!(
        next.to_runs(),
        vec![
            Run::new("abc", [Tag::Em]),
            Run::placeholder([Tag::Em, Tag::Strong])
        ]
    );
    assert!(outcome.selection.is_collapsed());
    assert_eq!(
        current_tags(&next, outcome.selection),
        TagSet::from([Tag::Em, Tag::Strong])
    );
    assert_eq!(next.get(outcome.selection.end.run), next.run_at(1));
}

#[test]
fn test_subscript_replaces_superscript() {
    let seq = block(vec![Run::new("x", [Tag::Superscript])]);

    let (next, _) = apply_mark(&seq, select(&seq, 0, 1), &MarkRequest::add(Tag::Subscript));

    assert_eq!(next.to_runs(), vec![Run::new("x", [Tag::Subscript])]);
}

#[test]
fn test_adjacent_references_to_same_block_merge_static() {
    let mut seq = block(vec![
        Run::plain("foo").with_payload(PayloadValue::block_ref("42")),
        Run::plain("bar").with_payload(PayloadValue::block_ref("42")),
    ]);

    normalize(&mut seq);

    assert_eq!(
        seq.to_runs(),
        vec![Run::plain("foobar").with_payload(PayloadValue::BlockRef {
            id: "42".to_string(),
            subtype: RefSubtype::Static,
        })]
    );
}

#[test]
fn test_clear_twice_equals_clear_once() {
    let seq = block(vec![
        Run::new("one ", [Tag::Strong, Tag::Em]),
        Run::plain("two").with_payload(PayloadValue::link("https://x.test")),
        Run::new(" three", [Tag::Code]),
    ]);
    let selection = select(&seq, 0, seq.char_len());

    let (once, outcome) = apply_mark(&seq, selection, &MarkRequest::clear());
    let (twice, second) = apply_mark(&once, outcome.selection, &MarkRequest::clear());

    assert_eq!(twice, once);
    assert!(second.is_noop());
    assert_eq!(once.visible_text(), seq.visible_text());
}

#[rstest]
#[case::strong(Tag::Strong)]
#[case::em(Tag::Em)]
#[case::strike(Tag::Strike)]
#[case::underline(Tag::Underline)]
#[case::highlight(Tag::Highlight)]
#[case::superscript(Tag::Superscript)]
#[case::kbd(Tag::Kbd)]
#[case::code(Tag::Code)]
#[case::tag(Tag::Hashtag)]
#[case::link(Tag::Link)]
#[case::math(Tag::InlineMath)]
fn test_add_then_remove_restores_text(#[case] tag: Tag) {
    let seq = block(vec![
        Run::plain("alpha "),
        Run::new("beta", [Tag::Em]),
        Run::plain(" gamma"),
    ]);

    let (added, outcome) = apply_mark(&seq, select(&seq, 3, 12), &MarkRequest::add(tag));
    assert!(!outcome.is_noop(), "adding {tag} changed nothing");
    let (removed, _) = apply_mark(&added, outcome.selection, &MarkRequest::remove(tag));

    assert_eq!(removed.visible_text(), seq.visible_text());
    assert!(removed.runs().all(|run| !run.has(tag)));
}

#[rstest]
#[case::code(Tag::Code)]
#[case::kbd(Tag::Kbd)]
#[case::tag(Tag::Hashtag)]
#[case::strong(Tag::Strong)]
fn test_add_then_remove_at_block_start_restores_runs(#[case] tag: Tag) {
    // Given a block whose first word gets marked
    let seq = block(vec![Run::plain("let x = 1")]);
    let (added, outcome) = apply_mark(&seq, select(&seq, 0, 3), &MarkRequest::add(tag));

    // When the same selection is unmarked again
    let (removed, _) = apply_mark(&added, outcome.selection, &MarkRequest::remove(tag));

    // Then no marker placeholder is left behind at the block start
    assert_eq!(removed.to_runs(), seq.to_runs());
    assert_eq!(current_tags(&removed, select(&removed, 0, 0)), TagSet::EMPTY);
}

#[test]
fn test_every_produced_run_is_consistent() {
    let mut seq = block(vec![
        Run::plain("The quick brown fox\n"),
        Run::new("jumps over", [Tag::Strong]),
        Run::plain(" the lazy dog"),
    ]);
    let engine = MarkEngine::default();
    let len = seq.char_len();
    let mut step = 0usize;
    for (index, tag) in Tag::ALL.iter().copied().enumerate() {
        let start = (index * 7) % len;
        let end = (start + 5 + index).min(len);
        let request = match tag {
            Tag::BlockRef => MarkRequest::add(tag).with_payload(PayloadValue::block_ref("42")),
            Tag::FileAnnotationRef => MarkRequest::add(tag).with_payload(PayloadValue::FileAnnotation {
                id: "pdf-1".to_string(),
            }),
            Tag::Text => MarkRequest::add(tag).with_payload(PayloadValue::Style(TextStyle {
                color: Some("blue".to_string()),
                ..TextStyle::default()
            })),
            _ => MarkRequest::toggle(tag),
        };
        let selection = select(&seq, start, end);
        engine.apply(&mut seq, selection, &request);
        step += 1;
        for run in seq.runs() {
            assert!(
                is_consistent(run.tags()),
                "step {step}: {:?} carries {:?}",
                run.text(),
                run.tags()
            );
        }
    }
}

#[test]
fn test_normalization_is_a_fixed_point() {
    let mut seq = block(vec![
        Run::new("a", [Tag::Code]),
        Run::new("b", [Tag::Code]),
        Run::plain("\u{200b}c"),
        Run::plain("d"),
        Run::new("e", [Tag::Kbd]),
        Run::plain("f").with_payload(PayloadValue::math("1+")),
        Run::plain("g").with_payload(PayloadValue::math("2")),
    ]);

    normalize(&mut seq);
    let once = seq.clone();
    let merges = normalize(&mut seq);

    assert_eq!(merges, 0);
    assert_eq!(seq, once);
    assert_eq!(
        seq.runs().last().and_then(|run| run.payload().math_content()),
        Some("1+2")
    );
}

#[test]
fn test_link_over_text_then_caret_after_it_types_plain() {
    let seq = block(vec![Run::plain("read the docs")]);
    let request = MarkRequest::add(Tag::Link).with_payload(PayloadValue::link("https://docs.test"));

    let (linked, outcome) = apply_mark(&seq, select(&seq, 9, 13), &request);
    let caret = Selection::collapsed(outcome.selection.end);
    let (typed, _) = apply_mark(&linked, caret, &MarkRequest::add(Tag::Em));

    let pending = typed.run_at(typed.len() - 1).unwrap();
    assert!(pending.is_placeholder());
    assert_eq!(pending.tags(), TagSet::single(Tag::Em));
}

#[test]
fn test_code_at_block_start_keeps_marker_placeholders() {
    let seq = block(vec![Run::plain("let x")]);

    let (next, outcome) = apply_mark(&seq, select(&seq, 0, 5), &MarkRequest::add(Tag::Code));

    assert_eq!(
        next.to_runs(),
        vec![
            Run::new(format!("{PLACEHOLDER}let x"), [Tag::Code]),
            Run::plain(PLACEHOLDER.to_string()),
        ]
    );
    assert_eq!(outcome.selection.text(&next).unwrap(), "let x");
}

#[test]
fn test_stale_selection_after_merge_is_a_silent_noop() {
    let seq = block(vec![Run::plain("hello world")]);
    let (split, outcome) = apply_mark(&seq, select(&seq, 6, 11), &MarkRequest::add(Tag::Em));
    let old_right = outcome.selection.start.run;
    let (merged, _) = apply_mark(&split, outcome.selection, &MarkRequest::remove(Tag::Em));

    let stale = Selection::collapsed(Anchor::new(old_right, 0));
    let (after, noop) = apply_mark(&merged, stale, &MarkRequest::add(Tag::Strong));

    assert_eq!(after, merged);
    assert_eq!(noop.selection, stale);
    assert!(matches!(
        noop.skipped,
        Some(NoOpReason::Precondition(MarkError::StaleRun(_)))
    ));
}

#[test]
fn test_session_feeds_sink_once_per_change() {
    let store: BlockStore = [block(vec![Run::plain("hello world")])].into_iter().collect();
    let mut session = MarkSession::new(store, MarkPolicy::default(), Vec::<Transaction>::new());
    let id = BlockId::new("20240101-abc");
    let selection = {
        let seq = session.store().get(&id).unwrap();
        DocumentSelection::within(id.clone(), select(seq, 0, 5))
    };

    session.apply(&selection, &MarkRequest::add(Tag::Strong)).unwrap();
    session.apply(&selection, &MarkRequest::clear()).unwrap();
    let (_, sink) = session.into_parts();

    assert_eq!(sink.len(), 2);
    assert_eq!(sink[1].before, sink[0].after);
    assert_eq!(sink[1].after, sink[0].before);
}
