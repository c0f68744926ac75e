//! Integration tests for the editor crate

use anyhow::Result;
use manuscript_editor::model::builders::*;
use manuscript_editor::model::{diff_replacement_blocks, Node, NodeCoordinates, NodeType, Step};
use manuscript_editor::plugins::footnotes::{alphabetic_label, build_footnotes_state, FootnotesPlugin};
use manuscript_editor::plugins::inconsistency::{InconsistencyCategory, InconsistencyPlugin};
use manuscript_editor::plugins::sections::SectionsPlugin;
use manuscript_editor::{
    build_text, count_characters, count_words, meta, Bibliography, BibliographyItem, CitationEngine,
    CitationEngineError, CitationRequest, Collaborators, Dialog, Editor, EditorConfig, EngineHandle,
    InMemoryLibrary, NumericEngine, OutputMode, Plugin, SectionCategory, SectionCategoryCatalog, SectionGroup,
    StatisticsWorker,
};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn editor(doc: Node) -> Result<Editor> {
    init_tracing();
    Ok(Editor::new(doc, EditorConfig::default(), Collaborators::default())?)
}

fn child_ids(editor: &Editor, id: &str) -> Vec<String> {
    editor
        .doc()
        .find_by_id(id)
        .map(|(node, _)| node.content.iter().filter_map(Node::id).map(str::to_string).collect())
        .unwrap_or_default()
}

fn attr(editor: &Editor, id: &str, key: &str) -> Option<String> {
    let (node, _) = editor.doc().find_by_id(id)?;
    node.attr_str(key).map(str::to_string)
}

struct CountingEngine {
    inner: NumericEngine,
    rebuilds: AtomicUsize,
}

impl CitationEngine for CountingEngine {
    fn rebuild_processor_state(
        &self,
        requests: &[CitationRequest],
        mode: OutputMode,
    ) -> Result<Vec<String>, CitationEngineError> {
        self.rebuilds.fetch_add(1, Ordering::SeqCst);
        self.inner.rebuild_processor_state(requests, mode)
    }

    fn make_bibliography(&self) -> Result<Bibliography, CitationEngineError> {
        self.inner.make_bibliography()
    }
}

// Footnotes

#[test]
fn test_labels_follow_first_reference_order() -> Result<()> {
    // Footnotes created a, b; referenced b, a
    let editor = editor(manuscript(vec![
        paragraph(vec![inline_footnote("r1", &["b"]), inline_footnote("r2", &["a"])]),
        footnotes_element("fe", vec![footnote("a", "First"), footnote("b", "Second")]),
    ]))?;

    let footnotes = editor.plugin_state(&FootnotesPlugin::KEY).unwrap();
    assert_eq!(footnotes.label("b"), Some("a"));
    assert_eq!(footnotes.label("a"), Some("b"));
    assert_eq!(attr(&editor, "r1", "contents").as_deref(), Some("a"));
    assert_eq!(attr(&editor, "r2", "contents").as_deref(), Some("b"));
    assert_eq!(child_ids(&editor, "fe"), vec!["b", "a"]);
    Ok(())
}

#[test]
fn test_unused_footnotes_sort_last() -> Result<()> {
    let editor = editor(manuscript(vec![
        paragraph(vec![inline_footnote("r1", &["f1"]), text(" "), inline_footnote("r3", &["f3"])]),
        footnotes_element("fe", vec![footnote("f1", "1"), footnote("f2", "2"), footnote("f3", "3")]),
    ]))?;

    assert_eq!(child_ids(&editor, "fe"), vec!["f1", "f3", "f2"]);
    let footnotes = editor.plugin_state(&FootnotesPlugin::KEY).unwrap();
    assert!(footnotes.is_unused("f2"));
    assert!(editor
        .decorations()
        .for_node("f2")
        .any(|d| d.class() == Some("footnote-unused")));
    Ok(())
}

#[test]
fn test_footnote_deletion_dialog() -> Result<()> {
    let mut editor = editor(manuscript(vec![
        paragraph(vec![text("a"), inline_footnote("r1", &["f1", "f2"])]),
        footnotes_element("fe", vec![footnote("f1", "one"), footnote("f2", "two")]),
    ]))?;

    // Cancelling leaves the document alone
    let before = editor.doc().clone();
    editor.request_footnote_deletion("f1")?;
    assert!(matches!(editor.overlays().dialog(), Some(Dialog::FootnoteDeletion(_))));
    editor.cancel_dialog();
    assert!(editor.overlays().dialog().is_none());
    assert_eq!(editor.doc(), &before);

    editor.request_footnote_deletion("f1")?;
    assert!(editor.confirm_dialog()?);
    assert!(editor.doc().find_by_id("f1").is_none());
    let (inline, _) = editor.doc().find_by_id("r1").unwrap();
    assert_eq!(inline.attr_str_list("rids"), vec!["f2"]);
    assert_eq!(attr(&editor, "r1", "contents").as_deref(), Some("a"));

    // A dialog whose footnote is already gone does nothing
    editor.request_footnote_deletion("f1")?;
    assert!(!editor.confirm_dialog()?);
    Ok(())
}

// Enforcers

#[test]
fn test_enforcers_are_idempotent() -> Result<()> {
    init_tracing();
    let library = Arc::new(InMemoryLibrary::with_items([BibliographyItem::new("item-1", "On Trees")]));
    let engine = EngineHandle::with_engine(Arc::new(NumericEngine::new(library.clone())));
    let collaborators = Collaborators::new(library).with_engine(engine);

    let untitled = Node::new(
        NodeType::Section,
        Default::default(),
        vec![paragraph(vec![text("body")])],
    );
    let doc = manuscript(vec![
        untitled,
        paragraph(vec![
            citation("c1", &["item-1"]),
            inline_footnote("r1", &["f2"]),
            cross_reference("x1", &["fig-1"]),
        ]),
        figure_element("fig-1", "A figure"),
        footnotes_element("fe", vec![footnote("f1", "one"), footnote("f2", "two")]),
        // Duplicate id
        footnotes_element("fe", vec![footnote("f3", "three")]),
        bibliography_section("MPSection:refs", "MPBibliographyElement:1"),
    ]);
    let editor = Editor::new(doc, EditorConfig::default(), collaborators)?;
    assert!(!editor.history().can_undo());

    let mut tr = editor.state().tr();
    tr.set_meta(meta::REFRESH, true);
    let applied = editor.state().apply_transaction(tr)?;
    assert!(applied.appended().is_empty(), "second pass appended {:?}", applied.appended().len());

    assert_eq!(attr(&editor, "c1", "contents").as_deref(), Some("[1]"));
    assert_eq!(attr(&editor, "x1", "label").as_deref(), Some("Figure 1"));
    Ok(())
}

#[test]
fn test_enforcers_settle_when_repairs_overlap() -> Result<()> {
    // Untitled section whose first child is an empty footnote container
    let endnotes = Node::new(
        NodeType::FootnotesSection,
        Default::default(),
        vec![footnotes_element("fe-empty", vec![])],
    )
    .with_id("MPSection:endnotes");
    // Reordered footnote that itself holds a reference
    let nested = Node::new(
        NodeType::Footnote,
        Default::default(),
        vec![paragraph(vec![text("see "), inline_footnote("r2", &["f1"])])],
    )
    .with_id("f1");
    let editor = editor(manuscript(vec![
        paragraph(vec![inline_footnote("r1", &["f2"])]),
        footnotes_element("fe", vec![nested, footnote("f2", "two")]),
        endnotes,
    ]))?;

    assert_eq!(child_ids(&editor, "fe"), vec!["f2", "f1"]);
    assert_eq!(attr(&editor, "r1", "contents").as_deref(), Some("a"));
    assert_eq!(attr(&editor, "r2", "contents").as_deref(), Some("b"));

    let (section, _) = editor.doc().find_by_id("MPSection:endnotes").unwrap();
    let children: Vec<_> = section.content.iter().map(|c| c.node_type).collect();
    assert_eq!(children, vec![NodeType::SectionTitle]);
    assert!(editor.doc().find_by_id("fe-empty").is_none());

    let mut tr = editor.state().tr();
    tr.set_meta(meta::REFRESH, true);
    let applied = editor.state().apply_transaction(tr)?;
    assert!(applied.appended().is_empty(), "second pass appended {:?}", applied.appended().len());
    Ok(())
}

#[test]
fn test_equal_citation_requests_skip_the_engine() -> Result<()> {
    init_tracing();
    let library = Arc::new(InMemoryLibrary::with_items([BibliographyItem::new("item-1", "On Trees")]));
    let counting = Arc::new(CountingEngine {
        inner: NumericEngine::new(library.clone()),
        rebuilds: AtomicUsize::new(0),
    });
    let collaborators = Collaborators::new(library).with_engine(EngineHandle::with_engine(counting.clone()));
    let mut editor = Editor::new(
        manuscript(vec![paragraph(vec![text("ab"), citation("c1", &["item-1"])])]),
        EditorConfig::default(),
        collaborators,
    )?;
    let rebuilds = counting.rebuilds.load(Ordering::SeqCst);
    assert!(rebuilds > 0);

    let mut tr = editor.state().tr();
    tr.insert(2, vec![text("x")])?;
    editor.dispatch(tr)?;
    assert_eq!(counting.rebuilds.load(Ordering::SeqCst), rebuilds);

    // A bibliography insertion is a signal even with equal requests
    assert!(editor.insert_bibliography_section()?);
    assert_eq!(counting.rebuilds.load(Ordering::SeqCst), rebuilds + 1);
    assert!(!editor.insert_bibliography_section()?);
    Ok(())
}

#[test]
fn test_replacement_blocks() {
    let coordinates = |ids: &[&str]| -> Vec<NodeCoordinates> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| NodeCoordinates {
                id: id.to_string(),
                from: i * 4,
                to: i * 4 + 4,
            })
            .collect()
    };
    let nodes = |ids: &[&str]| -> Vec<Node> { ids.iter().map(|id| paragraph(vec![]).with_id(id)).collect() };

    let block = diff_replacement_blocks(&coordinates(&["one", "two", "three", "five"]), &nodes(&["one", "two", "four", "five"]));
    assert_eq!((block.start, block.remove), (2, 1));
    assert_eq!(block.insert, nodes(&["four"]));

    let block = diff_replacement_blocks(&coordinates(&["one", "two", "three"]), &nodes(&["four", "five", "six"]));
    assert_eq!((block.start, block.remove, block.insert.len()), (0, 3, 3));

    let block = diff_replacement_blocks(&coordinates(&["one", "two"]), &nodes(&["one", "two"]));
    assert!(block.is_noop());
}

// Sections

#[test]
fn test_section_numbering_recomputes() -> Result<()> {
    let mut editor = editor(manuscript(vec![
        section(
            "s1",
            "One",
            vec![
                section("s11", "One.One", vec![section("s111", "Deep", vec![paragraph(vec![])])]),
                section("s12", "One.Two", vec![paragraph(vec![])]),
            ],
        ),
        section("s2", "Two", vec![paragraph(vec![])]),
    ]))?;

    let numbers = editor.plugin_state(&SectionsPlugin::KEY).unwrap();
    let expected = [("s1", "1"), ("s11", "1.1"), ("s111", "1.1.1"), ("s12", "1.2"), ("s2", "2")];
    for (id, number) in expected {
        assert_eq!(numbers.number(id), Some(number), "section {}", id);
    }

    let mut tr = editor.state().tr();
    tr.insert(0, vec![section("s0", "Zero", vec![paragraph(vec![])])])?;
    editor.dispatch(tr)?;
    let numbers = editor.plugin_state(&SectionsPlugin::KEY).unwrap();
    assert_eq!(numbers.number("s0"), Some("1"));
    assert_eq!(numbers.number("s1"), Some("2"));
    assert_eq!(numbers.number("s12"), Some("2.2"));
    assert_eq!(numbers.number("s2"), Some("3"));
    Ok(())
}

#[test]
fn test_section_categories_through_the_editor() -> Result<()> {
    init_tracing();
    let catalog = SectionCategoryCatalog::new()
        .with(
            "intro",
            SectionCategory {
                name: "Introduction".to_string(),
                group_ids: vec![SectionGroup::Body],
                is_editable: true,
                titles: vec!["Introduction".to_string()],
                is_unique: true,
            },
        )
        .with(
            "methods",
            SectionCategory {
                name: "Methods".to_string(),
                group_ids: vec![SectionGroup::Body],
                is_editable: true,
                titles: vec![],
                is_unique: false,
            },
        );
    let config = EditorConfig {
        section_categories: catalog,
        ..EditorConfig::default()
    };
    let doc = manuscript(vec![body(vec![
        section_with_category("s1", "intro", "Introduction", vec![paragraph(vec![])]),
        section("s2", "", vec![paragraph(vec![])]),
    ])]);
    let mut editor = Editor::new(doc, config, Collaborators::default())?;

    let options = editor.category_options("s2")?;
    let intro = options.iter().find(|o| o.id == "intro").unwrap();
    assert!(intro.disabled);

    editor.set_section_category("s2", Some("methods"))?;
    assert_eq!(attr(&editor, "s2", "category").as_deref(), Some("methods"));
    assert!(editor.set_section_category("s2", Some("nope")).is_err());
    Ok(())
}

// Inconsistencies

#[test]
fn test_missing_reference_is_reported_until_resolved() -> Result<()> {
    init_tracing();
    let library = Arc::new(InMemoryLibrary::new());
    let mut editor = Editor::new(
        manuscript(vec![paragraph(vec![citation("c1", &["item-1"])])]),
        EditorConfig::default(),
        Collaborators::new(library.clone()),
    )?;

    let found = editor.plugin_state(&InconsistencyPlugin::KEY).unwrap();
    let missing: Vec<_> = found.of_category(InconsistencyCategory::MissingReference).collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].node_id.as_deref(), Some("c1"));

    editor.show_inconsistencies(true)?;
    assert!(editor
        .decorations()
        .for_node("c1")
        .any(|d| d.class() == Some("inconsistency-error")));

    library.insert_item(BibliographyItem::new("item-1", "Found"));
    editor.library_updated()?;
    let found = editor.plugin_state(&InconsistencyPlugin::KEY).unwrap();
    assert_eq!(found.of_category(InconsistencyCategory::MissingReference).count(), 0);
    Ok(())
}

// History

#[test]
fn test_undo_keeps_corrective_changes() -> Result<()> {
    let mut editor = editor(manuscript(vec![
        paragraph(vec![text("ab")]),
        footnotes_element("fe", vec![footnote("f1", "one"), footnote("f2", "two")]),
    ]))?;
    assert_eq!(child_ids(&editor, "fe"), vec!["f1", "f2"]);

    // Referencing f2 moves it first and labels the reference
    let mut tr = editor.state().tr();
    tr.insert(3, vec![inline_footnote("r2", &["f2"])])?;
    editor.dispatch(tr)?;
    assert_eq!(child_ids(&editor, "fe"), vec!["f2", "f1"]);
    assert_eq!(attr(&editor, "r2", "contents").as_deref(), Some("a"));
    assert_eq!(editor.history().undo_levels(), 1);

    // Undo removes the reference, not the reordering
    assert!(editor.undo()?);
    assert!(editor.doc().find_by_id("r2").is_none());
    assert_eq!(child_ids(&editor, "fe"), vec!["f2", "f1"]);
    assert!(!editor.history().can_undo());

    assert!(editor.redo()?);
    assert!(editor.doc().find_by_id("r2").is_some());
    Ok(())
}

// Find & replace

#[test]
fn test_find_and_replace_all() -> Result<()> {
    let mut editor = editor(manuscript(vec![
        paragraph(vec![text("The cat sat.")]),
        paragraph(vec![text("A Cat ran.")]),
    ]))?;
    editor.find("cat", false)?;
    assert!(editor.replace_all("dog")?);
    assert_eq!(editor.doc().text_content(), "The dog sat.A dog ran.");

    // Replacing is one undo level
    assert!(editor.undo()?);
    assert_eq!(editor.doc().text_content(), "The cat sat.A Cat ran.");
    Ok(())
}

// Collaboration

#[test]
fn test_remote_steps_rebase_pending_local_steps() -> Result<()> {
    let mut editor = editor(manuscript(vec![paragraph(vec![text("abc")])]))?;
    editor.enable_collaboration("me", 0);

    let mut tr = editor.state().tr();
    tr.insert(4, vec![text("!")])?;
    editor.dispatch(tr)?;
    assert_eq!(editor.sendable().map(|s| s.steps.len()), Some(1));

    let remote = Step::Replace {
        from: 1,
        to: 1,
        nodes: vec![text(">>")],
    };
    assert!(editor.receive_remote(vec![remote], &["them".to_string()])?);
    assert_eq!(editor.doc().text_content(), ">>abc!");

    let sendable = editor.sendable().unwrap();
    assert_eq!(sendable.version, 1);
    assert_eq!(
        sendable.steps,
        vec![Step::Replace {
            from: 6,
            to: 6,
            nodes: vec![text("!")],
        }]
    );

    // Remote text never comes back out through local undo
    while editor.undo()? {}
    assert!(editor.doc().text_content().starts_with(">>abc"));
    Ok(())
}

// Statistics

#[test]
fn test_statistics_are_fixed_functions_of_text() -> Result<()> {
    let doc = manuscript(vec![
        section("s1", "Introduction", vec![paragraph(vec![text("Hello, world! — 42 times.")])]),
        paragraph(vec![text("Second line")]),
    ]);
    let text = build_text(&doc);
    assert_eq!(count_words(&text), 7);
    assert_eq!(count_characters(&text), 48);
    assert_eq!(build_text(&doc), text);

    let editor = editor(doc)?;
    assert_eq!(editor.statistics().words, 7);
    Ok(())
}

#[tokio::test]
async fn test_statistics_worker_matches_inline_count() -> Result<()> {
    let editor = editor(manuscript(vec![paragraph(vec![text("one two three")])]))?;
    let worker = StatisticsWorker::spawn();
    let counted = worker.count(editor.doc().clone()).await?;
    assert_eq!(counted, editor.statistics());
    Ok(())
}

// Teardown

#[test]
fn test_destroy_tears_down_overlays() -> Result<()> {
    let mut editor = editor(manuscript(vec![
        paragraph(vec![inline_footnote("r1", &["f1"])]),
        footnotes_element("fe", vec![footnote("f1", "one")]),
    ]))?;
    editor.overlays_mut().show_popup("f1", "Delete footnote?")?;
    editor.request_footnote_deletion("f1")?;
    editor.destroy();

    assert!(editor.overlays().dialog().is_none());
    assert_eq!(editor.overlays().popup_count(), 0);
    assert!(editor.request_footnote_deletion("f1").is_err());
    assert!(editor.undo().is_err());
    Ok(())
}

proptest! {
    #[test]
    fn prop_labels_depend_only_on_reference_order(
        (reference_order, creation_order) in (1usize..8).prop_flat_map(|n| {
            let ids: Vec<usize> = (0..n).collect();
            (Just(ids.clone()).prop_shuffle(), Just(ids).prop_shuffle())
        })
    ) {
        let id = |i: &usize| format!("f{}", i);
        let references: Vec<Node> = reference_order
            .iter()
            .map(|i| inline_footnote(&format!("r{}", i), &[id(i).as_str()]))
            .collect();
        let footnotes: Vec<Node> = creation_order.iter().map(|i| footnote(&id(i), "x")).collect();
        let doc = manuscript(vec![paragraph(references), footnotes_element("fe", footnotes)]);

        let state = build_footnotes_state(&doc);
        for (position, i) in reference_order.iter().enumerate() {
            let expected = alphabetic_label(position + 1);
            prop_assert_eq!(state.label(&id(i)), Some(expected.as_str()));
        }
    }
}
