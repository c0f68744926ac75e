//! Integration tests for document transforms

use anyhow::Result;
use manuscript_model::builders::*;
use manuscript_model::{IdGenerator, Selection, Step, Transaction};
use std::sync::Arc;

fn doc() -> manuscript_model::Node {
    manuscript(vec![
        paragraph(vec![text("Hello")]),
        footnotes_element("fe", vec![footnote("f1", "Note")]),
    ])
}

#[test]
fn test_inverses_restore_the_original() -> Result<()> {
    let original = Arc::new(doc());
    let mut tr = Transaction::new(original.clone());
    tr.insert(6, vec![text(" world")])?;
    tr.set_node_attribute(0, "id", "p1")?;
    tr.delete(1, 2)?;
    assert_eq!(tr.doc().content[0].text_content(), "ello world");

    let mut undo = Transaction::new(tr.doc().clone());
    for inverse in tr.inverses().iter().rev() {
        undo.step(inverse.clone())?;
    }
    assert_eq!(undo.doc(), &original);
    Ok(())
}

#[test]
fn test_steps_travel_as_json() -> Result<()> {
    let step = Step::Replace {
        from: 1,
        to: 1,
        nodes: vec![text("x")],
    };
    let json = serde_json::to_value(&step)?;
    assert_eq!(json["stepType"], "replace");
    let back: Step = serde_json::from_value(json)?;
    assert_eq!(back, step);
    Ok(())
}

#[test]
fn test_selection_survives_deletion_of_its_target() -> Result<()> {
    let mut tr = Transaction::new(Arc::new(doc()));
    let selection = Selection::cursor(3);
    tr.delete(0, 7)?;
    let mapped = selection.map(tr.doc(), tr.mapping());
    assert!(mapped.head <= tr.doc().content_size());
    assert_eq!(mapped.head, 0);
    Ok(())
}

#[test]
fn test_corrective_flags() {
    let mut tr = Transaction::new(Arc::new(doc()));
    assert!(tr.add_to_history());
    assert!(!tr.skip_tracking());
    tr.mark_corrective();
    assert!(tr.is_corrective());
    assert!(!tr.add_to_history());
    assert!(tr.skip_tracking());
}

#[test]
fn test_generated_ids_are_unique_per_document_key() {
    let first = IdGenerator::new("manuscript-a");
    let second = IdGenerator::new("manuscript-b");
    let a = first.next_id("MPFootnote");
    let b = second.next_id("MPFootnote");
    assert_ne!(a, b);
    assert!(a.starts_with("MPFootnote:"));
}
