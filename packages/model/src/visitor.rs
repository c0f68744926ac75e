use crate::node::{Mark, Node};

/// Visitor pattern for traversing the document tree immutably
///
/// Default implementations walk the entire tree in document order.
/// Override specific visit_* methods to act on the nodes you care about.
pub trait Visitor: Sized {
    fn visit_document(&mut self, doc: &Node) {
        walk_children(self, doc, 0);
    }

    fn visit_node(&mut self, node: &Node, pos: usize) {
        walk_node(self, node, pos);
    }

    fn visit_text(&mut self, _text: &str, _marks: &[Mark], _pos: usize) {
        // Leaf, nothing to walk
    }
}

pub fn walk_node<V: Visitor>(visitor: &mut V, node: &Node, pos: usize) {
    match &node.text {
        Some(text) => visitor.visit_text(text, &node.marks, pos),
        None => walk_children(visitor, node, pos + 1),
    }
}

/// Visit the children of `parent`, whose content starts at `start`
pub fn walk_children<V: Visitor>(visitor: &mut V, parent: &Node, start: usize) {
    let mut offset = start;
    for child in &parent.content {
        visitor.visit_node(child, offset);
        offset += child.node_size();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::*;

    struct TextPositions(Vec<(String, usize)>);

    impl Visitor for TextPositions {
        fn visit_text(&mut self, text: &str, _marks: &[Mark], pos: usize) {
            self.0.push((text.to_string(), pos));
        }
    }

    #[test]
    fn test_visitor_reports_text_positions() {
        let doc = manuscript(vec![section("s1", "Intro", vec![paragraph(vec![text("body")])])]);
        let mut visitor = TextPositions(Vec::new());
        visitor.visit_document(&doc);
        assert_eq!(
            visitor.0,
            vec![("Intro".to_string(), 2), ("body".to_string(), 9)]
        );
    }
}
