//! Convenience constructors for manuscript trees.
//!
//! Used by tests, benches and commands that need to insert well-formed
//! structural nodes.

use crate::node::{Attrs, Node};
use crate::schema::NodeType;
use serde_json::Value;

fn with_id(node_type: NodeType, id: &str, content: Vec<Node>) -> Node {
    Node::new(node_type, Attrs::new(), content).with_id(id)
}

fn rids(ids: &[&str]) -> Value {
    Value::Array(ids.iter().map(|id| Value::String(id.to_string())).collect())
}

fn text_children(text: &str) -> Vec<Node> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Node::text(text)]
    }
}

pub fn manuscript(content: Vec<Node>) -> Node {
    Node::new(NodeType::Manuscript, Attrs::new(), content)
}

pub fn body(content: Vec<Node>) -> Node {
    Node::new(NodeType::Body, Attrs::new(), content)
}

pub fn backmatter(content: Vec<Node>) -> Node {
    Node::new(NodeType::Backmatter, Attrs::new(), content)
}

pub fn abstracts(content: Vec<Node>) -> Node {
    Node::new(NodeType::Abstracts, Attrs::new(), content)
}

pub fn text(text: &str) -> Node {
    Node::text(text)
}

pub fn paragraph(content: Vec<Node>) -> Node {
    Node::new(NodeType::Paragraph, Attrs::new(), content)
}

pub fn section_title(title: &str) -> Node {
    Node::new(NodeType::SectionTitle, Attrs::new(), text_children(title))
}

/// Section with a leading title
pub fn section(id: &str, title: &str, content: Vec<Node>) -> Node {
    let mut children = vec![section_title(title)];
    children.extend(content);
    with_id(NodeType::Section, id, children)
}

pub fn section_with_category(id: &str, category: &str, title: &str, content: Vec<Node>) -> Node {
    section(id, title, content).with_attr("category", category)
}

pub fn box_element(id: &str, content: Vec<Node>) -> Node {
    with_id(NodeType::BoxElement, id, content)
}

pub fn footnote(id: &str, text: &str) -> Node {
    with_id(NodeType::Footnote, id, vec![paragraph(text_children(text))])
}

pub fn footnotes_element(id: &str, footnotes: Vec<Node>) -> Node {
    with_id(NodeType::FootnotesElement, id, footnotes)
}

pub fn footnotes_section(id: &str, elements: Vec<Node>) -> Node {
    let mut children = vec![section_title("Footnotes")];
    children.extend(elements);
    with_id(NodeType::FootnotesSection, id, children)
}

pub fn inline_footnote(id: &str, footnote_ids: &[&str]) -> Node {
    Node::leaf(NodeType::InlineFootnote, Attrs::new())
        .with_id(id)
        .with_attr("rids", rids(footnote_ids))
}

pub fn citation(id: &str, item_ids: &[&str]) -> Node {
    Node::leaf(NodeType::Citation, Attrs::new())
        .with_id(id)
        .with_attr("rids", rids(item_ids))
}

pub fn cross_reference(id: &str, target_ids: &[&str]) -> Node {
    Node::leaf(NodeType::CrossReference, Attrs::new())
        .with_id(id)
        .with_attr("rids", rids(target_ids))
}

pub fn figcaption(caption: &str) -> Node {
    Node::new(NodeType::Figcaption, Attrs::new(), text_children(caption))
}

pub fn figure_element(id: &str, caption: &str) -> Node {
    with_id(
        NodeType::FigureElement,
        id,
        vec![
            with_id(NodeType::Figure, &format!("{}-figure", id), Vec::new()),
            figcaption(caption),
        ],
    )
}

pub fn table_cell(content: Vec<Node>) -> Node {
    Node::new(NodeType::TableCell, Attrs::new(), content)
}

pub fn table_row(cells: Vec<Node>) -> Node {
    Node::new(NodeType::TableRow, Attrs::new(), cells)
}

pub fn table_element_footer(id: &str, elements: Vec<Node>) -> Node {
    with_id(NodeType::TableElementFooter, id, elements)
}

/// Table element with one row per entry of `rows`; each cell holds one paragraph
pub fn table_element(id: &str, caption: &str, rows: Vec<Vec<Node>>, footer: Option<Node>) -> Node {
    let rows = rows
        .into_iter()
        .map(|cells| table_row(cells.into_iter().map(|c| table_cell(vec![c])).collect()))
        .collect();
    let mut children = vec![
        with_id(NodeType::Table, &format!("{}-table", id), rows),
        figcaption(caption),
    ];
    children.extend(footer);
    with_id(NodeType::TableElement, id, children)
}

pub fn equation_element(id: &str) -> Node {
    with_id(
        NodeType::EquationElement,
        id,
        vec![Node::leaf(NodeType::Equation, Attrs::new()).with_id(&format!("{}-equation", id))],
    )
}

pub fn listing_element(id: &str, caption: &str) -> Node {
    with_id(
        NodeType::ListingElement,
        id,
        vec![
            with_id(NodeType::Listing, &format!("{}-listing", id), Vec::new()),
            figcaption(caption),
        ],
    )
}

pub fn bibliography_element(id: &str) -> Node {
    with_id(NodeType::BibliographyElement, id, Vec::new())
}

pub fn bibliography_section(id: &str, element_id: &str) -> Node {
    with_id(
        NodeType::BibliographySection,
        id,
        vec![section_title("References"), bibliography_element(element_id)],
    )
}
