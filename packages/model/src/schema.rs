//! # Schema
//!
//! Node and mark types of a manuscript document.
//!
//! Type-specific behaviour is looked up through [`NodeType::spec`] rather than
//! branching on type names at every call site.

use serde::{Deserialize, Serialize};

/// Every node type a manuscript document can contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Manuscript,
    Body,
    Backmatter,
    Abstracts,
    Section,
    SectionTitle,
    Paragraph,
    Text,
    FootnotesSection,
    FootnotesElement,
    Footnote,
    InlineFootnote,
    Citation,
    BibliographySection,
    BibliographyElement,
    BibliographyItem,
    CrossReference,
    FigureElement,
    Figure,
    Figcaption,
    TableElement,
    Table,
    TableRow,
    TableCell,
    TableElementFooter,
    EquationElement,
    Equation,
    ListingElement,
    Listing,
    BoxElement,
    HardBreak,
    Placeholder,
}

/// Static description of a node type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSpec {
    /// Serialized name
    pub name: &'static str,

    /// Inline atom occupying a single position
    pub leaf: bool,

    /// Prefix for generated ids. `Some` means the node must carry a unique id.
    pub id_prefix: Option<&'static str>,
}

const fn spec(name: &'static str, leaf: bool, id_prefix: Option<&'static str>) -> NodeSpec {
    NodeSpec {
        name,
        leaf,
        id_prefix,
    }
}

impl NodeType {
    pub fn spec(self) -> NodeSpec {
        match self {
            NodeType::Manuscript => spec("manuscript", false, None),
            NodeType::Body => spec("body", false, None),
            NodeType::Backmatter => spec("backmatter", false, None),
            NodeType::Abstracts => spec("abstracts", false, None),
            NodeType::Section => spec("section", false, Some("MPSection")),
            NodeType::SectionTitle => spec("section_title", false, None),
            NodeType::Paragraph => spec("paragraph", false, None),
            NodeType::Text => spec("text", false, None),
            NodeType::FootnotesSection => spec("footnotes_section", false, Some("MPSection")),
            NodeType::FootnotesElement => {
                spec("footnotes_element", false, Some("MPFootnotesElement"))
            }
            NodeType::Footnote => spec("footnote", false, Some("MPFootnote")),
            NodeType::InlineFootnote => spec("inline_footnote", true, Some("MPInlineFootnote")),
            NodeType::Citation => spec("citation", true, Some("MPCitation")),
            NodeType::BibliographySection => {
                spec("bibliography_section", false, Some("MPSection"))
            }
            NodeType::BibliographyElement => {
                spec("bibliography_element", false, Some("MPBibliographyElement"))
            }
            NodeType::BibliographyItem => spec("bibliography_item", false, None),
            NodeType::CrossReference => spec("cross_reference", true, Some("MPCrossReference")),
            NodeType::FigureElement => spec("figure_element", false, Some("MPFigureElement")),
            NodeType::Figure => spec("figure", false, Some("MPFigure")),
            NodeType::Figcaption => spec("figcaption", false, None),
            NodeType::TableElement => spec("table_element", false, Some("MPTableElement")),
            NodeType::Table => spec("table", false, Some("MPTable")),
            NodeType::TableRow => spec("table_row", false, None),
            NodeType::TableCell => spec("table_cell", false, None),
            NodeType::TableElementFooter => {
                spec("table_element_footer", false, Some("MPTableElementFooter"))
            }
            NodeType::EquationElement => {
                spec("equation_element", false, Some("MPEquationElement"))
            }
            NodeType::Equation => spec("equation", true, Some("MPEquation")),
            NodeType::ListingElement => spec("listing_element", false, Some("MPListingElement")),
            NodeType::Listing => spec("listing", false, Some("MPListing")),
            NodeType::BoxElement => spec("box_element", false, Some("MPBoxElement")),
            NodeType::HardBreak => spec("hard_break", true, None),
            NodeType::Placeholder => spec("placeholder", true, None),
        }
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn is_text(self) -> bool {
        self == NodeType::Text
    }

    pub fn is_leaf(self) -> bool {
        self.spec().leaf
    }

    pub fn requires_id(self) -> bool {
        self.spec().id_prefix.is_some()
    }

    /// Types that may be targeted by a cross reference
    pub fn is_reference_target(self) -> bool {
        matches!(
            self,
            NodeType::FigureElement
                | NodeType::TableElement
                | NodeType::EquationElement
                | NodeType::ListingElement
        )
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Inline annotations carried by text nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkType {
    Bold,
    Italic,
    Superscript,
    Subscript,
    TrackedInsert,
    TrackedDelete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_types_are_inline_atoms() {
        assert!(NodeType::Citation.is_leaf());
        assert!(NodeType::InlineFootnote.is_leaf());
        assert!(NodeType::CrossReference.is_leaf());
        assert!(!NodeType::Footnote.is_leaf());
        assert!(!NodeType::Text.is_leaf());
    }

    #[test]
    fn test_structural_nodes_require_ids() {
        for node_type in [
            NodeType::Footnote,
            NodeType::Citation,
            NodeType::Section,
            NodeType::FigureElement,
            NodeType::TableElement,
            NodeType::EquationElement,
        ] {
            assert!(node_type.requires_id(), "{} should require an id", node_type);
        }
        assert!(!NodeType::Paragraph.requires_id());
    }

    #[test]
    fn test_serialized_names_match_spec_names() {
        let json = serde_json::to_string(&NodeType::TableElementFooter).unwrap();
        assert_eq!(json, "\"table_element_footer\"");
        assert_eq!(NodeType::TableElementFooter.name(), "table_element_footer");
    }
}
