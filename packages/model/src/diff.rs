//! Minimal contiguous replacement between two id-keyed child lists

use crate::node::Node;

/// Identity and extent of an existing child node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCoordinates {
    pub id: String,
    pub from: usize,
    pub to: usize,
}

/// Replace `remove` old entries starting at index `start` with `insert`
#[derive(Debug, Clone, PartialEq)]
pub struct ReplacementBlock {
    pub start: usize,
    pub remove: usize,
    pub insert: Vec<Node>,
}

impl ReplacementBlock {
    pub fn is_noop(&self) -> bool {
        self.remove == 0 && self.insert.is_empty()
    }
}

/// Compare old coordinates with new nodes by id, trimming the common prefix
/// and suffix. Whatever differs in between is replaced as one block.
pub fn diff_replacement_blocks(old: &[NodeCoordinates], new: &[Node]) -> ReplacementBlock {
    let same = |o: &NodeCoordinates, n: &Node| n.id() == Some(o.id.as_str());

    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(o, n)| same(o, n))
        .count();

    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(max_suffix)
        .take_while(|(o, n)| same(o, n))
        .count();

    ReplacementBlock {
        start: prefix,
        remove: old.len() - prefix - suffix,
        insert: new[prefix..new.len() - suffix].to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::paragraph;

    fn coords(ids: &[&str]) -> Vec<NodeCoordinates> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| NodeCoordinates {
                id: id.to_string(),
                from: i * 2,
                to: i * 2 + 2,
            })
            .collect()
    }

    fn nodes(ids: &[&str]) -> Vec<Node> {
        ids.iter().map(|id| paragraph(vec![]).with_id(id)).collect()
    }

    fn ids(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().filter_map(Node::id).collect()
    }

    #[test]
    fn test_single_changed_entry() {
        let block = diff_replacement_blocks(
            &coords(&["one", "two", "three", "five"]),
            &nodes(&["one", "two", "four", "five"]),
        );
        assert_eq!(block.start, 2);
        assert_eq!(block.remove, 1);
        assert_eq!(ids(&block.insert), vec!["four"]);
    }

    #[test]
    fn test_disjoint_lists_replace_everything() {
        let block = diff_replacement_blocks(
            &coords(&["one", "two", "three"]),
            &nodes(&["four", "five", "six"]),
        );
        assert_eq!(block.start, 0);
        assert_eq!(block.remove, 3);
        assert_eq!(ids(&block.insert), vec!["four", "five", "six"]);
    }

    #[test]
    fn test_identical_lists_are_noop() {
        let block = diff_replacement_blocks(
            &coords(&["one", "two", "three"]),
            &nodes(&["one", "two", "three"]),
        );
        assert_eq!(block.remove, 0);
        assert!(block.insert.is_empty());
        assert!(block.is_noop());
    }

    #[test]
    fn test_pure_append_and_truncate() {
        let block = diff_replacement_blocks(&coords(&["one"]), &nodes(&["one", "two"]));
        assert_eq!((block.start, block.remove), (1, 0));
        assert_eq!(ids(&block.insert), vec!["two"]);

        let block = diff_replacement_blocks(&coords(&["one", "two"]), &nodes(&["one"]));
        assert_eq!((block.start, block.remove), (1, 1));
        assert!(block.insert.is_empty());
    }
}
