//
// Copyright 2020 ndfkit Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! The in-memory path trie shared by the import and export path
//! sections. Only the tree structure lives here; the on-disk node
//! layout is in `de.rs`/`ser.rs`.

/// One node of an import or export trie. The root itself (see
/// [`TrieNode::root`]) carries no fragment of its own — its children are
/// the path's literal first components, each written on the wire as a
/// top-level trie entry.
#[derive(Debug, Clone)]
pub struct TrieNode {
    pub fragment: String,
    pub leaf: Option<u32>,
    pub children: Vec<TrieNode>,
}

impl TrieNode {
    pub fn root() -> Self {
        TrieNode {
            fragment: String::new(),
            leaf: None,
            children: Vec::new(),
        }
    }

    /// Inserts `path` (its components split on `/`), attaching `leaf_index`
    /// to the terminal node.
    pub fn insert(&mut self, path: &str, leaf_index: u32) {
        let mut current = self;
        for part in path.split('/') {
            let position = current
                .children
                .iter()
                .position(|child| child.fragment == part);
            let index = match position {
                Some(index) => index,
                None => {
                    current.children.push(TrieNode {
                        fragment: part.to_string(),
                        leaf: None,
                        children: Vec::new(),
                    });
                    current.children.len() - 1
                }
            };
            current = &mut current.children[index];
        }
        current.leaf = Some(leaf_index);
    }

    /// Children in a deterministic emit order (alphabetical by fragment),
    /// so encoding the same graph twice always produces identical bytes.
    pub fn sorted_children(&self) -> Vec<&TrieNode> {
        let mut children: Vec<&TrieNode> = self.children.iter().collect();
        children.sort_by(|a, b| a.fragment.cmp(&b.fragment));
        children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_builds_nested_fragments() {
        let mut root = TrieNode::root();
        root.insert("Units/Infantry", 0);
        root.insert("Units/Tanks", 1);

        let units = root.sorted_children();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].fragment, "Units");
        assert_eq!(units[0].leaf, None);

        let leaves = units[0].sorted_children();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].fragment, "Infantry");
        assert_eq!(leaves[0].leaf, Some(0));
        assert_eq!(leaves[1].fragment, "Tanks");
        assert_eq!(leaves[1].leaf, Some(1));
    }

    #[test]
    fn test_shared_prefix_reuses_node() {
        let mut root = TrieNode::root();
        root.insert("A/B", 0);
        root.insert("A/C", 1);
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].children.len(), 2);
    }
}
