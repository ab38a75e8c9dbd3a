use serde::{Deserialize, Serialize};

/// Child count at which a node switches from the compact key list to a dense
/// 256-slot array.
const DENSE_THRESHOLD: usize = 128;

/// One trie node. `start` is a 1-based block number; 0 means the label is
/// inherited during the fill pass. A node is dense exactly when it carries
/// 256 children and no key list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    keys: Vec<u8>,
    children: Vec<Node>,
    start: u32,
}

impl Node {
    /// Child for `val`, creating it if missing. Upgrades the node to the
    /// dense representation once the compact list reaches the threshold.
    fn make(&mut self, val: u8) -> &mut Node {
        if self.children.len() < DENSE_THRESHOLD {
            if let Some(i) = self.keys.iter().position(|&k| k == val) {
                return &mut self.children[i];
            }
            self.keys.push(val);
            self.children.push(Node::default());
            let last = self.children.len() - 1;
            return &mut self.children[last];
        }
        if self.children.len() < 256 {
            let mut dense = vec![Node::default(); 256];
            let keys = std::mem::take(&mut self.keys);
            let children = std::mem::take(&mut self.children);
            for (slot, node) in keys.into_iter().zip(children) {
                dense[slot as usize] = node;
            }
            self.children = dense;
        }
        &mut self.children[val as usize]
    }

    /// Child used to resolve `val` during a query: the exact child when
    /// present, otherwise the greatest child key below `val`. None means the
    /// walk stays on this node.
    fn child(&self, val: u8) -> Option<&Node> {
        if self.children.len() == 256 {
            return Some(&self.children[val as usize]);
        }
        let mut best: Option<usize> = None;
        for (i, &k) in self.keys.iter().enumerate() {
            if k == val {
                return Some(&self.children[i]);
            }
            if k < val && best.map_or(true, |b| self.keys[b] < k) {
                best = Some(i);
            }
        }
        best.map(|i| &self.children[i])
    }
}

/// 256-ary byte trie mapping block-prefix paths to block numbers.
///
/// Insertion walks one byte of a block's first record at a time, at most one
/// byte past the block prefix, labelling childless nodes along the way. After
/// all blocks are in, [`SearchTree::fill`] propagates labels depth-first so
/// that any byte path, inserted or not, resolves to the closest lower block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchTree {
    roots: Vec<Node>,
}

impl Default for SearchTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchTree {
    pub fn new() -> Self {
        Self {
            roots: vec![Node::default(); 256],
        }
    }

    /// Register the first record of a block. `block` is the 1-based block
    /// number and `prefix` the block's shared prefix length.
    pub fn insert(&mut self, first: &[u8], prefix: usize, block: u32) {
        let mut node = &mut self.roots[first[0] as usize];
        let end = (prefix + 1).min(first.len());
        for &b in &first[1..end] {
            if node.children.is_empty() {
                node.start = block;
            }
            node = node.make(b);
        }
    }

    /// Propagate block numbers so every node resolves. Unlabelled nodes
    /// inherit from the last labelled predecessor in depth-first order.
    pub fn fill(&mut self) {
        fn walk(mut val: u32, nodes: &mut [Node]) -> u32 {
            for node in nodes {
                if node.start > 0 {
                    val = node.start;
                } else {
                    node.start = val;
                }
                val = walk(val, &mut node.children);
            }
            val
        }
        walk(1, &mut self.roots);
    }

    /// Resolve a query to a 1-based block number. Only meaningful after
    /// [`SearchTree::fill`].
    pub fn locate(&self, query: &[u8]) -> u32 {
        let mut node = &self.roots[query[0] as usize];
        let mut pos = node.start;
        for &b in &query[1..] {
            if node.children.is_empty() {
                break;
            }
            match node.child(b) {
                Some(next) => {
                    node = next;
                    pos = node.start;
                }
                None => break,
            }
        }
        pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_follows_inserted_paths() {
        let mut tree = SearchTree::new();
        tree.insert(b"blah00000abc", 6, 1);
        tree.insert(b"blah00341abc", 6, 2);
        tree.insert(b"blah01023abc", 6, 3);
        tree.fill();

        // Exact prefix paths resolve to their blocks.
        assert_eq!(tree.locate(b"blah01023"), 3);
        // Paths between inserted ones resolve to a block at or below the
        // match; the reader's forward advance covers the rest.
        assert_eq!(tree.locate(b"blah00123"), 1);
        assert_eq!(tree.locate(b"blah00500"), 1);
        // Unrelated first bytes inherit from the walk.
        assert_eq!(tree.locate(b"aaaa"), 1);
        assert_eq!(tree.locate(b"zzzz"), 3);
    }

    #[test]
    fn test_fill_labels_every_path() {
        let mut tree = SearchTree::new();
        tree.insert(b"mm", 1, 1);
        tree.insert(b"mz", 1, 2);
        tree.fill();

        for b in 0u8..=255 {
            assert!(tree.locate(&[b, b, b]) >= 1);
        }
    }

    #[test]
    fn test_sibling_fallback_takes_greatest_lower_key() {
        let mut tree = SearchTree::new();
        // Children 'b', 'd', 'f' under root 'x'.
        tree.insert(b"xbb", 2, 1);
        tree.insert(b"xdd", 2, 2);
        tree.insert(b"xff", 2, 3);
        tree.fill();

        // 'e' is missing; the walk falls back to the 'd' subtree.
        assert_eq!(tree.locate(b"xe"), 2);
        // 'a' is below every child; the walk stays on the root.
        assert_eq!(tree.locate(b"xa"), 1);
        assert_eq!(tree.locate(b"xg"), 3);
    }

    #[test]
    fn test_dense_upgrade_keeps_children() {
        let mut node = Node::default();
        for k in 0..200u8 {
            node.make(k).start = k as u32 + 1;
        }
        assert_eq!(node.children.len(), 256);
        assert!(node.keys.is_empty());
        for k in 0..200u8 {
            assert_eq!(node.child(k).unwrap().start, k as u32 + 1);
        }
        // Dense dispatch resolves unassigned slots too.
        assert_eq!(node.child(220).unwrap().start, 0);
    }

    #[test]
    fn test_compact_until_threshold() {
        let mut node = Node::default();
        for k in 0..127u8 {
            node.make(k);
        }
        assert_eq!(node.children.len(), 127);
        assert_eq!(node.keys.len(), 127);
        node.make(127);
        assert_eq!(node.children.len(), 128);
        node.make(128);
        assert_eq!(node.children.len(), 256);
    }

    #[test]
    fn test_terminal_path_node_inherits_lower_label() {
        let mut tree = SearchTree::new();
        tree.insert(b"hello world abc", 12, 1);
        tree.insert(b"hello world mno", 12, 2);
        tree.fill();

        // The walk labels nodes it passes through while they are childless;
        // the terminal "m" node stays unlabelled and inherits the block
        // below, leaving the reader's forward advance to settle the rest.
        assert_eq!(tree.locate(b"hello world m"), 1);
        assert_eq!(tree.locate(b"hello world a"), 1);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut tree = SearchTree::new();
        tree.insert(b"hello world abc", 12, 1);
        tree.insert(b"hello world mno", 13, 2);
        tree.fill();

        let bytes = bincode::serialize(&tree).unwrap();
        let loaded: SearchTree = bincode::deserialize(&bytes).unwrap();
        assert_eq!(tree, loaded);
        assert_eq!(loaded.locate(b"hello world m"), 2);
    }
}
