//! Hierarchical selection tree
//!
//! A trie keyed by ordered string segments. Terminal nodes remember the flat
//! path they were inserted from so the checked subset can be flattened back
//! into a list for persistence. Delimiter parsing lives in [`channel_path`].

pub mod channel_path;

use log::{debug, warn};
use serde::Serialize;

pub use channel_path::decompose;

/// One segment of the selection tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<TreeNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    leaf_path: Option<String>,
    checked: bool,
}

impl TreeNode {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            children: Vec::new(),
            leaf_path: None,
            checked: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Children in order of first encounter
    pub fn children(&self) -> &[TreeNode] {
        &self.children
    }

    /// Flat path this node was inserted from, if any
    pub fn leaf_path(&self) -> Option<&str> {
        self.leaf_path.as_deref()
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn child(&self, name: &str) -> Option<&TreeNode> {
        self.children.iter().find(|child| child.name == name)
    }

    fn child_index(&self, name: &str) -> Option<usize> {
        self.children.iter().position(|child| child.name == name)
    }

    fn set_checked_recursive(&mut self, value: bool) {
        self.checked = value;
        for child in &mut self.children {
            child.set_checked_recursive(value);
        }
    }
}

/// Result of inserting one key-part sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The terminal node now carries the given path
    Inserted,
    /// Another path already decomposed to the same key parts and was displaced
    Replaced { previous: String },
    /// No key parts, nothing was created
    Ignored,
}

/// Selection tree rooted at an unnamed node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathTree {
    root: TreeNode,
}

impl Default for PathTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PathTree {
    pub fn new() -> Self {
        Self {
            root: TreeNode::new(""),
        }
    }

    /// Build a fresh tree from channel paths, in input order
    pub fn build<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::new();
        for path in paths {
            tree.insert_channel(path.as_ref());
        }
        tree
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Insert a channel path using the channel decomposition
    pub fn insert_channel(&mut self, path: &str) -> InsertOutcome {
        let outcome = self.insert(&decompose(path), path);
        if let InsertOutcome::Replaced { previous } = &outcome {
            warn!(
                "Channel '{}' collides with '{}' in the selection tree; keeping '{}'",
                path, previous, path
            );
        }
        outcome
    }

    /// Walk down `key_parts`, creating missing nodes, and tag the last one
    pub fn insert<S: AsRef<str>>(&mut self, key_parts: &[S], leaf_path: &str) -> InsertOutcome {
        if key_parts.is_empty() {
            return InsertOutcome::Ignored;
        }

        let mut node = &mut self.root;
        for part in key_parts {
            let part = part.as_ref();
            let index = match node.child_index(part) {
                Some(index) => index,
                None => {
                    node.children.push(TreeNode::new(part));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[index];
        }

        match node.leaf_path.replace(leaf_path.to_string()) {
            Some(previous) if previous != leaf_path => InsertOutcome::Replaced { previous },
            _ => InsertOutcome::Inserted,
        }
    }

    /// Follow `key_parts` through existing nodes only
    pub fn find<S: AsRef<str>>(&self, key_parts: &[S]) -> Option<&TreeNode> {
        if key_parts.is_empty() {
            return None;
        }
        key_parts
            .iter()
            .try_fold(&self.root, |node, part| node.child(part.as_ref()))
    }

    fn find_mut<S: AsRef<str>>(&mut self, key_parts: &[S]) -> Option<&mut TreeNode> {
        if key_parts.is_empty() {
            return None;
        }
        let mut node = &mut self.root;
        for part in key_parts {
            let index = node.child_index(part.as_ref())?;
            node = &mut node.children[index];
        }
        Some(node)
    }

    /// Set `checked` on every node
    pub fn reset(&mut self, checked: bool) {
        self.root.set_checked_recursive(checked);
    }

    /// Select all / select none
    pub fn set_all_checked(&mut self, value: bool) {
        self.root.set_checked_recursive(value);
    }

    /// Mark the node of every known path checked; unknown paths are dropped
    ///
    /// Additive only: call [`PathTree::reset`] first for exact-set semantics.
    /// Returns how many paths matched a node.
    pub fn apply_selection<I, S>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut applied = 0;
        for path in paths {
            let path = path.as_ref();
            match self.find_mut(&decompose(path)) {
                Some(node) => {
                    node.checked = true;
                    applied += 1;
                }
                None => debug!("Dropping unknown channel '{}' from selection", path),
            }
        }
        applied
    }

    /// Toggle one channel or group; a group passes the value to its descendants
    ///
    /// Returns false when the path names no node in the tree.
    pub fn set_channel_checked(&mut self, path: &str, value: bool) -> bool {
        match self.find_mut(&decompose(path)) {
            Some(node) => {
                node.set_checked_recursive(value);
                true
            }
            None => false,
        }
    }

    /// Leaf paths of every checked leaf, in pre-order
    pub fn selected_leaf_paths(&self) -> SelectedLeafPaths<'_> {
        SelectedLeafPaths {
            stack: vec![&self.root],
        }
    }

    /// Number of selectable channels
    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if node.is_leaf() {
                count += usize::from(node.leaf_path.is_some());
            } else {
                stack.extend(node.children.iter());
            }
        }
        count
    }
}

/// Lazy pre-order walk over checked leaves
pub struct SelectedLeafPaths<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for SelectedLeafPaths<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        while let Some(node) = self.stack.pop() {
            if node.is_leaf() {
                if node.checked {
                    if let Some(path) = node.leaf_path.as_deref() {
                        return Some(path);
                    }
                }
            } else {
                self.stack.extend(node.children.iter().rev());
            }
        }
        None
    }
}
