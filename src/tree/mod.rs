//! Flat parent-linked rows to owned trees.
//!
//! Recursive queries return one row per node, each naming its parent.
//! [`TreeBuilder`] collects those rows into an arena (first pass), then
//! [`TreeBuilder::link`] wires every node into its parent's child list in
//! encounter order (second pass). The linked [`Tree`] is finally folded
//! into owned values.
//!
//! ```text
//! rows ─insert→ arena { id → slot } ─link→ roots + child indices ─fold→ Vec<U>
//! ```

pub mod dashboard;
pub mod widget;

pub use dashboard::{build_dashboard, build_dashboards, is_sentinel, DashboardRow, SENTINEL_ID};
pub use widget::{build_widget, build_widgets, WidgetRow};

use std::collections::HashMap;

/// Errors raised while linking or materializing a tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("node {id} references missing parent {parent}")]
    DanglingParent { id: String, parent: String },

    #[error("cycle detected at node {0}")]
    Cycle(String),

    #[error("entity not found: {0}")]
    NotFound(String),
}

pub type TreeResult<T> = Result<T, TreeError>;

/// First pass: nodes keyed by id, parent ids remembered.
#[derive(Debug)]
pub struct TreeBuilder<T> {
    ids: Vec<String>,
    parents: Vec<Option<String>>,
    values: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for TreeBuilder<T> {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            parents: Vec::new(),
            values: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> TreeBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Returns `false` and keeps the existing node when `id` was
    /// already inserted.
    pub fn insert(&mut self, id: impl Into<String>, parent: Option<String>, value: T) -> bool {
        let id = id.into();
        if self.index.contains_key(&id) {
            return false;
        }
        self.index.insert(id.clone(), self.ids.len());
        self.ids.push(id);
        self.parents.push(parent);
        self.values.push(value);
        true
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Second pass: attach each node to its parent, in insertion order.
    pub fn link(self) -> TreeResult<Tree<T>> {
        let mut children = vec![Vec::new(); self.ids.len()];
        let mut roots = Vec::new();

        for (idx, parent) in self.parents.iter().enumerate() {
            match parent {
                None => roots.push(idx),
                Some(parent) => match self.index.get(parent) {
                    Some(&parent_idx) => children[parent_idx].push(idx),
                    None => {
                        return Err(TreeError::DanglingParent {
                            id: self.ids[idx].clone(),
                            parent: parent.clone(),
                        })
                    }
                },
            }
        }

        Ok(Tree {
            ids: self.ids,
            values: self.values.into_iter().map(Some).collect(),
            children,
            roots,
            index: self.index,
        })
    }
}

/// A linked arena, ready to be folded into owned values.
#[derive(Debug)]
pub struct Tree<T> {
    ids: Vec<String>,
    values: Vec<Option<T>>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
    index: HashMap<String, usize>,
}

impl<T> Tree<T> {
    /// Ids of parentless nodes, in insertion order.
    pub fn root_ids(&self) -> Vec<&str> {
        self.roots.iter().map(|&idx| self.ids[idx].as_str()).collect()
    }

    /// Ids of the direct children of `id`.
    pub fn child_ids(&self, id: &str) -> Vec<&str> {
        self.index
            .get(id)
            .map(|&idx| {
                self.children[idx]
                    .iter()
                    .map(|&child| self.ids[child].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fold every root's subtree bottom-up with `build(value, children)`.
    ///
    /// Fails with [`TreeError::Cycle`] if some node cannot be reached from
    /// a root.
    pub fn into_roots<U>(mut self, mut build: impl FnMut(T, Vec<U>) -> U) -> TreeResult<Vec<U>> {
        let roots = std::mem::take(&mut self.roots);
        let built = roots
            .into_iter()
            .map(|idx| self.materialize(idx, &mut build))
            .collect::<TreeResult<Vec<_>>>()?;

        match self.values.iter().position(Option::is_some) {
            Some(unreached) => Err(TreeError::Cycle(self.ids[unreached].clone())),
            None => Ok(built),
        }
    }

    /// Fold the subtree rooted at `id`.
    pub fn into_subtree<U>(
        mut self,
        id: &str,
        mut build: impl FnMut(T, Vec<U>) -> U,
    ) -> TreeResult<U> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
        self.materialize(idx, &mut build)
    }

    /// Post-order fold of the subtree at `root` over an explicit stack, so
    /// depth is bounded by memory rather than the call stack.
    fn materialize<U>(
        &mut self,
        root: usize,
        build: &mut impl FnMut(T, Vec<U>) -> U,
    ) -> TreeResult<U> {
        let mut current = self.open(root)?;
        let mut ancestors: Vec<Frame<T, U>> = Vec::new();
        loop {
            if let Some(child) = current.children.next() {
                let frame = self.open(child)?;
                ancestors.push(std::mem::replace(&mut current, frame));
                continue;
            }
            let Frame { value, built, .. } = current;
            let node = build(value, built);
            match ancestors.pop() {
                Some(mut parent) => {
                    parent.built.push(node);
                    current = parent;
                }
                None => return Ok(node),
            }
        }
    }

    /// Claim node `idx`; a second claim means the links loop.
    fn open<U>(&mut self, idx: usize) -> TreeResult<Frame<T, U>> {
        let value = self.values[idx]
            .take()
            .ok_or_else(|| TreeError::Cycle(self.ids[idx].clone()))?;
        let children = std::mem::take(&mut self.children[idx]);
        Ok(Frame {
            value,
            built: Vec::with_capacity(children.len()),
            children: children.into_iter(),
        })
    }
}

/// A node whose children are still being folded.
struct Frame<T, U> {
    value: T,
    children: std::vec::IntoIter<usize>,
    built: Vec<U>,
}
