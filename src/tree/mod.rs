//! Comment tree reconstruction.
//!
//! Comments are stored flat, each pointing at its parent by id. The tree is
//! rebuilt on demand for one entry:
//!
//! 1. Every comment becomes a node in an arena, indexed by comment id.
//! 2. Nodes are attached in ascending id order, either to the root list
//!    (parent 0) or to their parent's children. The result does not depend
//!    on the order the comments were supplied in.
//! 3. Deleted and banned comments whose replies are all pruned (or which
//!    have none) are pruned themselves, deciding every reply before its
//!    parent.
//! 4. [`CommentTree::render`] projects the unpruned nodes into a nested,
//!    serializable structure.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::model::{Comment, CommentState};

/// Tree reconstruction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// A comment points at a parent that is not in the set.
    #[error("Comment {comment_id} refers to missing parent {parent_id}")]
    OrphanComment { comment_id: u64, parent_id: u64 },

    /// Comments whose parent chain never reaches a root.
    #[error("Comments {comment_ids:?} form a parent cycle")]
    Cycle { comment_ids: Vec<u64> },

    /// Moderation code outside the known vocabulary.
    #[error("Comment {comment_id} has unknown state {state:?}")]
    UnknownState { comment_id: u64, state: String },
}

#[derive(Debug)]
struct Node<'a> {
    comment: &'a Comment,
    children: Vec<usize>,
    pruned: bool,
}

/// Comments of one entry arranged by parent.
#[derive(Debug)]
pub struct CommentTree<'a> {
    nodes: Vec<Node<'a>>,
    by_id: HashMap<u64, usize>,
    roots: Vec<usize>,
}

/// A comment ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedComment {
    pub comment_id: u64,
    pub parent_id: u64,
    pub username: String,
    /// Posted by the journal owner.
    pub own: bool,
    pub state: CommentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub body: String,
    /// `YYYY-MM-DD HH:MM:SS` when the remote sent ISO-8601.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub children: Vec<RenderedComment>,
}

impl RenderedComment {
    /// Number of comments in this subtree, itself included.
    #[must_use]
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Self::count).sum::<usize>()
    }
}

/// `2020-01-01T10:00:00Z` → `2020-01-01 10:00:00`.
#[must_use]
pub fn normalize_date(date: &str) -> String {
    date.replace('T', " ").replace('Z', "")
}

impl<'a> CommentTree<'a> {
    /// Build the tree from comments in any order.
    ///
    /// # Errors
    ///
    /// Returns `OrphanComment` if a parent id is not among the comments and
    /// `Cycle` if some comments cannot be reached from a root.
    pub fn build(comments: impl IntoIterator<Item = &'a Comment>) -> Result<Self, TreeError> {
        let sorted: BTreeMap<u64, &'a Comment> =
            comments.into_iter().map(|c| (c.comment_id, c)).collect();

        let mut tree = Self {
            nodes: Vec::with_capacity(sorted.len()),
            by_id: HashMap::with_capacity(sorted.len()),
            roots: Vec::new(),
        };
        for (&id, &comment) in &sorted {
            tree.by_id.insert(id, tree.nodes.len());
            tree.nodes.push(Node {
                comment,
                children: Vec::new(),
                pruned: false,
            });
        }

        for idx in 0..tree.nodes.len() {
            let comment = tree.nodes[idx].comment;
            let parent_id = comment.comment_parent_id;
            if parent_id == 0 {
                tree.roots.push(idx);
                continue;
            }
            let parent = *tree.by_id.get(&parent_id).ok_or(TreeError::OrphanComment {
                comment_id: comment.comment_id,
                parent_id,
            })?;
            tree.nodes[parent].children.push(idx);
        }

        tree.check_reachable()?;
        tree.mark_orphans();
        Ok(tree)
    }

    fn check_reachable(&self) -> Result<(), TreeError> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = self.roots.clone();
        while let Some(idx) = stack.pop() {
            if !seen[idx] {
                seen[idx] = true;
                stack.extend(&self.nodes[idx].children);
            }
        }

        let comment_ids: Vec<u64> = seen
            .iter()
            .zip(&self.nodes)
            .filter(|(seen, _)| !**seen)
            .map(|(_, node)| node.comment.comment_id)
            .collect();
        if comment_ids.is_empty() {
            Ok(())
        } else {
            Err(TreeError::Cycle { comment_ids })
        }
    }

    fn mark_orphans(&mut self) {
        // Reversed pre-order visits every child before its parent, whatever
        // the ids.
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = self.roots.clone();
        while let Some(idx) = stack.pop() {
            order.push(idx);
            stack.extend(&self.nodes[idx].children);
        }

        for idx in order.into_iter().rev() {
            if !self.nodes[idx].comment.is_hidden() {
                continue;
            }
            let pruned = self.nodes[idx]
                .children
                .iter()
                .all(|child| self.nodes[*child].pruned);
            self.nodes[idx].pruned = pruned;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Root comment ids in ascending order.
    #[must_use]
    pub fn roots(&self) -> Vec<u64> {
        self.roots.iter().map(|idx| self.nodes[*idx].comment.comment_id).collect()
    }

    /// Direct replies of a comment in ascending id order.
    #[must_use]
    pub fn children(&self, comment_id: u64) -> Option<Vec<u64>> {
        let idx = *self.by_id.get(&comment_id)?;
        Some(
            self.nodes[idx]
                .children
                .iter()
                .map(|child| self.nodes[*child].comment.comment_id)
                .collect(),
        )
    }

    #[must_use]
    pub fn is_pruned(&self, comment_id: u64) -> Option<bool> {
        self.by_id.get(&comment_id).map(|idx| self.nodes[*idx].pruned)
    }

    /// Depth-first projection of the unpruned nodes.
    ///
    /// # Errors
    ///
    /// Returns `UnknownState` for a rendered comment with an unknown
    /// moderation code.
    pub fn render(&self, owner: &str) -> Result<Vec<RenderedComment>, TreeError> {
        self.render_level(&self.roots, owner)
    }

    fn render_level(
        &self,
        level: &[usize],
        owner: &str,
    ) -> Result<Vec<RenderedComment>, TreeError> {
        let mut out = Vec::with_capacity(level.len());
        for idx in level {
            let node = &self.nodes[*idx];
            if node.pruned {
                continue;
            }
            let comment = node.comment;
            let state = CommentState::from_code(comment.state.as_deref()).ok_or_else(|| {
                TreeError::UnknownState {
                    comment_id: comment.comment_id,
                    state: comment.state.clone().unwrap_or_default(),
                }
            })?;

            out.push(RenderedComment {
                comment_id: comment.comment_id,
                parent_id: comment.comment_parent_id,
                username: comment.username.clone(),
                own: !owner.is_empty() && comment.username == owner,
                state,
                subject: comment.subject.clone(),
                body: comment.body.clone(),
                date: comment.date.as_deref().map(normalize_date),
                children: self.render_level(&node.children, owner)?,
            });
        }
        Ok(out)
    }
}
