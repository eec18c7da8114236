//! The AST context: the exclusive owner of every node in one compilation.
//!
//! The context is an id-addressed arena. Inter-node links are weak in
//! ownership terms (plain [`NodeId`]s), so the cyclic parent/child structure
//! of an AST reduces to a table of nodes plus a reverse parent index that is
//! updated on insertion and replacement.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use stc_errors::transpile::{Error, Result};

use crate::node::{Node, NodeId, NodeKindTag};

/// The id-addressed arena owning all nodes of one compilation.
///
/// Ids are allocated monotonically starting at one; id zero is reserved so
/// that it can never name a live node. Concurrent compilations each own
/// their own context, and ids are never meaningful across contexts.
#[derive(Debug, Deserialize, Serialize)]
pub struct AstContext {
    /// The node table.
    nodes: HashMap<NodeId, Node>,

    /// The reverse index from each node to the node whose kind payload
    /// references it.
    parents: HashMap<NodeId, NodeId>,

    /// The next id to be allocated.
    next_id: NodeId,
}

impl AstContext {
    /// Creates a new, empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes:   HashMap::new(),
            parents: HashMap::new(),
            // Start our ids at one, as we have reserved zero.
            next_id: 1,
        }
    }

    /// Reserves the next node id.
    fn allocate_id(&mut self) -> NodeId {
        let allocated_id = self.next_id;
        self.next_id += 1;
        allocated_id
    }

    /// Inserts the provided `node` into the context, returning its id.
    ///
    /// Every child referenced by the node's kind payload is re-parented onto
    /// the new node, which is what keeps the reverse index correct when a
    /// pass builds a replacement around existing subtrees.
    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = self.allocate_id();
        for child in node.kind.children() {
            self.parents.insert(child, id);
        }
        self.nodes.insert(id, node);
        id
    }

    /// Returns `true` iff `id` names a live node in this context.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Gets the number of live nodes in the context.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` iff the context contains no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Retrieves the node named by `id`.
    ///
    /// # Panics
    ///
    /// Panics if the id does not name a live node. This is a programmer
    /// error.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes
            .get(&id)
            .expect("internal consistency error: node lookup with an unknown id!")
    }

    /// Retrieves the node named by `id` mutably.
    ///
    /// # Panics
    ///
    /// Panics if the id does not name a live node. This is a programmer
    /// error.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes
            .get_mut(&id)
            .expect("internal consistency error: node lookup with an unknown id!")
    }

    /// Gets the kind tag of the node named by `id`.
    ///
    /// # Panics
    ///
    /// Panics if the id does not name a live node. This is a programmer
    /// error.
    #[must_use]
    pub fn kind_tag(&self, id: NodeId) -> NodeKindTag {
        self.node(id).kind.tag()
    }

    /// Collects the child ids of the node named by `id` in source order.
    ///
    /// # Panics
    ///
    /// Panics if the id does not name a live node. This is a programmer
    /// error.
    #[must_use]
    pub fn children_of(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).kind.children()
    }

    /// Gets the parent of the node named by `id`, or [`None`] for roots.
    #[must_use]
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    /// Walks the parent chain of `id` until a node of the provided kind is
    /// found, returning its id, or [`None`] if no ancestor matches.
    #[must_use]
    pub fn closest_ancestor(&self, id: NodeId, tag: NodeKindTag) -> Option<NodeId> {
        let mut current = self.parent_of(id);
        while let Some(ancestor) = current {
            if self.kind_tag(ancestor) == tag {
                return Some(ancestor);
            }
            current = self.parent_of(ancestor);
        }
        None
    }

    /// Substitutes the subtree rooted at `old` with the already-inserted
    /// node `new` under `old`'s parent.
    ///
    /// On success: the parent's reference names `new`, `new` is parented
    /// under `old`'s former parent, and `old` is dropped from the context
    /// together with any descendants that `new` did not adopt. Surviving
    /// nodes keep their identities.
    ///
    /// # Errors
    ///
    /// - [`Error::AssertionFailure`] if `old` has no parent, or if the
    ///   parent's kind payload does not actually reference `old`. Both are
    ///   transpiler bugs.
    pub fn replace_node(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        let parent = self.parent_of(old).ok_or_else(|| {
            Error::AssertionFailure(format!(
                "cannot replace parentless node {}",
                self.describe(old)
            ))
        })?;

        if !self.node_mut(parent).kind.replace_child(old, new) {
            Err(Error::AssertionFailure(format!(
                "parent {} does not reference replaced child {}",
                self.describe(parent),
                self.describe(old)
            )))?;
        }

        self.parents.insert(new, parent);
        self.drop_orphaned(old);
        Ok(())
    }

    /// Drops `id` and every descendant that is still parented inside the
    /// dropped region.
    ///
    /// Children that a replacement node adopted were re-parented when the
    /// replacement was inserted, so the parent check is what distinguishes
    /// genuinely orphaned nodes from reused ones.
    fn drop_orphaned(&mut self, id: NodeId) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        self.parents.remove(&id);

        for child in node.kind.children() {
            if self.parents.get(&child) == Some(&id) {
                self.drop_orphaned(child);
            }
        }
    }

    /// Deep-clones the subtree rooted at `id`, returning the id of the
    /// clone's root. All nodes of the clone are fresh; no ids are shared
    /// with the original.
    ///
    /// # Panics
    ///
    /// Panics if the id does not name a live node. This is a programmer
    /// error.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let mut node = self.node(id).clone();
        for child in node.kind.children() {
            let copy = self.clone_subtree(child);
            node.kind.replace_child(child, copy);
        }
        self.insert(node)
    }

    /// Iterates over every live `(id, node)` pair in the context, in no
    /// particular order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    /// Re-registers the parent link of every child of `id`.
    ///
    /// Callers that edit a node's child lists in place (rather than through
    /// [`Self::replace_node`]) must call this afterwards to keep the reverse
    /// index correct.
    ///
    /// # Panics
    ///
    /// Panics if the id does not name a live node. This is a programmer
    /// error.
    pub fn reindex_children(&mut self, id: NodeId) {
        for child in self.children_of(id) {
            self.parents.insert(child, id);
        }
    }

    /// Drops the subtree rooted at `id` from the context.
    ///
    /// Descendants that another node has adopted since (and that are hence
    /// no longer parented inside the dropped region) survive.
    pub fn drop_subtree(&mut self, id: NodeId) {
        self.drop_orphaned(id);
    }

    /// Renders a short description of the node named by `id` for
    /// diagnostics, tolerating dropped ids.
    #[must_use]
    pub fn describe(&self, id: NodeId) -> String {
        match self.nodes.get(&id) {
            Some(node) => format!("{node} (id {id})"),
            None => format!("<dropped node> (id {id})"),
        }
    }
}

impl Default for AstContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use stc_errors::transpile::Error;

    use crate::{
        context::AstContext,
        node::{
            Assignment,
            Block,
            ExpressionStatement,
            Identifier,
            Literal,
            LiteralKind,
            Node,
            NodeKind,
            NodeKindTag,
        },
    };

    fn identifier(ctx: &mut AstContext, name: &str) -> usize {
        ctx.insert(Node::new(NodeKind::Identifier(Identifier {
            name: name.to_string(),
            referenced_declaration: None,
        })))
    }

    fn number(ctx: &mut AstContext, value: &str) -> usize {
        ctx.insert(Node::new(NodeKind::Literal(Literal {
            kind:      LiteralKind::Number,
            value:     value.to_string(),
            hex_value: String::new(),
        })))
    }

    /// Builds `{ x = 5; }` and returns (block, statement, assignment, x, 5).
    fn simple_block(ctx: &mut AstContext) -> (usize, usize, usize, usize, usize) {
        let x = identifier(ctx, "x");
        let five = number(ctx, "5");
        let assign = ctx.insert(Node::new(NodeKind::Assignment(Assignment {
            operator: "=".to_string(),
            lhs:      x,
            rhs:      five,
        })));
        let stmt = ctx.insert(Node::new(NodeKind::ExpressionStatement(
            ExpressionStatement { expression: assign },
        )));
        let block = ctx.insert(Node::new(NodeKind::Block(Block {
            statements: vec![stmt],
        })));
        (block, stmt, assign, x, five)
    }

    #[test]
    fn ids_are_monotonic_and_nonzero() {
        let mut ctx = AstContext::new();
        let a = identifier(&mut ctx, "a");
        let b = identifier(&mut ctx, "b");
        assert!(a >= 1);
        assert!(b > a);
    }

    #[test]
    fn insertion_indexes_parents() {
        let mut ctx = AstContext::new();
        let (block, stmt, assign, x, five) = simple_block(&mut ctx);

        assert_eq!(ctx.parent_of(x), Some(assign));
        assert_eq!(ctx.parent_of(five), Some(assign));
        assert_eq!(ctx.parent_of(assign), Some(stmt));
        assert_eq!(ctx.parent_of(stmt), Some(block));
        assert_eq!(ctx.parent_of(block), None);
    }

    #[test]
    fn closest_ancestor_walks_the_parent_chain() {
        let mut ctx = AstContext::new();
        let (block, _, _, x, _) = simple_block(&mut ctx);

        assert_eq!(ctx.closest_ancestor(x, NodeKindTag::Block), Some(block));
        assert_eq!(ctx.closest_ancestor(x, NodeKindTag::SourceUnit), None);
        assert_eq!(ctx.closest_ancestor(block, NodeKindTag::Block), None);
    }

    #[test]
    fn replacement_rewires_parent_and_drops_orphans() {
        let mut ctx = AstContext::new();
        let (_, stmt, assign, x, five) = simple_block(&mut ctx);

        // Replace the assignment with a bare literal; the old RHS is adopted
        // by nothing, so the whole assignment subtree must be dropped.
        let replacement = number(&mut ctx, "1");
        ctx.replace_node(assign, replacement).unwrap();

        assert_eq!(ctx.children_of(stmt), vec![replacement]);
        assert_eq!(ctx.parent_of(replacement), Some(stmt));
        assert!(!ctx.contains(assign));
        assert!(!ctx.contains(x));
        assert!(!ctx.contains(five));
    }

    #[test]
    fn replacement_keeps_adopted_children_alive() {
        let mut ctx = AstContext::new();
        let (_, stmt, assign, x, five) = simple_block(&mut ctx);

        // Wrap the old RHS in a replacement expression. Inserting the
        // replacement re-parents the RHS, so only the assignment and its
        // orphaned LHS may be dropped.
        let callee = identifier(&mut ctx, "storageWrite");
        let call = ctx.insert(Node::new(NodeKind::FunctionCall(
            crate::node::FunctionCall {
                callee,
                arguments: vec![five],
            },
        )));
        ctx.replace_node(assign, call).unwrap();

        assert_eq!(ctx.children_of(stmt), vec![call]);
        assert!(ctx.contains(five));
        assert_eq!(ctx.parent_of(five), Some(call));
        assert!(!ctx.contains(assign));
        assert!(!ctx.contains(x));
    }

    #[test]
    fn replacing_a_root_is_an_assertion_failure() {
        let mut ctx = AstContext::new();
        let (block, ..) = simple_block(&mut ctx);
        let replacement = number(&mut ctx, "1");

        let result = ctx.replace_node(block, replacement);
        assert!(matches!(result, Err(Error::AssertionFailure(_))));
    }

    #[test]
    fn clone_subtree_shares_no_ids() {
        let mut ctx = AstContext::new();
        let (_, _, assign, x, five) = simple_block(&mut ctx);

        let copy = ctx.clone_subtree(assign);
        assert_ne!(copy, assign);

        let copy_children = ctx.children_of(copy);
        assert_eq!(copy_children.len(), 2);
        assert!(!copy_children.contains(&x));
        assert!(!copy_children.contains(&five));

        // The original is untouched.
        assert_eq!(ctx.children_of(assign), vec![x, five]);
    }
}
