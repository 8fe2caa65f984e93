//! The variation tree: every position reached in the session, with a
//! current-node pointer the board display follows.
//!
//! Nodes live in an arena with a free list; handles carry a generation so a
//! handle to a deleted node can never resurrect whatever reuses its slot.
//! Each structural change bumps a version counter, which is what redraw
//! logic compares instead of subscribing to individual mutations. Methods
//! that move the current pointer return whether it actually moved.

use tracing::debug;

use crate::rules::{pgn, Move, Position, RulesError};

// ---------------------------------------------------------------------------
// NodeId
// ---------------------------------------------------------------------------

/// Handle to a tree node. Stale handles (to deleted nodes) are detected by
/// the generation check and treated as absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

// ---------------------------------------------------------------------------
// Node / arena plumbing
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct Node {
    position: Position,
    /// The move that produced this position; `None` only at the root.
    mv: Option<Move>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Tree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    current: NodeId,
    version: u64,
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new(Position::starting())
    }
}

impl Tree {
    /// Build a tree whose root holds the given position.
    pub fn new(root_position: Position) -> Self {
        let root = NodeId {
            index: 0,
            generation: 0,
        };
        Tree {
            slots: vec![Slot {
                generation: 0,
                node: Some(Node {
                    position: root_position,
                    mv: None,
                    parent: None,
                    children: Vec::new(),
                }),
            }],
            free: Vec::new(),
            root,
            current: root,
            version: 0,
        }
    }

    /// Build a tree rooted at a FEN position.
    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        Ok(Tree::new(Position::from_fen(fen)?))
    }

    /// Import a PGN game as a tree: one line from the standard starting
    /// position, with the current node at its end.
    pub fn from_pgn(text: &str) -> Result<Self, RulesError> {
        let game = pgn::import(text)?;
        let mut tree = Tree::default();
        tree.make_move_sequence(&game.moves);
        Ok(tree)
    }

    /// Throw the whole tree away and start over from a new root position.
    /// The current pointer moves to the new root.
    pub fn replace_root(&mut self, root_position: Position) {
        let version = self.version + 1;
        *self = Tree::new(root_position);
        self.version = version;
    }

    // -- accessors ----------------------------------------------------------

    #[inline]
    pub fn root_id(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn current_id(&self) -> NodeId {
        self.current
    }

    /// Monotonic structure counter; compare against a saved value to decide
    /// whether a cached rendering of the tree is stale.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    fn get(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn position(&self, id: NodeId) -> Option<&Position> {
        self.get(id).map(|n| &n.position)
    }

    /// The position at the current node.
    pub fn current_position(&self) -> &Position {
        // The current pointer is maintained by every mutator; it always
        // addresses a live node.
        &self
            .get(self.current)
            .unwrap_or_else(|| unreachable!("current node is live"))
            .position
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.get(id).map(|n| n.children.clone()).unwrap_or_default()
    }

    /// The move that produced this node's position (`None` at the root).
    pub fn produced_by(&self, id: NodeId) -> Option<Move> {
        self.get(id).and_then(|n| n.mv)
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    /// The moves leading from the root to `id`.
    pub fn history(&self, id: NodeId) -> Vec<Move> {
        let mut list = Vec::new();
        let mut walk = id;
        while let Some(node) = self.get(walk) {
            if let Some(mv) = node.mv {
                list.push(mv);
            }
            match node.parent {
                Some(p) => walk = p,
                None => break,
            }
        }
        list.reverse();
        list
    }

    /// Follow first children from `id` to the end of its line.
    pub fn line_end(&self, id: NodeId) -> NodeId {
        let mut walk = id;
        while let Some(&first) = self.get(walk).and_then(|n| n.children.first()) {
            walk = first;
        }
        walk
    }

    /// The root position's FEN, as needed for the engine's
    /// `position fen ... moves ...` command.
    pub fn root_fen(&self) -> String {
        self.position(self.root)
            .map(Position::to_fen)
            .unwrap_or_default()
    }

    /// Whether `id` lies on the main line, i.e. every ancestor step down to
    /// it goes through a first child.
    pub fn is_main_line(&self, id: NodeId) -> bool {
        let mut walk = id;
        while let Some(parent) = self.parent(walk) {
            if self.get(parent).and_then(|n| n.children.first()) != Some(&walk) {
                return false;
            }
            walk = parent;
        }
        self.contains(id) && walk == self.root
    }

    /// Whether `id` lies on the line through the current node (from the
    /// root to the end of the current node's line).
    pub fn is_on_current_line(&self, id: NodeId) -> bool {
        let mut walk = self.line_end(self.current);
        loop {
            if walk == id {
                return true;
            }
            match self.parent(walk) {
                Some(p) => walk = p,
                None => return false,
            }
        }
    }

    /// The child of the current node reached by `mv`, if one exists.
    pub fn child_by_move(&self, mv: Move) -> Option<NodeId> {
        self.get(self.current)?
            .children
            .iter()
            .copied()
            .find(|&c| self.get(c).and_then(|n| n.mv) == Some(mv))
    }

    // -- allocation ---------------------------------------------------------

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    /// Free `id` and everything below it. Does not touch the parent's child
    /// list; callers detach first.
    fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(slot) = self.slots.get_mut(next.index as usize) else {
                continue;
            };
            if slot.generation != next.generation {
                continue;
            }
            if let Some(node) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(next.index);
                stack.extend(node.children);
            }
        }
    }

    /// Remove `id` from its parent's child list and free its subtree.
    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            if let Some(node) = self.get_mut(parent) {
                node.children.retain(|&c| c != id);
            }
        }
        self.free_subtree(id);
    }

    // -- move making --------------------------------------------------------

    /// Play `mv` from the current node and advance to the resulting node.
    /// If the current node already has a child reached by the same move,
    /// that child is reused and no structure changes; otherwise a node is
    /// created and the version bumps. The move is trusted to be legal.
    pub fn apply_move_from_current(&mut self, mv: Move) -> NodeId {
        if let Some(existing) = self.child_by_move(mv) {
            self.current = existing;
            return existing;
        }
        let child = self.spawn_child(self.current, mv);
        self.version += 1;
        self.current = child;
        debug!(mv = %mv, "new tree node");
        child
    }

    /// Like [`Self::apply_move_from_current`], but always creates a fresh
    /// child even when one reached by the same move exists.
    pub fn apply_move_from_current_forced(&mut self, mv: Move) -> NodeId {
        let child = self.spawn_child(self.current, mv);
        self.version += 1;
        self.current = child;
        child
    }

    fn spawn_child(&mut self, parent: NodeId, mv: Move) -> NodeId {
        let position = self
            .get(parent)
            .map(|n| n.position.apply(mv))
            .unwrap_or_else(|| unreachable!("parent node is live"));
        let child = self.alloc(Node {
            position,
            mv: Some(mv),
            parent: Some(parent),
            children: Vec::new(),
        });
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
        child
    }

    /// Play a whole sequence from the current node, advancing to its end.
    /// Existing children are reused move by move; the version bumps at most
    /// once no matter how many nodes are created. Returns whether the
    /// current pointer moved.
    pub fn make_move_sequence(&mut self, moves: &[Move]) -> bool {
        if moves.is_empty() {
            return false;
        }
        let before = self.version;
        let start = self.current;
        for &mv in moves {
            self.apply_move_from_current(mv);
        }
        if self.version != before {
            self.version = before + 1;
        }
        self.current != start
    }

    // -- navigation ---------------------------------------------------------

    /// Move the current pointer to `id`. No-op on a stale handle or when
    /// already there.
    pub fn set_current(&mut self, id: NodeId) -> bool {
        if self.contains(id) && id != self.current {
            self.current = id;
            true
        } else {
            false
        }
    }

    /// Step to the parent.
    pub fn prev(&mut self) -> bool {
        match self.parent(self.current) {
            Some(p) => {
                self.current = p;
                true
            }
            None => false,
        }
    }

    /// Step to the first child.
    pub fn next(&mut self) -> bool {
        match self.get(self.current).and_then(|n| n.children.first().copied()) {
            Some(c) => {
                self.current = c;
                true
            }
            None => false,
        }
    }

    pub fn goto_root(&mut self) -> bool {
        self.set_current(self.root)
    }

    /// Jump to the end of the current line.
    pub fn goto_end(&mut self) -> bool {
        let end = self.line_end(self.current);
        self.set_current(end)
    }

    /// Return to the main line: follow it from the root for as long as it
    /// agrees with the current node's history, stopping at the divergence.
    pub fn return_to_main_line(&mut self) -> bool {
        let main_line = self.history(self.line_end(self.root));
        let history = self.history(self.current);

        let mut node = self.root;
        for (n, &mv) in history.iter().enumerate() {
            if main_line.get(n) != Some(&mv) {
                break;
            }
            match self.get(node).and_then(|nd| nd.children.first().copied()) {
                Some(first) => node = first,
                None => break,
            }
        }
        self.set_current(node)
    }

    // -- deletion and reordering --------------------------------------------

    /// Delete the current node and its subtree, moving to the parent. At
    /// the root there is no node to delete, so only the root's children go
    /// and the current pointer stays put (returns false).
    pub fn delete_current_subtree(&mut self) -> bool {
        if self.current == self.root {
            self.delete_children();
            return false;
        }
        let parent = self
            .parent(self.current)
            .unwrap_or_else(|| unreachable!("non-root node has a parent"));
        self.detach(self.current);
        self.current = parent;
        self.version += 1;
        true
    }

    /// Delete every child of the current node.
    pub fn delete_children(&mut self) {
        let children = self.children(self.current);
        if !children.is_empty() {
            for child in children {
                self.detach(child);
            }
            self.version += 1;
        }
    }

    /// Delete every sibling of the current node (and their subtrees).
    pub fn delete_siblings(&mut self) {
        let Some(parent) = self.parent(self.current) else {
            return;
        };
        let mut changed = false;
        for sibling in self.children(parent) {
            if sibling != self.current {
                self.detach(sibling);
                changed = true;
            }
        }
        if changed {
            self.version += 1;
        }
    }

    /// Make the current node's line the main line: walking up from the
    /// current node, any ancestor that is not its parent's first child is
    /// swapped with whoever is. The current pointer does not move; returns
    /// whether anything changed.
    pub fn promote_current_to_main_line(&mut self) -> bool {
        let mut node = self.current;
        let mut changed = false;

        while let Some(parent) = self.parent(node) {
            if let Some(p) = self.get_mut(parent) {
                if p.children.first() != Some(&node) {
                    if let Some(i) = p.children.iter().position(|&c| c == node) {
                        p.children.swap(0, i);
                    }
                    changed = true;
                }
            }
            node = parent;
        }

        if changed {
            self.version += 1;
        }
        changed
    }

    /// Keep only the main line: promote the current line, then cut every
    /// branch off it. Afterwards the tree is a single chain from the root
    /// through the current node to its line's end.
    pub fn delete_other_lines(&mut self) -> bool {
        let promoted = self.promote_current_to_main_line();
        let mut trimmed = false;
        let mut node = self.root;
        loop {
            let children = self.children(node);
            if children.is_empty() {
                break;
            }
            for &extra in &children[1..] {
                self.detach(extra);
                trimmed = true;
            }
            node = children[0];
        }
        if trimmed {
            self.version += 1;
        }
        promoted || trimmed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Move;

    fn mv(s: &str) -> Move {
        Move::from_uci(s).unwrap()
    }

    fn seq(tree: &mut Tree, moves: &[&str]) {
        for s in moves {
            tree.apply_move_from_current(mv(s));
        }
    }

    #[test]
    fn root_starts_current() {
        let tree = Tree::default();
        assert_eq!(tree.current_id(), tree.root_id());
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.version(), 0);
        assert_eq!(tree.produced_by(tree.root_id()), None);
    }

    #[test]
    fn moves_grow_the_tree_and_advance() {
        let mut tree = Tree::default();
        let a = tree.apply_move_from_current(mv("e2e4"));
        assert_eq!(tree.current_id(), a);
        assert_eq!(tree.node_count(), 2);
        assert_eq!(tree.version(), 1);
        assert_eq!(tree.produced_by(a), Some(mv("e2e4")));
        assert_eq!(
            tree.current_position().to_fen(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );
    }

    #[test]
    fn repeating_a_move_reuses_the_child() {
        let mut tree = Tree::default();
        let a = tree.apply_move_from_current(mv("e2e4"));
        tree.prev();
        let b = tree.apply_move_from_current(mv("e2e4"));
        assert_eq!(a, b);
        assert_eq!(tree.node_count(), 2);
        assert_eq!(tree.version(), 1);
    }

    #[test]
    fn sibling_moves_branch() {
        let mut tree = Tree::default();
        tree.apply_move_from_current(mv("e2e4"));
        tree.prev();
        tree.apply_move_from_current(mv("d2d4"));
        assert_eq!(tree.children(tree.root_id()).len(), 2);
        assert_eq!(tree.node_count(), 3);
    }

    #[test]
    fn navigation_steps() {
        let mut tree = Tree::default();
        seq(&mut tree, &["e2e4", "e7e5", "g1f3"]);
        assert!(tree.prev());
        assert!(tree.prev());
        assert!(tree.next());
        assert_eq!(tree.history(tree.current_id()), vec![mv("e2e4"), mv("e7e5")]);
        assert!(tree.goto_root());
        assert!(!tree.prev());
        assert!(tree.goto_end());
        assert_eq!(tree.history(tree.current_id()).len(), 3);
        assert!(!tree.next());
        assert!(!tree.goto_end());
    }

    #[test]
    fn make_move_sequence_bumps_version_once() {
        let mut tree = Tree::default();
        let before = tree.version();
        assert!(tree.make_move_sequence(&[mv("e2e4"), mv("e7e5"), mv("g1f3")]));
        assert_eq!(tree.version(), before + 1);
        assert_eq!(tree.node_count(), 4);
        assert!(!tree.make_move_sequence(&[]));
    }

    #[test]
    fn set_current_rejects_stale_handles() {
        let mut tree = Tree::default();
        let a = tree.apply_move_from_current(mv("e2e4"));
        tree.delete_current_subtree();
        assert!(!tree.contains(a));
        assert!(!tree.set_current(a));
        assert_eq!(tree.current_id(), tree.root_id());
    }

    #[test]
    fn slot_reuse_does_not_resurrect_old_handles() {
        let mut tree = Tree::default();
        let a = tree.apply_move_from_current(mv("e2e4"));
        tree.delete_current_subtree();
        let b = tree.apply_move_from_current(mv("d2d4"));
        // The new node reuses the freed slot but the old handle stays dead.
        assert!(tree.contains(b));
        assert!(!tree.contains(a));
        assert_ne!(a, b);
    }

    #[test]
    fn delete_at_root_clears_children_only() {
        let mut tree = Tree::default();
        seq(&mut tree, &["e2e4", "e7e5"]);
        tree.goto_root();
        assert!(!tree.delete_current_subtree());
        assert_eq!(tree.current_id(), tree.root_id());
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn delete_subtree_moves_to_parent() {
        let mut tree = Tree::default();
        seq(&mut tree, &["e2e4", "e7e5", "g1f3"]);
        tree.prev();
        let v = tree.version();
        assert!(tree.delete_current_subtree());
        // e7e5 and g1f3 both gone.
        assert_eq!(tree.node_count(), 2);
        assert_eq!(tree.history(tree.current_id()), vec![mv("e2e4")]);
        assert_eq!(tree.version(), v + 1);
    }

    #[test]
    fn delete_siblings_keeps_own_line() {
        let mut tree = Tree::default();
        tree.apply_move_from_current(mv("e2e4"));
        tree.prev();
        tree.apply_move_from_current(mv("d2d4"));
        tree.prev();
        let c = tree.apply_move_from_current(mv("c2c4"));
        tree.delete_siblings();
        assert_eq!(tree.node_count(), 2);
        assert_eq!(tree.children(tree.root_id()), vec![c]);
    }

    #[test]
    fn promote_swaps_into_first_place() {
        let mut tree = Tree::default();
        let e4 = tree.apply_move_from_current(mv("e2e4"));
        tree.goto_root();
        let d4 = tree.apply_move_from_current(mv("d2d4"));
        tree.apply_move_from_current(mv("d7d5"));

        assert!(tree.promote_current_to_main_line());
        assert_eq!(tree.children(tree.root_id()), vec![d4, e4]);
        // Already main line: nothing to do.
        assert!(!tree.promote_current_to_main_line());
    }

    #[test]
    fn return_to_main_line_stops_at_divergence() {
        let mut tree = Tree::default();
        // Main line: e4 e5. Variation: e4 c5 Nf3.
        seq(&mut tree, &["e2e4", "e7e5"]);
        tree.prev();
        tree.prev();
        tree.next(); // at e4
        seq(&mut tree, &["c7c5", "g1f3"]);

        // The variation was added after e5, so e5 is still children[0].
        assert!(tree.return_to_main_line());
        assert_eq!(tree.history(tree.current_id()), vec![mv("e2e4")]);
    }

    #[test]
    fn delete_other_lines_leaves_a_chain() {
        let mut tree = Tree::default();
        // Build a few branches, then stand inside a variation.
        seq(&mut tree, &["e2e4", "e7e5", "g1f3"]);
        tree.goto_root();
        seq(&mut tree, &["d2d4", "d7d5"]);
        tree.prev();
        tree.apply_move_from_current(mv("g8f6"));

        assert!(tree.delete_other_lines());
        // A single chain: root, d4, Nf6.
        let depth = tree.history(tree.current_id()).len();
        assert_eq!(tree.node_count(), depth + 1);
        assert_eq!(tree.line_end(tree.root_id()), tree.current_id());
        assert_eq!(tree.children(tree.root_id()).len(), 1);
    }

    #[test]
    fn replace_root_resets_but_keeps_counting() {
        let mut tree = Tree::default();
        seq(&mut tree, &["e2e4", "e7e5"]);
        let v = tree.version();
        tree.replace_root(Position::starting());
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.current_id(), tree.root_id());
        assert_eq!(tree.version(), v + 1);
    }

    #[test]
    fn forced_moves_duplicate_deliberately() {
        let mut tree = Tree::default();
        let a = tree.apply_move_from_current(mv("e2e4"));
        tree.prev();
        let b = tree.apply_move_from_current_forced(mv("e2e4"));
        assert_ne!(a, b);
        assert_eq!(tree.children(tree.root_id()).len(), 2);
        assert_eq!(tree.current_id(), b);
    }

    #[test]
    fn from_fen_and_root_fen() {
        let fen = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1";
        let mut tree = Tree::from_fen(fen).unwrap();
        assert_eq!(tree.root_fen(), fen);
        tree.apply_move_from_current(mv("e1g1"));
        assert_eq!(tree.root_fen(), fen);
        assert!(Tree::from_fen("nonsense").is_err());
    }

    #[test]
    fn from_pgn_builds_a_line() {
        let tree = Tree::from_pgn("1. e4 e5 2. Nf3 1-0").unwrap();
        assert_eq!(tree.node_count(), 4);
        assert_eq!(tree.history(tree.current_id()).len(), 3);
        assert_eq!(tree.line_end(tree.root_id()), tree.current_id());
        assert!(Tree::from_pgn("1. banana").is_err());
    }

    #[test]
    fn main_line_and_current_line_queries() {
        let mut tree = Tree::default();
        let e4 = tree.apply_move_from_current(mv("e2e4"));
        let e5 = tree.apply_move_from_current(mv("e7e5"));
        tree.prev();
        let c5 = tree.apply_move_from_current(mv("c7c5"));

        assert!(tree.is_main_line(tree.root_id()));
        assert!(tree.is_main_line(e4));
        assert!(tree.is_main_line(e5));
        assert!(!tree.is_main_line(c5));

        // Current is c5: root and e4 share its line, e5 does not.
        assert!(tree.is_on_current_line(tree.root_id()));
        assert!(tree.is_on_current_line(e4));
        assert!(tree.is_on_current_line(c5));
        assert!(!tree.is_on_current_line(e5));
    }

    #[test]
    fn child_by_move_lookup() {
        let mut tree = Tree::default();
        let e4 = tree.apply_move_from_current(mv("e2e4"));
        tree.prev();
        assert_eq!(tree.child_by_move(mv("e2e4")), Some(e4));
        assert_eq!(tree.child_by_move(mv("d2d4")), None);
    }
}
