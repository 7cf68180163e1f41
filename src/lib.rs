//! A suffix tree over a single string, built with Ukkonen's algorithm.
//!
//! The tree indexes every suffix of the input in O(n) time and space. A
//! unique terminator symbol is appended to the input so that no suffix is a
//! prefix of another, which guarantees that every suffix ends at a distinct
//! leaf. The finished tree is immutable and supports substring-existence
//! queries, suffix checks, suffix enumeration and longest-repeated-substring
//! extraction.
//!
//! # Examples
//!
//! ```
//! use suffix_tree::SuffixTree;
//! let tree = SuffixTree::build("abab").unwrap();
//! assert!(tree.contains("bab"));
//! assert!(!tree.contains("baba"));
//! let suffixes: Vec<String> = tree.suffixes().collect();
//! assert_eq!(suffixes, ["$", "ab$", "abab$", "b$", "bab$"]);
//! ```

use std::collections::BTreeMap;

use log::{debug, trace};
use thiserror::Error;

type NodeId = usize;

// The root is always the first node in the arena. It has no incoming edge;
// its start/end fields are sentinels and are never read as a real edge.
const ROOT: NodeId = 0;

/// Terminator symbol appended to every input string. Inputs containing this
/// byte are rejected by [`SuffixTree::build`] before construction starts.
pub const TERMINATOR: u8 = b'$';

/// Errors surfaced by suffix-tree construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The input contains the reserved terminator symbol.
    #[error("input contains reserved symbol {0:?} at byte {1}")]
    ReservedSymbol(char, usize),

    /// An internal construction invariant was broken. This indicates a bug
    /// in the builder, not a recoverable runtime condition; there is no
    /// transient-failure class and nothing to retry.
    #[error("construction invariant violated: {0}")]
    ConstructionInvariantViolation(&'static str),
}

/// End index (exclusive) of the edge leading into a node.
///
/// Leaves stay `Open` and resolve their effective end against the
/// construction-wide leaf-end marker, so one marker advance per phase
/// extends every leaf edge at once without revisiting them. Internal nodes
/// are `Closed` with a fixed end the moment a split creates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeEnd {
    Open,
    Closed(usize),
}

/// A node in the tree. The edge from the parent is stored on the child as a
/// `(start, end)` slice into the text, so there is no explicit edge type.
#[derive(Debug)]
struct Node {
    /// Child nodes keyed by the first symbol of their incoming edge. At most
    /// one child per distinct starting symbol; `BTreeMap` keeps iteration
    /// order lexicographic so traversal output is reproducible.
    children: BTreeMap<u8, NodeId>,

    /// Start index (inclusive) into the text of the incoming edge label.
    start: usize,

    /// End index (exclusive) of the incoming edge label.
    end: EdgeEnd,

    /// Link to the internal node representing the same string with its first
    /// symbol removed. Auxiliary navigation only, set during construction;
    /// never part of the ownership structure.
    suffix_link: Option<NodeId>,
}

impl Node {
    fn new(start: usize, end: EdgeEnd) -> Self {
        Self {
            children: BTreeMap::new(),
            start,
            end,
            suffix_link: None,
        }
    }

    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// The construction cursor: where the next suffix gets inserted.
struct ActivePoint {
    node: NodeId,

    /// Text index of the first symbol on the active edge. Only meaningful
    /// while `length > 0`.
    edge: usize,

    length: usize,
}

/// Transient construction state for Ukkonen's algorithm. Consumed by
/// [`Builder::run`]; the active point, remaining-suffix counter and leaf-end
/// marker are discarded once the tree is complete.
struct Builder {
    text: Vec<u8>,
    nodes: Vec<Node>,
    active: ActivePoint,

    /// Suffixes not yet guaranteed a path of their own in the current phase.
    remaining: usize,

    /// Shared end (exclusive) of every open leaf edge; advanced once per
    /// phase.
    leaf_end: usize,

    /// Internal node created earlier in the current phase whose suffix link
    /// is still unset.
    pending_link: Option<NodeId>,
}

impl Builder {
    fn new(input: &[u8]) -> Self {
        let mut text = Vec::with_capacity(input.len() + 1);
        text.extend_from_slice(input);
        text.push(TERMINATOR);

        Self {
            text,
            nodes: vec![Node::new(0, EdgeEnd::Closed(0))],
            active: ActivePoint {
                node: ROOT,
                edge: 0,
                length: 0,
            },
            remaining: 0,
            leaf_end: 0,
            pending_link: None,
        }
    }

    fn run(mut self) -> Result<SuffixTree, Error> {
        for i in 0..self.text.len() {
            self.extend(i)?;
        }
        debug!(
            "suffix tree built: {} symbols, {} nodes",
            self.text.len(),
            self.nodes.len()
        );
        Ok(SuffixTree {
            text: self.text,
            nodes: self.nodes,
        })
    }

    /// Phase `i` of the construction: fold the symbol at position `i` into
    /// the tree so that afterwards every suffix of `text[..=i]` has a path
    /// from the root.
    fn extend(&mut self, i: usize) -> Result<(), Error> {
        // Rule 1: advancing the shared marker extends all open leaf edges
        // by the new symbol at zero cost.
        self.leaf_end = i + 1;
        self.remaining += 1;
        self.pending_link = None;
        trace!("phase {}: {} pending suffixes", i, self.remaining);

        while self.remaining > 0 {
            if self.active.length == 0 {
                self.active.edge = i;
            }
            let edge_symbol = self.symbol_at(self.active.edge)?;

            match self.nodes[self.active.node].children.get(&edge_symbol) {
                None => {
                    // Rule 2: no edge starts with this symbol, grow a leaf.
                    let leaf = self.new_node(i, EdgeEnd::Open);
                    self.nodes[self.active.node].children.insert(edge_symbol, leaf);
                    self.resolve_pending_link(self.active.node);
                }
                Some(&next) => {
                    let edge_len = self.edge_length(next);
                    if self.active.length >= edge_len {
                        // The active point lies beyond this edge; walk down
                        // without consuming a pending suffix.
                        self.active.edge += edge_len;
                        self.active.length -= edge_len;
                        self.active.node = next;
                        continue;
                    }

                    if self.symbol_at(self.nodes[next].start + self.active.length)?
                        == self.text[i]
                    {
                        // Rule 3: the extension already exists in the tree,
                        // and so do all shorter suffixes of this phase.
                        self.active.length += 1;
                        self.resolve_pending_link(self.active.node);
                        break;
                    }

                    // Rule 2: mismatch inside the edge, split it.
                    let split = self.split_edge(next, edge_symbol, i);
                    self.resolve_pending_link(split);
                    self.pending_link = Some(split);
                }
            }

            self.remaining -= 1;

            if self.active.node == ROOT && self.active.length > 0 {
                self.active.length -= 1;
                self.active.edge = i - self.remaining + 1;
            } else if self.active.node != ROOT {
                self.active.node = self.nodes[self.active.node].suffix_link.ok_or(
                    Error::ConstructionInvariantViolation(
                        "active node has no suffix link to follow",
                    ),
                )?;
            }
        }
        Ok(())
    }

    /// Splits the edge into `next` at the active length. A new internal node
    /// takes over the matched prefix of the edge, `next` keeps the
    /// remainder, and a new leaf for position `i` hangs off the internal
    /// node.
    fn split_edge(&mut self, next: NodeId, edge_symbol: u8, i: usize) -> NodeId {
        let next_start = self.nodes[next].start;
        let split_at = next_start + self.active.length;

        let split = self.new_node(next_start, EdgeEnd::Closed(split_at));
        self.nodes[next].start = split_at;
        let remainder_symbol = self.text[split_at];
        self.nodes[split].children.insert(remainder_symbol, next);

        let leaf = self.new_node(i, EdgeEnd::Open);
        self.nodes[split].children.insert(self.text[i], leaf);

        self.nodes[self.active.node].children.insert(edge_symbol, split);
        split
    }

    fn resolve_pending_link(&mut self, target: NodeId) {
        if let Some(pending) = self.pending_link.take() {
            self.nodes[pending].suffix_link = Some(target);
        }
    }

    fn new_node(&mut self, start: usize, end: EdgeEnd) -> NodeId {
        self.nodes.push(Node::new(start, end));
        self.nodes.len() - 1
    }

    fn edge_length(&self, node: NodeId) -> usize {
        let n = &self.nodes[node];
        match n.end {
            EdgeEnd::Closed(end) => end - n.start,
            EdgeEnd::Open => self.leaf_end - n.start,
        }
    }

    fn symbol_at(&self, index: usize) -> Result<u8, Error> {
        self.text.get(index).copied().ok_or(
            Error::ConstructionInvariantViolation("edge walk indexed past the end of the text"),
        )
    }
}

/// An immutable suffix tree over a single string.
///
/// Built once by [`SuffixTree::build`]; after that the structure is
/// read-only and may be shared across threads for concurrent queries.
#[derive(Debug)]
pub struct SuffixTree {
    /// Input bytes plus the appended terminator.
    text: Vec<u8>,
    nodes: Vec<Node>,
}

impl SuffixTree {
    /// Builds the suffix tree for `text`.
    ///
    /// The empty string is valid and yields a tree whose only suffix is the
    /// terminator. Fails with [`Error::ReservedSymbol`] if the input
    /// contains the terminator byte.
    pub fn build(text: &str) -> Result<Self, Error> {
        if let Some(pos) = text.bytes().position(|b| b == TERMINATOR) {
            return Err(Error::ReservedSymbol(TERMINATOR as char, pos));
        }
        Builder::new(text.as_bytes()).run()
    }

    /// Checks whether `pattern` occurs as a substring of the input.
    ///
    /// The empty pattern is a substring of everything. Patterns containing
    /// the reserved terminator symbol never match; the terminator is not
    /// part of the indexed alphabet.
    #[must_use]
    pub fn contains(&self, pattern: &str) -> bool {
        let pattern = pattern.as_bytes();
        if pattern.contains(&TERMINATOR) {
            return false;
        }
        self.walk(pattern).is_some()
    }

    /// Checks whether `pattern` is a complete suffix of the input.
    #[must_use]
    pub fn is_suffix(&self, pattern: &str) -> bool {
        let pattern = pattern.as_bytes();
        if pattern.contains(&TERMINATOR) {
            return false;
        }
        match self.walk(pattern) {
            // The pattern ended exactly at a node; it is a suffix iff the
            // terminator hangs directly below.
            Some((node, 0)) => self.nodes[node].children.contains_key(&TERMINATOR),
            // The pattern ended inside an edge; the next symbol on the edge
            // must be the terminator.
            Some((node, offset)) => self.text[self.nodes[node].start + offset] == TERMINATOR,
            None => false,
        }
    }

    /// Returns a lazy iterator over all suffixes of the input (terminator
    /// included), one per leaf, in lexicographic order. Calling this again
    /// restarts the enumeration.
    #[must_use]
    pub fn suffixes(&self) -> Suffixes<'_> {
        let mut stack = Vec::new();
        for &child in self.nodes[ROOT].children.values().rev() {
            stack.push((child, 0));
        }
        Suffixes {
            tree: self,
            stack,
            label: Vec::new(),
        }
    }

    /// Returns the longest substring that occurs at least twice in the
    /// input, or the empty string if there is no repeat.
    ///
    /// Every internal node spells a repeated substring (it has at least two
    /// leaves below it), so this is the deepest internal node by string
    /// depth.
    #[must_use]
    pub fn longest_repeated_substring(&self) -> String {
        let mut label = Vec::new();
        let mut best = Vec::new();
        self.deepest_internal(ROOT, &mut label, &mut best);
        String::from_utf8_lossy(&best).into_owned()
    }

    fn deepest_internal(&self, node: NodeId, label: &mut Vec<u8>, best: &mut Vec<u8>) {
        for &child in self.nodes[node].children.values() {
            if self.nodes[child].is_leaf() {
                continue;
            }
            let start = self.nodes[child].start;
            let end = self.edge_end(child);
            label.extend_from_slice(&self.text[start..end]);
            if label.len() > best.len() {
                best.clear();
                best.extend_from_slice(label);
            }
            self.deepest_internal(child, label, best);
            label.truncate(label.len() - (end - start));
        }
    }

    /// Prints an indented dump of the tree's edge labels for diagnostics.
    pub fn pretty_print(&self) {
        self.print_recursive(ROOT, 0);
    }

    fn print_recursive(&self, node: NodeId, indent: usize) {
        for &child in self.nodes[node].children.values() {
            let start = self.nodes[child].start;
            let end = self.edge_end(child);
            println!(
                "{:indent$}{}",
                "",
                String::from_utf8_lossy(&self.text[start..end]),
                indent = indent
            );
            self.print_recursive(child, indent + 4);
        }
    }

    /// Walks `pattern` from the root, crossing whole edges where possible.
    /// Returns the node reached and how many symbols of its incoming edge
    /// were consumed (`0` means the walk ended exactly at the node), or
    /// `None` on any mismatch.
    fn walk(&self, pattern: &[u8]) -> Option<(NodeId, usize)> {
        let mut node = ROOT;
        let mut matched = 0;
        while matched < pattern.len() {
            let next = *self.nodes[node].children.get(&pattern[matched])?;
            let start = self.nodes[next].start;
            let edge_len = self.edge_end(next) - start;
            let take = edge_len.min(pattern.len() - matched);
            if self.text[start..start + take] != pattern[matched..matched + take] {
                return None;
            }
            matched += take;
            if take < edge_len {
                return Some((next, take));
            }
            node = next;
        }
        Some((node, 0))
    }

    fn edge_end(&self, node: NodeId) -> usize {
        match self.nodes[node].end {
            EdgeEnd::Closed(end) => end,
            EdgeEnd::Open => self.text.len(),
        }
    }
}

/// Depth-first enumeration of root-to-leaf paths, yielding one suffix per
/// leaf. The shared label buffer is truncated back to the parent's depth
/// before each edge is appended, so only O(n) bytes are held at any time.
pub struct Suffixes<'a> {
    tree: &'a SuffixTree,
    /// Pending nodes paired with the label length at their parent.
    stack: Vec<(NodeId, usize)>,
    label: Vec<u8>,
}

impl Iterator for Suffixes<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while let Some((id, depth)) = self.stack.pop() {
            self.label.truncate(depth);
            let node = &self.tree.nodes[id];
            let end = self.tree.edge_end(id);
            self.label.extend_from_slice(&self.tree.text[node.start..end]);
            if node.is_leaf() {
                return Some(String::from_utf8_lossy(&self.label).into_owned());
            }
            for &child in node.children.values().rev() {
                self.stack.push((child, self.label.len()));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Structural invariants that need access to the node arena.
    fn check_structure(input: &str) {
        let tree = SuffixTree::build(input).unwrap();

        let mut leaf_count = 0;
        for (id, node) in tree.nodes.iter().enumerate() {
            if node.is_leaf() {
                leaf_count += 1;
            }
            if id != ROOT {
                assert!(
                    tree.edge_end(id) > node.start,
                    "node {} has an empty edge label",
                    id
                );
                // Maximal compression: internal nodes branch at least twice.
                assert!(
                    node.is_leaf() || node.children.len() >= 2,
                    "internal node {} has {} children",
                    id,
                    node.children.len()
                );
            }
            if let Some(link) = node.suffix_link {
                assert!(link < tree.nodes.len());
                assert!(
                    link == ROOT || !tree.nodes[link].is_leaf(),
                    "suffix link of node {} targets a leaf",
                    id
                );
            }
        }

        // One distinct leaf per suffix of text-with-terminator.
        assert_eq!(leaf_count, input.len() + 1, "input {:?}", input);
    }

    #[test]
    fn structure_invariants() {
        for input in ["", "a", "aaaa", "abab", "banana", "mississippi", "abcabxabcd"] {
            check_structure(input);
        }
    }

    #[test]
    fn leaves_stay_open_and_internal_nodes_close() {
        let tree = SuffixTree::build("abab").unwrap();
        for node in &tree.nodes[1..] {
            if node.is_leaf() {
                assert_eq!(node.end, EdgeEnd::Open);
            } else {
                assert!(matches!(node.end, EdgeEnd::Closed(_)));
            }
        }
    }

    #[test]
    fn empty_input_has_single_terminator_leaf() {
        let tree = SuffixTree::build("").unwrap();
        let leaves: Vec<_> = tree.nodes.iter().filter(|n| n.is_leaf()).collect();
        assert_eq!(leaves.len(), 1);
        assert_eq!(tree.suffixes().collect::<Vec<_>>(), ["$"]);
    }

    #[test]
    fn reserved_symbol_is_rejected_before_construction() {
        let err = SuffixTree::build("ab$c").unwrap_err();
        assert_eq!(err, Error::ReservedSymbol('$', 2));
    }
}
