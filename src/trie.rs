//! Prefix tree for autocomplete with frequency ranking.
//!
//! Keys are stored one character per level; terminals remember the
//! original-case value, how many times it was inserted, and optional
//! associated data:
//!
//! ```text
//! insert "Dune", "Dune", "Duel":
//!
//!   d ── u ─┬─ n ── e●   value "Dune", count 2
//!           └─ e ── l●   value "Duel", count 1
//! ```
//!
//! Matching is case-insensitive by default (ASCII folding on insert,
//! lookup and traversal); construct with [`Trie::case_sensitive`] to opt
//! out. Autocomplete ranks by insertion count, then lexicographically.
//!
//! [`TrieIndex`] maintains one trie per named field ("title", "artist"),
//! created on demand.
//!
//! # Thread safety
//!
//! `RwLock`: search/prefix/autocomplete/enumeration are shared;
//! insert/delete/clear are exclusive.

use core::fmt;
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::sync::Arc;

struct TrieNode<D> {
    children: HashMap<char, TrieNode<D>>,
    is_end: bool,
    /// Original-case value; meaningful only on terminals.
    value: String,
    /// Times the value was inserted; ranks autocomplete results.
    count: u64,
    data: Option<D>,
}

impl<D> TrieNode<D> {
    fn new() -> Self {
        TrieNode {
            children: HashMap::new(),
            is_end: false,
            value: String::new(),
            count: 0,
            data: None,
        }
    }
}

struct TrieCore<D> {
    root: TrieNode<D>,
    /// Number of distinct terminals.
    size: usize,
    case_sensitive: bool,
}

impl<D> TrieCore<D> {
    fn fold(&self, s: &str) -> String {
        if self.case_sensitive {
            s.to_owned()
        } else {
            s.to_ascii_lowercase()
        }
    }

    fn node(&self, folded: &str) -> Option<&TrieNode<D>> {
        let mut node = &self.root;
        for c in folded.chars() {
            node = node.children.get(&c)?;
        }
        Some(node)
    }

    fn insert(&mut self, value: &str, data: Option<D>) -> bool {
        let folded = self.fold(value);
        let mut node = &mut self.root;
        for c in folded.chars() {
            node = node.children.entry(c).or_insert_with(TrieNode::new);
        }
        if data.is_some() {
            node.data = data;
        }
        if node.is_end {
            node.count += 1;
            false
        } else {
            node.is_end = true;
            node.value = value.to_owned();
            node.count = 1;
            self.size += 1;
            true
        }
    }

    fn collect_terminals(node: &TrieNode<D>, out: &mut Vec<(String, u64)>) {
        if node.is_end {
            out.push((node.value.clone(), node.count));
        }
        for child in node.children.values() {
            Self::collect_terminals(child, out);
        }
    }

    /// Returns (found-and-cleared, child-is-prunable).
    fn delete_rec(node: &mut TrieNode<D>, chars: &[char]) -> (bool, bool) {
        match chars.split_first() {
            None => {
                if !node.is_end {
                    return (false, false);
                }
                node.is_end = false;
                node.value.clear();
                node.count = 0;
                node.data = None;
                (true, node.children.is_empty())
            }
            Some((&c, rest)) => {
                let Some(child) = node.children.get_mut(&c) else {
                    return (false, false);
                };
                let (deleted, prune_child) = Self::delete_rec(child, rest);
                if prune_child {
                    node.children.remove(&c);
                }
                (
                    deleted,
                    deleted && !node.is_end && node.children.is_empty(),
                )
            }
        }
    }
}

/// Thread-safe prefix tree.
///
/// # Example
///
/// ```
/// use cachekit::trie::Trie;
///
/// let trie: Trie = Trie::new();
/// trie.insert("Dune");
/// trie.insert("Dune");
/// trie.insert("Duel");
///
/// assert_eq!(trie.autocomplete("du", 10), vec!["Dune", "Duel"]);
/// assert!(trie.search("dune"));
/// assert!(trie.has_prefix("DU"));
/// ```
pub struct Trie<D = ()> {
    core: RwLock<TrieCore<D>>,
}

impl<D: Clone> Trie<D> {
    /// Creates a case-insensitive trie (the default).
    pub fn new() -> Self {
        Self::with_case_sensitivity(false)
    }

    /// Creates a case-sensitive trie.
    pub fn case_sensitive() -> Self {
        Self::with_case_sensitivity(true)
    }

    fn with_case_sensitivity(case_sensitive: bool) -> Self {
        Trie {
            core: RwLock::new(TrieCore {
                root: TrieNode::new(),
                size: 0,
                case_sensitive,
            }),
        }
    }

    /// Inserts a value. Returns true on the first occurrence, false on a
    /// repeat (which bumps the ranking count instead).
    pub fn insert(&self, value: &str) -> bool {
        self.core.write().insert(value, None)
    }

    /// Inserts a value and sets (or replaces) its associated data.
    pub fn insert_with_data(&self, value: &str, data: D) -> bool {
        self.core.write().insert(value, Some(data))
    }

    /// Exact-match lookup (subject to case folding).
    pub fn search(&self, value: &str) -> bool {
        let core = self.core.read();
        let folded = core.fold(value);
        core.node(&folded).is_some_and(|n| n.is_end)
    }

    /// Whether any stored value starts with `prefix`. The empty prefix
    /// reports whether the trie is non-empty.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        let core = self.core.read();
        if prefix.is_empty() {
            return core.size > 0;
        }
        let folded = core.fold(prefix);
        core.node(&folded).is_some()
    }

    /// Data associated with an exact value, if any.
    pub fn get_data(&self, value: &str) -> Option<D> {
        let core = self.core.read();
        let folded = core.fold(value);
        core.node(&folded)
            .filter(|n| n.is_end)
            .and_then(|n| n.data.clone())
    }

    /// Completions of `prefix`, ranked by insertion count (descending)
    /// then value (ascending), truncated to `limit` (0 = unlimited). The
    /// empty prefix completes to every stored value.
    pub fn autocomplete(&self, prefix: &str, limit: usize) -> Vec<String> {
        let core = self.core.read();
        let folded = core.fold(prefix);
        let Some(start) = core.node(&folded) else {
            return Vec::new();
        };
        let mut terminals = Vec::new();
        TrieCore::collect_terminals(start, &mut terminals);
        terminals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        if limit > 0 {
            terminals.truncate(limit);
        }
        terminals.into_iter().map(|(value, _)| value).collect()
    }

    /// Every stored value, unranked.
    pub fn get_all(&self) -> Vec<String> {
        let core = self.core.read();
        let mut terminals = Vec::new();
        TrieCore::collect_terminals(&core.root, &mut terminals);
        terminals.into_iter().map(|(value, _)| value).collect()
    }

    /// Removes a value, pruning branches that serve no other value.
    /// Returns whether the value was present.
    pub fn delete(&self, value: &str) -> bool {
        let mut core = self.core.write();
        let folded = core.fold(value);
        let chars: Vec<char> = folded.chars().collect();
        let (deleted, _) = TrieCore::delete_rec(&mut core.root, &chars);
        if deleted {
            core.size -= 1;
        }
        deleted
    }

    /// Number of distinct stored values.
    pub fn len(&self) -> usize {
        self.core.read().size
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every value.
    pub fn clear(&self) {
        let mut core = self.core.write();
        core.root = TrieNode::new();
        core.size = 0;
    }
}

impl<D: Clone> Default for Trie<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> fmt::Debug for Trie<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.read();
        f.debug_struct("Trie")
            .field("size", &core.size)
            .field("case_sensitive", &core.case_sensitive)
            .finish()
    }
}

/// Field-name → trie map, created on demand.
///
/// # Example
///
/// ```
/// use cachekit::trie::TrieIndex;
///
/// let index: TrieIndex = TrieIndex::new();
/// index.insert("title", "Dune");
/// index.insert("artist", "Daft Punk");
/// assert_eq!(index.autocomplete("title", "du", 5), vec!["Dune"]);
/// assert!(index.autocomplete("artist", "du", 5).is_empty());
/// ```
pub struct TrieIndex<D = ()> {
    fields: RwLock<HashMap<String, Arc<Trie<D>>>>,
}

impl<D: Clone> TrieIndex<D> {
    /// Creates an empty index; tries are case-insensitive.
    pub fn new() -> Self {
        TrieIndex {
            fields: RwLock::new(HashMap::new()),
        }
    }

    fn trie_for(&self, field: &str) -> Arc<Trie<D>> {
        if let Some(trie) = self.fields.read().get(field) {
            return Arc::clone(trie);
        }
        let mut fields = self.fields.write();
        Arc::clone(
            fields
                .entry(field.to_owned())
                .or_insert_with(|| Arc::new(Trie::new())),
        )
    }

    /// Inserts a value under `field`, creating the trie on first use.
    pub fn insert(&self, field: &str, value: &str) -> bool {
        self.trie_for(field).insert(value)
    }

    /// Inserts a value with associated data under `field`.
    pub fn insert_with_data(&self, field: &str, value: &str, data: D) -> bool {
        self.trie_for(field).insert_with_data(value, data)
    }

    /// Exact-match lookup under `field`.
    pub fn search(&self, field: &str, value: &str) -> bool {
        match self.fields.read().get(field) {
            Some(trie) => trie.search(value),
            None => false,
        }
    }

    /// Completions under `field`; empty for unknown fields.
    pub fn autocomplete(&self, field: &str, prefix: &str, limit: usize) -> Vec<String> {
        match self.fields.read().get(field) {
            Some(trie) => trie.autocomplete(prefix, limit),
            None => Vec::new(),
        }
    }

    /// Removes a value under `field`.
    pub fn delete(&self, field: &str, value: &str) -> bool {
        match self.fields.read().get(field) {
            Some(trie) => trie.delete(value),
            None => false,
        }
    }

    /// The trie backing `field`, if it exists.
    pub fn get(&self, field: &str) -> Option<Arc<Trie<D>>> {
        self.fields.read().get(field).cloned()
    }

    /// Names of the indexed fields.
    pub fn fields(&self) -> Vec<String> {
        self.fields.read().keys().cloned().collect()
    }

    /// Drops every field.
    pub fn clear(&self) {
        self.fields.write().clear();
    }
}

impl<D: Clone> Default for TrieIndex<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> fmt::Debug for TrieIndex<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrieIndex")
            .field("fields", &self.fields.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_first_vs_repeat() {
        let trie: Trie = Trie::new();
        assert!(trie.insert("Dune"));
        assert!(!trie.insert("Dune"));
        assert!(!trie.insert("DUNE"));
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_case_insensitive_search_preserves_value() {
        let trie: Trie = Trie::new();
        trie.insert("Blade Runner");
        assert!(trie.search("blade runner"));
        assert!(trie.search("BLADE RUNNER"));
        assert_eq!(trie.autocomplete("blade", 1), vec!["Blade Runner"]);
    }

    #[test]
    fn test_case_sensitive_mode() {
        let trie: Trie = Trie::case_sensitive();
        trie.insert("Dune");
        assert!(trie.search("Dune"));
        assert!(!trie.search("dune"));
        assert!(trie.insert("dune"));
        assert_eq!(trie.len(), 2);
    }

    #[test]
    fn test_autocomplete_ranking() {
        let trie: Trie = Trie::new();
        trie.insert("Dune");
        trie.insert("Dune");
        trie.insert("Dune");
        trie.insert("Duel");
        trie.insert("Duel");
        trie.insert("Dumbo");
        // Count descending, then value ascending.
        assert_eq!(trie.autocomplete("du", 10), vec!["Dune", "Duel", "Dumbo"]);
        assert_eq!(trie.autocomplete("du", 2), vec!["Dune", "Duel"]);
    }

    #[test]
    fn test_autocomplete_ties_sort_by_value() {
        let trie: Trie = Trie::new();
        trie.insert("beta");
        trie.insert("alpha");
        trie.insert("gamma");
        assert_eq!(
            trie.autocomplete("", 0),
            vec!["alpha", "beta", "gamma"]
        );
    }

    #[test]
    fn test_empty_prefix_returns_everything() {
        let trie: Trie = Trie::new();
        trie.insert("a");
        trie.insert("b");
        assert_eq!(trie.autocomplete("", 0).len(), 2);
        assert!(trie.has_prefix(""));
        trie.clear();
        assert!(!trie.has_prefix(""));
    }

    #[test]
    fn test_missing_prefix_is_empty() {
        let trie: Trie = Trie::new();
        trie.insert("dune");
        assert!(trie.autocomplete("x", 10).is_empty());
        assert!(!trie.has_prefix("x"));
    }

    #[test]
    fn test_insert_with_data() {
        let trie: Trie<u32> = Trie::new();
        trie.insert_with_data("Dune", 1965);
        assert_eq!(trie.get_data("dune"), Some(1965));
        assert_eq!(trie.get_data("duel"), None);
        // Repeat insert replaces the data.
        trie.insert_with_data("Dune", 2021);
        assert_eq!(trie.get_data("dune"), Some(2021));
    }

    #[test]
    fn test_prefix_of_another_value_is_not_terminal() {
        let trie: Trie = Trie::new();
        trie.insert("dune");
        assert!(!trie.search("dun"));
        assert!(trie.has_prefix("dun"));
    }

    #[test]
    fn test_delete_prunes_branches() {
        let trie: Trie = Trie::new();
        trie.insert("dune");
        trie.insert("duel");
        assert!(trie.delete("dune"));
        assert!(!trie.delete("dune"));
        assert!(!trie.search("dune"));
        assert!(trie.search("duel"));
        // The shared "du" branch must survive for "duel".
        assert!(trie.has_prefix("du"));
        assert!(!trie.has_prefix("dun"));
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_delete_keeps_terminal_prefix() {
        let trie: Trie = Trie::new();
        trie.insert("dun");
        trie.insert("dune");
        assert!(trie.delete("dune"));
        assert!(trie.search("dun"));
        assert!(!trie.has_prefix("dune"));
    }

    #[test]
    fn test_get_all() {
        let trie: Trie = Trie::new();
        trie.insert("a");
        trie.insert("b");
        let mut all = trie.get_all();
        all.sort();
        assert_eq!(all, vec!["a", "b"]);
    }

    #[test]
    fn test_index_per_field_isolation() {
        let index: TrieIndex = TrieIndex::new();
        index.insert("title", "Dune");
        index.insert("artist", "Daft Punk");
        assert!(index.search("title", "dune"));
        assert!(!index.search("artist", "dune"));
        assert!(!index.search("missing", "dune"));
        let mut fields = index.fields();
        fields.sort();
        assert_eq!(fields, vec!["artist", "title"]);
    }

    #[test]
    fn test_index_delete_and_clear() {
        let index: TrieIndex = TrieIndex::new();
        index.insert("title", "Dune");
        assert!(index.delete("title", "dune"));
        assert!(!index.delete("title", "dune"));
        assert!(!index.delete("missing", "dune"));
        index.insert("title", "Dune");
        index.clear();
        assert!(index.fields().is_empty());
    }

    #[test]
    fn test_concurrent_inserts_and_lookups() {
        use std::thread;

        let trie: Arc<Trie> = Arc::new(Trie::new());
        let mut handles = Vec::new();
        for t in 0..4 {
            let trie = Arc::clone(&trie);
            handles.push(thread::spawn(move || {
                for i in 0..250 {
                    let value = format!("title-{t}-{i}");
                    trie.insert(&value);
                    assert!(trie.search(&value));
                    let _ = trie.autocomplete(&format!("title-{t}"), 5);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(trie.len(), 1000);
    }
}
