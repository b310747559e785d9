//! Aho–Corasick multi-pattern string matcher.
//!
//! Finds every occurrence of every pattern in a single pass over the
//! text, overlaps included. Construction is two-phase:
//!
//! 1. [`AhoCorasick::add_pattern`] inserts patterns into a trie of
//!    character transitions (nodes live in an arena, linked by index).
//! 2. [`AhoCorasick::build`] computes failure links by BFS — each node's
//!    failure points to its longest proper suffix that is also a trie
//!    prefix — and folds every node's failure-chain outputs into the
//!    node, so search never walks the chain to enumerate matches.
//!
//! ```text
//! patterns {he, she, his, hers}:
//!
//!   root ─ h ─ e●           failure links (dashed):
//!        │     └ r ─ s●        she's "e" ⇢ he's "e"
//!        │  └ i ─ s●           hers' "r" ⇢ root, ...
//!        └ s ─ h ─ e●
//!
//! search("ushers") → she@1, he@2, hers@2
//! ```
//!
//! The automaton has three lifecycle states: empty, collecting (patterns
//! added, not built) and built. Searching is valid only once built;
//! in any other state searches return empty results. Adding a pattern to
//! a built automaton drops it back to collecting until the next build.
//!
//! Match positions are character (rune) indices into the searched text;
//! for ASCII they equal byte indices. Case-insensitive automatons fold
//! patterns and text with ASCII lowercasing, which keeps those indices
//! stable.
//!
//! # Thread safety
//!
//! `RwLock`: searches are shared; `add_pattern`/`build`/`clear` are
//! exclusive. Callers serialize their own lifecycle transitions — a
//! search racing a rebuild sees either the old or the new automaton.

use core::fmt;
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::collections::VecDeque;

/// One pattern occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match<D> {
    /// The pattern as it was added (original case).
    pub pattern: String,
    /// Data attached to the pattern, if any.
    pub data: Option<D>,
    /// Character index of the first matched character.
    pub position: usize,
}

struct AhoNode {
    children: HashMap<char, usize>,
    fail: usize,
    /// Patterns terminating exactly here.
    terminal: Vec<usize>,
    /// `terminal` plus everything inherited along the failure chain;
    /// filled in by `build`.
    output: Vec<usize>,
}

impl AhoNode {
    fn new() -> Self {
        AhoNode {
            children: HashMap::new(),
            fail: 0,
            terminal: Vec::new(),
            output: Vec::new(),
        }
    }
}

struct AhoPattern<D> {
    pattern: String,
    /// Pattern length in characters, for position arithmetic.
    char_len: usize,
    data: Option<D>,
}

struct AhoCore<D> {
    nodes: Vec<AhoNode>,
    patterns: Vec<AhoPattern<D>>,
    built: bool,
    case_insensitive: bool,
}

impl<D: Clone> AhoCore<D> {
    fn fold(&self, s: &str) -> String {
        if self.case_insensitive {
            s.to_ascii_lowercase()
        } else {
            s.to_owned()
        }
    }

    fn add_pattern(&mut self, pattern: &str, data: Option<D>) {
        if pattern.is_empty() {
            return;
        }
        let folded = self.fold(pattern);
        let mut node = 0;
        for c in folded.chars() {
            node = match self.nodes[node].children.get(&c) {
                Some(&next) => next,
                None => {
                    self.nodes.push(AhoNode::new());
                    let next = self.nodes.len() - 1;
                    self.nodes[node].children.insert(c, next);
                    next
                }
            };
        }
        let index = self.patterns.len();
        self.nodes[node].terminal.push(index);
        self.patterns.push(AhoPattern {
            pattern: pattern.to_owned(),
            char_len: folded.chars().count(),
            data,
        });
        self.built = false;
    }

    /// Computes failure links breadth-first and folds failure-chain
    /// outputs into each node. Idempotent: outputs are rebuilt from the
    /// terminals every time.
    fn build(&mut self) {
        for node in &mut self.nodes {
            node.fail = 0;
            node.output = node.terminal.clone();
        }
        let mut queue: VecDeque<usize> = VecDeque::new();
        let roots: Vec<usize> = self.nodes[0].children.values().copied().collect();
        for v in roots {
            queue.push_back(v);
        }
        while let Some(u) = queue.pop_front() {
            // BFS visits shallower nodes first, so the failure target's
            // output list is already final.
            let fail_u = self.nodes[u].fail;
            let mut inherited = self.nodes[fail_u].output.clone();
            self.nodes[u].output.append(&mut inherited);

            let children: Vec<(char, usize)> =
                self.nodes[u].children.iter().map(|(c, v)| (*c, *v)).collect();
            for (c, v) in children {
                let mut f = self.nodes[u].fail;
                let fail_v = loop {
                    if let Some(&w) = self.nodes[f].children.get(&c) {
                        break w;
                    }
                    if f == 0 {
                        break 0;
                    }
                    f = self.nodes[f].fail;
                };
                self.nodes[v].fail = fail_v;
                queue.push_back(v);
            }
        }
        self.built = true;
    }

    fn ready(&self) -> bool {
        self.built && !self.patterns.is_empty()
    }

    /// Runs the automaton, handing every match to `emit`; stops early
    /// when `emit` returns false.
    fn scan<F: FnMut(Match<D>) -> bool>(&self, text: &str, mut emit: F) {
        if !self.ready() {
            return;
        }
        let folded = self.fold(text);
        let mut state = 0;
        for (i, c) in folded.chars().enumerate() {
            loop {
                if let Some(&next) = self.nodes[state].children.get(&c) {
                    state = next;
                    break;
                }
                if state == 0 {
                    break;
                }
                state = self.nodes[state].fail;
            }
            for &pattern_index in &self.nodes[state].output {
                let p = &self.patterns[pattern_index];
                let m = Match {
                    pattern: p.pattern.clone(),
                    data: p.data.clone(),
                    position: i + 1 - p.char_len,
                };
                if !emit(m) {
                    return;
                }
            }
        }
    }
}

/// Thread-safe Aho–Corasick automaton.
///
/// # Example
///
/// ```
/// use cachekit::aho::AhoCorasick;
///
/// let ac: AhoCorasick = AhoCorasick::new();
/// for pattern in ["he", "she", "his", "hers"] {
///     ac.add_pattern(pattern);
/// }
/// ac.build();
///
/// let matches = ac.search("ushers");
/// let found: Vec<(&str, usize)> = matches
///     .iter()
///     .map(|m| (m.pattern.as_str(), m.position))
///     .collect();
/// assert_eq!(found, vec![("she", 1), ("he", 2), ("hers", 2)]);
/// ```
pub struct AhoCorasick<D = ()> {
    core: RwLock<AhoCore<D>>,
}

impl<D: Clone> AhoCorasick<D> {
    /// Creates an empty, case-sensitive automaton.
    pub fn new() -> Self {
        Self::with_case_insensitivity(false)
    }

    /// Creates an empty automaton that folds patterns and text with
    /// ASCII lowercasing.
    pub fn case_insensitive() -> Self {
        Self::with_case_insensitivity(true)
    }

    fn with_case_insensitivity(case_insensitive: bool) -> Self {
        AhoCorasick {
            core: RwLock::new(AhoCore {
                nodes: vec![AhoNode::new()],
                patterns: Vec::new(),
                built: false,
                case_insensitive,
            }),
        }
    }

    /// Adds a pattern. Empty patterns are ignored. Invalidates any prior
    /// [`AhoCorasick::build`].
    pub fn add_pattern(&self, pattern: &str) {
        self.core.write().add_pattern(pattern, None);
    }

    /// Adds a pattern carrying data returned with its matches.
    pub fn add_pattern_with_data(&self, pattern: &str, data: D) {
        self.core.write().add_pattern(pattern, Some(data));
    }

    /// Computes failure links and output lists, making the automaton
    /// searchable.
    pub fn build(&self) {
        self.core.write().build();
    }

    /// Whether the automaton is built and searchable.
    pub fn is_built(&self) -> bool {
        self.core.read().built
    }

    /// Number of patterns added.
    pub fn pattern_count(&self) -> usize {
        self.core.read().patterns.len()
    }

    /// Every occurrence of every pattern in `text`, in increasing
    /// end-position order, overlaps included. Empty on an unbuilt or
    /// empty automaton.
    pub fn search(&self, text: &str) -> Vec<Match<D>> {
        let core = self.core.read();
        let mut matches = Vec::new();
        core.scan(text, |m| {
            matches.push(m);
            true
        });
        matches
    }

    /// The first match in `text`, by end position.
    pub fn search_first(&self, text: &str) -> Option<Match<D>> {
        let core = self.core.read();
        let mut first = None;
        core.scan(text, |m| {
            first = Some(m);
            false
        });
        first
    }

    /// Whether any pattern occurs in `text`.
    pub fn contains_match(&self, text: &str) -> bool {
        self.search_first(text).is_some()
    }

    /// Total number of occurrences in `text`.
    pub fn match_count(&self, text: &str) -> usize {
        let core = self.core.read();
        let mut count = 0;
        core.scan(text, |_| {
            count += 1;
            true
        });
        count
    }

    /// Drops every pattern and returns to the empty state.
    pub fn clear(&self) {
        let mut core = self.core.write();
        core.nodes = vec![AhoNode::new()];
        core.patterns.clear();
        core.built = false;
    }
}

impl<D: Clone> Default for AhoCorasick<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> fmt::Debug for AhoCorasick<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.read();
        f.debug_struct("AhoCorasick")
            .field("patterns", &core.patterns.len())
            .field("nodes", &core.nodes.len())
            .field("built", &core.built)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn built(patterns: &[&str]) -> AhoCorasick {
        let ac = AhoCorasick::new();
        for p in patterns {
            ac.add_pattern(p);
        }
        ac.build();
        ac
    }

    fn positions(matches: &[Match<()>]) -> Vec<(String, usize)> {
        matches.iter().map(|m| (m.pattern.clone(), m.position)).collect()
    }

    #[test]
    fn test_classic_ushers() {
        let ac = built(&["he", "she", "his", "hers"]);
        let matches = ac.search("ushers");
        assert_eq!(
            positions(&matches),
            vec![
                ("she".to_owned(), 1),
                ("he".to_owned(), 2),
                ("hers".to_owned(), 2),
            ]
        );
    }

    #[test]
    fn test_overlapping_matches() {
        let ac = built(&["aa", "aaa"]);
        let matches = ac.search("aaaa");
        // Grouped by end position; at each position the longest
        // (terminal) pattern emits before the failure-chain suffixes.
        assert_eq!(
            positions(&matches),
            vec![
                ("aa".to_owned(), 0),
                ("aaa".to_owned(), 0),
                ("aa".to_owned(), 1),
                ("aaa".to_owned(), 1),
                ("aa".to_owned(), 2),
            ]
        );
        assert_eq!(ac.match_count("aaaa"), 5);
    }

    #[test]
    fn test_search_first_and_contains() {
        let ac = built(&["needle"]);
        let m = ac.search_first("hay needle hay needle").unwrap();
        assert_eq!(m.position, 4);
        assert!(ac.contains_match("a needle"));
        assert!(!ac.contains_match("nothing here"));
    }

    #[test]
    fn test_unbuilt_automaton_is_silent() {
        let ac: AhoCorasick = AhoCorasick::new();
        ac.add_pattern("x");
        // Not built yet.
        assert!(ac.search("x").is_empty());
        assert!(!ac.contains_match("x"));
        assert_eq!(ac.match_count("x"), 0);
        assert!(!ac.is_built());
        ac.build();
        assert!(ac.is_built());
        assert_eq!(ac.match_count("x"), 1);
    }

    #[test]
    fn test_empty_automaton_is_silent() {
        let ac: AhoCorasick = AhoCorasick::new();
        ac.build();
        assert!(ac.search("anything").is_empty());
    }

    #[test]
    fn test_add_after_build_resets_then_rebuild_finds_all() {
        let ac = built(&["he", "she"]);
        assert!(ac.is_built());
        ac.add_pattern("hers");
        assert!(!ac.is_built());
        assert!(ac.search("ushers").is_empty());
        ac.build();
        // Rebuild must not duplicate matches for the original patterns.
        assert_eq!(
            positions(&ac.search("ushers")),
            vec![
                ("she".to_owned(), 1),
                ("he".to_owned(), 2),
                ("hers".to_owned(), 2),
            ]
        );
    }

    #[test]
    fn test_case_insensitive_mode() {
        let ac: AhoCorasick = AhoCorasick::case_insensitive();
        ac.add_pattern("GoogleBot");
        ac.build();
        let m = ac.search_first("Mozilla googlebot/2.1").unwrap();
        assert_eq!(m.pattern, "GoogleBot");
        assert_eq!(m.position, 8);
        assert!(ac.contains_match("GOOGLEBOT"));
    }

    #[test]
    fn test_case_sensitive_by_default() {
        let ac = built(&["Bot"]);
        assert!(ac.contains_match("a Bot"));
        assert!(!ac.contains_match("a bot"));
    }

    #[test]
    fn test_pattern_data_round_trips() {
        let ac: AhoCorasick<u32> = AhoCorasick::new();
        ac.add_pattern_with_data("abc", 7);
        ac.add_pattern("xyz");
        ac.build();
        assert_eq!(ac.search_first("abc").unwrap().data, Some(7));
        assert_eq!(ac.search_first("xyz").unwrap().data, None);
    }

    #[test]
    fn test_duplicate_patterns_both_match() {
        let ac: AhoCorasick<u32> = AhoCorasick::new();
        ac.add_pattern_with_data("dup", 1);
        ac.add_pattern_with_data("dup", 2);
        ac.build();
        assert_eq!(ac.match_count("dup"), 2);
    }

    #[test]
    fn test_empty_pattern_and_text() {
        let ac: AhoCorasick = AhoCorasick::new();
        ac.add_pattern("");
        assert_eq!(ac.pattern_count(), 0);
        ac.add_pattern("a");
        ac.build();
        assert!(ac.search("").is_empty());
    }

    #[test]
    fn test_clear_returns_to_empty() {
        let ac = built(&["he"]);
        ac.clear();
        assert_eq!(ac.pattern_count(), 0);
        assert!(!ac.is_built());
        assert!(ac.search("he").is_empty());
        ac.add_pattern("she");
        ac.build();
        assert_eq!(ac.match_count("she"), 1);
    }

    #[test]
    fn test_multibyte_positions_are_char_indices() {
        let ac = built(&["né"]);
        let m = ac.search_first("un né").unwrap();
        // 3 chars precede the match ('u', 'n', ' ').
        assert_eq!(m.position, 3);
    }

    #[test]
    fn test_concurrent_searches() {
        use std::sync::Arc;
        use std::thread;

        let ac = Arc::new(built(&["he", "she", "his", "hers"]));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let ac = Arc::clone(&ac);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    assert_eq!(ac.search("ushers").len(), 3);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
