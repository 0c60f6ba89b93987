//! Dependency graph for formula cells.
//!
//! Tracks, for every cell name, the cells its formula reads ("depends on")
//! and the cells whose formulas read it ("depended on by").
//!
//! # Edge Direction
//!
//! ```text
//! (B1, A1)  means  "B1's formula reads A1"
//! depends_on(B1)     = {A1}
//! depended_on_by(A1) = {B1}
//! ```
//!
//! The graph does no evaluation and no cycle detection; see
//! [`crate::recalc`] for ordering. It is a plain value type, so a
//! `clone()` is an independent deep copy suitable for rollback.

use rustc_hash::{FxHashMap, FxHashSet};

/// Bidirectional set-of-edges index keyed by canonical cell name.
///
/// # Invariants
///
/// 1. **Bidirectional consistency:** t ∈ preds[s] iff s ∈ succs[t].
/// 2. **No dangling entries:** empty sets are removed, not stored.
/// 3. **No duplicate edges:** set semantics enforced by FxHashSet.
/// 4. **Edge count:** `edges` equals the total size of all `preds` sets.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct DepGraph {
    /// s -> {t, ...}: the cells s reads.
    preds: FxHashMap<String, FxHashSet<String>>,

    /// t -> {s, ...}: the cells that read t.
    succs: FxHashMap<String, FxHashSet<String>>,

    edges: usize,
}

impl DepGraph {
    /// Create an empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cells that `s` reads. Empty if `s` has no formula edges.
    pub fn depends_on<'a>(&'a self, s: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.preds
            .get(s)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Cells whose formulas read `t`. Empty if nothing references `t`.
    pub fn depended_on_by<'a>(&'a self, t: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.succs
            .get(t)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Returns true if `s` reads at least one cell.
    pub fn has_depends_on(&self, s: &str) -> bool {
        self.preds.contains_key(s)
    }

    /// Returns true if at least one cell reads `t`.
    pub fn has_depended_on_by(&self, t: &str) -> bool {
        self.succs.contains_key(t)
    }

    /// Total number of edges.
    pub fn len(&self) -> usize {
        self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.edges == 0
    }

    /// Add the edge (s, t). No-op if it already exists.
    pub fn add(&mut self, s: &str, t: &str) {
        if self.preds.get(s).is_some_and(|set| set.contains(t)) {
            return;
        }

        // Both inserts happen after the existence check, so the maps only
        // ever change together.
        self.preds
            .entry(s.to_string())
            .or_default()
            .insert(t.to_string());
        self.succs
            .entry(t.to_string())
            .or_default()
            .insert(s.to_string());
        self.edges += 1;
    }

    /// Remove the edge (s, t). No-op if it does not exist.
    pub fn remove(&mut self, s: &str, t: &str) {
        let Some(targets) = self.preds.get_mut(s) else {
            return;
        };
        if !targets.remove(t) {
            return;
        }
        if targets.is_empty() {
            self.preds.remove(s);
        }

        if let Some(sources) = self.succs.get_mut(t) {
            sources.remove(s);
            if sources.is_empty() {
                self.succs.remove(t);
            }
        }
        self.edges -= 1;
    }

    /// Replace every edge (s, *) with (s, t) for each t in `new_targets`.
    ///
    /// This is the mutator the sheet uses on every content change. Pass an
    /// empty iterator to clear the cell's outgoing edges.
    pub fn replace_depends_on<I, T>(&mut self, s: &str, new_targets: I)
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        if let Some(old) = self.preds.remove(s) {
            for t in &old {
                if let Some(sources) = self.succs.get_mut(t) {
                    sources.remove(s);
                    if sources.is_empty() {
                        self.succs.remove(t);
                    }
                }
            }
            self.edges -= old.len();
        }

        for t in new_targets {
            self.add(s, t.as_ref());
        }
    }

    /// Replace every edge (*, t) with (s, t) for each s in `new_sources`.
    pub fn replace_depended_on_by<I, S>(&mut self, t: &str, new_sources: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some(old) = self.succs.remove(t) {
            for s in &old {
                if let Some(targets) = self.preds.get_mut(s) {
                    targets.remove(t);
                    if targets.is_empty() {
                        self.preds.remove(s);
                    }
                }
            }
            self.edges -= old.len();
        }

        for s in new_sources {
            self.add(s.as_ref(), t);
        }
    }

    /// Check all invariants. Panics if any are violated.
    ///
    /// Only available in test builds.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        for (s, targets) in &self.preds {
            assert!(!targets.is_empty(), "Empty preds set stored for {}", s);
            for t in targets {
                assert!(
                    self.succs.get(t).is_some_and(|set| set.contains(s)),
                    "Missing succ edge: {} should have {} in depended_on_by",
                    t,
                    s
                );
            }
        }

        for (t, sources) in &self.succs {
            assert!(!sources.is_empty(), "Empty succs set stored for {}", t);
            for s in sources {
                assert!(
                    self.preds.get(s).is_some_and(|set| set.contains(t)),
                    "Missing pred edge: {} should have {} in depends_on",
                    s,
                    t
                );
            }
        }

        let counted: usize = self.preds.values().map(|set| set.len()).sum();
        assert_eq!(counted, self.edges, "Edge count out of sync");
    }
}
