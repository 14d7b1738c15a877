//! Cross-dex reference minimizer: ranks candidate classes by how many of
//! their references are already applied in the open container versus how
//! many new ones they would introduce, so that classes sharing references
//! get colocated and inter-container duplication shrinks.

use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::trace;

use crate::config::RefWeightsConfig;
use crate::model::{ClassId, ClassUniverse, RefId, RefKind};

/// Fixed-point scale for the seed-penalty division; keeps priorities in
/// integers so ordering is total and reproducible.
const PRIORITY_SCALE: i64 = 1024;

type OrderKey<P> = (P, Reverse<Arc<str>>, ClassId);

#[derive(Debug)]
struct Candidate {
    refs: Vec<RefId>,
    priority: i64,
    unapplied: usize,
    name: Arc<str>,
}

/// Priority structure over candidate classes.
///
/// `sample` seeds the reference-frequency histogram and must precede the
/// first `insert` for the initial priorities to see the full pending pool;
/// after that, `insert` and `erase` keep everything incremental. Ties in
/// both orderings break on type-name order, so two runs over the same
/// universe pick identical classes.
pub struct CrossDexRefMinimizer {
    config: RefWeightsConfig,
    candidates: FxHashMap<ClassId, Candidate>,
    /// Pending-pool frequency per reference, seeded by `sample`
    frequencies: FxHashMap<RefId, u32>,
    /// Candidates carrying each reference, for targeted repricing
    ref_candidates: FxHashMap<RefId, FxHashSet<ClassId>>,
    /// References present in the currently-open container
    applied: FxHashSet<RefId>,
    ignored: FxHashSet<ClassId>,
    by_priority: BTreeSet<OrderKey<i64>>,
    by_unapplied: BTreeSet<OrderKey<usize>>,
}

impl CrossDexRefMinimizer {
    pub fn new(config: RefWeightsConfig) -> Self {
        Self {
            config,
            candidates: FxHashMap::default(),
            frequencies: FxHashMap::default(),
            ref_candidates: FxHashMap::default(),
            applied: FxHashSet::default(),
            ignored: FxHashSet::default(),
            by_priority: BTreeSet::new(),
            by_unapplied: BTreeSet::new(),
        }
    }

    pub fn config(&self) -> &RefWeightsConfig {
        &self.config
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    fn weights_for(&self, kind: RefKind) -> (u64, u64) {
        let w = &self.config;
        match kind {
            RefKind::Method => (w.method_ref_weight, w.method_seed_weight),
            RefKind::Field => (w.field_ref_weight, w.field_seed_weight),
            RefKind::Type => (w.type_ref_weight, w.type_seed_weight),
            RefKind::String => (w.string_ref_weight, w.string_seed_weight),
        }
    }

    fn deduped_refs(universe: &ClassUniverse, class: ClassId) -> Vec<RefId> {
        let mut seen = FxHashSet::default();
        let mut refs: Vec<RefId> = universe
            .class(class)
            .all_refs()
            .filter(|r| seen.insert(*r))
            .collect();
        refs.sort_unstable();
        refs
    }

    /// Score a candidate against the current applied set and histogram:
    /// a positive contribution per applied ref, and a seed penalty per
    /// unapplied ref discounted by how many pending classes share it.
    fn score(&self, universe: &ClassUniverse, refs: &[RefId]) -> (i64, usize) {
        let mut priority = 0i64;
        let mut unapplied = 0usize;
        for &r in refs {
            let (ref_weight, seed_weight) = self.weights_for(universe.ref_kind(r));
            if self.applied.contains(&r) {
                priority += ref_weight as i64 * PRIORITY_SCALE;
            } else {
                let freq = self.frequencies.get(&r).copied().unwrap_or(1).max(1);
                priority -= seed_weight as i64 * PRIORITY_SCALE / i64::from(freq);
                unapplied += 1;
            }
        }
        (priority, unapplied)
    }

    /// Count the class's references into the pending-pool histogram
    /// without making it a candidate.
    pub fn sample(&mut self, universe: &ClassUniverse, class: ClassId) {
        for r in Self::deduped_refs(universe, class) {
            *self.frequencies.entry(r).or_insert(0) += 1;
        }
    }

    /// Register the class as a candidate and compute its priority.
    /// Ignored classes are skipped: their refs stay in the histogram but the
    /// relocator owns their placement.
    pub fn insert(&mut self, universe: &ClassUniverse, class: ClassId) {
        if self.ignored.contains(&class) || self.candidates.contains_key(&class) {
            return;
        }
        let refs = Self::deduped_refs(universe, class);
        let (priority, unapplied) = self.score(universe, &refs);
        let name: Arc<str> = Arc::from(universe.class_name(class));
        for &r in &refs {
            self.ref_candidates.entry(r).or_default().insert(class);
        }
        self.by_priority.insert((priority, Reverse(name.clone()), class));
        self.by_unapplied.insert((unapplied, Reverse(name.clone()), class));
        self.candidates.insert(
            class,
            Candidate {
                refs,
                priority,
                unapplied,
                name,
            },
        );
    }

    /// Best class to emit into the open container next
    pub fn front(&self) -> Option<ClassId> {
        self.by_priority.iter().next_back().map(|(_, _, cls)| *cls)
    }

    /// Candidate with the most unapplied refs; used to seed a fresh container
    pub fn worst(&self) -> Option<ClassId> {
        self.by_unapplied.iter().next_back().map(|(_, _, cls)| *cls)
    }

    /// Drop a class without charging its refs as applied. Used for the
    /// relocated helper classes the cross-dex relocator attaches directly.
    pub fn ignore(&mut self, class: ClassId) {
        self.ignored.insert(class);
        if let Some(candidate) = self.candidates.remove(&class) {
            self.unindex(&candidate, class);
            for &r in &candidate.refs {
                if let Some(set) = self.ref_candidates.get_mut(&r) {
                    set.remove(&class);
                }
            }
        }
    }

    /// Remove the class from the pool. If it was emitted, its refs become
    /// applied and every remaining candidate sharing one is repriced; if the
    /// emission overflowed into a fresh container, the applied set resets to
    /// the refs of the surviving class first.
    pub fn erase(&mut self, universe: &ClassUniverse, class: ClassId, emitted: bool, overflowed: bool) {
        self.ignored.remove(&class);
        let refs = match self.candidates.remove(&class) {
            Some(candidate) => {
                self.unindex(&candidate, class);
                candidate.refs
            }
            None => Self::deduped_refs(universe, class),
        };
        trace!(
            "minimizer erase: {} emitted={} overflowed={}",
            universe.class_name(class),
            emitted,
            overflowed
        );

        let mut affected = FxHashSet::default();

        // The class leaves the pending pool, so the sharing discount of its
        // refs changes for everyone still carrying them.
        for &r in &refs {
            if let Some(freq) = self.frequencies.get_mut(&r) {
                *freq = freq.saturating_sub(1);
            }
            if let Some(set) = self.ref_candidates.get_mut(&r) {
                set.remove(&class);
                affected.extend(set.iter().copied());
            }
        }

        if overflowed {
            self.applied.clear();
            affected.extend(self.candidates.keys().copied());
        }
        if emitted {
            for &r in &refs {
                if self.applied.insert(r) {
                    if let Some(set) = self.ref_candidates.get(&r) {
                        affected.extend(set.iter().copied());
                    }
                }
            }
        }

        for cls in affected {
            self.reprice(universe, cls);
        }
    }

    pub fn get_unapplied_refs(&self, class: ClassId) -> usize {
        self.candidates
            .get(&class)
            .map(|c| c.unapplied)
            .unwrap_or(0)
    }

    pub fn get_applied_refs(&self) -> usize {
        self.applied.len()
    }

    fn unindex(&mut self, candidate: &Candidate, class: ClassId) {
        self.by_priority
            .remove(&(candidate.priority, Reverse(candidate.name.clone()), class));
        self.by_unapplied
            .remove(&(candidate.unapplied, Reverse(candidate.name.clone()), class));
    }

    fn reprice(&mut self, universe: &ClassUniverse, class: ClassId) {
        let Some(candidate) = self.candidates.get(&class) else {
            return;
        };
        let refs = candidate.refs.clone();
        let (priority, unapplied) = self.score(universe, &refs);
        let candidate = self.candidates.get_mut(&class).expect("candidate present");
        if priority == candidate.priority && unapplied == candidate.unapplied {
            return;
        }
        let name = candidate.name.clone();
        let (old_priority, old_unapplied) = (candidate.priority, candidate.unapplied);
        candidate.priority = priority;
        candidate.unapplied = unapplied;
        self.by_priority
            .remove(&(old_priority, Reverse(name.clone()), class));
        self.by_priority.insert((priority, Reverse(name.clone()), class));
        self.by_unapplied
            .remove(&(old_unapplied, Reverse(name.clone()), class));
        self.by_unapplied.insert((unapplied, Reverse(name), class));
    }
}
