//! Container bookkeeping: the currently-open output container, its
//! accumulated reference sets and remaining capacity, and the running
//! totals across the whole emitted sequence.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::DexLimits;
use crate::model::{ClassId, ClassUniverse, RefSet};

/// Flag bundle carried per container, snapshotted at flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DexInfo {
    pub primary: bool,
    pub coldstart: bool,
    pub extended: bool,
    pub scroll: bool,
    pub background: bool,
    pub betamap_ordered: bool,
}

/// Headroom plugins reserve for classes they will inject at flush time.
/// Re-queried before every admission decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReserveRefs {
    pub mrefs: usize,
    pub frefs: usize,
    pub trefs: usize,
    pub classes: usize,
}

impl std::ops::AddAssign for ReserveRefs {
    fn add_assign(&mut self, other: Self) {
        self.mrefs += other.mrefs;
        self.frefs += other.frefs;
        self.trefs += other.trefs;
        self.classes += other.classes;
    }
}

/// The currently-open container
#[derive(Debug, Default)]
pub struct DexStructure {
    classes: Vec<ClassId>,
    class_set: FxHashSet<ClassId>,
    squashed_classes: Vec<ClassId>,
    refs: RefSet,
    methods_defined: u64,
    fields_defined: u64,
}

impl DexStructure {
    /// Atomically admit a class if its *new* references fit under the limits
    /// with the reserved headroom. References already accumulated count once.
    pub fn add_class_if_fits(
        &mut self,
        universe: &ClassUniverse,
        class_refs: &RefSet,
        class: ClassId,
        limits: &DexLimits,
        reserves: &ReserveRefs,
    ) -> bool {
        if self.class_set.contains(&class) {
            trace!("trying to re-add class {}", universe.class_name(class));
            return false;
        }

        let (new_m, new_f, new_t) = class_refs.count_new_in(&self.refs);
        let fits = self.refs.methods.len() + new_m + reserves.mrefs <= limits.max_method_refs
            && self.refs.fields.len() + new_f + reserves.frefs <= limits.max_field_refs
            && self.refs.types.len() + new_t + reserves.trefs <= limits.max_type_refs
            && self.classes.len() + 1 + reserves.classes <= limits.max_classes;
        if !fits {
            return false;
        }

        self.add_class_no_checks(universe, class_refs, class);
        true
    }

    /// Admit without capacity checks: pre-validated primary classes and
    /// plugin-injected classes at flush time.
    pub fn add_class_no_checks(
        &mut self,
        universe: &ClassUniverse,
        class_refs: &RefSet,
        class: ClassId,
    ) {
        debug_assert!(!self.class_set.contains(&class));
        self.refs.insert_all(class_refs);
        self.classes.push(class);
        self.class_set.insert(class);
        let cls = universe.class(class);
        self.methods_defined += u64::from(cls.methods_defined);
        self.fields_defined += u64::from(cls.fields_defined);
    }

    /// Record a relocated helper squashed back into its origin; visible to
    /// plugins at flush but never part of the emitted class list.
    pub fn add_squashed_class(&mut self, class: ClassId) {
        self.squashed_classes.push(class);
    }

    pub fn has_class(&self, class: ClassId) -> bool {
        self.class_set.contains(&class)
    }

    pub fn classes(&self) -> &[ClassId] {
        &self.classes
    }

    pub fn squashed_classes(&self) -> &[ClassId] {
        &self.squashed_classes
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn mref_count(&self) -> usize {
        self.refs.methods.len()
    }

    pub fn fref_count(&self) -> usize {
        self.refs.fields.len()
    }

    pub fn tref_count(&self) -> usize {
        self.refs.types.len()
    }

    pub fn methods_defined(&self) -> u64 {
        self.methods_defined
    }

    pub fn fields_defined(&self) -> u64 {
        self.fields_defined
    }
}

/// Running totals over all emitted containers
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DexesStats {
    pub num_dexes: usize,
    pub num_secondary_dexes: usize,
    pub num_coldstart_dexes: usize,
    pub num_extended_dexes: usize,
    pub num_scroll_dexes: usize,
    pub num_background_dexes: usize,
    pub num_classes: usize,
    pub num_mrefs: usize,
    pub num_frefs: usize,
    pub num_trefs: usize,
    pub num_methods_defined: u64,
    pub num_fields_defined: u64,
}

/// The ordered sequence of containers under construction: one open
/// [`DexStructure`] plus the finalized totals and the global placed set.
#[derive(Debug, Default)]
pub struct DexesStructure {
    limits: DexLimits,
    current: DexStructure,
    placed: FxHashSet<ClassId>,
    stats: DexesStats,
}

impl DexesStructure {
    pub fn new(limits: DexLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn limits(&self) -> &DexLimits {
        &self.limits
    }

    pub fn add_class_if_fits(
        &mut self,
        universe: &ClassUniverse,
        class_refs: &RefSet,
        class: ClassId,
        reserves: &ReserveRefs,
    ) -> bool {
        if self
            .current
            .add_class_if_fits(universe, class_refs, class, &self.limits, reserves)
        {
            self.placed.insert(class);
            true
        } else {
            false
        }
    }

    pub fn add_class_no_checks(
        &mut self,
        universe: &ClassUniverse,
        class_refs: &RefSet,
        class: ClassId,
    ) {
        self.current.add_class_no_checks(universe, class_refs, class);
        self.placed.insert(class);
    }

    pub fn add_squashed_class(&mut self, class: ClassId) {
        self.current.add_squashed_class(class);
        self.placed.insert(class);
    }

    /// Whether the class was placed in any container, including the open one
    pub fn has_class(&self, class: ClassId) -> bool {
        self.placed.contains(&class)
    }

    pub fn current(&self) -> &DexStructure {
        &self.current
    }

    /// Number of *completed* containers; also the index the open container
    /// will take once flushed.
    pub fn num_dexes(&self) -> usize {
        self.stats.num_dexes
    }

    pub fn stats(&self) -> &DexesStats {
        &self.stats
    }

    /// Finalize the open container: fold its counters into the totals under
    /// the given flags, reset, and yield its ordered classes.
    pub fn end_dex(&mut self, dex_info: DexInfo) -> Vec<ClassId> {
        self.stats.num_dexes += 1;
        if !dex_info.primary {
            self.stats.num_secondary_dexes += 1;
        }
        if dex_info.coldstart {
            self.stats.num_coldstart_dexes += 1;
        }
        if dex_info.extended {
            self.stats.num_extended_dexes += 1;
        }
        if dex_info.scroll {
            self.stats.num_scroll_dexes += 1;
        }
        if dex_info.background {
            self.stats.num_background_dexes += 1;
        }
        self.stats.num_classes += self.current.class_count();
        self.stats.num_mrefs += self.current.mref_count();
        self.stats.num_frefs += self.current.fref_count();
        self.stats.num_trefs += self.current.tref_count();
        self.stats.num_methods_defined += self.current.methods_defined();
        self.stats.num_fields_defined += self.current.fields_defined();

        let finished = std::mem::take(&mut self.current);
        finished.classes
    }
}
