//! Cross-dex method relocator: splits relocatable method definitions out of
//! eligible classes into synthetic helper classes, so the packer can place
//! them where their references are cheapest. Helpers that end up with no
//! room next to their origin are squashed straight back.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::config::RelocatorConfig;
use crate::container::{DexesStructure, ReserveRefs};
use crate::model::{ClassId, ClassUniverse, DexClass, RefKind, RefSet};

/// Tracks the synthetic helper classes extracted per origin class and
/// whether each ended up placed or squashed back.
pub struct CrossDexRelocator {
    config: RelocatorConfig,
    helpers_by_origin: FxHashMap<ClassId, Vec<ClassId>>,
    placed: FxHashSet<ClassId>,
    squashed: FxHashSet<ClassId>,
    next_helper_index: u32,
}

impl CrossDexRelocator {
    pub fn new(config: RelocatorConfig) -> Self {
        Self {
            config,
            helpers_by_origin: FxHashMap::default(),
            placed: FxHashSet::default(),
            squashed: FxHashSet::default(),
            next_helper_index: 0,
        }
    }

    /// Whether a helper was merged back into its origin
    pub fn is_squashed(&self, class: ClassId) -> bool {
        self.squashed.contains(&class)
    }

    fn relocatable_count(&self, class: &DexClass) -> u32 {
        let r = &class.relocatable;
        let mut count = 0;
        if self.config.relocate_static_methods {
            count += r.static_methods;
        }
        if self.config.relocate_non_static_direct_methods {
            count += r.non_static_direct_methods;
        }
        if self.config.relocate_virtual_methods {
            count += r.virtual_methods;
        }
        count
    }

    /// Extract helper classes from an eligible origin. Each helper takes
    /// over up to `max_relocated_methods_per_class` method definitions and
    /// references only its own and the origin's type.
    pub fn relocate_methods(
        &mut self,
        universe: &mut ClassUniverse,
        origin: ClassId,
    ) -> Vec<ClassId> {
        let origin_class = universe.class(origin);
        if !origin_class.can_rename || origin_class.is_interface {
            return Vec::new();
        }
        let mut remaining = self
            .relocatable_count(origin_class)
            .min(origin_class.methods_defined);
        if remaining == 0 {
            return Vec::new();
        }

        let origin_type = origin_class.type_id();
        let origin_name = universe.class_name(origin).to_string();
        let chunk = self.config.max_relocated_methods_per_class.max(1);

        let mut helpers = Vec::new();
        while remaining > 0 {
            let take = remaining.min(chunk);
            let name = format!("Lredex/$Relocated{:04};", self.next_helper_index);
            self.next_helper_index += 1;

            let helper_type = universe.intern_type(&name);
            let own_tref = universe.intern_ref(RefKind::Type, &name, Some(helper_type));
            let origin_tref =
                universe.intern_ref(RefKind::Type, &origin_name, Some(origin_type));
            let mut helper = DexClass::new(helper_type);
            helper.super_class = Some(universe.intern_type("Ljava/lang/Object;"));
            helper.trefs = vec![own_tref, origin_tref];
            helper.methods_defined = take;
            let helper_id = universe.add_class(helper);

            universe.class_mut(origin).methods_defined -= take;
            helpers.push(helper_id);
            remaining -= take;
        }
        debug!(
            "relocated {} helper classes out of {}",
            helpers.len(),
            origin_name
        );

        self.helpers_by_origin.insert(origin, helpers.clone());
        helpers
    }

    /// The origin just landed in the open container: place its helpers
    /// alongside it where they fit, and squash the rest back immediately.
    pub fn add_to_current_dex(
        &mut self,
        universe: &mut ClassUniverse,
        dexes: &mut DexesStructure,
        reserves: &ReserveRefs,
        origin: ClassId,
    ) {
        let Some(helpers) = self.helpers_by_origin.get(&origin).cloned() else {
            return;
        };
        for helper in helpers {
            if self.placed.contains(&helper) || self.squashed.contains(&helper) {
                continue;
            }
            let refs = RefSet::from_class(universe.class(helper));
            if dexes.add_class_if_fits(universe, &refs, helper, reserves) {
                self.placed.insert(helper);
            } else {
                let methods = universe.class(helper).methods_defined;
                universe.class_mut(origin).methods_defined += methods;
                universe.class_mut(helper).methods_defined = 0;
                dexes.add_squashed_class(helper);
                self.squashed.insert(helper);
                debug!(
                    "squashed relocated helper {} back into {}",
                    universe.class_name(helper),
                    universe.class_name(origin)
                );
            }
        }
    }

    /// Resolve anything left at the end of the remainder phase: helpers
    /// whose origin never got emitted (a plugin veto, typically) give their
    /// methods back and disappear.
    pub fn cleanup(&mut self, universe: &mut ClassUniverse) {
        for (&origin, helpers) in &self.helpers_by_origin {
            for &helper in helpers {
                if self.placed.contains(&helper) || self.squashed.contains(&helper) {
                    continue;
                }
                let methods = universe.class(helper).methods_defined;
                universe.class_mut(origin).methods_defined += methods;
                universe.class_mut(helper).methods_defined = 0;
                self.squashed.insert(helper);
                debug!(
                    "unplaced relocated helper {} merged back into {}",
                    universe.class_name(helper),
                    universe.class_name(origin)
                );
            }
        }
        self.helpers_by_origin.clear();
    }
}
