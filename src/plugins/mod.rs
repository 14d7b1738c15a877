//! The fixed hook surface through which external passes participate in
//! emission: extra references per class, class vetoes, per-container
//! synthesized classes, leftovers, and reserved capacity headroom.

use tracing::debug;

use crate::container::{DexInfo, ReserveRefs};
use crate::model::{ClassId, ClassUniverse, RefId};

/// One extension hooked into the driver. Every method has a neutral
/// default so plugins implement only the hooks they care about.
pub trait InterdexPlugin {
    fn name(&self) -> &str;

    /// Contribute additional references for a class on top of its own.
    /// May report "erased" classes: classes this plugin swallowed whose
    /// refs are charged through the surviving class.
    #[allow(unused_variables)]
    fn gather_refs(
        &self,
        universe: &ClassUniverse,
        dex_info: &DexInfo,
        class: ClassId,
        mrefs: &mut Vec<RefId>,
        frefs: &mut Vec<RefId>,
        trefs: &mut Vec<RefId>,
        erased_classes: &mut Vec<ClassId>,
        should_not_relocate_methods: bool,
    ) {
    }

    /// Veto a class from normal emission
    #[allow(unused_variables)]
    fn should_skip_class(&self, universe: &ClassUniverse, class: ClassId) -> bool {
        false
    }

    #[allow(unused_variables)]
    fn should_not_relocate_methods_of_class(
        &self,
        universe: &ClassUniverse,
        class: ClassId,
    ) -> bool {
        false
    }

    /// Capacity to hold back for classes this plugin will inject at flush
    fn reserve_refs(&self) -> ReserveRefs {
        ReserveRefs::default()
    }

    /// Classes to inject into the container being flushed
    #[allow(unused_variables)]
    fn additional_classes(
        &mut self,
        universe: &ClassUniverse,
        outdex: &[Vec<ClassId>],
        current_classes: &[ClassId],
    ) -> Vec<ClassId> {
        Vec::new()
    }

    /// Classes to emit after the remainder phase has drained
    fn leftover_classes(&mut self) -> Vec<ClassId> {
        Vec::new()
    }

    /// Notification that a synthesized class joined the scope
    #[allow(unused_variables)]
    fn add_to_scope(&mut self, universe: &ClassUniverse, class: ClassId) {}
}

/// Ordered collection of plugins with the aggregate queries the driver needs
#[derive(Default)]
pub struct PluginHost {
    plugins: Vec<Box<dyn InterdexPlugin>>,
}

impl PluginHost {
    pub fn new(plugins: Vec<Box<dyn InterdexPlugin>>) -> Self {
        Self { plugins }
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn should_skip_class(&self, universe: &ClassUniverse, class: ClassId) -> bool {
        for plugin in &self.plugins {
            if plugin.should_skip_class(universe, class) {
                debug!(
                    "skipping class from {} :: {}",
                    plugin.name(),
                    universe.class_name(class)
                );
                return true;
            }
        }
        false
    }

    pub fn should_not_relocate_methods_of_class(
        &self,
        universe: &ClassUniverse,
        class: ClassId,
    ) -> bool {
        for plugin in &self.plugins {
            if plugin.should_not_relocate_methods_of_class(universe, class) {
                debug!(
                    "not relocating methods of class from {} :: {}",
                    plugin.name(),
                    universe.class_name(class)
                );
                return true;
            }
        }
        false
    }

    /// Summed headroom across plugins; queried anew before every admission
    pub fn reserve_refs(&self) -> ReserveRefs {
        let mut total = ReserveRefs::default();
        for plugin in &self.plugins {
            total += plugin.reserve_refs();
        }
        total
    }

    pub fn gather_refs(
        &self,
        universe: &ClassUniverse,
        dex_info: &DexInfo,
        class: ClassId,
        mrefs: &mut Vec<RefId>,
        frefs: &mut Vec<RefId>,
        trefs: &mut Vec<RefId>,
        erased_classes: &mut Vec<ClassId>,
        should_not_relocate_methods: bool,
    ) {
        for plugin in &self.plugins {
            plugin.gather_refs(
                universe,
                dex_info,
                class,
                mrefs,
                frefs,
                trefs,
                erased_classes,
                should_not_relocate_methods,
            );
        }
    }

    pub fn add_to_scope(&mut self, universe: &ClassUniverse, class: ClassId) {
        for plugin in &mut self.plugins {
            plugin.add_to_scope(universe, class);
        }
    }

    /// Iterate plugins mutably, for the per-plugin additional/leftover hooks
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn InterdexPlugin>> {
        self.plugins.iter_mut()
    }
}
