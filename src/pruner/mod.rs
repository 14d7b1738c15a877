//! Unreferenced-coldstart pruning: iteratively drops coldstart classes that
//! no surviving coldstart class references, so the startup-critical
//! containers stay tight. Non-renameable classes are pinned because they may
//! be reached from native code.

use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::model::{ClassId, ClassUniverse, TypeId};
use crate::order::InterdexOrder;

/// Every type a class mentions: its type refs plus hierarchy links
fn gathered_types<'a>(
    universe: &'a ClassUniverse,
    class: ClassId,
) -> impl Iterator<Item = TypeId> + 'a {
    let cls = universe.class(class);
    cls.trefs
        .iter()
        .filter_map(|&r| universe.ref_info(r).target)
        .chain(cls.super_class)
        .chain(cls.interfaces.iter().copied())
}

/// Types a class's code references (method/field targets and type refs),
/// excluding the class itself
fn referenced_types<'a>(
    universe: &'a ClassUniverse,
    class: ClassId,
) -> impl Iterator<Item = TypeId> + 'a {
    let cls = universe.class(class);
    let own = cls.type_id();
    cls.mrefs
        .iter()
        .chain(&cls.frefs)
        .chain(&cls.trefs)
        .filter_map(move |&r| universe.ref_info(r).target)
        .filter(move |&t| t != own)
}

/// Compute the coldstart classes that nothing in the surviving coldstart
/// closure references. Runs to a fixed point: dropping a class can orphan
/// the classes only it referenced.
///
/// Returns the pruned set; the driver re-emits those classes at the tail of
/// the coldstart phase as non-perf-sensitive.
pub fn find_unreferenced_coldstart_classes(
    universe: &ClassUniverse,
    scope: &[ClassId],
    order: &InterdexOrder,
    static_prune_classes: bool,
) -> FxHashSet<ClassId> {
    let mut unreferenced_classes = FxHashSet::default();
    if !static_prune_classes {
        return unreferenced_classes;
    }

    let coldstart_types: FxHashSet<TypeId> = order
        .classes()
        .map(|c| universe.class(c).type_id())
        .collect();
    let coldstart_classes: Vec<ClassId> = order.classes().collect();

    let mut input_scope: Vec<ClassId> = scope.to_vec();
    let mut old_no_ref = usize::MAX;
    let mut new_no_ref = 0;

    while old_no_ref != new_no_ref {
        old_no_ref = new_no_ref;
        new_no_ref = 0;

        // References from the surviving coldstart classes to other
        // coldstart classes
        let mut cold_cold_references: FxHashSet<TypeId> = input_scope
            .par_iter()
            .filter(|&&cls| coldstart_types.contains(&universe.class(cls).type_id()))
            .flat_map_iter(|&cls| {
                referenced_types(universe, cls).filter(|t| coldstart_types.contains(t))
            })
            .collect();

        // Pin classes that might be reached from native code
        for &cls in scope {
            if !universe.class(cls).can_rename {
                cold_cold_references.insert(universe.class(cls).type_id());
            }
        }

        // Pull in everything the referenced classes mention, even without a
        // direct opcode reference
        let mut expanded: Vec<TypeId> = Vec::new();
        for &cls in &input_scope {
            if cold_cold_references.contains(&universe.class(cls).type_id()) {
                expanded.extend(gathered_types(universe, cls));
            }
        }
        cold_cold_references.extend(expanded);

        let mut output_scope = Vec::new();
        for &cls in &coldstart_classes {
            let class = universe.class(cls);
            if class.can_rename && !cold_cold_references.contains(&class.type_id()) {
                new_no_ref += 1;
                unreferenced_classes.insert(cls);
            } else {
                output_scope.push(cls);
            }
        }
        debug!("found {new_no_ref} classes in coldstart with no references");
        input_scope = output_scope;
    }

    unreferenced_classes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DexClass, RefKind};
    use crate::order::load_interdex_order;

    /// Universe where each class may reference others by type ref
    fn build(classes: &[(&str, &[&str], bool)]) -> (ClassUniverse, Vec<ClassId>) {
        let mut universe = ClassUniverse::new();
        for (name, _, _) in classes {
            universe.intern_type(name);
        }
        let ids = classes
            .iter()
            .map(|(name, targets, can_rename)| {
                let t = universe.intern_type(name);
                let trefs = targets
                    .iter()
                    .map(|target| {
                        let target_type = universe.intern_type(target);
                        universe.intern_ref(RefKind::Type, target, Some(target_type))
                    })
                    .collect();
                let mut cls = DexClass::new(t);
                cls.trefs = trefs;
                cls.can_rename = *can_rename;
                universe.add_class(cls)
            })
            .collect();
        (universe, ids)
    }

    fn order_of(universe: &ClassUniverse, scope: &[ClassId], names: &[&str]) -> InterdexOrder {
        let lines: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        load_interdex_order(universe, scope, &lines).unwrap()
    }

    #[test]
    fn test_disabled_pruner_returns_empty() {
        let (universe, ids) = build(&[("La/A;", &[], true)]);
        let order = order_of(&universe, &ids, &["La/A;"]);
        let pruned = find_unreferenced_coldstart_classes(&universe, &ids, &order, false);
        assert!(pruned.is_empty());
    }

    #[test]
    fn test_unreferenced_renameable_class_is_pruned() {
        // Pinned A references B; C is referenced by nobody
        let (universe, ids) = build(&[
            ("La/A;", &["La/B;"], false),
            ("La/B;", &[], true),
            ("La/C;", &[], true),
        ]);
        let order = order_of(&universe, &ids, &["La/A;", "La/B;", "La/C;"]);
        let pruned = find_unreferenced_coldstart_classes(&universe, &ids, &order, true);
        assert!(pruned.contains(&ids[2]));
        assert!(!pruned.contains(&ids[0]));
        assert!(!pruned.contains(&ids[1]));
    }

    #[test]
    fn test_non_renameable_class_is_pinned() {
        let (universe, ids) = build(&[("La/A;", &[], false)]);
        let order = order_of(&universe, &ids, &["La/A;"]);
        let pruned = find_unreferenced_coldstart_classes(&universe, &ids, &order, true);
        assert!(pruned.is_empty());
    }

    #[test]
    fn test_pruning_cascades_to_fixed_point() {
        // Chain A -> B; once A is pruned, B loses its only referrer.
        // A is pinned by nothing, referenced by nothing.
        let (universe, ids) = build(&[
            ("La/A;", &["La/B;"], true),
            ("La/B;", &[], true),
        ]);
        let order = order_of(&universe, &ids, &["La/A;", "La/B;"]);
        let pruned = find_unreferenced_coldstart_classes(&universe, &ids, &order, true);
        assert!(pruned.contains(&ids[0]));
        assert!(pruned.contains(&ids[1]));
    }
}
