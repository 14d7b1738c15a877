use rustc_hash::FxHashSet;

use super::{ClassUniverse, DexClass, RefId};

/// Deduplicated method/field/type references attributable to a class or
/// accumulated by an open container. String refs are scored by the minimizer
/// but never capped, so they do not appear here.
#[derive(Debug, Default, Clone)]
pub struct RefSet {
    pub methods: FxHashSet<RefId>,
    pub fields: FxHashSet<RefId>,
    pub types: FxHashSet<RefId>,
}

impl RefSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The deduplicated refs a class induces on its own
    pub fn from_class(class: &DexClass) -> Self {
        let mut set = Self::new();
        set.methods.extend(&class.mrefs);
        set.fields.extend(&class.frefs);
        set.types.extend(&class.trefs);
        set
    }

    /// Build from raw ref lists, typically after plugins appended theirs
    pub fn from_parts(mrefs: &[RefId], frefs: &[RefId], trefs: &[RefId]) -> Self {
        let mut set = Self::new();
        set.methods.extend(mrefs);
        set.fields.extend(frefs);
        set.types.extend(trefs);
        set
    }

    pub fn insert_all(&mut self, other: &RefSet) {
        self.methods.extend(&other.methods);
        self.fields.extend(&other.fields);
        self.types.extend(&other.types);
    }

    /// Refs in `self` not yet present in `other`, per kind
    pub fn count_new_in(&self, other: &RefSet) -> (usize, usize, usize) {
        (
            self.methods.difference(&other.methods).count(),
            self.fields.difference(&other.fields).count(),
            self.types.difference(&other.types).count(),
        )
    }

    /// Size of the union with another set
    pub fn union_len_with(&self, other: &RefSet) -> usize {
        let (m, f, t) = self.count_new_in(other);
        other.len() + m + f + t
    }

    pub fn len(&self) -> usize {
        self.methods.len() + self.fields.len() + self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Gather the refs of a class into plain per-kind lists. Plugins append to
/// these before they are deduplicated into a [`RefSet`].
pub fn gather_own_refs(
    universe: &ClassUniverse,
    class: super::ClassId,
    mrefs: &mut Vec<RefId>,
    frefs: &mut Vec<RefId>,
    trefs: &mut Vec<RefId>,
) {
    let class = universe.class(class);
    mrefs.extend(&class.mrefs);
    frefs.extend(&class.frefs);
    trefs.extend(&class.trefs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RefKind;

    #[test]
    fn test_refset_dedups_overlap() {
        let mut universe = ClassUniverse::new();
        let t = universe.intern_type("La/A;");
        let r1 = universe.intern_ref(RefKind::Method, "La/B;.f:()V", None);
        let r2 = universe.intern_ref(RefKind::Method, "La/B;.g:()V", None);

        let mut a = DexClass::new(t);
        a.mrefs = vec![r1, r2];
        let a_set = RefSet::from_class(&a);

        let mut container = RefSet::new();
        container.methods.insert(r1);

        let (new_m, new_f, new_t) = a_set.count_new_in(&container);
        assert_eq!((new_m, new_f, new_t), (1, 0, 0));
        assert_eq!(a_set.union_len_with(&container), 2);
    }

    #[test]
    fn test_insert_all_and_len() {
        let mut universe = ClassUniverse::new();
        let m = universe.intern_ref(RefKind::Method, "m", None);
        let f = universe.intern_ref(RefKind::Field, "f", None);

        let mut a = RefSet::new();
        a.methods.insert(m);
        let mut b = RefSet::new();
        b.fields.insert(f);

        a.insert_all(&b);
        assert_eq!(a.len(), 2);
        assert!(!a.is_empty());
    }
}
