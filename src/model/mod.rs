//! Class universe: the classes, types and references the packer works with.
//!
//! Classes are externally owned in the real pipeline; here the universe is an
//! arena and everything else holds plain index handles into it. Handle
//! equality is identity because names are interned on the way in.

mod refs;

pub use refs::{gather_own_refs, RefSet};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Interned type name handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(u32);

/// Handle to a class in the universe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(u32);

/// Handle to an interned reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RefId(u32);

impl ClassId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Kind of a reference a class induces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefKind {
    Method,
    Field,
    Type,
    String,
}

/// An identity-compared reference. Method and field refs know the type that
/// declares them; type refs point at the named type; string refs point at
/// nothing.
#[derive(Debug, Clone)]
pub struct Ref {
    pub kind: RefKind,
    pub name: String,
    pub target: Option<TypeId>,
}

/// Counts of method definitions a class could give up to the relocator
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RelocatableMethods {
    pub static_methods: u32,
    pub non_static_direct_methods: u32,
    pub virtual_methods: u32,
}

impl RelocatableMethods {
    pub fn total(&self) -> u32 {
        self.static_methods + self.non_static_direct_methods + self.virtual_methods
    }
}

/// A class as the packer sees it: identity, hierarchy, induced references
/// and the two bits the driver is allowed to write.
#[derive(Debug, Clone)]
pub struct DexClass {
    type_id: TypeId,
    pub is_interface: bool,
    pub super_class: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    pub can_rename: bool,
    pub interdex_subgroup: Option<u32>,

    /// Deduplicated references this class induces, by kind
    pub mrefs: Vec<RefId>,
    pub frefs: Vec<RefId>,
    pub trefs: Vec<RefId>,
    pub srefs: Vec<RefId>,

    /// Definitions carried by the class, for the per-container counters
    pub methods_defined: u32,
    pub fields_defined: u32,

    /// Method definitions the relocator may extract
    pub relocatable: RelocatableMethods,

    perf_sensitive: bool,
    keepnames: bool,
}

impl DexClass {
    pub fn new(type_id: TypeId) -> Self {
        Self {
            type_id,
            is_interface: false,
            super_class: None,
            interfaces: Vec::new(),
            can_rename: true,
            interdex_subgroup: None,
            mrefs: Vec::new(),
            frefs: Vec::new(),
            trefs: Vec::new(),
            srefs: Vec::new(),
            methods_defined: 0,
            fields_defined: 0,
            relocatable: RelocatableMethods::default(),
            perf_sensitive: false,
            keepnames: false,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn is_perf_sensitive(&self) -> bool {
        self.perf_sensitive
    }

    pub fn set_perf_sensitive(&mut self, value: bool) {
        self.perf_sensitive = value;
    }

    pub fn keepnames(&self) -> bool {
        self.keepnames
    }

    pub fn set_keepnames(&mut self) {
        self.keepnames = true;
    }

    /// All references of the class across kinds, in declaration order
    pub fn all_refs(&self) -> impl Iterator<Item = RefId> + '_ {
        self.mrefs
            .iter()
            .chain(&self.frefs)
            .chain(&self.trefs)
            .chain(&self.srefs)
            .copied()
    }
}

const CANARY_PREFIX: &str = "Lsecondary/dex";
const JAVA_LANG_OBJECT: &str = "Ljava/lang/Object;";

/// Canary class name for a container index, `Lsecondary/dex<NN>/Canary;`
pub fn canary_name(container_index: usize) -> String {
    format!("Lsecondary/dex{container_index:02}/Canary;")
}

struct TypeEntry {
    name: String,
    class: Option<ClassId>,
}

/// Arena owning every class, interned type name and interned reference
#[derive(Default)]
pub struct ClassUniverse {
    types: Vec<TypeEntry>,
    type_by_name: FxHashMap<String, TypeId>,
    refs: Vec<Ref>,
    ref_by_key: FxHashMap<(RefKind, String), RefId>,
    classes: Vec<DexClass>,
}

impl ClassUniverse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a type name, returning the existing handle if already known
    pub fn intern_type(&mut self, name: &str) -> TypeId {
        if let Some(&id) = self.type_by_name.get(name) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeEntry {
            name: name.to_string(),
            class: None,
        });
        self.type_by_name.insert(name.to_string(), id);
        id
    }

    /// Look up an already-interned type name
    pub fn get_type(&self, name: &str) -> Option<TypeId> {
        self.type_by_name.get(name).copied()
    }

    pub fn type_name(&self, id: TypeId) -> &str {
        &self.types[id.0 as usize].name
    }

    /// Intern a reference, keyed by kind and name
    pub fn intern_ref(&mut self, kind: RefKind, name: &str, target: Option<TypeId>) -> RefId {
        if let Some(&id) = self.ref_by_key.get(&(kind, name.to_string())) {
            return id;
        }
        let id = RefId(self.refs.len() as u32);
        self.refs.push(Ref {
            kind,
            name: name.to_string(),
            target,
        });
        self.ref_by_key.insert((kind, name.to_string()), id);
        id
    }

    pub fn ref_info(&self, id: RefId) -> &Ref {
        &self.refs[id.0 as usize]
    }

    pub fn ref_kind(&self, id: RefId) -> RefKind {
        self.refs[id.0 as usize].kind
    }

    /// Register a class. The class's type must not already carry one.
    pub fn add_class(&mut self, class: DexClass) -> ClassId {
        let type_id = class.type_id;
        debug_assert!(
            self.types[type_id.0 as usize].class.is_none(),
            "type {} already has a class",
            self.type_name(type_id)
        );
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(class);
        self.types[type_id.0 as usize].class = Some(id);
        id
    }

    pub fn class(&self, id: ClassId) -> &DexClass {
        &self.classes[id.0 as usize]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut DexClass {
        &mut self.classes[id.0 as usize]
    }

    /// The class defining a type, if the type is part of the universe
    pub fn class_of_type(&self, type_id: TypeId) -> Option<ClassId> {
        self.types[type_id.0 as usize].class
    }

    pub fn class_name(&self, id: ClassId) -> &str {
        self.type_name(self.class(id).type_id)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn class_ids(&self) -> impl Iterator<Item = ClassId> {
        (0..self.classes.len() as u32).map(ClassId)
    }

    pub fn is_canary(&self, id: ClassId) -> bool {
        self.class_name(id).starts_with(CANARY_PREFIX)
    }

    /// Synthesize a canary class: an abstract public interface extending the
    /// platform root object, pinned against renaming.
    pub fn create_canary(&mut self, name: &str) -> ClassId {
        let object = self.intern_type(JAVA_LANG_OBJECT);
        let type_id = self.intern_type(name);
        let own_tref = self.intern_ref(RefKind::Type, name, Some(type_id));
        let object_tref = self.intern_ref(RefKind::Type, JAVA_LANG_OBJECT, Some(object));
        let mut class = DexClass::new(type_id);
        class.is_interface = true;
        class.super_class = Some(object);
        class.can_rename = false;
        class.trefs = vec![own_tref, object_tref];
        class.set_keepnames();
        self.add_class(class)
    }

    /// Whether `sub` is castable to `sup` along supertypes and interfaces.
    /// Types without a class in the universe terminate the walk.
    pub fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        if sub == sup {
            return true;
        }
        let mut worklist = vec![sub];
        let mut seen = vec![sub];
        while let Some(current) = worklist.pop() {
            let Some(class_id) = self.class_of_type(current) else {
                continue;
            };
            let class = self.class(class_id);
            for parent in class.super_class.iter().chain(&class.interfaces) {
                if *parent == sup {
                    return true;
                }
                if !seen.contains(parent) {
                    seen.push(*parent);
                    worklist.push(*parent);
                }
            }
        }
        false
    }

    /// Canonical type ordering: lexicographic on the interned name
    pub fn compare_types(&self, a: TypeId, b: TypeId) -> Ordering {
        self.type_name(a).cmp(self.type_name(b))
    }

    pub fn compare_type_lists(&self, a: &[TypeId], b: &[TypeId]) -> Ordering {
        for (x, y) in a.iter().zip(b.iter()) {
            match self.compare_types(*x, *y) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        a.len().cmp(&b.len())
    }
}
