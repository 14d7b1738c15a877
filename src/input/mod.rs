//! Universe loading for the CLI: a JSON description of the compiled classes
//! and their induced references, plus the input container partition.

use miette::{miette, IntoDiagnostic, Result, WrapErr};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::model::{ClassId, ClassUniverse, DexClass, RefKind, RelocatableMethods};

/// One class record of the universe file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassSpec {
    /// JVM-style type descriptor, e.g. `Lcom/example/Main;`
    pub name: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub is_interface: bool,
    pub can_rename: bool,
    pub interdex_subgroup: Option<u32>,

    /// Method refs as `Lcom/example/Foo;.bar:(I)V`; the declaring type is
    /// derived from the descriptor prefix
    pub method_refs: Vec<String>,
    /// Field refs as `Lcom/example/Foo;.baz:I`
    pub field_refs: Vec<String>,
    /// Referenced type descriptors
    pub type_refs: Vec<String>,
    /// String constants, scored by the minimizer but never capped
    pub string_refs: Vec<String>,

    pub methods: u32,
    pub fields: u32,
    pub relocatable: RelocatableMethods,
}

impl Default for ClassSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            super_class: None,
            interfaces: Vec::new(),
            is_interface: false,
            can_rename: true,
            interdex_subgroup: None,
            method_refs: Vec::new(),
            field_refs: Vec::new(),
            type_refs: Vec::new(),
            string_refs: Vec::new(),
            methods: 0,
            fields: 0,
            relocatable: RelocatableMethods::default(),
        }
    }
}

/// The universe file: classes plus the input container partition
#[derive(Debug, Deserialize)]
pub struct UniverseSpec {
    pub classes: Vec<ClassSpec>,

    /// Input containers as lists of class names, primary first. When
    /// absent, every class lands in a single primary container.
    #[serde(default)]
    pub containers: Option<Vec<Vec<String>>>,
}

impl UniverseSpec {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read universe file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .into_diagnostic()
            .wrap_err("Failed to parse universe JSON")
    }

    /// Intern everything into a fresh universe and resolve the partition
    pub fn build(&self) -> Result<(ClassUniverse, Vec<Vec<ClassId>>)> {
        let mut universe = ClassUniverse::new();

        // Two passes so refs can point at types declared later in the file
        for spec in &self.classes {
            if spec.name.is_empty() {
                return Err(miette!("class record without a name"));
            }
            let type_id = universe.intern_type(&spec.name);
            if universe.class_of_type(type_id).is_some() {
                return Err(miette!("duplicate class {}", spec.name));
            }
            // Reserve the slot so duplicates are caught in order
            let class = DexClass::new(type_id);
            universe.add_class(class);
        }

        for spec in &self.classes {
            let type_id = universe
                .get_type(&spec.name)
                .expect("type interned in first pass");

            let super_class = spec.super_class.as_deref().map(|s| universe.intern_type(s));
            let interfaces: Vec<_> = spec
                .interfaces
                .iter()
                .map(|i| universe.intern_type(i))
                .collect();

            let mrefs = spec
                .method_refs
                .iter()
                .map(|m| {
                    let target = declaring_type(m).map(|t| universe.intern_type(t));
                    universe.intern_ref(RefKind::Method, m, target)
                })
                .collect();
            let frefs = spec
                .field_refs
                .iter()
                .map(|f| {
                    let target = declaring_type(f).map(|t| universe.intern_type(t));
                    universe.intern_ref(RefKind::Field, f, target)
                })
                .collect();

            // A class always references its own type, its super and its
            // interfaces on top of whatever the input lists.
            let mut tref_names: Vec<String> = vec![spec.name.clone()];
            tref_names.extend(spec.super_class.iter().cloned());
            tref_names.extend(spec.interfaces.iter().cloned());
            tref_names.extend(spec.type_refs.iter().cloned());
            let mut trefs = Vec::new();
            for name in tref_names {
                let target = universe.intern_type(&name);
                let r = universe.intern_ref(RefKind::Type, &name, Some(target));
                if !trefs.contains(&r) {
                    trefs.push(r);
                }
            }

            let srefs = spec
                .string_refs
                .iter()
                .map(|s| universe.intern_ref(RefKind::String, s, None))
                .collect();

            let class_id = universe
                .class_of_type(type_id)
                .expect("class added in first pass");
            let class = universe.class_mut(class_id);
            class.is_interface = spec.is_interface;
            class.super_class = super_class;
            class.interfaces = interfaces;
            class.can_rename = spec.can_rename;
            class.interdex_subgroup = spec.interdex_subgroup;
            class.mrefs = mrefs;
            class.frefs = frefs;
            class.trefs = trefs;
            class.srefs = srefs;
            class.methods_defined = spec.methods;
            class.fields_defined = spec.fields;
            class.relocatable = spec.relocatable;
        }

        let dexen = match &self.containers {
            Some(containers) => containers
                .iter()
                .map(|names| {
                    names
                        .iter()
                        .map(|name| {
                            universe
                                .get_type(name)
                                .and_then(|t| universe.class_of_type(t))
                                .ok_or_else(|| miette!("container references unknown class {name}"))
                        })
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<Vec<_>>>()?,
            None => vec![universe.class_ids().collect()],
        };

        info!(
            "loaded universe: {} classes in {} input containers",
            universe.class_count(),
            dexen.len()
        );
        Ok((universe, dexen))
    }
}

/// The declaring type of a member descriptor, `Lfoo;.bar:...` -> `Lfoo;`
fn declaring_type(descriptor: &str) -> Option<&str> {
    descriptor.split_once(";.").map(|(prefix, _)| {
        // split_once ate the terminating semicolon
        &descriptor[..prefix.len() + 1]
    })
}
