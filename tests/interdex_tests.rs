//! Integration tests for the dexpack emission pipeline
//!
//! These tests drive the full driver over small in-code universes and check
//! the structural invariants of the emitted container sequence.

use dexpack::config::{DexLimits, DexpackConfig};
use dexpack::container::ReserveRefs;
use dexpack::emit::{InterDex, InterDexOutput};
use dexpack::error::DexpackError;
use dexpack::model::{ClassId, ClassUniverse, DexClass, RefId, RefKind};
use dexpack::plugins::{InterdexPlugin, PluginHost};

use proptest::prelude::*;
use std::collections::HashSet;

/// Build a universe from (name, method refs) pairs. Classes carry only the
/// listed method refs, so capacity arithmetic in tests stays exact.
fn build_universe(classes: &[(&str, &[&str])]) -> (ClassUniverse, Vec<ClassId>) {
    let mut universe = ClassUniverse::new();
    let ids = classes
        .iter()
        .map(|(name, mrefs)| {
            let t = universe.intern_type(name);
            let mut cls = DexClass::new(t);
            cls.mrefs = mrefs
                .iter()
                .map(|m| universe.intern_ref(RefKind::Method, m, None))
                .collect();
            universe.add_class(cls)
        })
        .collect();
    (universe, ids)
}

fn config_with_limit(max_method_refs: usize, emit_canaries: bool) -> DexpackConfig {
    DexpackConfig {
        emit_canaries,
        limits: DexLimits {
            max_method_refs,
            ..DexLimits::default()
        },
        ..DexpackConfig::default()
    }
}

/// Run the driver over an empty primary plus the given classes
fn run(
    universe: &mut ClassUniverse,
    classes: &[ClassId],
    order_lines: &[&str],
    config: DexpackConfig,
) -> dexpack::error::Result<InterDexOutput> {
    let lines: Vec<String> = order_lines.iter().map(|s| s.to_string()).collect();
    let dexen = vec![Vec::new(), classes.to_vec()];
    let driver = InterDex::new(universe, dexen, &lines, PluginHost::default(), config)?;
    driver.run()
}

fn container_names(universe: &ClassUniverse, output: &InterDexOutput) -> Vec<Vec<String>> {
    output
        .dexes
        .iter()
        .map(|dex| {
            dex.iter()
                .map(|&cls| universe.class_name(cls).to_string())
                .collect()
        })
        .collect()
}

fn non_canary_names(universe: &ClassUniverse, output: &InterDexOutput) -> Vec<Vec<String>> {
    output
        .dexes
        .iter()
        .map(|dex| {
            dex.iter()
                .filter(|&&cls| !universe.is_canary(cls))
                .map(|&cls| universe.class_name(cls).to_string())
                .collect()
        })
        .collect()
}

// --- S1: empty universe ---

#[test]
fn test_empty_universe_with_canaries() {
    let (mut universe, _) = build_universe(&[]);
    let output = run(&mut universe, &[], &[], config_with_limit(10, true)).unwrap();

    assert_eq!(output.dexes.len(), 1);
    let names = container_names(&universe, &output);
    assert_eq!(names[0], vec!["Lsecondary/dex00/Canary;"]);
    assert_eq!(
        output.manifest,
        "Lsecondary/dex00/Canary;,ordinal=0,coldstart=0,extended=0,primary=1,scroll=0,background=0\n"
    );
}

#[test]
fn test_empty_universe_without_canaries() {
    let (mut universe, _) = build_universe(&[]);
    let output = run(&mut universe, &[], &[], config_with_limit(10, false)).unwrap();
    assert!(output.dexes.is_empty());
    assert!(output.manifest.is_empty());
}

// --- S2: single oversized class ---

#[test]
fn test_oversized_class_is_fatal() {
    let (mut universe, ids) = build_universe(&[("La/Huge;", &["m1", "m2", "m3"])]);
    let result = run(&mut universe, &ids, &[], config_with_limit(2, false));
    assert!(matches!(result, Err(DexpackError::StructuralViolation(_))));
}

// --- S3: exact-fit packing ---

#[test]
fn test_exact_fit_packing() {
    let specs: Vec<(String, Vec<String>)> = (0..7)
        .map(|i| (format!("La/C{i};"), vec![format!("m{i}")]))
        .collect();
    let mut universe = ClassUniverse::new();
    let ids: Vec<ClassId> = specs
        .iter()
        .map(|(name, mrefs)| {
            let t = universe.intern_type(name);
            let mut cls = DexClass::new(t);
            cls.mrefs = mrefs
                .iter()
                .map(|m| universe.intern_ref(RefKind::Method, m, None))
                .collect();
            universe.add_class(cls)
        })
        .collect();

    let output = run(&mut universe, &ids, &[], config_with_limit(3, false)).unwrap();

    // ceil(7 / 3) containers, each full except the last
    assert_eq!(output.dexes.len(), 3);
    assert_eq!(output.dexes[0].len(), 3);
    assert_eq!(output.dexes[1].len(), 3);
    assert_eq!(output.dexes[2].len(), 1);

    // Completeness and no duplication
    let mut seen = HashSet::new();
    for dex in &output.dexes {
        for &cls in dex {
            assert!(seen.insert(cls), "class emitted twice");
        }
    }
    assert_eq!(seen.len(), 7);
}

// --- S4: marker walk ---

#[test]
fn test_marker_walk_sections_and_flush() {
    let (mut universe, ids) = build_universe(&[
        ("La/A;", &["ma"]),
        ("La/B;", &["mb"]),
        ("La/C;", &["mc"]),
        ("La/D;", &["md"]),
    ]);
    let output = run(
        &mut universe,
        &ids,
        &[
            "La/A;",
            "LScrollSetStart;",
            "La/B;",
            "La/C;",
            "LScrollSetEnd;",
            "LDexEndMarker0;",
            "La/D;",
        ],
        config_with_limit(100, true),
    )
    .unwrap();

    let names = non_canary_names(&universe, &output);
    // Primary (empty but canary-marked), the coldstart/scroll dex, then D
    assert_eq!(output.dexes.len(), 3);
    assert_eq!(names[1], vec!["La/A;", "La/B;", "La/C;"]);
    assert_eq!(names[2], vec!["La/D;"]);

    let (_, primary_info) = &output.dex_infos[0];
    assert!(primary_info.primary);

    let (_, scroll_info) = &output.dex_infos[1];
    assert!(scroll_info.coldstart);
    assert!(scroll_info.scroll);
    assert!(!scroll_info.background);

    let (_, tail_info) = &output.dex_infos[2];
    assert!(!tail_info.coldstart);
    assert!(!tail_info.scroll);
}

#[test]
fn test_background_section_arms_extended() {
    let (mut universe, ids) = build_universe(&[
        ("La/E;", &["me"]),
        ("La/F;", &["mf"]),
        ("La/G;", &["mg"]),
    ]);
    let output = run(
        &mut universe,
        &ids,
        &[
            "La/E;",
            "LBackgroundSetStart;",
            "La/F;",
            "LBackgroundSetEnd;",
            "LDexEndMarker0;",
            "La/G;",
        ],
        config_with_limit(100, true),
    )
    .unwrap();

    let (_, bg_info) = &output.dex_infos[1];
    assert!(bg_info.background);
    assert!(bg_info.coldstart);

    // The first class after the background set opens the extended region
    let (_, ext_info) = &output.dex_infos[2];
    assert!(ext_info.extended);
    assert!(!ext_info.background);
    assert!(!ext_info.coldstart);
}

// --- S5: minimizer sharing ---

#[test]
fn test_minimizer_colocates_shared_refs() {
    let (mut universe, ids) = build_universe(&[
        ("La/X;", &["r1", "r2"]),
        ("La/Z;", &["r3", "r4"]),
        ("La/Y;", &["r1", "r2"]),
    ]);
    let output = run(&mut universe, &ids, &[], config_with_limit(2, false)).unwrap();

    let names = container_names(&universe, &output);
    assert_eq!(names.len(), 2);
    // X and Y share both refs and get colocated despite Z between them
    assert_eq!(names[0], vec!["La/X;", "La/Y;"]);
    assert_eq!(names[1], vec!["La/Z;"]);
}

// --- S6 and marker structure errors ---

#[test]
fn test_unterminated_scroll_is_fatal() {
    let (mut universe, ids) = build_universe(&[("La/A;", &["ma"])]);
    let result = run(
        &mut universe,
        &ids,
        &["LScrollSetStart;", "La/A;"],
        config_with_limit(100, false),
    );
    assert!(matches!(result, Err(DexpackError::StructuralViolation(_))));
}

#[test]
fn test_nested_regions_are_fatal() {
    let (mut universe, ids) = build_universe(&[("La/A;", &["ma"])]);
    let result = run(
        &mut universe,
        &ids,
        &[
            "LScrollSetStart;",
            "LBackgroundSetStart;",
            "La/A;",
            "LBackgroundSetEnd;",
            "LScrollSetEnd;",
        ],
        config_with_limit(100, false),
    );
    assert!(matches!(result, Err(DexpackError::StructuralViolation(_))));
}

#[test]
fn test_end_without_start_is_fatal() {
    let (mut universe, ids) = build_universe(&[("La/A;", &["ma"])]);
    let result = run(
        &mut universe,
        &ids,
        &["LScrollSetEnd;", "La/A;"],
        config_with_limit(100, false),
    );
    assert!(matches!(result, Err(DexpackError::StructuralViolation(_))));
}

// --- Capacity and ordering invariants ---

#[test]
fn test_capacity_invariant_with_shared_refs() {
    // 30 classes drawing refs from a pool of 10; the per-container count of
    // distinct refs must respect the cap even though raw sums exceed it
    let mut universe = ClassUniverse::new();
    let pool: Vec<RefId> = (0..10)
        .map(|i| universe.intern_ref(RefKind::Method, &format!("m{i}"), None))
        .collect();
    let ids: Vec<ClassId> = (0..30)
        .map(|i| {
            let t = universe.intern_type(&format!("La/C{i:02};"));
            let mut cls = DexClass::new(t);
            cls.mrefs = vec![pool[i % 10], pool[(i + 1) % 10], pool[(i + 7) % 10]];
            universe.add_class(cls)
        })
        .collect();

    let output = run(&mut universe, &ids, &[], config_with_limit(5, false)).unwrap();

    for dex in &output.dexes {
        let distinct: HashSet<RefId> = dex
            .iter()
            .flat_map(|&cls| universe.class(cls).mrefs.clone())
            .collect();
        assert!(distinct.len() <= 5, "container exceeds method-ref cap");
    }

    let emitted: usize = output.dexes.iter().map(|d| d.len()).sum();
    assert_eq!(emitted, 30);
}

#[test]
fn test_prescribed_prefix_order_is_preserved() {
    let (mut universe, ids) = build_universe(&[
        ("La/C1;", &["m1"]),
        ("La/C2;", &["m2"]),
        ("La/C3;", &["m3"]),
        ("La/C4;", &["m4"]),
    ]);
    let output = run(
        &mut universe,
        &ids,
        &["La/C3;", "La/C1;", "La/C4;"],
        config_with_limit(2, false),
    )
    .unwrap();

    let flat: Vec<String> = container_names(&universe, &output)
        .into_iter()
        .flatten()
        .collect();
    let positions: Vec<usize> = ["La/C3;", "La/C1;", "La/C4;"]
        .iter()
        .map(|n| flat.iter().position(|x| x == *n).unwrap())
        .collect();
    assert!(positions[0] < positions[1]);
    assert!(positions[1] < positions[2]);
}

#[test]
fn test_canary_per_secondary_container() {
    let specs: Vec<(String, Vec<String>)> = (0..6)
        .map(|i| (format!("La/C{i};"), vec![format!("m{i}")]))
        .collect();
    let mut universe = ClassUniverse::new();
    let ids: Vec<ClassId> = specs
        .iter()
        .map(|(name, mrefs)| {
            let t = universe.intern_type(name);
            let mut cls = DexClass::new(t);
            cls.mrefs = mrefs
                .iter()
                .map(|m| universe.intern_ref(RefKind::Method, m, None))
                .collect();
            universe.add_class(cls)
        })
        .collect();

    let output = run(&mut universe, &ids, &[], config_with_limit(2, true)).unwrap();

    // Every container carries exactly one canary named after its index
    for (ordinal, dex) in output.dexes.iter().enumerate() {
        let canaries: Vec<&str> = dex
            .iter()
            .filter(|&&cls| universe.is_canary(cls))
            .map(|&cls| universe.class_name(cls))
            .collect();
        assert_eq!(canaries.len(), 1);
        assert_eq!(canaries[0], format!("Lsecondary/dex{ordinal:02}/Canary;"));
    }
    assert_eq!(output.manifest.lines().count(), output.dexes.len());
}

#[test]
fn test_determinism_across_runs() {
    let build = || {
        build_universe(&[
            ("La/A;", &["m1", "m2"]),
            ("La/B;", &["m2", "m3"]),
            ("La/C;", &["m3", "m4"]),
            ("La/D;", &["m1", "m4"]),
        ])
    };
    let (mut u1, ids1) = build();
    let (mut u2, ids2) = build();
    let out1 = run(&mut u1, &ids1, &[], config_with_limit(3, true)).unwrap();
    let out2 = run(&mut u2, &ids2, &[], config_with_limit(3, true)).unwrap();
    assert_eq!(container_names(&u1, &out1), container_names(&u2, &out2));
    assert_eq!(out1.manifest, out2.manifest);
}

// --- Plugins ---

struct VetoPlugin {
    veto_name: String,
}

impl InterdexPlugin for VetoPlugin {
    fn name(&self) -> &str {
        "veto"
    }

    fn should_skip_class(&self, universe: &ClassUniverse, class: ClassId) -> bool {
        universe.class_name(class) == self.veto_name
    }
}

#[test]
fn test_vetoed_class_is_not_emitted() {
    let (mut universe, ids) = build_universe(&[("La/A;", &["ma"]), ("La/B;", &["mb"])]);
    let dexen = vec![Vec::new(), ids.clone()];
    let plugins = PluginHost::new(vec![Box::new(VetoPlugin {
        veto_name: "La/B;".to_string(),
    })]);
    let driver = InterDex::new(
        &mut universe,
        dexen,
        &[],
        plugins,
        config_with_limit(100, false),
    )
    .unwrap();
    let output = driver.run().unwrap();

    let flat: Vec<String> = container_names(&universe, &output)
        .into_iter()
        .flatten()
        .collect();
    assert!(flat.contains(&"La/A;".to_string()));
    assert!(!flat.contains(&"La/B;".to_string()));
}

struct InjectorPlugin {
    inject_name: String,
    injected: std::cell::Cell<bool>,
}

impl InterdexPlugin for InjectorPlugin {
    fn name(&self) -> &str {
        "injector"
    }

    fn should_skip_class(&self, universe: &ClassUniverse, class: ClassId) -> bool {
        // The injected class only enters through additional_classes
        universe.class_name(class) == self.inject_name
    }

    fn additional_classes(
        &mut self,
        universe: &ClassUniverse,
        _outdex: &[Vec<ClassId>],
        _current_classes: &[ClassId],
    ) -> Vec<ClassId> {
        if self.injected.get() {
            return Vec::new();
        }
        self.injected.set(true);
        universe
            .get_type(&self.inject_name)
            .and_then(|t| universe.class_of_type(t))
            .into_iter()
            .collect()
    }

    fn reserve_refs(&self) -> ReserveRefs {
        ReserveRefs {
            classes: 1,
            ..ReserveRefs::default()
        }
    }
}

#[test]
fn test_plugin_injects_class_at_flush() {
    let (mut universe, ids) = build_universe(&[("La/A;", &["ma"]), ("La/Injected;", &[])]);
    let dexen = vec![Vec::new(), ids.clone()];
    let plugins = PluginHost::new(vec![Box::new(InjectorPlugin {
        inject_name: "La/Injected;".to_string(),
        injected: std::cell::Cell::new(false),
    })]);
    let driver = InterDex::new(
        &mut universe,
        dexen,
        &[],
        plugins,
        config_with_limit(100, false),
    )
    .unwrap();
    let output = driver.run().unwrap();

    let flat: Vec<String> = container_names(&universe, &output)
        .into_iter()
        .flatten()
        .collect();
    assert!(flat.contains(&"La/Injected;".to_string()));
}

struct LeftoverPlugin {
    leftover_name: String,
    drained: std::cell::Cell<bool>,
    leftover: std::cell::Cell<Option<ClassId>>,
}

impl InterdexPlugin for LeftoverPlugin {
    fn name(&self) -> &str {
        "leftover"
    }

    fn should_skip_class(&self, universe: &ClassUniverse, class: ClassId) -> bool {
        if universe.class_name(class) == self.leftover_name {
            self.leftover.set(Some(class));
            return true;
        }
        false
    }

    fn leftover_classes(&mut self) -> Vec<ClassId> {
        if self.drained.get() {
            return Vec::new();
        }
        self.drained.set(true);
        self.leftover.get().into_iter().collect()
    }
}

#[test]
fn test_plugin_leftovers_are_emitted_last() {
    let (mut universe, ids) = build_universe(&[("La/A;", &["ma"]), ("La/Late;", &["ml"])]);
    let dexen = vec![Vec::new(), ids.clone()];
    let plugins = PluginHost::new(vec![Box::new(LeftoverPlugin {
        leftover_name: "La/Late;".to_string(),
        drained: std::cell::Cell::new(false),
        leftover: std::cell::Cell::new(None),
    })]);
    let driver = InterDex::new(
        &mut universe,
        dexen,
        &[],
        plugins,
        config_with_limit(100, false),
    )
    .unwrap();
    let output = driver.run().unwrap();

    let flat: Vec<String> = container_names(&universe, &output)
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(flat.last().unwrap(), "La/Late;");
}

// --- force_single_dex ---

#[test]
fn test_force_single_dex_packs_everything() {
    let (mut universe, ids) = build_universe(&[
        ("La/A;", &["m1"]),
        ("La/B;", &["m2"]),
        ("La/C;", &["m3"]),
    ]);
    let config = DexpackConfig {
        force_single_dex: true,
        // A cap the classes would normally bust
        limits: DexLimits {
            max_method_refs: 1,
            ..DexLimits::default()
        },
        ..DexpackConfig::default()
    };
    let output = run(&mut universe, &ids, &["La/C;"], config).unwrap();

    assert_eq!(output.dexes.len(), 1);
    assert_eq!(output.dexes[0].len(), 3);
    // The listed class leads and is pinned
    assert_eq!(universe.class_name(output.dexes[0][0]), "La/C;");
    assert!(universe.class(output.dexes[0][0]).is_perf_sensitive());
}

// --- Compression sort at flush ---

#[test]
fn test_sort_remaining_classes_orders_suffix() {
    let mut universe = ClassUniverse::new();
    let super_b = universe.intern_type("La/SuperB;");
    let super_a = universe.intern_type("La/SuperA;");
    let tx = universe.intern_type("La/X;");
    let ty = universe.intern_type("La/Y;");

    let mut x = DexClass::new(tx);
    x.super_class = Some(super_b);
    let mut y = DexClass::new(ty);
    y.super_class = Some(super_a);
    let x = universe.add_class(x);
    let y = universe.add_class(y);

    let config = DexpackConfig {
        emit_canaries: false,
        minimize_cross_dex_refs: false,
        sort_remaining_classes: true,
        ..DexpackConfig::default()
    };
    let output = run(&mut universe, &[x, y], &[], config).unwrap();

    // Unrelated classes sort by super-class name: SuperA before SuperB
    let names = container_names(&universe, &output);
    assert_eq!(names[0], vec!["La/Y;", "La/X;"]);
}

// --- Determinism under shuffled input (minimize mode) ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_layout_is_input_order_independent(seed in 0u64..1000) {
        // Fixed class set, permuted insertion order; the minimizer's
        // name-based tie-breaking keeps the layout identical.
        let base: Vec<(String, Vec<String>)> = (0..12)
            .map(|i| {
                (
                    format!("La/P{i:02};"),
                    vec![format!("m{}", i % 5), format!("m{}", (i + 3) % 5)],
                )
            })
            .collect();

        let mut shuffled = base.clone();
        // Cheap deterministic shuffle driven by the seed
        let mut state = seed.wrapping_add(1);
        for i in (1..shuffled.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let j = (state % (i as u64 + 1)) as usize;
            shuffled.swap(i, j);
        }

        let build = |specs: &[(String, Vec<String>)]| {
            let mut universe = ClassUniverse::new();
            let ids: Vec<ClassId> = specs
                .iter()
                .map(|(name, mrefs)| {
                    let t = universe.intern_type(name);
                    let mut cls = DexClass::new(t);
                    cls.mrefs = mrefs
                        .iter()
                        .map(|m| universe.intern_ref(RefKind::Method, m, None))
                        .collect();
                    universe.add_class(cls)
                })
                .collect();
            (universe, ids)
        };

        let (mut u1, ids1) = build(&base);
        let (mut u2, ids2) = build(&shuffled);
        let out1 = run(&mut u1, &ids1, &[], config_with_limit(4, false)).unwrap();
        let out2 = run(&mut u2, &ids2, &[], config_with_limit(4, false)).unwrap();

        prop_assert_eq!(container_names(&u1, &out1), container_names(&u2, &out2));
    }
}
