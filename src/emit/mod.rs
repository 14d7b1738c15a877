//! The emission driver: walks the primary container, the prescribed
//! interdex prefix and the minimizer-driven remainder, flushing containers
//! as they fill and minting the per-container canary classes.

use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;
use std::fmt::Write as _;
use tracing::{debug, info, trace};

use crate::config::DexpackConfig;
use crate::container::{DexInfo, DexesStats, DexesStructure};
use crate::error::{DexpackError, Result};
use crate::minimizer::CrossDexRefMinimizer;
use crate::model::{canary_name, gather_own_refs, ClassId, ClassUniverse, RefId, RefSet};
use crate::order::{load_interdex_order, InterdexOrder, OrderEntry};
use crate::plugins::PluginHost;
use crate::pruner::find_unreferenced_coldstart_classes;
use crate::relocate::CrossDexRelocator;

/// Canary naming runs out of digits past this container index
const MAX_DEX_NUM: usize = 99;

/// The finalized container sequence with its sidecar manifest
#[derive(Debug)]
pub struct InterDexOutput {
    /// Ordered containers; index 0 is the primary when one was emitted
    pub dexes: Vec<Vec<ClassId>>,
    /// Per canary-minted container: canary name and flag snapshot
    pub dex_infos: Vec<(String, DexInfo)>,
    /// One line per canary-minted container
    pub manifest: String,
    pub stats: DexesStats,
}

/// The InterDex driver. Consumes the class universe partition, the
/// prescribed order and the plugin set, and produces the ordered container
/// sequence.
pub struct InterDex<'a> {
    universe: &'a mut ClassUniverse,
    dexen: Vec<Vec<ClassId>>,
    scope: Vec<ClassId>,
    plugins: PluginHost,
    config: DexpackConfig,
    dexes: DexesStructure,
    order: InterdexOrder,
    minimizer: CrossDexRefMinimizer,
    relocator: Option<CrossDexRelocator>,

    emitting_scroll_set: bool,
    emitting_bg_set: bool,
    emitted_bg_set: bool,
    emitting_extended: bool,
    end_markers_seen: usize,

    outdex: Vec<Vec<ClassId>>,
    dex_infos: Vec<(String, DexInfo)>,
}

impl<'a> InterDex<'a> {
    pub fn new(
        universe: &'a mut ClassUniverse,
        dexen: Vec<Vec<ClassId>>,
        order_lines: &[String],
        plugins: PluginHost,
        config: DexpackConfig,
    ) -> Result<Self> {
        config.validate()?;
        let scope: Vec<ClassId> = dexen.iter().flatten().copied().collect();
        let order = load_interdex_order(universe, &scope, order_lines)?;
        let minimizer = CrossDexRefMinimizer::new(config.ref_weights.clone());
        let relocator = config
            .relocator
            .is_enabled()
            .then(|| CrossDexRelocator::new(config.relocator.clone()));
        let dexes = DexesStructure::new(config.limits.clone());
        Ok(Self {
            universe,
            dexen,
            scope,
            plugins,
            config,
            dexes,
            order,
            minimizer,
            relocator,
            emitting_scroll_set: false,
            emitting_bg_set: false,
            emitted_bg_set: false,
            emitting_extended: false,
            end_markers_seen: 0,
            outdex: Vec::new(),
            dex_infos: Vec::new(),
        })
    }

    /// Run the full emission sequence on the root store
    pub fn run(mut self) -> Result<InterDexOutput> {
        if self.config.force_single_dex {
            return self.run_force_single_dex();
        }

        let unreferenced = find_unreferenced_coldstart_classes(
            self.universe,
            &self.scope,
            &self.order,
            self.config.static_prune_classes,
        );

        let primary = self.dexen.first().cloned().unwrap_or_default();
        if !self.config.normal_primary_dex {
            self.emit_primary_dex(&primary, &unreferenced)?;
        } else if self.config.keep_primary_order && !self.order.is_empty() {
            // The primary classes keep their leading position in the
            // cross-container ordering
            let mut entries: Vec<OrderEntry> =
                primary.iter().map(|&c| OrderEntry::Class(c)).collect();
            entries.append(&mut self.order.entries);
            self.order.entries = entries;
        }

        let mut dex_info = DexInfo::default();
        self.emit_interdex_classes(&mut dex_info, &unreferenced)?;
        self.emit_remaining_classes(&mut dex_info)?;

        let leftover_batches: Vec<(String, Vec<ClassId>)> = self
            .plugins
            .iter_mut()
            .map(|p| (p.name().to_string(), p.leftover_classes()))
            .collect();
        for (plugin_name, batch) in leftover_batches {
            for cls in batch {
                debug!(
                    "emitting {}-plugin generated leftover class :: {}",
                    plugin_name,
                    self.universe.class_name(cls)
                );
                self.emit_class(&mut dex_info, cls, false, false, None)?;
            }
        }

        if self.dexes.current().class_count() > 0 {
            self.flush_out_dex(&mut dex_info)?;
        }

        self.finish()
    }

    /// Plain emission for auxiliary (non-root) stores: no markers, no
    /// primary policy, input order.
    pub fn run_nonroot_store(mut self) -> Result<InterDexOutput> {
        let mut dex_info = DexInfo::default();
        for cls in self.scope.clone() {
            self.emit_class(&mut dex_info, cls, false, false, None)?;
        }
        if self.dexes.current().class_count() > 0 {
            self.flush_out_dex(&mut dex_info)?;
        }
        self.finish()
    }

    fn run_force_single_dex(mut self) -> Result<InterDexOutput> {
        let mut scope = self.scope.clone();
        let mut dex_info = DexInfo {
            primary: true,
            ..DexInfo::default()
        };

        let order_classes: Vec<ClassId> = self.order.classes().collect();
        if order_classes.is_empty() {
            debug!("single dex mode: no coldstart classes");
        } else {
            dex_info.coldstart = true;
            order_classes_by_list(self.universe, &order_classes, &mut scope);
        }

        // Capacity checking is the caller's promise here; overflow surfaces
        // later when the container file is written.
        for cls in scope {
            let refs = self.gather_refs(&dex_info, cls, None);
            self.dexes.add_class_no_checks(self.universe, &refs, cls);
        }
        if self.dexes.current().class_count() > 0 {
            self.flush_out_dex(&mut dex_info)?;
        }
        self.finish()
    }

    /// Emit the read-only primary container: first the primary classes that
    /// appear in the prescribed order, in that order and perf-sensitive,
    /// then the rest in their input order.
    fn emit_primary_dex(
        &mut self,
        primary: &[ClassId],
        unreferenced: &FxHashSet<ClassId>,
    ) -> Result<()> {
        let primary_set: FxHashSet<ClassId> = primary.iter().copied().collect();
        let mut primary_info = DexInfo {
            primary: true,
            ..DexInfo::default()
        };

        let mut in_order = 0usize;
        let mut skipped = 0usize;
        for cls in self.order.classes().collect::<Vec<_>>() {
            if !primary_set.contains(&cls) {
                continue;
            }
            if unreferenced.contains(&cls) {
                trace!(
                    "[primary dex]: {} no longer linked to coldstart set",
                    self.universe.class_name(cls)
                );
                skipped += 1;
                continue;
            }
            self.emit_class(&mut primary_info, cls, true, true, None)?;
            in_order += 1;
        }

        for &cls in primary {
            self.emit_class(&mut primary_info, cls, true, false, None)?;
        }
        debug!(
            "[primary dex]: {} of {} classes emitted from the prescribed order, {} skipped",
            in_order,
            primary.len(),
            skipped
        );

        self.flush_out_dex(&mut primary_info)?;

        if self.dexes.num_dexes() > 1 {
            return Err(DexpackError::StructuralViolation(format!(
                "primary container no longer fits in one container but in {}",
                self.dexes.num_dexes()
            )));
        }
        Ok(())
    }

    /// Walk the prescribed order: classes are emitted perf-sensitive, the
    /// markers drive the section flags and container boundaries.
    fn emit_interdex_classes(
        &mut self,
        dex_info: &mut DexInfo,
        unreferenced: &FxHashSet<ClassId>,
    ) -> Result<()> {
        if self.order.is_empty() {
            debug!("no prescribed interdex classes");
            return Ok(());
        }

        // Coldstart has no interaction with the extended and scroll sets,
        // but those two do interact with each other.
        dex_info.coldstart = true;

        let entries = self.order.entries.clone();
        let mut skipped_in_secondary = 0usize;

        for (position, entry) in entries.iter().enumerate() {
            match *entry {
                OrderEntry::ScrollStart => {
                    if self.emitting_scroll_set {
                        return Err(DexpackError::StructuralViolation(
                            "scroll start marker discovered after another scroll start marker"
                                .to_string(),
                        ));
                    }
                    if self.emitting_bg_set {
                        return Err(DexpackError::StructuralViolation(
                            "scroll start marker discovered between background set markers"
                                .to_string(),
                        ));
                    }
                    debug!("marking dex as scroll at prescribed-order entry {position}");
                    self.emitting_scroll_set = true;
                    dex_info.scroll = true;
                }
                OrderEntry::ScrollEnd => {
                    if !self.emitting_scroll_set {
                        return Err(DexpackError::StructuralViolation(
                            "scroll end marker discovered without scroll start marker".to_string(),
                        ));
                    }
                    self.emitting_scroll_set = false;
                }
                OrderEntry::BgStart => {
                    if self.emitting_bg_set {
                        return Err(DexpackError::StructuralViolation(
                            "background start marker discovered after another background start marker"
                                .to_string(),
                        ));
                    }
                    if self.emitting_scroll_set {
                        return Err(DexpackError::StructuralViolation(
                            "background start marker discovered between scroll set markers"
                                .to_string(),
                        ));
                    }
                    debug!("marking dex as background at prescribed-order entry {position}");
                    self.emitting_bg_set = true;
                    dex_info.background = true;
                }
                OrderEntry::BgEnd => {
                    if !self.emitting_bg_set {
                        return Err(DexpackError::StructuralViolation(
                            "background end marker discovered without background start marker"
                                .to_string(),
                        ));
                    }
                    self.emitting_bg_set = false;
                    self.emitted_bg_set = true;
                }
                OrderEntry::EndMarker => {
                    if self.emitting_scroll_set {
                        return Err(DexpackError::StructuralViolation(
                            "end marker discovered between scroll start/end markers".to_string(),
                        ));
                    }
                    if self.emitting_bg_set {
                        return Err(DexpackError::StructuralViolation(
                            "end marker discovered between background start/end markers"
                                .to_string(),
                        ));
                    }
                    debug!("terminating dex due to end marker at entry {position}");
                    self.flush_out_dex(dex_info)?;
                    self.end_markers_seen += 1;
                    if self.end_markers_seen == self.order.end_marker_count {
                        dex_info.coldstart = false;
                    }
                }
                OrderEntry::Class(cls) => {
                    if unreferenced.contains(&cls) {
                        trace!(
                            "{} no longer linked to coldstart set",
                            self.universe.class_name(cls)
                        );
                        skipped_in_secondary += 1;
                        continue;
                    }
                    if self.emitted_bg_set {
                        self.emitted_bg_set = false;
                        self.emitting_extended = true;
                        dex_info.extended = true;
                    }
                    dex_info.betamap_ordered = true;
                    self.emit_class(dex_info, cls, true, true, None)?;
                }
            }
        }

        // The classes pruned out of the coldstart set still get emitted,
        // as a cold, non-perf-sensitive tail.
        for entry in &entries {
            if let OrderEntry::Class(cls) = *entry {
                if unreferenced.contains(&cls) {
                    self.emit_class(dex_info, cls, true, false, None)?;
                }
            }
        }
        debug!(
            "[interdex order]: {skipped_in_secondary} classes unreferenced from the prescribed order"
        );

        if self.emitting_scroll_set {
            return Err(DexpackError::StructuralViolation(
                "unterminated scroll set marker".to_string(),
            ));
        }
        if self.emitting_bg_set {
            return Err(DexpackError::StructuralViolation(
                "unterminated background set marker".to_string(),
            ));
        }
        self.emitting_extended = false;
        Ok(())
    }

    /// Emit everything neither the primary nor the prescribed order placed
    fn emit_remaining_classes(&mut self, dex_info: &mut DexInfo) -> Result<()> {
        if !self.config.minimize_cross_dex_refs {
            for cls in self.scope.clone() {
                self.emit_class(dex_info, cls, true, false, None)?;
            }
            return Ok(());
        }

        self.init_minimizer_and_relocate_methods()?;

        // Strategy: at the start of a fresh container pick the "worst"
        // class (most unapplied refs), otherwise the "best" one (shares
        // many applied refs, introduces few unapplied ones).
        let mut dexnum = self.dexes.num_dexes();
        let mut pick_worst = true;
        while !self.minimizer.is_empty() {
            let mut picked = None;
            if pick_worst {
                if let Some(worst) = self.minimizer.worst() {
                    if self.minimizer.get_unapplied_refs(worst) > self.minimizer.get_applied_refs()
                    {
                        picked = Some(worst);
                    }
                }
            }
            let cls = match picked {
                Some(cls) => cls,
                None => self.minimizer.front().expect("non-empty candidate pool"),
            };

            let mut erased_classes = Vec::new();
            let emitted = self.emit_class(dex_info, cls, false, false, Some(&mut erased_classes))?;
            let new_dexnum = self.dexes.num_dexes();
            let overflowed = dexnum != new_dexnum;
            self.minimizer.erase(self.universe, cls, emitted, overflowed);

            if let Some(relocator) = self.relocator.as_mut() {
                let reserves = self.plugins.reserve_refs();
                relocator.add_to_current_dex(self.universe, &mut self.dexes, &reserves, cls);
            }

            // Refs owned by erased classes count as effectively emitted
            for erased in erased_classes {
                debug!(
                    "[dex ordering] applying erased class {}",
                    self.universe.class_name(erased)
                );
                if !self.plugins.should_skip_class(self.universe, erased) {
                    return Err(DexpackError::PluginConflict(format!(
                        "erased class {} is not vetoed by any plugin",
                        self.universe.class_name(erased)
                    )));
                }
                self.minimizer.insert(self.universe, erased);
                self.minimizer.erase(self.universe, erased, true, false);
            }

            pick_worst = (pick_worst && !emitted) || overflowed;
            dexnum = new_dexnum;
        }

        if let Some(relocator) = self.relocator.as_mut() {
            relocator.cleanup(self.universe);
        }
        Ok(())
    }

    fn init_minimizer_and_relocate_methods(&mut self) -> Result<()> {
        let w = self.minimizer.config();
        debug!(
            "[dex ordering] cross-dex-ref-minimizer active, ref weights {}/{}/{}/{}, seed weights {}/{}/{}/{}",
            w.method_ref_weight,
            w.field_ref_weight,
            w.type_ref_weight,
            w.string_ref_weight,
            w.method_seed_weight,
            w.field_seed_weight,
            w.type_seed_weight,
            w.string_seed_weight
        );

        let mut classes_to_insert = Vec::new();
        for cls in self.scope.clone() {
            if self.universe.is_canary(cls) || self.dexes.has_class(cls) {
                continue;
            }

            if self.relocator.is_some()
                && !self
                    .plugins
                    .should_not_relocate_methods_of_class(self.universe, cls)
            {
                let relocated = self
                    .relocator
                    .as_mut()
                    .expect("relocator present")
                    .relocate_methods(self.universe, cls);
                for helper in relocated {
                    // The new class is now effectively part of the scope
                    self.plugins.add_to_scope(self.universe, helper);
                    if self.plugins.should_skip_class(self.universe, helper) {
                        return Err(DexpackError::PluginConflict(format!(
                            "plugin vetoes relocated helper {}",
                            self.universe.class_name(helper)
                        )));
                    }
                    // Placement of helpers belongs to the relocator
                    self.minimizer.ignore(helper);
                    classes_to_insert.push(helper);
                }
            }

            if self.plugins.should_skip_class(self.universe, cls) {
                // A vetoed class may come back through the additional-class
                // mechanism, so its refs still shape the histogram
                self.minimizer.sample(self.universe, cls);
                continue;
            }
            classes_to_insert.push(cls);
        }

        // Seed frequencies first, then compute priorities
        for &cls in &classes_to_insert {
            self.minimizer.sample(self.universe, cls);
        }
        for &cls in &classes_to_insert {
            self.minimizer.insert(self.universe, cls);
        }

        // Classes already sitting in the open container have their refs
        // charged as applied.
        for cls in self.dexes.current().classes().to_vec() {
            self.minimizer.sample(self.universe, cls);
            self.minimizer.insert(self.universe, cls);
            self.minimizer.erase(self.universe, cls, true, false);
        }
        Ok(())
    }

    /// Gather the refs a class would add: its own plus plugin contributions
    fn gather_refs(
        &self,
        dex_info: &DexInfo,
        cls: ClassId,
        erased_classes: Option<&mut Vec<ClassId>>,
    ) -> RefSet {
        let mut mrefs: Vec<RefId> = Vec::new();
        let mut frefs: Vec<RefId> = Vec::new();
        let mut trefs: Vec<RefId> = Vec::new();
        gather_own_refs(self.universe, cls, &mut mrefs, &mut frefs, &mut trefs);

        let should_not_relocate = self
            .plugins
            .should_not_relocate_methods_of_class(self.universe, cls);
        let mut local_erased = Vec::new();
        let erased = erased_classes.unwrap_or(&mut local_erased);
        self.plugins.gather_refs(
            self.universe,
            dex_info,
            cls,
            &mut mrefs,
            &mut frefs,
            &mut trefs,
            erased,
            should_not_relocate,
        );

        RefSet::from_parts(&mrefs, &frefs, &trefs)
    }

    /// Try to place one class into the open container, flushing into a
    /// fresh one on overflow. Returns whether the class was placed.
    fn emit_class(
        &mut self,
        dex_info: &mut DexInfo,
        cls: ClassId,
        check_if_skip: bool,
        perf_sensitive: bool,
        mut erased_classes: Option<&mut Vec<ClassId>>,
    ) -> Result<bool> {
        if self.universe.is_canary(cls) {
            // Canaries are handled at flush time
            return Ok(false);
        }
        if self.dexes.has_class(cls) {
            trace!("trying to re-add class {}", self.universe.class_name(cls));
            return Ok(false);
        }
        if check_if_skip && self.plugins.should_skip_class(self.universe, cls) {
            return Ok(false);
        }

        if perf_sensitive {
            self.universe.class_mut(cls).set_perf_sensitive(true);
        }

        let refs = self.gather_refs(dex_info, cls, erased_classes.as_deref_mut());
        let reserves = self.plugins.reserve_refs();
        if self
            .dexes
            .add_class_if_fits(self.universe, &refs, cls, &reserves)
        {
            return Ok(true);
        }

        self.flush_out_dex(dex_info)?;

        // Plugins may keep internal state they reset at flush, so the refs
        // are gathered again from scratch for the fresh container.
        if let Some(erased) = erased_classes.as_deref_mut() {
            erased.clear();
        }
        let refs = self.gather_refs(dex_info, cls, erased_classes);
        let reserves = self.plugins.reserve_refs();
        if !self
            .dexes
            .add_class_if_fits(self.universe, &refs, cls, &reserves)
        {
            // The class alone busts the caps of an empty container; no
            // packing can ever place it.
            return Err(DexpackError::StructuralViolation(format!(
                "class {} does not fit into an empty container",
                self.universe.class_name(cls)
            )));
        }
        Ok(true)
    }

    /// Finalize the open container: mint its canary, collect plugin
    /// additions, optionally sort the unordered suffix, and append it to
    /// the output sequence.
    fn flush_out_dex(&mut self, dex_info: &mut DexInfo) -> Result<()> {
        let dexnum = self.dexes.num_dexes();
        if dex_info.primary {
            debug!(
                "writing out primary dex with {} classes",
                self.dexes.current().class_count()
            );
        } else {
            debug!(
                "writing out secondary dex number {}: coldstart={} extended={} background={} scroll={}, {} classes",
                self.dexes.stats().num_secondary_dexes + 1,
                dex_info.coldstart,
                dex_info.extended,
                dex_info.background,
                dex_info.scroll,
                self.dexes.current().class_count()
            );
        }

        // An empty primary still gets marked so the runtime can tell the
        // container was produced.
        let mint_canary = self.config.emit_canaries
            && (!dex_info.primary || self.dexes.current().class_count() == 0);
        if mint_canary {
            if dexnum > MAX_DEX_NUM {
                return Err(DexpackError::StructuralViolation(format!(
                    "container count exceeded the canary namespace at {dexnum}"
                )));
            }
            let name = canary_name(dexnum);
            let canary = match self
                .universe
                .get_type(&name)
                .and_then(|t| self.universe.class_of_type(t))
            {
                Some(existing) => existing,
                None => {
                    trace!("no canary class {name} found, creating one");
                    self.universe.create_canary(&name)
                }
            };
            let refs = RefSet::from_class(self.universe.class(canary));
            self.dexes.add_class_no_checks(self.universe, &refs, canary);
            self.dex_infos.push((name, *dex_info));
        }

        let mut additional: FxHashSet<ClassId> = FxHashSet::default();
        let mut current: Vec<ClassId> = self.dexes.current().classes().to_vec();
        current.extend_from_slice(self.dexes.current().squashed_classes());
        let universe = &mut *self.universe;
        let dexes = &mut self.dexes;
        let outdex = &self.outdex;
        for plugin in self.plugins.iter_mut() {
            for cls in plugin.additional_classes(universe, outdex, &current) {
                debug!(
                    "emitting {}-plugin-generated class :: {}",
                    plugin.name(),
                    universe.class_name(cls)
                );
                let refs = RefSet::from_class(universe.class(cls));
                dexes.add_class_no_checks(universe, &refs, cls);
                // Containers carrying ordered classes keep their injected
                // classes pinned too
                if dex_info.primary || dex_info.betamap_ordered {
                    universe.class_mut(cls).set_perf_sensitive(true);
                }
                additional.insert(cls);
            }
        }

        if self.dexes.current().class_count() == 0 {
            // Nothing ended up in this container; drop it rather than
            // emitting an empty file.
            self.reset_transient_flags(dex_info);
            return Ok(());
        }

        let mut classes = self.dexes.end_dex(*dex_info);

        if self.config.sort_remaining_classes {
            let is_ordered = |universe: &ClassUniverse, cls: ClassId| {
                universe.class(cls).is_perf_sensitive() && !additional.contains(&cls)
            };
            let mut prefix_len = 0;
            while prefix_len < classes.len() && is_ordered(self.universe, classes[prefix_len]) {
                prefix_len += 1;
            }
            if classes[prefix_len..]
                .iter()
                .any(|&cls| is_ordered(self.universe, cls))
            {
                return Err(DexpackError::StructuralViolation(
                    "ordered class found after the unordered suffix".to_string(),
                ));
            }
            debug!(
                "skipping {} and sorting {} classes",
                prefix_len,
                classes.len() - prefix_len
            );
            let universe = &*self.universe;
            classes[prefix_len..]
                .sort_by(|&a, &b| compare_classes_for_compressed_size(universe, a, b));
        }

        self.outdex.push(classes);
        self.reset_transient_flags(dex_info);
        Ok(())
    }

    fn reset_transient_flags(&self, dex_info: &mut DexInfo) {
        if !self.emitting_scroll_set {
            dex_info.scroll = false;
        }
        if !self.emitting_bg_set {
            dex_info.background = false;
        }
        if !self.emitting_extended {
            dex_info.extended = false;
        }
        // Reset every time the driver advances to the next writable dex
        dex_info.betamap_ordered = false;
    }

    fn finish(self) -> Result<InterDexOutput> {
        let mut manifest = String::new();
        for (ordinal, (name, info)) in self.dex_infos.iter().enumerate() {
            let _ = writeln!(
                manifest,
                "{name},ordinal={ordinal},coldstart={},extended={},primary={},scroll={},background={}",
                u8::from(info.coldstart),
                u8::from(info.extended),
                u8::from(info.primary),
                u8::from(info.scroll),
                u8::from(info.background),
            );
        }

        let stats = *self.dexes.stats();
        info!("InterDex stats:");
        info!("\t dex count: {}", stats.num_dexes);
        info!("\t secondary dex count: {}", stats.num_secondary_dexes);
        info!("\t coldstart dex count: {}", stats.num_coldstart_dexes);
        info!("\t extended dex count: {}", stats.num_extended_dexes);
        info!("\t scroll dex count: {}", stats.num_scroll_dexes);
        info!("\t {} classes", stats.num_classes);
        info!("\t {} mrefs", stats.num_mrefs);
        info!("\t {} frefs", stats.num_frefs);
        info!("\t {} trefs", stats.num_trefs);

        Ok(InterDexOutput {
            dexes: self.outdex,
            dex_infos: self.dex_infos,
            manifest,
            stats,
        })
    }
}

/// Stable-sort `scope` so the listed classes lead in list order, marking
/// them perf-sensitive. Everything unlisted keeps its relative order after.
pub fn order_classes_by_list(
    universe: &mut ClassUniverse,
    list: &[ClassId],
    scope: &mut [ClassId],
) {
    let mut priorities: FxHashMap<ClassId, u32> = FxHashMap::default();
    for (position, &cls) in list.iter().enumerate() {
        priorities.entry(cls).or_insert(position as u32);
        universe.class_mut(cls).set_perf_sensitive(true);
    }
    debug!("ordered {} classes at the beginning", priorities.len());
    scope.sort_by_key(|cls| priorities.get(cls).copied().unwrap_or(u32::MAX));
}

/// Comparator for the compression-friendly suffix order: canaries first,
/// interfaces after non-interfaces, supertypes after their subtypes, then
/// canonical type ordering of the super-class and interface lists.
pub fn compare_classes_for_compressed_size(
    universe: &ClassUniverse,
    c1: ClassId,
    c2: ClassId,
) -> Ordering {
    let canary1 = universe.is_canary(c1);
    let canary2 = universe.is_canary(c2);
    if canary1 != canary2 {
        return if canary1 {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }

    let cls1 = universe.class(c1);
    let cls2 = universe.class(c2);
    if cls1.is_interface != cls2.is_interface {
        return if cls1.is_interface {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }

    let t1 = cls1.type_id();
    let t2 = cls2.type_id();
    if t1 == t2 {
        return Ordering::Equal;
    }
    if universe.is_subtype(t2, t1) {
        return Ordering::Greater;
    }
    if universe.is_subtype(t1, t2) {
        return Ordering::Less;
    }

    if cls1.super_class != cls2.super_class {
        let ordering = match (cls1.super_class, cls2.super_class) {
            (Some(s1), Some(s2)) => universe.compare_types(s1, s2),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    if cls1.interfaces != cls2.interfaces {
        let ordering = universe.compare_type_lists(&cls1.interfaces, &cls2.interfaces);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}
