//! Prescribed-order loading: parses the textual class list with its embedded
//! section markers into a structured sequence the driver can walk.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{DexpackError, Result};
use crate::model::{ClassId, ClassUniverse};

const END_MARKER_PREFIX: &str = "LDexEndMarker";
const SCROLL_SET_START_PREFIX: &str = "LScrollSetStart";
const SCROLL_SET_END_PREFIX: &str = "LScrollSetEnd";
const BG_SET_START_PREFIX: &str = "LBackgroundSetStart";
const BG_SET_END_PREFIX: &str = "LBackgroundSetEnd";

/// One entry of the loaded prescribed order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEntry {
    /// A class resolved against the universe
    Class(ClassId),
    /// End of a coldstart container; the last one closes the coldstart set
    EndMarker,
    ScrollStart,
    ScrollEnd,
    BgStart,
    BgEnd,
}

/// The loaded order: resolved classes interleaved with section markers
#[derive(Debug, Default)]
pub struct InterdexOrder {
    pub entries: Vec<OrderEntry>,
    pub end_marker_count: usize,
    /// Entries that resolved to nothing and were not markers
    pub dropped: usize,
}

impl InterdexOrder {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The classes of the order, in walk order
    pub fn classes(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.entries.iter().filter_map(|e| match e {
            OrderEntry::Class(cls) => Some(*cls),
            _ => None,
        })
    }
}

/// Classes tagged with an interdex subgroup, grouped by their index.
/// These are skipped in textual position and spliced in ahead of the
/// matching end marker, in group-index order.
fn subgroup_classes(universe: &ClassUniverse, scope: &[ClassId]) -> Vec<Vec<ClassId>> {
    let mut by_group: FxHashMap<u32, Vec<ClassId>> = FxHashMap::default();
    let mut num_groups = 0;
    for &cls in scope {
        if let Some(group) = universe.class(cls).interdex_subgroup {
            by_group.entry(group).or_default().push(cls);
            num_groups = num_groups.max(group as usize + 1);
        }
    }
    let mut groups = vec![Vec::new(); num_groups];
    for (group, classes) in by_group {
        groups[group as usize] = classes;
    }
    groups
}

/// Parse the prescribed-order lines against the universe.
///
/// Lines that resolve to a class are kept; recognized marker prefixes are
/// kept as markers even though they resolve to nothing; everything else is
/// dropped with a diagnostic log line.
pub fn load_interdex_order(
    universe: &ClassUniverse,
    scope: &[ClassId],
    lines: &[String],
) -> Result<InterdexOrder> {
    let groups = subgroup_classes(universe, scope);
    let mut current_group = 0;

    let mut order = InterdexOrder::default();
    for line in lines {
        let entry = line.trim();
        if entry.is_empty() {
            continue;
        }

        let resolved = universe
            .get_type(entry)
            .and_then(|t| universe.class_of_type(t));
        if let Some(cls) = resolved {
            if universe.class(cls).interdex_subgroup.is_some() {
                // Spliced in at its group's end marker instead
                continue;
            }
            order.entries.push(OrderEntry::Class(cls));
        } else if entry.starts_with(END_MARKER_PREFIX) {
            if let Some(group) = groups.get(current_group) {
                order.entries.extend(group.iter().map(|&c| OrderEntry::Class(c)));
                current_group += 1;
            }
            order.entries.push(OrderEntry::EndMarker);
            order.end_marker_count += 1;
            debug!("[interdex order]: found end marker {entry}");
        } else if entry.starts_with(SCROLL_SET_START_PREFIX) {
            order.entries.push(OrderEntry::ScrollStart);
        } else if entry.starts_with(SCROLL_SET_END_PREFIX) {
            order.entries.push(OrderEntry::ScrollEnd);
        } else if entry.starts_with(BG_SET_START_PREFIX) {
            order.entries.push(OrderEntry::BgStart);
        } else if entry.starts_with(BG_SET_END_PREFIX) {
            order.entries.push(OrderEntry::BgEnd);
        } else {
            debug!("[interdex order]: no such entry {entry}");
            order.dropped += 1;
        }
    }

    if groups.len() > current_group + 2 {
        return Err(DexpackError::ConfigViolation(format!(
            "too many interdex subgroups: {} groups, {} end markers",
            groups.len(),
            order.end_marker_count
        )));
    }
    // A trailing group with no marker of its own goes at the very end
    if let Some(group) = groups.get(current_group) {
        order.entries.extend(group.iter().map(|&c| OrderEntry::Class(c)));
    }

    Ok(order)
}
