//! dexpack - multi-dex class packing and ordering for Android bytecode
//! post-processing
//!
//! Given a universe of compiled classes, dexpack decides which classes end
//! up in which output container ("dex") and in what order, packing tens of
//! thousands of classes into the minimum number of containers while keeping
//! a startup-critical prescribed prefix intact.
//!
//! # Architecture
//!
//! The emission pipeline consists of:
//! 1. **Universe loading** - Intern classes, types and references
//! 2. **Order loading** - Parse the prescribed class order with its markers
//! 3. **Pruning** - Drop unreferenced coldstart classes
//! 4. **Primary emission** - Lay out the eagerly-loaded primary container
//! 5. **Prefix walk** - Emit the prescribed order, markers driving flags
//! 6. **Remainder** - Minimizer-driven packing of everything else
//! 7. **Reporting** - Layout JSON, manifest, terminal summary

pub mod config;
pub mod container;
pub mod emit;
pub mod error;
pub mod input;
pub mod minimizer;
pub mod model;
pub mod order;
pub mod plugins;
pub mod pruner;
pub mod relocate;
pub mod report;

pub use config::{DexLimits, DexpackConfig, RefWeightsConfig, RelocatorConfig};
pub use container::{DexInfo, DexStructure, DexesStructure, ReserveRefs};
pub use emit::{InterDex, InterDexOutput};
pub use error::{DexpackError, Result};
pub use minimizer::CrossDexRefMinimizer;
pub use model::{ClassId, ClassUniverse, DexClass, RefId, RefKind, RefSet, TypeId};
pub use order::{InterdexOrder, OrderEntry};
pub use plugins::{InterdexPlugin, PluginHost};
pub use relocate::CrossDexRelocator;
