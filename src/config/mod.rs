// Configuration for the packing run - mirrors the options the outer pass
// manager recognizes.
#![allow(dead_code)]

use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::DexpackError;

/// Configuration for a dexpack run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DexpackConfig {
    /// Stuff every class into one container, bypassing capacity checks.
    /// The caller promises they fit.
    pub force_single_dex: bool,

    /// Treat the primary container as modifiable rather than read-only
    pub normal_primary_dex: bool,

    /// When the primary is modifiable, prepend its classes to the
    /// prescribed order so they keep their leading position
    pub keep_primary_order: bool,

    /// Enable the unreferenced-coldstart pruner
    pub static_prune_classes: bool,

    /// Engage the cross-dex reference minimizer; otherwise the remainder
    /// is emitted in input order
    pub minimize_cross_dex_refs: bool,

    /// Inject a per-container canary class into secondary containers
    pub emit_canaries: bool,

    /// Stable-sort the non-perf-sensitive suffix of each container into
    /// a compression-friendly order at flush
    pub sort_remaining_classes: bool,

    /// Per-container structural capacity limits
    pub limits: DexLimits,

    /// Minimizer scoring weights
    pub ref_weights: RefWeightsConfig,

    /// Cross-dex method relocator settings
    pub relocator: RelocatorConfig,
}

/// Hard structural caps of one output container
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DexLimits {
    pub max_method_refs: usize,
    pub max_field_refs: usize,
    pub max_type_refs: usize,
    pub max_classes: usize,
}

/// The eight minimizer weights: a positive contribution per applied ref and
/// a seed penalty per unapplied ref, independently per reference kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefWeightsConfig {
    pub method_ref_weight: u64,
    pub field_ref_weight: u64,
    pub type_ref_weight: u64,
    pub string_ref_weight: u64,
    pub method_seed_weight: u64,
    pub field_seed_weight: u64,
    pub type_seed_weight: u64,
    pub string_seed_weight: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelocatorConfig {
    pub relocate_static_methods: bool,
    pub relocate_non_static_direct_methods: bool,
    pub relocate_virtual_methods: bool,
    pub max_relocated_methods_per_class: u32,
}

impl Default for DexpackConfig {
    fn default() -> Self {
        Self {
            force_single_dex: false,
            normal_primary_dex: false,
            keep_primary_order: false,
            static_prune_classes: false,
            minimize_cross_dex_refs: true,
            emit_canaries: true,
            sort_remaining_classes: false,
            limits: DexLimits::default(),
            ref_weights: RefWeightsConfig::default(),
            relocator: RelocatorConfig::default(),
        }
    }
}

impl Default for DexLimits {
    fn default() -> Self {
        // The dex format encodes each ref table index in 16 bits.
        Self {
            max_method_refs: 65536,
            max_field_refs: 65536,
            max_type_refs: 65536,
            max_classes: 65536,
        }
    }
}

impl Default for RefWeightsConfig {
    fn default() -> Self {
        Self {
            method_ref_weight: 100,
            field_ref_weight: 90,
            type_ref_weight: 100,
            string_ref_weight: 90,
            method_seed_weight: 600,
            field_seed_weight: 200,
            type_seed_weight: 400,
            string_seed_weight: 100,
        }
    }
}

impl Default for RelocatorConfig {
    fn default() -> Self {
        Self {
            relocate_static_methods: false,
            relocate_non_static_direct_methods: false,
            relocate_virtual_methods: false,
            max_relocated_methods_per_class: 200,
        }
    }
}

impl RelocatorConfig {
    pub fn is_enabled(&self) -> bool {
        self.relocate_static_methods
            || self.relocate_non_static_direct_methods
            || self.relocate_virtual_methods
    }
}

impl DexpackConfig {
    /// Load configuration from a file (YAML or TOML)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match extension {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse YAML config"),
            "toml" => toml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse TOML config"),
            _ => {
                if let Ok(config) = serde_yaml::from_str(&contents) {
                    Ok(config)
                } else {
                    toml::from_str(&contents)
                        .into_diagnostic()
                        .wrap_err("Failed to parse config file")
                }
            }
        }
    }

    /// Try to load configuration from default locations
    pub fn from_default_locations(root: &Path) -> Result<Self> {
        let default_names = [
            ".dexpack.yml",
            ".dexpack.yaml",
            ".dexpack.toml",
            "dexpack.yml",
            "dexpack.yaml",
            "dexpack.toml",
        ];

        for name in &default_names {
            let path = root.join(name);
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Reject weight sets the minimizer cannot score with
    pub fn validate(&self) -> std::result::Result<(), DexpackError> {
        let w = &self.ref_weights;
        let all_zero = w.method_ref_weight == 0
            && w.field_ref_weight == 0
            && w.type_ref_weight == 0
            && w.string_ref_weight == 0
            && w.method_seed_weight == 0
            && w.field_seed_weight == 0
            && w.type_seed_weight == 0
            && w.string_seed_weight == 0;
        if self.minimize_cross_dex_refs && all_zero {
            return Err(DexpackError::ConfigViolation(
                "cross-dex ref minimizer enabled with an all-zero weight set".to_string(),
            ));
        }
        if self.limits.max_classes == 0 {
            return Err(DexpackError::ConfigViolation(
                "max_classes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
