//! Layout output: the finalized container sequence as JSON, the sidecar
//! manifest, and a terminal summary.

use colored::Colorize;
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::Serialize;
use std::path::Path;

use crate::container::DexInfo;
use crate::emit::InterDexOutput;
use crate::model::ClassUniverse;

/// One emitted container in the layout report
#[derive(Debug, Serialize)]
pub struct ContainerReport {
    pub ordinal: usize,
    pub classes: Vec<String>,
    pub class_count: usize,
}

/// The serialized layout: containers plus manifest rows
#[derive(Debug, Serialize)]
pub struct LayoutReport {
    pub containers: Vec<ContainerReport>,
    pub dex_flags: Vec<DexFlagsReport>,
    pub manifest: String,
}

#[derive(Debug, Serialize)]
pub struct DexFlagsReport {
    pub canary: String,
    pub flags: DexInfo,
}

impl LayoutReport {
    pub fn new(universe: &ClassUniverse, output: &InterDexOutput) -> Self {
        let containers = output
            .dexes
            .iter()
            .enumerate()
            .map(|(ordinal, classes)| ContainerReport {
                ordinal,
                class_count: classes.len(),
                classes: classes
                    .iter()
                    .map(|&cls| universe.class_name(cls).to_string())
                    .collect(),
            })
            .collect();
        let dex_flags = output
            .dex_infos
            .iter()
            .map(|(canary, flags)| DexFlagsReport {
                canary: canary.clone(),
                flags: *flags,
            })
            .collect();
        Self {
            containers,
            dex_flags,
            manifest: output.manifest.clone(),
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).into_diagnostic()?;
        std::fs::write(path, json)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to write layout report: {}", path.display()))
    }
}

/// Write the sidecar manifest, one line per canary-minted container
pub fn write_manifest(output: &InterDexOutput, path: &Path) -> Result<()> {
    std::fs::write(path, &output.manifest)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to write manifest: {}", path.display()))
}

/// Print the per-container summary table
pub fn print_summary(report: &LayoutReport, output: &InterDexOutput) {
    println!();
    println!("{}", "Container layout".bold());
    for container in &report.containers {
        // Containers are matched to their flag rows through the canary
        // class they carry; a canary-less container has no row.
        let flags = report
            .dex_flags
            .iter()
            .find(|row| container.classes.contains(&row.canary))
            .map(|row| describe_flags(&row.flags))
            .unwrap_or_default();
        println!(
            "  {} {:>6} classes  {}",
            format!("dex{:02}", container.ordinal).cyan(),
            container.class_count,
            flags.dimmed()
        );
    }
    println!(
        "{}",
        format!(
            "{} containers, {} classes, {} method refs, {} field refs, {} type refs",
            output.stats.num_dexes,
            output.stats.num_classes,
            output.stats.num_mrefs,
            output.stats.num_frefs,
            output.stats.num_trefs
        )
        .green()
    );
}

fn describe_flags(info: &DexInfo) -> String {
    let mut flags = Vec::new();
    if info.primary {
        flags.push("primary");
    }
    if info.coldstart {
        flags.push("coldstart");
    }
    if info.extended {
        flags.push("extended");
    }
    if info.scroll {
        flags.push("scroll");
    }
    if info.background {
        flags.push("background");
    }
    flags.join(",")
}
