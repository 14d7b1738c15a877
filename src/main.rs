use clap::Parser;
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use tracing::info;

use dexpack::config::DexpackConfig;
use dexpack::emit::InterDex;
use dexpack::input::UniverseSpec;
use dexpack::plugins::PluginHost;
use dexpack::report::{print_summary, write_manifest, LayoutReport};

/// dexpack - multi-dex class packing and ordering
#[derive(Parser, Debug)]
#[command(name = "dexpack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Universe description file (JSON)
    universe: PathBuf,

    /// Prescribed class order file, one descriptor or marker per line
    #[arg(short = 'r', long, value_name = "FILE")]
    order: Option<PathBuf>,

    /// Path to configuration file (YAML or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the container layout as JSON
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Write the container manifest
    #[arg(short, long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Pack everything into a single container
    #[arg(long)]
    force_single_dex: bool,

    /// Treat the primary container as modifiable
    #[arg(long)]
    normal_primary_dex: bool,

    /// Prune unreferenced coldstart classes before emission
    #[arg(long)]
    static_prune: bool,

    /// Disable the cross-dex reference minimizer
    #[arg(long)]
    no_minimize: bool,

    /// Do not inject canary classes
    #[arg(long)]
    no_canaries: bool,

    /// Sort the unordered suffix of each container for compression
    #[arg(long)]
    sort_remaining: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - only output results
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    info!("dexpack v{}", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(&cli)?;
    apply_cli_overrides(&cli, &mut config);

    let spec = UniverseSpec::from_file(&cli.universe)?;
    let (mut universe, dexen) = spec.build()?;

    let order_lines = match &cli.order {
        Some(path) => std::fs::read_to_string(path)
            .into_diagnostic()?
            .lines()
            .map(|l| l.to_string())
            .collect(),
        None => Vec::new(),
    };

    let plugins = PluginHost::default();
    let driver = InterDex::new(&mut universe, dexen, &order_lines, plugins, config)
        .into_diagnostic()?;
    let output = driver.run().into_diagnostic()?;

    let report = LayoutReport::new(&universe, &output);
    if let Some(path) = &cli.output {
        report.write_json(path)?;
        println!("{} {}", "Layout written to".green(), path.display());
    }
    if let Some(path) = &cli.manifest {
        write_manifest(&output, path)?;
        println!("{} {}", "Manifest written to".green(), path.display());
    }
    if !cli.quiet {
        print_summary(&report, &output);
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<DexpackConfig> {
    match &cli.config {
        Some(path) => DexpackConfig::from_file(path),
        None => {
            let root = cli
                .universe
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."));
            DexpackConfig::from_default_locations(&root)
        }
    }
}

fn apply_cli_overrides(cli: &Cli, config: &mut DexpackConfig) {
    if cli.force_single_dex {
        config.force_single_dex = true;
    }
    if cli.normal_primary_dex {
        config.normal_primary_dex = true;
    }
    if cli.static_prune {
        config.static_prune_classes = true;
    }
    if cli.no_minimize {
        config.minimize_cross_dex_refs = false;
    }
    if cli.no_canaries {
        config.emit_canaries = false;
    }
    if cli.sort_remaining {
        config.sort_remaining_classes = true;
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
