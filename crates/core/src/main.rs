use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use refmapper::{RemapConfig, DEFAULT_PACKAGE_PREFIX};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const USAGE: &str =
    "Usage: refmapper <input mod jar> <output mod jar> <mappings file> <reference jar>";

#[derive(Parser)]
#[command(name = "refmapper")]
#[command(about = "Generate a mixin refmap and remap access wideners for a mod jar")]
#[command(long_about = None)]
struct Cli {
    /// Mod jar to process
    input: PathBuf,

    /// Where the remapped mod jar is written
    output: PathBuf,

    /// Mapping file in the v1 text format
    mappings: PathBuf,

    /// Jar providing the class hierarchy
    reference: PathBuf,

    /// Only classes under this package take part in inheritance lookups
    #[arg(long, default_value = DEFAULT_PACKAGE_PREFIX)]
    package_prefix: String,

    /// Refmap entry name used when no mixin config declares one
    #[arg(long)]
    refmap_name: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            eprintln!("{}", e.kind());
            eprintln!("{}", USAGE);
            return Ok(());
        }
    };

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = RemapConfig::new(cli.input, cli.output, cli.mappings, cli.reference)
        .with_package_prefix(cli.package_prefix)
        .with_refmap_name(cli.refmap_name);

    match refmapper::run(&config) {
        Ok(report) => {
            for line in report.metrics.summary() {
                println!("{}", line);
            }
        }
        Err(e) => {
            eprintln!("{:#}", e);
            eprintln!("{}", USAGE);
        }
    }

    Ok(())
}
