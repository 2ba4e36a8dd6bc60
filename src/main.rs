use anyhow::Context;
use clap::Parser;
use gffstats::options::SummaryOptions;
use gffstats::GffSummary;
use peak_alloc::PeakAlloc;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static PEAK_ALLOC: PeakAlloc = PeakAlloc;

#[derive(Debug, Parser)]
#[command(
    name = "gffstats",
    version,
    about = "Compute summary statistics from GFF3 genome annotation files"
)]
struct Cli {
    /// URL or local path to a GFF3 file (may be gzip-compressed)
    gff_source: String,

    /// Output file path (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print the JSON output with indentation
    #[arg(long)]
    pretty: bool,

    /// Force gzip decompression instead of relying on auto-detection
    #[arg(long)]
    gzipped: bool,
}

fn main() -> anyhow::Result<()> {
    // report JSON goes to stdout, logs to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    let opts = SummaryOptions {
        force_gzip: cli.gzipped,
        ..SummaryOptions::default()
    };

    let summary = GffSummary::from_source(&cli.gff_source, &opts)?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&summary.report)?
    } else {
        serde_json::to_string(&summary.report)?
    };

    match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create output file {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            writer.write_all(json.as_bytes())?;
            writer.write_all(b"\n")?;
            info!("statistics written to {}", path.display());
        }
        None => println!("{}", json),
    }

    info!("peak memory usage was {:.3} GB", PEAK_ALLOC.peak_usage_as_gb());
    Ok(())
}
