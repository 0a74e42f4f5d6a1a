use beampack::archive::BeamPacker;
use beampack::config::PackOptions;
use beampack::error::Result;
use chrono::DateTime;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "beam", about = "Pack small files into fixed-capacity checksummed blocks")]
struct Cli {
    /// JSON file with capacity / chunk_size / verify_integrity
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a directory tree into block-<N>.beam files
    Pack {
        source: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Payload bytes per block (default 60 MiB)
        #[arg(long)]
        capacity: Option<u64>,
        /// Hash / copy buffer in bytes (default 32 KiB)
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Extract one block, or every block in a directory
    Unpack {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
        /// Skip the block footer check before extracting
        #[arg(long)]
        no_verify: bool,
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Check block footers without extracting
    Verify {
        input: PathBuf,
    },
    /// List the records stored in a block
    List {
        input: PathBuf,
    },
}

/// Exit status for a checksum mismatch, distinct from other failures.
const EXIT_INTEGRITY: u8 = 2;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("beampack=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            if e.is_integrity() { ExitCode::from(EXIT_INTEGRITY) } else { ExitCode::FAILURE }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut opts = match &cli.config {
        Some(path) => PackOptions::from_json_file(path)?,
        None       => PackOptions::default(),
    };

    match cli.command {

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { source, output, capacity, chunk_size } => {
            if let Some(c) = capacity   { opts.capacity = c; }
            if let Some(c) = chunk_size { opts.chunk_size = c; }
            let packer = BeamPacker::new(opts)?;

            let start = Instant::now();
            let report = packer.pack(&source, &output)?;
            let took = start.elapsed();
            println!(
                "Packed {} file(s), {} into {} block(s) in {:.2?} ({})",
                report.files,
                human_bytes(report.bytes),
                report.blocks.len(),
                took,
                throughput(report.bytes, took),
            );
            if report.skipped > 0 {
                println!("Skipped {} file(s) larger than the block capacity", report.skipped);
            }
        }

        // ── Unpack ───────────────────────────────────────────────────────────
        Commands::Unpack { input, output_dir, no_verify, chunk_size } => {
            if no_verify                { opts.verify_integrity = false; }
            if let Some(c) = chunk_size { opts.chunk_size = c; }
            let packer = BeamPacker::new(opts)?;

            let start = Instant::now();
            let report = packer.unpack(&input, &output_dir)?;
            let took = start.elapsed();
            println!(
                "Unpacked {} file(s), {} from {} block(s) to {} in {:.2?} ({})",
                report.files,
                human_bytes(report.bytes),
                report.blocks,
                output_dir.display(),
                took,
                throughput(report.bytes, took),
            );
        }

        // ── Verify ───────────────────────────────────────────────────────────
        Commands::Verify { input } => {
            let packer = BeamPacker::new(opts)?;
            let start = Instant::now();
            let ids = packer.verify(&input)?;
            println!("Verified {} block(s) in {:.2?}: all checksums match", ids.len(), start.elapsed());
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input } => {
            let packer = BeamPacker::new(opts)?;
            let block = packer.inspect(&input)?;
            println!("Block {} ({}): {} file(s)", block.id, display_name(&input), block.records.len());
            println!("{:<40} {:>12} {:>12} {:>6}  {:<19}  Checksum", "Path", "Size", "Offset", "Mode", "Modified");
            for r in &block.records {
                let modified = DateTime::from_timestamp(r.mtime, 0)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| r.mtime.to_string());
                println!(
                    "{:<40} {:>12} {:>12} {:>6o}  {:<19}  {}",
                    r.path, r.size, r.offset, r.mode, modified, hex::encode(&r.checksum[..8]),
                );
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 { format!("{n} B") } else { format!("{v:.2} {}", UNITS[unit]) }
}

fn throughput(bytes: u64, took: Duration) -> String {
    let secs = took.as_secs_f64();
    if secs == 0.0 {
        return "n/a".into();
    }
    format!("{:.2} MB/s", bytes as f64 / (1024.0 * 1024.0) / secs)
}
