//! wld-inspect - look inside WLD scene containers
//!
//! # Commands
//!
//! - `wld-inspect info <file>` - dialect, header words and per-type counts
//! - `wld-inspect list <file> [--code 0x36]` - one line per fragment
//! - `wld-inspect dump <file> <index>` - one fragment as JSON
//! - `wld-inspect refs <file>` - reference graph, flagging dangling targets
//! - `wld-inspect verify <file>...` - decode, re-encode and compare bytes
//!
//! Logging follows `RUST_LOG`; `-v` raises the default to `debug`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use wld_inspect::{InspectConfig, OutputFormat};

/// Inspect, dump and verify WLD scene containers
#[derive(Parser)]
#[command(name = "wld-inspect")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./wld-inspect.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dialect, reserved header words and fragment counts per type
    Info { file: PathBuf },

    /// One line per fragment: index, code, type, size, name
    List {
        file: PathBuf,
        /// Only fragments of this type (hex code or type name)
        #[arg(long)]
        code: Option<String>,
    },

    /// One fragment as JSON
    Dump {
        file: PathBuf,
        /// 1-based directory index
        index: u32,
    },

    /// Reference graph edges
    Refs { file: PathBuf },

    /// Decode and re-encode each file, reporting byte equality
    Verify {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = InspectConfig::load(cli.config.as_deref())?;
    let json = config.output.format == OutputFormat::Json;

    match cli.command {
        Commands::Info { file } => {
            let (bytes, wld) = wld_inspect::load_wld(&file, &config.decode)?;
            let info = wld_inspect::info(&wld, bytes.len());
            if json {
                println!("{}", config.to_json(&info)?);
            } else {
                print!("{}", wld_inspect::format_info(&info));
            }
        }
        Commands::List { file, code } => {
            let filter = code.as_deref().map(wld_inspect::parse_code).transpose()?;
            let (_, wld) = wld_inspect::load_wld(&file, &config.decode)?;
            let entries = wld_inspect::list(&wld, filter)?;
            if json {
                println!("{}", config.to_json(&entries)?);
            } else {
                print!("{}", wld_inspect::format_list(&entries));
            }
        }
        Commands::Dump { file, index } => {
            let (_, wld) = wld_inspect::load_wld(&file, &config.decode)?;
            println!("{}", wld_inspect::dump(&wld, index, &config)?);
        }
        Commands::Refs { file } => {
            let (_, wld) = wld_inspect::load_wld(&file, &config.decode)?;
            let lines = wld_inspect::refs(&wld);
            let dangling = lines.iter().filter(|l| l.dangling).count();
            if json {
                println!("{}", config.to_json(&lines)?);
            } else {
                print!("{}", wld_inspect::format_refs(&lines));
            }
            if dangling > 0 {
                tracing::warn!("{} dangling references", dangling);
            }
        }
        Commands::Verify { files } => {
            let mut failures = 0;
            for file in &files {
                let (bytes, wld) = match wld_inspect::load_wld(file, &config.decode) {
                    Ok(loaded) => loaded,
                    Err(e) => {
                        failures += 1;
                        println!("FAIL  {}: {:#}", file.display(), e);
                        continue;
                    }
                };
                let report = wld_inspect::verify(&bytes, &wld, &config.encode)?;
                if report.identical {
                    println!(
                        "OK    {} ({} fragments, {} opaque)",
                        file.display(),
                        report.fragment_count,
                        report.opaque_count
                    );
                } else {
                    failures += 1;
                    println!(
                        "DIFF  {}: first difference at byte {} ({} -> {} bytes)",
                        file.display(),
                        report.first_difference.unwrap_or_default(),
                        report.input_size,
                        report.output_size
                    );
                }
            }
            if failures > 0 {
                tracing::error!("{} of {} files failed", failures, files.len());
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
