//! Hyperschema CLI
//!
//! Normalizes snapshots, generates codec modules and checks a proposed
//! snapshot against a previous one.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hyperschema::{codegen, Hyperschema, Schema, SchemaConfig, Snapshot};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hyperschema")]
#[command(about = "Append-only schema compiler")]
struct Cli {
    /// Configuration file, layered over the default locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild a snapshot and write it back normalized
    Json {
        snapshot: PathBuf,
        /// Output file (defaults to output.json_file, "-" for stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Generate the Rust codec module for a snapshot
    Code {
        snapshot: PathBuf,
        /// Output file (defaults to output.code_file, "-" for stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Apply the declarations of `next` on top of `previous`
    Check { previous: PathBuf, next: PathBuf },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = SchemaConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Json { snapshot, out } => {
            let schema = load_schema(&snapshot, &config)?;
            let json = schema.to_json(config.output.format.is_pretty())?;
            let target = out.unwrap_or_else(|| config.output.json_file.clone());
            write_output(&target, &json)?;
            info!(version = schema.version(), "snapshot written");
            Ok(())
        }

        Commands::Code { snapshot, out } => {
            let schema = load_schema(&snapshot, &config)?;
            let (code, checksum) = codegen::generate_with_checksum(&schema, &config.codegen);
            let target = out.unwrap_or_else(|| config.output.code_file.clone());
            write_output(&target, &code)?;
            info!(version = schema.version(), checksum = checksum.short(), "code written");
            Ok(())
        }

        Commands::Check { previous, next } => {
            let before = read_snapshot(&previous)?;
            let after = read_snapshot(&next)?;

            let old = Hyperschema::from_snapshot_with(&before, config.build.versioned)?.build()?;
            let mut builder = Hyperschema::from_snapshot_with(&before, config.build.versioned)?;

            let namespaces: BTreeSet<&str> = after
                .schema
                .iter()
                .filter_map(|d| d.namespace.as_deref())
                .collect();
            for ns in namespaces {
                builder.namespace(ns)?;
            }
            for desc in after.schema {
                let fqn = desc.fqn();
                builder
                    .register(desc)
                    .with_context(|| format!("registering {}", fqn))?;
            }
            let schema = builder.build()?;

            println!("version: {} -> {}", old.version(), schema.version());
            for change in schema.changes() {
                println!("  {}", change);
            }
            println!("fingerprint: {} -> {}", old.fingerprint()?.short(), schema.fingerprint()?.short());
            Ok(())
        }
    }
}

fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    Snapshot::from_json(&json).with_context(|| format!("parsing {}", path.display()))
}

fn load_schema(path: &Path, config: &SchemaConfig) -> Result<Schema> {
    let snapshot = read_snapshot(path)?;
    Ok(Hyperschema::from_snapshot_with(&snapshot, config.build.versioned)?.build()?)
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    if path == Path::new("-") {
        print!("{}", content);
        return Ok(());
    }
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))
}
