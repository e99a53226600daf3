// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polycork CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use log::{Level, LevelFilter, Metadata, Record};
use polycork::geometry::{analyze, boolean, mesh_utils};
use polycork::{io, BooleanOp, EngineConfig, FlatMesh, Mesh};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "polycork")]
#[command(about = "Polycork - robust Boolean operations on closed triangle meshes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// A ∪ B
    Union(BinaryArgs),
    /// A − B
    Difference(BinaryArgs),
    /// A ∩ B
    Intersection(BinaryArgs),
    /// (A − B) ∪ (B − A)
    Xor(BinaryArgs),
    /// Keep both operands with their intersection curve made explicit
    Resolve(BinaryArgs),

    /// Check that a mesh is closed and free of self-intersections
    Solid {
        /// Mesh file (.stl or .off)
        mesh: PathBuf,
    },

    /// Print mesh statistics
    Info {
        /// Mesh file (.stl or .off)
        mesh: PathBuf,

        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct BinaryArgs {
    /// First operand
    a: PathBuf,

    /// Second operand
    b: PathBuf,

    /// Output file (.stl or .off)
    #[arg(short, long)]
    output: PathBuf,
}

/// Stage-level log lines on stderr for `--verbose`
struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with("polycork")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = match record.level() {
            Level::Error => "error".red(),
            Level::Warn => "warn".yellow(),
            Level::Info => "info".cyan(),
            Level::Debug | Level::Trace => "debug".bright_black(),
        };
        eprintln!("[{}] {}", level, record.args());
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn main() {
    let cli = Cli::parse();

    let max_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(max_level);
    }

    match run(&cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Returns false when the command ran but its check failed
fn run(cli: &Cli) -> Result<bool> {
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Union(args) => boolean_command(args, BooleanOp::Union, &config, cli.verbose),
        Commands::Difference(args) => boolean_command(args, BooleanOp::Difference, &config, cli.verbose),
        Commands::Intersection(args) => {
            boolean_command(args, BooleanOp::Intersection, &config, cli.verbose)
        }
        Commands::Xor(args) => {
            boolean_command(args, BooleanOp::SymmetricDifference, &config, cli.verbose)
        }
        Commands::Resolve(args) => boolean_command(args, BooleanOp::Resolve, &config, cli.verbose),
        Commands::Solid { mesh } => solid_command(mesh, &config),
        Commands::Info { mesh, json } => info_command(mesh, *json),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            let mut config = EngineConfig::from_file(path)?;
            config.apply_env_overrides();
            Ok(config)
        }
        None => EngineConfig::load(),
    }
}

fn load(path: &Path) -> Result<Mesh> {
    let flat = io::load_mesh(path)?;
    flat.to_mesh()
        .with_context(|| format!("Invalid mesh in {}", path.display()))
}

fn boolean_command(args: &BinaryArgs, op: BooleanOp, config: &EngineConfig, verbose: bool) -> Result<bool> {
    let a = load(&args.a)?;
    let b = load(&args.b)?;

    if verbose {
        println!(
            "{} {} ({} triangles) and {} ({} triangles)",
            op.name().bold(),
            args.a.display().to_string().cyan(),
            a.triangle_count(),
            args.b.display().to_string().cyan(),
            b.triangle_count()
        );
    }

    let start = Instant::now();
    let result = boolean(&a, &b, op, config)
        .with_context(|| format!("{} of {} and {} failed", op.name(), args.a.display(), args.b.display()))?;
    let elapsed = start.elapsed();

    io::save_mesh(&args.output, &FlatMesh::from_mesh(&result))?;

    println!(
        "{} {} -> {} ({} triangles, {:.2?})",
        "✅".green(),
        op.name().green().bold(),
        args.output.display().to_string().cyan(),
        result.triangle_count(),
        elapsed
    );
    Ok(true)
}

fn solid_command(path: &Path, config: &EngineConfig) -> Result<bool> {
    let mesh = load(path)?;

    let closed = mesh_utils::is_closed(&mesh);
    let self_intersecting = closed && mesh_utils::is_self_intersecting_with(&mesh, config);

    let name = path.display().to_string();
    if !closed {
        println!("{} {} is not closed", "❌".red(), name.cyan());
        Ok(false)
    } else if self_intersecting {
        println!("{} {} is self-intersecting", "❌".red(), name.cyan());
        Ok(false)
    } else {
        println!("{} {} is solid", "✅".green(), name.cyan());
        Ok(true)
    }
}

fn info_command(path: &Path, json: bool) -> Result<bool> {
    let mesh = load(path)?;
    let stats = analyze(&mesh);

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{} {}", "File:".bold(), path.display().to_string().cyan());
        stats.print();
    }
    Ok(true)
}
