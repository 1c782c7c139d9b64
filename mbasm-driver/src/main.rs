//! Multi-bank assembler data resolution driver
//!
//! Replays a declaration script against a memory map and prints where every
//! variable, constant, pointer and port ended up.

mod script;

use clap::{Parser, Subcommand};
use mbasm_common::{ErrorReporter, MemoryMap};
use mbasm_data::Registry;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "mbasm")]
#[command(about = "Multi-bank assembler data resolution")]
#[command(version = "0.1.0")]
struct Cli {
    /// Log every binding decision
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a declaration script and report the resulting bindings
    Resolve {
        /// Declaration script (JSON list of steps)
        script: PathBuf,

        /// Memory map of the target
        #[arg(short, long)]
        memory_map: PathBuf,

        /// Write the JSON binding report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also print the registry contents
        #[arg(long)]
        dump: bool,
    },

    /// Check that a memory map file loads and is consistent
    CheckMap {
        /// Memory map of the target
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let result = match cli.command {
        Commands::Resolve {
            script,
            memory_map,
            output,
            dump,
        } => resolve_command(&script, &memory_map, output.as_deref(), dump),
        Commands::CheckMap { path } => check_map_command(&path),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the script ran without errors
fn resolve_command(
    script_path: &Path,
    map_path: &Path,
    output_path: Option<&Path>,
    dump: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let memory_map = MemoryMap::load(map_path)?;
    let steps = script::load(script_path)?;
    let mut registry = Registry::new(memory_map)?;
    let mut reporter = ErrorReporter::new();

    let resolutions = script::run(&mut registry, &steps, &mut reporter);

    if dump {
        eprintln!("{}", registry);
    }

    let report = script::Report {
        resolutions: &resolutions,
        entities: registry.entities().collect(),
    };
    let json = serde_json::to_string_pretty(&report)?;
    match output_path {
        Some(path) => {
            fs::write(path, json)?;
            log::info!("Binding report written to {}", path.display());
        }
        None => println!("{}", json),
    }

    reporter.print_diagnostics();
    if !reporter.diagnostics().is_empty() {
        eprintln!("{}", reporter.summary());
    }
    Ok(!reporter.has_errors())
}

fn check_map_command(path: &Path) -> Result<bool, Box<dyn std::error::Error>> {
    let map = MemoryMap::load(path)?;
    println!(
        "{}: {} threads, shared {}, private {}, {}/{} indirect slots, {} ports",
        path.display(),
        map.thread_count,
        map.shared,
        map.private,
        map.slot_count(mbasm_common::Bank::A),
        map.slot_count(mbasm_common::Bank::B),
        map.io.len()
    );
    Ok(true)
}
