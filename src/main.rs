//! # plcmod CLI Entry Point
//!
//! Parses CLI arguments with clap and routes commands to the build pipeline.
//!
//! ## Commands
//!
//! - `build` - Render, compile, link and package the PLC module
//! - `generate` - Only render `plc_main.c` / `plc_debugger.c`
//! - `hash`, `reset-hash` - Inspect or forget the module identity
//! - `clean` - Remove the build directory

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use std::path::PathBuf;

use plcmod::build::{self, ProcessRunner};
use plcmod::config::{self, DEFAULT_PROJECT_FILE};
use plcmod::log::ConsoleLog;

#[derive(Parser)]
#[command(name = "plcmod")]
#[command(about = "Builds IEC-61131 generated C code into loadable PLC modules", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    /// Project file
    #[arg(long, global = true, default_value = DEFAULT_PROJECT_FILE)]
    project: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the PLC module
    Build {
        /// Show tool command lines and staleness notes
        #[arg(short, long)]
        verbose: bool,
    },
    /// Render plc_main.c and plc_debugger.c without compiling
    Generate,
    /// Print the MD5 of the current module
    Hash,
    /// Forget the module hash until the next successful build
    ResetHash,
    /// Remove the build directory
    Clean,
    /// Generate shell completion scripts
    Completion { shell: Shell },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            generate(*shell, &mut cmd, "plcmod", &mut std::io::stdout());
            Ok(())
        }

        Commands::Build { verbose } => {
            let config = config::load_config(&cli.project)?;
            let log = ConsoleLog;
            println!(
                "{} Project: {} ({})",
                "🚀".blue(),
                config.project.name.bold(),
                config.project.target
            );
            let mut builder =
                build::builder_for(&config, Box::new(ProcessRunner), &log).verbose(*verbose);
            if !builder.build(&config) {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Generate => {
            let config = config::load_config(&cli.project)?;
            let log = ConsoleLog;
            let builder = build::builder_for(&config, Box::new(ProcessRunner), &log);
            builder.write_sources(&config)?;
            println!(
                "{} Generated {} and {} in {}",
                "✓".green(),
                build::MAIN_SOURCE,
                build::DEBUG_SOURCE,
                config.project.build_dir.display()
            );
            Ok(())
        }

        Commands::Hash => {
            let config = config::load_config(&cli.project)?;
            match build::store_for(&config).binary_hash() {
                Some(hash) => println!("{}", hash),
                None => println!("unknown"),
            }
            Ok(())
        }

        Commands::ResetHash => {
            let config = config::load_config(&cli.project)?;
            build::store_for(&config).reset_binary_hash();
            println!("{} Module hash reset", "✓".green());
            Ok(())
        }

        Commands::Clean => {
            let config = config::load_config(&cli.project)?;
            build::clean(&config.project.build_dir)
        }
    }
}
