//! Command-line interface (CLI) for lrtree-ttcn3
//!
//! Parses TTCN-3 source files with the incremental parser and prints their
//! syntax trees as S-expressions.

use anyhow::Context;
use clap::{Parser as ClapParser, Subcommand};
use lrtree::{ParseStatus, Parser};
use std::path::PathBuf;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Command
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parses TTCN-3 files
    Parse {
        /// Input files with TTCN-3 source
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Print only the files with syntax errors
        #[arg(short, long)]
        quiet: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match args.command {
        Commands::Parse { inputs, quiet } => {
            let language = lrtree_ttcn3::language()?;
            let mut parser = Parser::new(&language);
            let mut failed = 0;
            for path in &inputs {
                let text = std::fs::read(path)
                    .with_context(|| format!("can't open {}", path.display()))?;
                let tree = parser.parse(&text, None);
                let root = tree.root_node();
                if tree.status() != ParseStatus::Complete {
                    log::warn!("{}: parse ended early: {:?}", path.display(), tree.status());
                }
                if root.has_error() {
                    failed += 1;
                    println!("{}: syntax errors", path.display());
                }
                if !quiet {
                    println!("{}", root.to_sexp());
                }
                log::debug!("{}: {:?}", path.display(), parser.stats());
            }
            if failed > 0 {
                anyhow::bail!("{failed} of {} files have syntax errors", inputs.len());
            }
        }
    }
    Ok(())
}
