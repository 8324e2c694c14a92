//! Command-line interface for the `lrtree` grammar tools.
//!
//! Subcommands:
//!  * `check`: compile a grammar and report warnings and conflict decisions
//!  * `dump`: print the compiled parse table
//!  * `generate`: write `{name}.bin` and `{name}.rs` for a grammar package
//!  * `parse`: parse a file and print its syntax tree

#[cfg(feature = "cli")]
mod real {
    use anyhow::Context;
    use clap::{Args, Parser, Subcommand};
    use lrtree::{CompileOptions, ConflictPolicy, ParseStatus};
    use lrtree_gen::{compile_grammar, dump, generate};
    use std::path::PathBuf;

    #[derive(Parser)]
    #[command(about = "Compile, inspect and generate lrtree grammars")]
    struct Cli {
        /// Enable debug logging (off by default).
        #[arg(short = 'd', long, global = true)]
        debug: bool,

        #[command(subcommand)]
        command: Command,
    }

    #[derive(Args)]
    struct GrammarArgs {
        /// Path to the input `.lrg` grammar file
        #[arg(short = 'g', long)]
        grammar: PathBuf,

        /// Settle unresolved conflicts in favor of shifting instead of failing
        #[arg(long)]
        prefer_shift: bool,
    }

    impl GrammarArgs {
        fn options(&self) -> CompileOptions {
            let policy = if self.prefer_shift {
                ConflictPolicy::PreferShift
            } else {
                ConflictPolicy::Strict
            };
            CompileOptions::default().conflict_policy(policy)
        }
    }

    #[derive(Subcommand)]
    enum Command {
        /// Compile a grammar and report its conflict resolutions
        Check(GrammarArgs),
        /// Print the compiled parse table
        Dump(GrammarArgs),
        /// Generate the serialized table and Rust module
        Generate {
            #[command(flatten)]
            grammar: GrammarArgs,

            /// Path to the output directory.
            #[arg(short = 'o', long)]
            output_dir: PathBuf,

            /// Prefix used to construct output file names
            #[arg(short = 'n', long)]
            name: String,
        },
        /// Parse a file and print its tree as an S-expression
        Parse {
            #[command(flatten)]
            grammar: GrammarArgs,

            /// File to parse
            input: PathBuf,
        },
    }

    pub fn main() -> anyhow::Result<()> {
        let cli = Cli::parse();
        let level = if cli.debug { "debug" } else { "warn" };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

        match cli.command {
            Command::Check(args) => {
                let language = compile_grammar(&args.grammar, &args.options())?;
                let table = language.table();
                for r in table.resolutions() {
                    println!(
                        "state {} on {}: kept {} ({:?})",
                        r.state.0,
                        table.display_symbol(r.lookahead),
                        r.kept,
                        r.reason
                    );
                }
                println!(
                    "{}: {} symbols, {} productions, {} states, {} conflict resolutions",
                    language.name(),
                    table.symbol_count(),
                    table.productions().len(),
                    table.state_count(),
                    table.resolutions().len()
                );
            }
            Command::Dump(args) => {
                let language = compile_grammar(&args.grammar, &args.options())?;
                let mut out = std::io::stdout().lock();
                dump::write_table(&mut out, language.table())?;
            }
            Command::Generate {
                grammar,
                output_dir,
                name,
            } => generate(&grammar.grammar, &output_dir, &name, &grammar.options())?,
            Command::Parse { grammar, input } => {
                let language = compile_grammar(&grammar.grammar, &grammar.options())?;
                let text = std::fs::read(&input)
                    .with_context(|| format!("cannot read {}", input.display()))?;
                let mut parser = lrtree::Parser::new(&language);
                let tree = parser.parse(&text, None);
                println!("{}", tree.root_node().to_sexp());
                if tree.status() != ParseStatus::Complete {
                    log::warn!("parse ended early: {:?}", tree.status());
                }
                if tree.root_node().has_error() {
                    anyhow::bail!("{} has syntax errors", input.display());
                }
            }
        }
        Ok(())
    }
}

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    real::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("lrtree disabled (compiled without `cli` feature)");
}
