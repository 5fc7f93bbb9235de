// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `preprocess` — builds vocabularies and the indexed dataset
//   2. `inspect`    — summarises a saved dataset
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, InspectArgs, PreprocessArgs};

use crate::application::preprocess_use_case::PreprocessConfig;

#[derive(Parser, Debug)]
#[command(
    name = "nmt-prep",
    version = "0.1.0",
    about = "Turn a parallel corpus into vocabularies and an indexed NMT dataset."
)]
pub struct Cli {
    /// The subcommand to run (preprocess or inspect)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Preprocess(args) => run_preprocess(args),
            Commands::Inspect(args)    => run_inspect(args),
        }
    }
}

fn run_preprocess(args: PreprocessArgs) -> Result<()> {
    use crate::application::preprocess_use_case::PreprocessUseCase;

    let config = PreprocessConfig::try_from(args)?;
    tracing::info!("Preprocessing {} corpus into '{}'", config.src_type, config.save_data);

    let outcome = PreprocessUseCase::new(config).execute()?;

    for row in outcome.report.rows() {
        println!("{}: {} examples", row.split, row.examples);
    }
    println!("Dataset saved to '{}'.", outcome.data_path.display());
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    use crate::application::inspect_use_case::InspectUseCase;

    let summary = InspectUseCase::new(args.save_data, args.show, args.batch_size).summarise()?;
    print!("{summary}");
    Ok(())
}
