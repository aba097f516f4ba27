//! Command-line surface.
//!
//! Commands operate on a JSON data file (default `annotrain.json`) so
//! separate invocations compose: import builds the data set, train/
//! evaluate run an engine over it, export emits the exchange payload.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::snapshot::DataSet;
use crate::train::Trainer;
use crate::types::SamplePurpose;
use crate::{engine_for, EngineKind, RecognitionEngine, Result};

/// Training-data management and training orchestration for an
/// intent/entity recognizer.
#[derive(Debug, Parser)]
#[command(name = "annotrain", version, about)]
pub struct Cli {
    /// Path of the JSON data file.
    #[arg(long, global = true, default_value = "annotrain.json")]
    pub data: PathBuf,

    /// Engine to use for train/evaluate/parse (keyword, mock).
    #[arg(long, global = true, default_value = "keyword")]
    pub engine: String,

    /// The action to perform.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import a delimited file (CSV with `text` and `intent` columns).
    Import {
        /// The CSV file to import.
        file: PathBuf,
    },
    /// Print the exchange payload as JSON.
    Export {
        /// Restrict to one purpose ("train" or "test").
        #[arg(long)]
        purpose: Option<String>,
    },
    /// Train the engine on all train samples.
    Train {
        /// Mark the trained samples after a successful run.
        #[arg(long)]
        commit: bool,
    },
    /// Evaluate the engine on all test samples.
    Evaluate,
    /// Run inference on a single utterance.
    Parse {
        /// The utterance.
        text: String,
    },
    /// Print data set statistics.
    Stats,
}

/// Execute a parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let ds = DataSet::load_or_default(&cli.data)?;
    let engine: Arc<dyn RecognitionEngine> = Arc::from(engine_for(EngineKind::from_str(&cli.engine)?));

    match cli.command {
        Command::Import { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let summary = ds.import(&raw)?;
            print!("{summary}");
            ds.save(&cli.data)?;
        }
        Command::Export { purpose } => {
            let purpose = purpose
                .as_deref()
                .map(SamplePurpose::from_str)
                .transpose()?;
            let payload = ds.export(purpose);
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        Command::Train { commit } => {
            let trainer = Trainer::new(engine, &ds.catalog, &ds.store);
            let report = trainer.train()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if commit {
                let updated = trainer.commit_trained(&report);
                println!("marked {updated} samples as trained");
                ds.save(&cli.data)?;
            }
        }
        Command::Evaluate => {
            let trainer = Trainer::new(engine, &ds.catalog, &ds.store);
            let report = trainer.evaluate()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Parse { text } => {
            let trainer = Trainer::new(engine, &ds.catalog, &ds.store);
            if !trainer.engine_ready() {
                // Baseline engines train in-process from the stored data.
                trainer.train()?;
            }
            let prediction = trainer.parse(&text)?;
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
        Command::Stats => {
            println!("samples:     {}", ds.store.len());
            println!("annotations: {}", ds.store.annotation_count());
            println!("entities:    {}", ds.catalog.entity_count());
            println!("values:      {}", ds.catalog.value_count());
            let orphans = ds.catalog.orphaned_values(&ds.store);
            if !orphans.is_empty() {
                println!("orphaned values: {}", orphans.len());
            }
        }
    }
    Ok(())
}
