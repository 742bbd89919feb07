use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use phenotag::coding::READ_ICD10_MAPPING_FILENAME;
use phenotag::config::Settings;
use phenotag::import::{import_document, load_brand_configs, OntologyDocument};
use phenotag::labeller::label_phenotypes;
use phenotag::{CodeMap, Database, LabelSource};

/// Number of chapters, blocks per chapter and diseases per block of `--debug`
const SYNTHETIC_WIDTH: usize = 4;

#[derive(Parser)]
#[command(name = "phenotag", about = "Ontology indexing and phenotype labelling")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create ontology nodes and edges from a category document
    BuildOntology(BuildOntologyArgs),
    /// Label all phenotype versions with ontology nodes
    LabelPhenotypes(LabelPhenotypesArgs),
    /// Load brand configurations from a directory
    MigrateBrandConfig(MigrateBrandConfigArgs),
}

#[derive(Args)]
struct BuildOntologyArgs {
    /// JSON document with `type` and `data`, ignored with `--debug`
    #[arg(long, required_unless_present = "debug")]
    file: Option<PathBuf>,
    /// Build a synthetic ontology instead of reading a file
    #[arg(long)]
    debug: bool,
    /// Write a log file and the DOT rendering of the ontology to this directory
    #[arg(long, value_name = "DIR")]
    log: Option<PathBuf>,
    /// Print the import summary
    #[arg(long)]
    print: bool,
}

#[derive(Args)]
struct LabelPhenotypesArgs {
    /// 0: ICD-10 codes, 1: Read v2 codes mapped to ICD-10
    #[arg(long = "type", value_parser = clap::value_parser!(u8).range(0..=1))]
    source: u8,
    /// Print the labelling report
    #[arg(long)]
    print: bool,
}

#[derive(Args)]
struct MigrateBrandConfigArgs {
    /// Directory of `<brand>.json` files
    #[arg(long, value_name = "DIR")]
    file: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_dir = match &cli.command {
        Commands::BuildOntology(args) => args.log.as_deref(),
        _ => None,
    };
    init_tracing(log_dir)?;

    let settings = Settings::from_env();
    let db = Database::open(&settings.database)
        .with_context(|| format!("opening {}", settings.database.display()))?;

    match cli.command {
        Commands::BuildOntology(args) => build_ontology(&db, args)?,
        Commands::LabelPhenotypes(args) => label(&db, &settings, args)?,
        Commands::MigrateBrandConfig(args) => {
            let loaded = db.transaction(|tables| load_brand_configs(tables, &args.file))?;
            info!("Migrated {loaded} brand configurations");
        }
    }
    db.save()?;
    Ok(())
}

fn init_tracing(log_dir: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let file = File::create(dir.join("build-ontology.log"))?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

fn build_ontology(db: &Database, args: BuildOntologyArgs) -> Result<()> {
    let document = match &args.file {
        Some(path) if !args.debug => OntologyDocument::from_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        _ => OntologyDocument::synthetic(SYNTHETIC_WIDTH),
    };
    let report = db.transaction(|tables| import_document(tables, &document))?;

    if let Some(dir) = &args.log {
        let dot = db.read(|tables| tables.ontology.as_dot())?;
        let path = dir.join("ontology.dot");
        fs::write(&path, dot)?;
        info!("Wrote {}", path.display());
    }
    if args.print {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn label(db: &Database, settings: &Settings, args: LabelPhenotypesArgs) -> Result<()> {
    let source = match args.source {
        0 => LabelSource::Icd10,
        _ => {
            let path = settings.data_dir.join(READ_ICD10_MAPPING_FILENAME);
            let map = CodeMap::from_csv(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            LabelSource::ReadViaMap(map)
        }
    };
    let report = label_phenotypes(db, &source)?;
    if args.print {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
