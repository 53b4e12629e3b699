mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "lakerun",
    version,
    about = "Configuration-driven ETL pipeline runner"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline from a YAML configuration
    Run {
        /// Path to the pipeline YAML file
        config: PathBuf,
        /// Environment name (dev, qa, prd)
        #[arg(long, default_value = "dev")]
        environment: String,
        /// Build the execution plan and sample data without writing
        #[arg(long)]
        dry_run: bool,
        /// Catalog name substituted into ${CATALOG_NAME}
        #[arg(long)]
        catalog: Option<String>,
        /// Base path for configuration files
        #[arg(long, default_value = ".")]
        base_path: PathBuf,
    },
    /// Validate a pipeline configuration
    Validate {
        /// Path to the pipeline YAML file
        config: PathBuf,
        /// Environment name (dev, qa, prd)
        #[arg(long, default_value = "dev")]
        environment: String,
        /// Base path for configuration files
        #[arg(long, default_value = ".")]
        base_path: PathBuf,
    },
    /// List primary pipeline configurations (environment overlays excluded)
    List {
        /// Restrict to a layer subdirectory (bronze, silver, gold)
        #[arg(long)]
        layer: Option<String>,
        /// Base path for configuration files
        #[arg(long, default_value = ".")]
        base_path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run {
            config,
            environment,
            dry_run,
            catalog,
            base_path,
        } => commands::run::execute(&config, &environment, dry_run, catalog.as_deref(), &base_path),
        Commands::Validate {
            config,
            environment,
            base_path,
        } => commands::validate::execute(&config, &environment, &base_path),
        Commands::List { layer, base_path } => commands::list::execute(layer.as_deref(), &base_path),
    }
}
