use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use covnorm::cli;
use covnorm::hotspots::RiskHotspotThresholds;
use covnorm::preprocess::SourceContext;

/// covnorm: normalize and merge code coverage reports.
#[derive(Parser)]
#[command(name = "covnorm", version, about)]
struct Cli {
    /// Log level used when RUST_LOG is not set (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Directory searched for source files. May be given several times.
    #[arg(long = "source-dir", global = true)]
    source_dirs: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the detected schema of a coverage report.
    Detect {
        /// Path to the coverage report.
        file: PathBuf,
    },

    /// Repair coverage reports and write them to an output directory.
    Preprocess {
        /// Paths to the coverage reports.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Override schema detection (opencover, partcover, dotcover, visualstudio, jacoco).
        #[arg(long)]
        format: Option<String>,

        /// Directory the repaired reports are written to.
        #[arg(long, short, default_value = "covnorm-out")]
        output_dir: PathBuf,
    },

    /// List the source files declaring a class.
    FindClass {
        /// Fully-qualified class name, e.g. `Ns.Outer/Inner`.
        class_name: String,
    },

    /// Merge JSON coverage data of several runs.
    Merge {
        /// JSON files holding lists of assemblies.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Write the merged assemblies to this file.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// List methods whose code quality metrics exceed a threshold.
    Hotspots {
        /// JSON file holding a list of assemblies.
        input: PathBuf,

        #[arg(long, default_value_t = 15.0)]
        cyclomatic_complexity: f64,

        #[arg(long, default_value_t = 30.0)]
        crap_score: f64,

        #[arg(long, default_value_t = 200.0)]
        npath_complexity: f64,

        /// Fail when a method's cyclomatic complexity is above this value.
        #[arg(long)]
        max_cyclomatic_complexity: Option<f64>,

        /// Fail when a method's CRAP score is above this value.
        #[arg(long)]
        max_crap_score: Option<f64>,

        /// Fail when a method's NPath complexity is above this value.
        #[arg(long)]
        max_npath_complexity: Option<f64>,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    for dir in &cli.source_dirs {
        if !dir.is_dir() {
            tracing::warn!("Source directory {} does not exist", dir.display());
        }
    }

    let output = match cli.command {
        Commands::Detect { file } => cli::cmd_detect(&file)?,
        Commands::Preprocess {
            files,
            format,
            output_dir,
        } => {
            let context = SourceContext::new(cli.source_dirs);
            cli::cmd_preprocess(&files, format.as_deref(), &output_dir, &context)?
        }
        Commands::FindClass { class_name } => {
            let context = SourceContext::new(cli.source_dirs);
            cli::cmd_find_class(&class_name, &context)?
        }
        Commands::Merge { inputs, output } => cli::cmd_merge(&inputs, output.as_deref())?,
        Commands::Hotspots {
            input,
            cyclomatic_complexity,
            crap_score,
            npath_complexity,
            max_cyclomatic_complexity,
            max_crap_score,
            max_npath_complexity,
        } => {
            let thresholds = RiskHotspotThresholds {
                cyclomatic_complexity,
                crap_score,
                npath_complexity,
                maximum_cyclomatic_complexity: max_cyclomatic_complexity,
                maximum_crap_score: max_crap_score,
                maximum_npath_complexity: max_npath_complexity,
            };
            cli::cmd_hotspots(&input, &thresholds)?
        }
    };

    print!("{}", output);
    Ok(())
}
