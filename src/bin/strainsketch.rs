use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, LevelFilter};

use strainsketch::cmd::{self, ComputeParameters};
use strainsketch::sketch::{Estimator, SketchConfig};

#[derive(Parser)]
#[command(name = "strainsketch", version, about = "HyperLogLog k-mer sketches for strain comparison")]
struct Cli {
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

fn load_parameters(path: Option<&PathBuf>) -> Result<ComputeParameters> {
    match path {
        Some(path) => ComputeParameters::from_path(path)
            .with_context(|| format!("loading parameters from {}", path.display())),
        None => Ok(ComputeParameters::default()),
    }
}

#[derive(Args)]
struct SketchArgs {
    /// JSON file with sketch parameters
    #[arg(long)]
    params: Option<PathBuf>,

    /// k-mer size
    #[arg(short, long)]
    ksize: Option<usize>,

    /// Register index bits; the sketch has 2^p registers
    #[arg(short, long)]
    precision: Option<usize>,

    /// Use the maximum-likelihood cardinality estimator
    #[arg(long)]
    mle: bool,

    /// Fail on k-mers with ambiguous bases instead of skipping them
    #[arg(long)]
    strict: bool,
}

impl SketchArgs {
    fn parameters(&self) -> Result<ComputeParameters> {
        let mut params = load_parameters(self.params.as_ref())?;

        let base = params.sketch();
        let estimator = if self.mle { Estimator::Mle } else { base.estimator() };
        params.set_sketch(
            SketchConfig::builder()
                .precision(self.precision.unwrap_or(base.precision()))
                .ksize(self.ksize.unwrap_or(base.ksize()))
                .seed(base.seed())
                .estimator(estimator)
                .build(),
        );
        if self.strict {
            params.set_force(false);
        }
        Ok(params)
    }
}

/// Options that only affect how stored sketches are compared.
#[derive(Args)]
struct EstimatorArgs {
    /// JSON file with sketch parameters; only the estimator is used
    #[arg(long)]
    params: Option<PathBuf>,

    /// Use the maximum-likelihood cardinality estimator
    #[arg(long)]
    mle: bool,
}

impl EstimatorArgs {
    fn parameters(&self) -> Result<ComputeParameters> {
        let mut params = load_parameters(self.params.as_ref())?;

        if self.mle {
            let base = params.sketch();
            params.set_sketch(
                SketchConfig::builder()
                    .precision(base.precision())
                    .ksize(base.ksize())
                    .seed(base.seed())
                    .estimator(Estimator::Mle)
                    .build(),
            );
        }
        Ok(params)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Sketch FASTA files, one sketch per file
    Compute {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory for the sketches
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        sketch: SketchArgs,
    },
    /// Pairwise distance matrix of stored sketches, as CSV
    Compare {
        sketch_dir: PathBuf,

        /// CSV output, stdout if absent
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        estimator: EstimatorArgs,
    },
    /// Compare a new strain against stored sketches
    Query {
        sequences: PathBuf,

        sketch_dir: PathBuf,

        #[command(flatten)]
        sketch: SketchArgs,
    },
}

fn output_writer(output: Option<&PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(io::stdout()),
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        logger.filter_level(LevelFilter::Warn);
    }
    logger.init();

    match cli.command {
        Command::Compute {
            inputs,
            output_dir,
            sketch,
        } => {
            let mut params = sketch.parameters()?;
            if let Some(dir) = output_dir {
                params.set_output_dir(dir);
            }
            let saved = cmd::compute(&inputs, &params)?;
            info!("wrote {} sketches", saved.len());
        }
        Command::Compare {
            sketch_dir,
            output,
            estimator,
        } => {
            let params = estimator.parameters()?;
            let matrix = cmd::compare(&sketch_dir, &params)?;
            let mut out = output_writer(output.as_ref())?;
            matrix.to_csv_writer(&mut out)?;
            out.flush()?;
        }
        Command::Query {
            sequences,
            sketch_dir,
            sketch,
        } => {
            let params = sketch.parameters()?;
            let results = cmd::query(&sequences, &sketch_dir, &params)?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            for (name, similarity) in results {
                writeln!(out, "Jaccard similarity with {}: {}", name, similarity)?;
            }
        }
    }

    Ok(())
}
