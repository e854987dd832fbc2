use vecfuzz_core::catalogue;
use vecfuzz_core::config::VecfuzzConfig;
use vecfuzz_core::coverage::{
    BreakpointScript, EdgeCache, EdgeSet, HitReport, ObjdumpDisassembler,
};
use vecfuzz_core::evaluator::Evaluator;
use vecfuzz_core::format::FormatFamily;
use vecfuzz_core::params::ParamVector;
use vecfuzz_core::pipeline::Pipeline;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration; `vecfuzz.toml` in the working directory is used when present.
    #[clap(short, long, value_parser, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[clap(short, long, global = true)]
    verbose: bool,
    #[clap(subcommand)]
    command: Command,
}

/// Pipeline selection shared by the subcommands that build one.
#[derive(clap::Args, Debug, Default)]
struct PipelineArgs {
    /// Catalogue keys, comma separated, in application order.
    #[clap(short, long, value_delimiter = ',')]
    mutators: Vec<String>,
    /// Use every strategy of one family (plaintext, csv, json, xml, jpeg, binary).
    #[clap(short, long)]
    family: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Applies a pipeline to a seed file.
    Mutate {
        #[clap(short, long)]
        seed: PathBuf,
        /// Coordinates in [0, 1], comma or space separated.
        #[clap(long, allow_hyphen_values = true)]
        vector: String,
        #[clap(flatten)]
        pipeline: PipelineArgs,
        /// Output file; stdout when absent.
        #[clap(short, long)]
        out: Option<PathBuf>,
    },
    /// Prints the pipeline composition and the vector length it expects.
    Dimension {
        #[clap(flatten)]
        pipeline: PipelineArgs,
        /// Seed used for format detection when no mutators are given.
        #[clap(short, long)]
        seed: Option<PathBuf>,
    },
    /// Lists the strategy catalogue.
    List,
    /// Renders the gdb breakpoint script for a binary or a saved disassembly listing.
    Breakpoints {
        #[clap(short, long, conflicts_with = "listing", required_unless_present = "listing")]
        binary: Option<PathBuf>,
        #[clap(short, long)]
        listing: Option<PathBuf>,
        #[clap(short, long)]
        out: Option<PathBuf>,
    },
    /// Reduces a saved gdb breakpoint report to the two coverage metrics.
    Score {
        #[clap(short, long)]
        report: PathBuf,
        #[clap(long)]
        json: bool,
    },
    /// Mutates a seed, runs the binary under the breakpoint script once and scores the run.
    Evaluate {
        #[clap(short, long)]
        seed: PathBuf,
        #[clap(short, long)]
        binary: PathBuf,
        #[clap(long, allow_hyphen_values = true)]
        vector: String,
        #[clap(flatten)]
        pipeline: PipelineArgs,
        /// Keeps the mutated input.
        #[clap(short, long)]
        out: Option<PathBuf>,
        #[clap(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<VecfuzzConfig> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading configuration");
            VecfuzzConfig::load_from_file(path)
        }
        None => {
            let default_path = Path::new("vecfuzz.toml");
            if default_path.exists() {
                tracing::info!(path = %default_path.display(), "Loading default configuration");
                VecfuzzConfig::load_from_file(default_path)
            } else {
                tracing::debug!("No configuration file, using built-in defaults");
                Ok(VecfuzzConfig::default())
            }
        }
    }
}

fn parse_family(name: &str) -> anyhow::Result<FormatFamily> {
    FormatFamily::ALL
        .into_iter()
        .find(|family| family.as_str() == name)
        .ok_or_else(|| anyhow::anyhow!("Unknown format family '{}'", name))
}

/// Applies the command line pipeline selection on top of the configured one.
fn build_pipeline(
    config: &mut VecfuzzConfig,
    args: &PipelineArgs,
    seed: &[u8],
) -> anyhow::Result<Pipeline> {
    if !args.mutators.is_empty() {
        config.pipeline.mutators = args.mutators.clone();
    }
    if let Some(name) = &args.family {
        config.pipeline.mutators.clear();
        config.pipeline.family = Some(parse_family(name)?);
    }
    let pipeline = config
        .pipeline
        .build(seed)
        .context("Failed to build pipeline")?;
    Ok(pipeline)
}

fn parse_vector(text: &str, pipeline: &Pipeline) -> anyhow::Result<ParamVector> {
    let vector: ParamVector = text
        .parse()
        .with_context(|| format!("Invalid parameter vector {text:?}"))?;
    if vector.len() != pipeline.dimension() {
        anyhow::bail!(
            "Pipeline '{}' takes {} coordinates, got {}",
            pipeline.name(),
            pipeline.dimension(),
            vector.len()
        );
    }
    Ok(vector)
}

fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write_output(out: Option<&Path>, bytes: &[u8]) -> anyhow::Result<()> {
    match out {
        Some(path) => std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            use std::io::Write;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

/// Extracts the edge set of `binary`, going through the configured edge cache.
fn edges_for_binary(config: &VecfuzzConfig, binary: &Path) -> anyhow::Result<EdgeSet> {
    let disassembler = ObjdumpDisassembler::new(config.coverage.disassembler.clone());
    let mut cache = match &config.coverage.cache_path {
        Some(path) => EdgeCache::open(path)
            .with_context(|| format!("Failed to open edge cache {}", path.display()))?,
        None => EdgeCache::in_memory(),
    };
    let edges = cache
        .edges_for(binary, &disassembler)
        .with_context(|| format!("Failed to extract edges from {}", binary.display()))?;
    cache.save().context("Failed to save edge cache")?;
    Ok(edges)
}

fn print_report(hits: &HitReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(hits)?);
    } else {
        println!("{hits}");
    }
    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let mut config = load_config(cli.config.as_deref())?;
    tracing::debug!(?config, "Effective configuration");

    match cli.command {
        Command::Mutate {
            seed,
            vector,
            pipeline,
            out,
        } => {
            let seed = read_file(&seed)?;
            let pipeline = build_pipeline(&mut config, &pipeline, &seed)?;
            let vector = parse_vector(&vector, &pipeline)?;
            let output = pipeline.apply(&seed, &vector)?;
            tracing::info!(
                pipeline = %pipeline.name(),
                digest = %format!("{:x}", md5::compute(&output)),
                len = output.len(),
                "Mutated seed"
            );
            write_output(out.as_deref(), &output)?;
        }
        Command::Dimension { pipeline, seed } => {
            let seed = match seed {
                Some(path) => read_file(&path)?,
                None => Vec::new(),
            };
            let pipeline = build_pipeline(&mut config, &pipeline, &seed)?;
            println!("{}", pipeline.name());
            println!("{}", pipeline.dimension());
        }
        Command::List => {
            for entry in catalogue::all() {
                let mutator = entry.build();
                println!(
                    "{:<28} {:<10} {}  {}",
                    entry.key,
                    entry.family.as_str(),
                    mutator.dimension(),
                    mutator.name()
                );
            }
        }
        Command::Breakpoints {
            binary,
            listing,
            out,
        } => {
            let edges = match (binary, listing) {
                (_, Some(listing)) => EdgeSet::from_listing_file(&listing)
                    .with_context(|| format!("Failed to read listing {}", listing.display()))?,
                (Some(binary), None) => edges_for_binary(&config, &binary)?,
                (None, None) => anyhow::bail!("Either --binary or --listing is required"),
            };
            if edges.is_empty() {
                tracing::warn!("Breakpoint script is empty");
            }
            let script = BreakpointScript::render(&edges, config.coverage.continue_ceiling);
            write_output(out.as_deref(), script.as_str().as_bytes())?;
        }
        Command::Score { report, json } => {
            let text = std::fs::read_to_string(&report)
                .with_context(|| format!("Failed to read report {}", report.display()))?;
            print_report(&HitReport::parse(&text), json)?;
        }
        Command::Evaluate {
            seed,
            binary,
            vector,
            pipeline,
            out,
            json,
        } => {
            let seed = read_file(&seed)?;
            let pipeline = build_pipeline(&mut config, &pipeline, &seed)?;
            let vector = parse_vector(&vector, &pipeline)?;
            let edges = edges_for_binary(&config, &binary)?;
            if edges.is_empty() {
                tracing::warn!(binary = %binary.display(), "No edges to observe, every run will score zero");
            }
            let script = BreakpointScript::render(&edges, config.coverage.continue_ceiling);
            let runner = config.runner_for(&binary);
            let mut evaluator = Evaluator::new(pipeline, seed, script, runner);
            let evaluation = evaluator.evaluate(&vector)?;
            if let Some(path) = out.as_deref() {
                write_output(Some(path), &evaluation.input)?;
            }
            print_report(&evaluation.hits, json)?;
        }
    }

    Ok(())
}
