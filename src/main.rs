//! Kohonen CLI - Self-Organizing Map training
//!
//! Command-line interface for training maps, labeling their units and
//! scoring them on held-out data.

use clap::{Parser, Subcommand};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use kohonen::storage::CheckpointFormat;
use kohonen::{
    evaluate, evaluate_checkpoints, label_checkpoints, label_units, CheckpointCadence,
    CheckpointStore, Dataset, DecaySchedule, DirectoryStore, KohonenError, Result, SomConfig,
    SomTrainer, UnitLabels, VectorSet, DEFAULT_LABEL_SIGMA,
};
use log::error;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "kohonen")]
#[command(version)]
#[command(about = "Self-Organizing Map training engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a map and write checkpoints
    Train {
        /// Training vectors (one per line, whitespace or comma separated)
        #[arg(short, long)]
        input: PathBuf,

        /// Checkpoint directory
        #[arg(short, long, default_value = "weights")]
        output: PathBuf,

        /// First column of the input holds a class label (ignored for training)
        #[arg(long)]
        labeled: bool,

        /// Grid rows
        #[arg(long, default_value = "10")]
        rows: usize,

        /// Grid columns
        #[arg(long, default_value = "10")]
        cols: usize,

        /// Number of training iterations
        #[arg(short = 'n', long, default_value = "10000")]
        iterations: u64,

        /// Initial neighborhood radius
        #[arg(long, default_value = "2.0")]
        sigma_max: f64,

        /// Final neighborhood radius
        #[arg(long, default_value = "0.9")]
        sigma_min: f64,

        /// Initial learning rate
        #[arg(long, default_value = "0.2")]
        eta_max: f64,

        /// Final learning rate
        #[arg(long, default_value = "0.001")]
        eta_min: f64,

        /// Iteration where the decay starts (default: 20% of iterations)
        #[arg(long)]
        decay_start: Option<u64>,

        /// Iteration where the decay ends (default: 60% of iterations)
        #[arg(long)]
        decay_stop: Option<u64>,

        /// Number of equally spaced checkpoints
        #[arg(short, long, default_value = "4")]
        checkpoints: usize,

        /// Random seed for reproducibility
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Label the units of a trained map from a labeled reference set
    Label {
        /// Labeled reference vectors (class in the first column)
        #[arg(short, long)]
        input: PathBuf,

        /// Checkpoint file
        #[arg(short, long, conflicts_with = "weights_dir", required_unless_present = "weights_dir")]
        weights: Option<PathBuf>,

        /// Checkpoint directory; labels every checkpoint it holds
        #[arg(long)]
        weights_dir: Option<PathBuf>,

        /// Output label file (a directory of `labels_<tag>.klab` with --weights-dir)
        #[arg(short, long)]
        output: PathBuf,

        /// Number of classes (default: largest label + 1)
        #[arg(long)]
        classes: Option<usize>,

        /// Gaussian bandwidth of each vote
        #[arg(long, default_value_t = DEFAULT_LABEL_SIGMA)]
        sigma: f64,
    },

    /// Classify a labeled test set and report the error rate
    Evaluate {
        /// Labeled test vectors (class in the first column)
        #[arg(short, long)]
        input: PathBuf,

        /// Checkpoint file
        #[arg(short, long, conflicts_with = "weights_dir", required_unless_present = "weights_dir")]
        weights: Option<PathBuf>,

        /// Label file produced by `label`, or its output directory with --weights-dir
        #[arg(short, long)]
        labels: PathBuf,

        /// Checkpoint directory; reports the error rate of every checkpoint
        #[arg(long)]
        weights_dir: Option<PathBuf>,
    },

    /// Show checkpoint header
    Info {
        /// Checkpoint file to inspect
        weights: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let result = match cli.command {
        Commands::Train {
            input,
            output,
            labeled,
            rows,
            cols,
            iterations,
            sigma_max,
            sigma_min,
            eta_max,
            eta_min,
            decay_start,
            decay_stop,
            checkpoints,
            seed,
        } => train_map(TrainArgs {
            input,
            output,
            labeled,
            rows,
            cols,
            iterations,
            sigma_max,
            sigma_min,
            eta_max,
            eta_min,
            decay_start,
            decay_stop,
            checkpoints,
            seed,
        }),

        Commands::Label {
            input,
            weights,
            weights_dir,
            output,
            classes,
            sigma,
        } => match (weights, weights_dir) {
            (_, Some(dir)) => label_all(input, dir, output, classes, sigma),
            (Some(weights), None) => label_map(input, weights, output, classes, sigma),
            (None, None) => Err(missing_weights()),
        },

        Commands::Evaluate {
            input,
            weights,
            labels,
            weights_dir,
        } => match (weights, weights_dir) {
            (_, Some(dir)) => evaluate_all(input, dir, labels),
            (Some(weights), None) => evaluate_map(input, weights, labels),
            (None, None) => Err(missing_weights()),
        },

        Commands::Info { weights } => show_info(weights),
    };

    if let Err(e) = result {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

struct TrainArgs {
    input: PathBuf,
    output: PathBuf,
    labeled: bool,
    rows: usize,
    cols: usize,
    iterations: u64,
    sigma_max: f64,
    sigma_min: f64,
    eta_max: f64,
    eta_min: f64,
    decay_start: Option<u64>,
    decay_stop: Option<u64>,
    checkpoints: usize,
    seed: Option<u64>,
}

fn train_map(args: TrainArgs) -> Result<()> {
    let start_time = Instant::now();

    let (default_start, default_stop) = default_decay_span(args.iterations);
    let decay_start = args.decay_start.unwrap_or(default_start);
    let decay_stop = args.decay_stop.unwrap_or(default_stop);
    let sigma = DecaySchedule::new(decay_start, decay_stop, args.sigma_max, args.sigma_min)?;
    let eta = DecaySchedule::new(decay_start, decay_stop, args.eta_max, args.eta_min)?;

    println!("Kohonen SOM");
    println!("   Training from: {}", args.input.display());
    println!();

    let data = VectorSet::load_text(&args.input, args.labeled)?;
    let dim = data
        .dim()
        .ok_or_else(|| KohonenError::EmptyInput("No training vectors in input".to_string()))?;
    println!(
        "✓ Loaded {} vectors ({} dimensions)",
        format_number(data.len()),
        dim
    );

    let config = SomConfig {
        rows: args.rows,
        cols: args.cols,
        vector_dim: dim,
        total_iterations: args.iterations,
        sigma,
        eta,
        checkpoints: CheckpointCadence::Count(args.checkpoints),
        seed: args.seed,
        log_interval: 0,
    };

    let mut trainer = SomTrainer::new(config)?;
    let mut store = DirectoryStore::create(&args.output)?;
    println!(
        "✓ Initialized map ({}x{} = {} units)",
        args.rows,
        args.cols,
        args.rows * args.cols
    );

    let bar_style = ProgressStyle::default_bar()
        .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) ETA: {eta}")
        .map_err(|e| KohonenError::Config(e.to_string()))?
        .progress_chars("█▓▒░  ");

    let pb = ProgressBar::new(args.iterations);
    pb.set_style(bar_style);
    pb.set_message("Training SOM...");

    let report = trainer.run_with_progress(&data, &mut store, |p| {
        if p.iteration % 100 == 0 {
            pb.set_position(p.iteration);
            pb.set_message(format!("Training SOM (sigma={:.3}, eta={:.4})", p.sigma, p.eta));
        }
    })?;
    pb.finish_and_clear();

    println!(
        "✓ Trained {} iterations, mean quantization error {:.4}",
        format_number(report.iterations_completed as usize),
        report.mean_quantization_error
    );
    for tag in &report.checkpoints {
        println!("   checkpoint: {}", store.path_for(*tag).display());
    }
    println!();
    println!("Done in {}", HumanDuration(start_time.elapsed()));

    Ok(())
}

/// Decay runs from 20% to 60% of the iterations.
fn default_decay_span(iterations: u64) -> (u64, u64) {
    let fifth = iterations / 5;
    (fifth, fifth * 3)
}

fn label_map(
    input: PathBuf,
    weights: PathBuf,
    output: PathBuf,
    classes: Option<usize>,
    sigma: f64,
) -> Result<()> {
    let (_, map) = CheckpointFormat::read(&weights)?;
    let reference = VectorSet::load_text(&input, true)?;
    let num_classes = classes.unwrap_or_else(|| reference.num_classes());

    let labels = label_units(&map, &reference, num_classes, sigma)?;
    labels.save(&output)?;

    let cols = map.topology().cols();
    for row in labels.as_slice().chunks(cols) {
        let line: Vec<String> = row.iter().map(|l| format!("{:>3}", l)).collect();
        println!("{}", line.join(""));
    }
    println!("✓ Wrote labels to {}", output.display());

    Ok(())
}

fn evaluate_map(input: PathBuf, weights: PathBuf, labels: PathBuf) -> Result<()> {
    let (header, map) = CheckpointFormat::read(&weights)?;
    let labels = UnitLabels::load(&labels)?;
    let test = VectorSet::load_text(&input, true)?;

    let evaluation = evaluate(&map, &labels, &test)?;
    println!("Checkpoint {}:", header.tag);
    println!("  Test vectors: {}", format_number(evaluation.total));
    println!("  Errors: {}", format_number(evaluation.errors));
    println!("  Error rate: {:.2}%", evaluation.error_percent());

    Ok(())
}

fn label_all(
    input: PathBuf,
    weights_dir: PathBuf,
    output: PathBuf,
    classes: Option<usize>,
    sigma: f64,
) -> Result<()> {
    let store = DirectoryStore::open(&weights_dir)?;
    let reference = VectorSet::load_text(&input, true)?;
    let num_classes = classes.unwrap_or_else(|| reference.num_classes());

    let labeled = label_checkpoints(&store, &reference, num_classes, sigma)?;
    fs::create_dir_all(&output)?;
    for (tag, labels) in &labeled {
        let path = UnitLabels::path_for(&output, *tag);
        labels.save(&path)?;
        println!("✓ Checkpoint {}: wrote {}", tag, path.display());
    }

    Ok(())
}

fn evaluate_all(input: PathBuf, weights_dir: PathBuf, labels_dir: PathBuf) -> Result<()> {
    let store = DirectoryStore::open(&weights_dir)?;
    let test = VectorSet::load_text(&input, true)?;

    let labels = store
        .tags()?
        .into_iter()
        .map(|tag| Ok((tag, UnitLabels::load(UnitLabels::path_for(&labels_dir, tag))?)))
        .collect::<Result<Vec<_>>>()?;

    let series = evaluate_checkpoints(&store, &labels, &test)?;
    println!("{:>12}  {:>10}  {:>10}", "Checkpoint", "Errors", "Rate");
    for (tag, evaluation) in &series {
        println!(
            "{:>12}  {:>10}  {:>9.2}%",
            format_number(*tag as usize),
            format_number(evaluation.errors),
            evaluation.error_percent()
        );
    }

    Ok(())
}

fn missing_weights() -> KohonenError {
    KohonenError::Config("either --weights or --weights-dir is required".to_string())
}

fn show_info(weights: PathBuf) -> Result<()> {
    let header = CheckpointFormat::read_header(&weights)?;

    println!("Checkpoint: {:?}", weights);
    println!("  Format version: {}", header.version);
    println!("  Tag (iteration): {}", header.tag);
    println!("  Grid: {}x{}", header.rows, header.cols);
    println!("  Vector dimension: {}", header.dim);

    Ok(())
}

fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
