use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tree_info_distances::distances::{Metric, build_split_lists, pairwise_distances};
use tree_info_distances::info::InfoTables;
use tree_info_distances::io::{BurnIn, read_trees, write_matrix_tsv};

/// Compute pairwise split-based distances between phylogenetic trees
/// and write a labeled distance matrix (TSV) where row/column names are tree names.
#[derive(Parser, Debug)]
#[command(
    name = "tree-info-distances",
    version,
    about = "Pairwise RF and clustering information distances for tree samples"
)]
struct Args {
    /// BEAST .trees (NEXUS) or Newick file; repeat to pool several files
    #[arg(short = 'i', long = "input", required = true)]
    input: Vec<PathBuf>,

    /// Output path for TSV distance matrix (gzip if it ends with .gz)
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Burn-in by number of trees (drop first N trees of each file)
    #[arg(short = 't', long = "burnin-trees", default_value_t = 0)]
    burnin_trees: usize,

    /// Burn-in by state (keep trees with STATE_ > value)
    #[arg(short = 's', long = "burnin-states", default_value_t = 0)]
    burnin_states: usize,

    /// Use TRANSLATE block to map taxon IDs to labels when available
    #[arg(long = "use-real-taxa", default_value_t = false)]
    use_real_taxa: bool,

    /// Distance metric to compute
    #[arg(long = "metric", value_enum, default_value_t = MetricArg::Cid)]
    metric: MetricArg,

    /// Worker threads for the pairwise pass (0 = all cores)
    #[arg(long = "threads", default_value_t = 0)]
    threads: usize,

    /// Largest tip count served from the precomputed log tables
    #[arg(long = "cache-tips", default_value_t = tree_info_distances::info::DEFAULT_MAX_TIPS)]
    cache_tips: usize,

    /// Quiet mode: only warnings and errors are logged
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum MetricArg {
    Rf,
    NormalizedRf,
    InfoRf,
    NormalizedInfoRf,
    Cid,
    NormalizedCid,
}

impl From<MetricArg> for Metric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Rf => Metric::Rf,
            MetricArg::NormalizedRf => Metric::NormalizedRf,
            MetricArg::InfoRf => Metric::InfoRf,
            MetricArg::NormalizedInfoRf => Metric::NormalizedInfoRf,
            MetricArg::Cid => Metric::Cid,
            MetricArg::NormalizedCid => Metric::NormalizedCid,
        }
    }
}

fn init_logging(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let log_level = std::env::var("TREE_INFO_LOG").unwrap_or_else(|_| default_level.to_string());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.quiet);

    if args.threads > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()
        {
            error!("Failed to configure thread pool: {e}");
        }
    }
    if !InfoTables::init_global(args.cache_tips) {
        info!("Log tables were already initialized; --cache-tips ignored");
    }

    // Read trees with names
    let t0 = Instant::now();
    let burnin = BurnIn {
        trees: args.burnin_trees,
        states: args.burnin_states,
    };
    let mut names = Vec::new();
    let mut trees = Vec::new();
    for path in &args.input {
        match read_trees(path, &burnin, args.use_real_taxa) {
            Ok(named) => {
                for (name, tree) in named {
                    names.push(name);
                    trees.push(tree);
                }
            }
            Err(e) => error!("Failed to read {}: {e}", path.display()),
        }
    }
    if trees.is_empty() {
        error!("No trees parsed from {:?}.", args.input);
        process::exit(2);
    }
    info!(
        trees = trees.len(),
        files = args.input.len(),
        "Reading trees {:.3}s",
        t0.elapsed().as_secs_f64()
    );

    let t1 = Instant::now();
    let lists = match build_split_lists(&trees) {
        Ok(lists) => lists,
        Err(e) => {
            error!("Failed to extract splits: {e}");
            process::exit(3);
        }
    };
    info!("Extracting splits {:.3}s", t1.elapsed().as_secs_f64());

    let metric = Metric::from(args.metric);
    let t2 = Instant::now();
    info!(
        "Determining distances using {metric} for {} combinations",
        names.len() * (names.len() - 1) / 2
    );
    let matrix = match pairwise_distances(&lists, metric) {
        Ok(matrix) => matrix,
        Err(e) => {
            error!("Failed to compute {metric} distances: {e}");
            process::exit(3);
        }
    };
    info!(
        "Determining distances using {metric} {:.3}s",
        t2.elapsed().as_secs_f64()
    );

    let t3 = Instant::now();
    if let Err(e) = write_matrix_tsv(&args.output, &names, &matrix) {
        error!("Failed to write output {:?}: {e}", args.output);
        process::exit(4);
    }
    info!(
        output = %args.output.display(),
        "Writing output {:.3}s",
        t3.elapsed().as_secs_f64()
    );
}
