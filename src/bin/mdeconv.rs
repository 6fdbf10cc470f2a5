//! mdeconv - marker selection and deconvolution CLI
//!
//! Selects cell-type marker regions from pure profiles, writes the signature
//! matrix, and estimates mixture composition against a saved signature.

use clap::{Parser, Subcommand};
use marker_deconv::data::{Phenotype, Profile, SignatureMatrix};
use marker_deconv::deconv::{deconvolve, Constraint, DeconvMethod};
use marker_deconv::error::Result;
use marker_deconv::normalize::NormMethod;
use marker_deconv::pipeline::{find_markers, RunConfig};
use marker_deconv::report::TracingReporter;
use marker_deconv::simulate::{mix_profiles, random_proportions};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Cell-type marker selection and signature-based deconvolution
#[derive(Parser)]
#[command(name = "mdeconv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of worker threads
    #[arg(long, default_value = "1", global = true)]
    threads: usize,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select marker regions and write the signature matrix
    Markers {
        /// Pure-profile TSV (regions x samples)
        #[arg(short, long)]
        profile: PathBuf,

        /// Phenotype TSV (cell types x samples, codes 0/1/2)
        #[arg(short = 'P', long)]
        phenotype: PathBuf,

        /// Output path for the signature matrix TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Run configuration YAML
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the run summary as JSON
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Normalization (quantile, deseq, upper_quantile, ppm, tmm)
        #[arg(long)]
        norm: Option<NormMethod>,

        /// Test log2(1 + x) of the normalized profile
        #[arg(long)]
        log_transform: bool,

        /// Smallest marker group size searched
        #[arg(long)]
        min_group_size: Option<usize>,

        /// Largest marker group size searched
        #[arg(long)]
        max_group_size: Option<usize>,

        /// Minimum specificity score
        #[arg(long)]
        score: Option<f64>,

        /// Ratio between the top cell type and the runner-up
        #[arg(long)]
        ratio: Option<f64>,
    },

    /// Estimate mixture composition against a signature matrix
    Deconvolve {
        /// Signature matrix TSV
        #[arg(short, long)]
        signature: PathBuf,

        /// Mixture profile TSV (regions x samples)
        #[arg(short, long)]
        mixture: PathBuf,

        /// Output path for the proportions TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Run configuration YAML
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Also write results as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Regression method (simpls, robust_simpls, least_squares)
        #[arg(long)]
        method: Option<DeconvMethod>,

        /// Post-processing of coefficients (none, non_negative, simplex)
        #[arg(long)]
        constraint: Option<Constraint>,

        /// Fixed number of PLS components
        #[arg(long)]
        n_components: Option<usize>,

        /// Choose components by K-fold cross-validation
        #[arg(long)]
        cv_folds: Option<usize>,

        /// Compute permutation p-values
        #[arg(long)]
        p_value: bool,

        /// Number of permutations
        #[arg(long)]
        permutations: Option<usize>,

        /// Random seed for permutations
        #[arg(long)]
        seed: Option<u64>,

        /// Normalize the mixture after intersection
        #[arg(long)]
        norm: Option<NormMethod>,
    },

    /// Mix pure profiles with random proportions
    Simulate {
        /// Pure-profile TSV whose columns are cell types
        #[arg(short, long)]
        profile: PathBuf,

        /// Output path for the mixture profile TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Output path for the true proportions TSV
        #[arg(long)]
        proportions: PathBuf,

        /// Cell types per mixture (comma-separated; default 1..=k)
        #[arg(long, value_delimiter = ',')]
        sizes: Option<Vec<usize>>,

        /// Mixtures per size
        #[arg(long)]
        replicates: Option<usize>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Write a default run configuration YAML
    Example {
        /// Output path
        #[arg(short, long, default_value = "mdeconv.yaml")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let threads = cli.threads;
    let result = match cli.command {
        Commands::Markers {
            profile,
            phenotype,
            output,
            config,
            summary,
            norm,
            log_transform,
            min_group_size,
            max_group_size,
            score,
            ratio,
        } => load_config(config.as_deref(), threads).and_then(|mut config| {
            let m = &mut config.markers;
            if let Some(norm) = norm {
                m.normalization = norm;
            }
            m.log_transform |= log_transform;
            if let Some(v) = min_group_size {
                m.optimizer.min_group_size = v;
            }
            if let Some(v) = max_group_size {
                m.optimizer.max_group_size = v;
            }
            if let Some(v) = score {
                m.score.pi_score_cutoff = v;
            }
            if let Some(v) = ratio {
                m.score.ratio_cutoff = v;
            }
            cmd_markers(&profile, &phenotype, &output, summary.as_deref(), &config)
        }),

        Commands::Deconvolve {
            signature,
            mixture,
            output,
            config,
            json,
            method,
            constraint,
            n_components,
            cv_folds,
            p_value,
            permutations,
            seed,
            norm,
        } => load_config(config.as_deref(), threads).and_then(|mut config| {
            let d = &mut config.deconvolution;
            if let Some(v) = method {
                d.method = v;
            }
            if let Some(v) = constraint {
                d.constraint = v;
            }
            if n_components.is_some() {
                d.n_components = n_components;
            }
            if cv_folds.is_some() {
                d.cv_folds = cv_folds;
            }
            d.p_value |= p_value;
            if let Some(v) = permutations {
                d.n_permutations = v;
            }
            if let Some(v) = seed {
                d.seed = v;
            }
            if norm.is_some() {
                d.normalization = norm;
            }
            cmd_deconvolve(&signature, &mixture, &output, json.as_deref(), &config)
        }),

        Commands::Simulate {
            profile,
            output,
            proportions,
            sizes,
            replicates,
            seed,
        } => load_config(None, threads).and_then(|mut config| {
            let s = &mut config.simulation;
            if sizes.is_some() {
                s.mixture_sizes = sizes;
            }
            if let Some(v) = replicates {
                s.replicates = v;
            }
            if let Some(v) = seed {
                s.seed = v;
            }
            cmd_simulate(&profile, &output, &proportions, &config)
        }),

        Commands::Example { output } => cmd_example(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>, threads: usize) -> Result<RunConfig> {
    let config = match path {
        Some(path) => {
            tracing::info!("Loading configuration from {:?}", path);
            RunConfig::from_file(path)?
        }
        None => RunConfig::default(),
    };
    Ok(config.with_threads(threads))
}

fn cmd_markers(
    profile_path: &Path,
    phenotype_path: &Path,
    output_path: &Path,
    summary_path: Option<&Path>,
    config: &RunConfig,
) -> Result<()> {
    let profile = Profile::from_tsv(profile_path)?;
    let phenotype = Phenotype::from_tsv(phenotype_path)?;
    tracing::info!(
        "Loaded {} regions x {} samples, {} cell types",
        profile.n_regions(),
        profile.n_samples(),
        phenotype.n_groups()
    );

    let run = find_markers(&profile, &phenotype, &config.markers, &TracingReporter)?;
    run.signature.to_tsv(output_path)?;
    if let Some(path) = summary_path {
        std::fs::write(path, run.summary_json()?)?;
    }

    eprintln!(
        "Signature: {} regions x {} cell types (group size {}, {} rows per type at most, condition number {:.3})",
        run.signature.n_regions(),
        run.signature.n_cell_types(),
        run.signature.group_size().unwrap_or_default(),
        run.signature.effective_group_size(),
        run.signature.condition_number()
    );
    Ok(())
}

fn cmd_deconvolve(
    signature_path: &Path,
    mixture_path: &Path,
    output_path: &Path,
    json_path: Option<&Path>,
    config: &RunConfig,
) -> Result<()> {
    let signature = SignatureMatrix::from_tsv(signature_path)?;
    let mixture = Profile::from_tsv(mixture_path)?;

    let results = deconvolve(&signature, &mixture, &config.deconvolution, &TracingReporter)?;
    results.to_tsv(output_path)?;
    if let Some(path) = json_path {
        std::fs::write(path, results.to_json()?)?;
    }

    eprintln!(
        "{} samples deconvolved over {} shared regions with {}",
        results.len(),
        results.n_regions,
        results.method
    );
    Ok(())
}

fn cmd_simulate(profile_path: &Path, output_path: &Path, proportions_path: &Path, config: &RunConfig) -> Result<()> {
    let pure = Profile::from_tsv(profile_path)?;
    let table = random_proportions(pure.sample_ids(), &config.simulation)?;
    let mixture = mix_profiles(&pure, &table)?;
    mixture.to_tsv(output_path)?;
    table.to_tsv(proportions_path)?;

    eprintln!("{} mixtures of {} cell types written", table.n_samples(), pure.n_samples());
    Ok(())
}

fn cmd_example(output_path: &Path) -> Result<()> {
    let config = RunConfig {
        description: Some("Default marker selection and SIMPLS deconvolution".to_string()),
        ..Default::default()
    };
    std::fs::write(output_path, config.to_yaml()?)?;
    eprintln!("Example configuration written to {:?}", output_path);
    Ok(())
}
