//! Landslide susceptibility CLI
//!
//! Subcommands for the full pipeline, factor inspection, model comparison and
//! prediction with a saved model.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::pipeline::{self, PipelineConfig, DEFAULT_CV_FOLDS};
use crate::prediction::PredictionConfig;
use crate::raster::{check_alignment, discover_factors, FactorStore};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn warn(s: &str) -> ColoredString   { s.truecolor(230, 190, 90) }

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "landslide")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Landslide susceptibility mapping from raster factors and inventory points")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a classifier and write the susceptibility map, table and report
    Run(RunArgs),

    /// Print factor metadata and the alignment report
    Inspect {
        /// Factor GeoTIFFs
        factors: Vec<PathBuf>,

        /// Directory to collect .tif files from
        #[arg(long)]
        factor_dir: Option<PathBuf>,
    },

    /// Train every classifier variant and compare test and cross-validated metrics
    Compare {
        #[command(flatten)]
        args: RunArgs,

        /// Cross-validation folds
        #[arg(long, default_value_t = DEFAULT_CV_FOLDS)]
        folds: usize,
    },

    /// Apply a saved model to factor rasters
    Predict {
        /// Saved model file (JSON)
        #[arg(short, long)]
        model: PathBuf,

        /// Factor GeoTIFFs, in the order used for training
        #[arg(required = true)]
        factors: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Prediction worker threads
        #[arg(long)]
        workers: Option<usize>,
    },
}

/// Pipeline inputs; flags override values from `--config`
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Factor GeoTIFFs; the first is the reference grid
    pub factors: Vec<PathBuf>,

    /// Directory to collect factor .tif files from
    #[arg(long)]
    pub factor_dir: Option<PathBuf>,

    /// CSV of landslide locations
    #[arg(short, long)]
    pub positive: Option<PathBuf>,

    /// CSV of non-landslide locations
    #[arg(short, long)]
    pub negative: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Classifier (random_forest, gradient_boosting, svm, logistic_regression, neural_network)
    #[arg(short, long)]
    pub model: Option<String>,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Fraction of samples held out for testing
    #[arg(long)]
    pub test_ratio: Option<f64>,

    /// Fail when factor grids are misaligned
    #[arg(long)]
    pub strict: bool,

    /// Write the fitted model as JSON
    #[arg(long)]
    pub save_model: Option<PathBuf>,

    /// Prediction worker threads
    #[arg(long)]
    pub workers: Option<usize>,

    #[arg(long)]
    pub n_estimators: Option<usize>,

    #[arg(long)]
    pub max_depth: Option<usize>,

    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Inverse regularization strength
    #[arg(long)]
    pub c: Option<f64>,

    /// SVM kernel (rbf, linear, poly, sigmoid)
    #[arg(long)]
    pub kernel: Option<String>,

    /// Hidden layer widths, comma separated
    #[arg(long, value_delimiter = ',')]
    pub hidden_layers: Option<Vec<usize>>,
}

impl RunArgs {
    /// Merge the config file (if any) with command-line overrides
    pub fn resolve(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(dir) = &self.factor_dir {
            config.factors = discover_factors(dir)?;
        }
        if !self.factors.is_empty() {
            config.factors = self.factors.clone();
        }
        if let Some(p) = &self.positive {
            config.positive_points = p.clone();
        }
        if let Some(n) = &self.negative {
            config.negative_points = n.clone();
        }
        if let Some(o) = &self.output {
            config.output_dir = o.clone();
        }
        if let Some(m) = &self.model {
            config.model = m.clone();
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(ratio) = self.test_ratio {
            config.test_ratio = ratio;
        }
        if self.strict {
            config.strict_alignment = true;
        }
        if let Some(path) = &self.save_model {
            config.save_model = Some(path.clone());
        }
        if let Some(w) = self.workers {
            config.n_workers = Some(w);
        }

        let hp = &mut config.hyperparameters;
        if self.n_estimators.is_some() {
            hp.n_estimators = self.n_estimators;
        }
        if self.max_depth.is_some() {
            hp.max_depth = self.max_depth;
        }
        if self.learning_rate.is_some() {
            hp.learning_rate = self.learning_rate;
        }
        if self.c.is_some() {
            hp.c = self.c;
        }
        if self.kernel.is_some() {
            hp.kernel = self.kernel.clone();
        }
        if self.hidden_layers.is_some() {
            hp.hidden_layer_sizes = self.hidden_layers.clone();
        }

        if config.positive_points.as_os_str().is_empty() || config.negative_points.as_os_str().is_empty() {
            anyhow::bail!("Both --positive and --negative point files are required");
        }
        config.validate()?;
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(args: &RunArgs) -> anyhow::Result<()> {
    section("Run");
    let config = args.resolve()?;

    kv("Model", &config.classifier_kind()?.display_name().to_string());
    kv("Factors", &config.factors.len().to_string());
    kv("Seed", &config.seed.to_string());
    kv("Test ratio", &format!("{:.2}", config.test_ratio));
    println!();

    step_run("Running pipeline");
    let start = Instant::now();
    let outcome = pipeline::run(&config)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    let test = &outcome.evaluation.test;
    section("Evaluation (test partition)");
    kv("Training samples", &outcome.n_train.to_string());
    kv("Test samples", &outcome.n_test.to_string());
    if outcome.dropped > 0 {
        kv("Dropped samples", &outcome.dropped.to_string().yellow().to_string());
    }
    kv("Accuracy", &format!("{:.4}", test.accuracy));
    kv("Precision", &format!("{:.4}", test.precision));
    kv("Recall", &format!("{:.4}", test.recall));
    kv("F1 score", &format!("{:.4}", test.f1));
    kv("AUC", &format!("{:.4}", test.auc));
    let gap = outcome.evaluation.overfitting_gap();
    let gap_text = format!("{:.4}", gap);
    kv("Overfitting gap", &if gap > 0.1 { warn(&gap_text).to_string() } else { gap_text });

    section("Outputs");
    let (rows, cols) = outcome.raster_shape;
    kv("Raster", &format!("{} ({} × {}, {} valid cells)", outcome.paths.raster.display(), rows, cols, outcome.valid_cells));
    kv("Table", &outcome.paths.table.display().to_string());
    kv("Report", &outcome.paths.report.display().to_string());
    if let Some(path) = &outcome.saved_model {
        kv("Model", &path.display().to_string());
    }
    println!();
    step_ok("Susceptibility map written");
    println!();
    Ok(())
}

pub fn cmd_inspect(factors: &[PathBuf], factor_dir: Option<&Path>) -> anyhow::Result<()> {
    section("Factors");

    let mut paths = match factor_dir {
        Some(dir) => discover_factors(dir)?,
        None => Vec::new(),
    };
    paths.extend(factors.iter().cloned());
    if paths.is_empty() {
        anyhow::bail!("No factor rasters given");
    }

    let store = FactorStore::load(&paths)?;

    println!(
        "  {:<16} {:>11} {:>10} {:>10} {:<11} {:>10} {:>8}",
        muted("Factor"), muted("Shape"), muted("Res X"), muted("Res Y"), muted("CRS"), muted("No-data"), muted("Missing")
    );
    println!("  {}", dim(&"─".repeat(84)));

    for factor in store.factors() {
        let (rows, cols) = factor.shape();
        let missing = factor.data().iter().filter(|v| factor.is_missing(**v)).count();
        println!(
            "  {:<16} {:>11} {:>10.3} {:>10.3} {:<11} {:>10} {:>8}",
            factor.name(),
            format!("{}×{}", rows, cols),
            factor.transform().resolution_x(),
            factor.transform().resolution_y(),
            factor.crs().map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()),
            factor.nodata().map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()),
            missing
        );
    }

    let bounds = store.reference().bounds();
    println!();
    kv(
        "Reference extent",
        &format!("[{:.3}, {:.3}] × [{:.3}, {:.3}]", bounds.left, bounds.right, bounds.bottom, bounds.top),
    );

    section("Alignment");
    let report = check_alignment(store.factors());
    if report.is_aligned() {
        step_ok(&format!("All factors match {}", report.reference));
    } else {
        for (name, issues) in &report.mismatches {
            for issue in issues {
                tracing::warn!(factor = %name, reference = %report.reference, issue = %issue, "Factor misaligned with reference");
                println!("  {} {} {}", warn("!"), name.white(), muted(&issue.to_string()));
            }
        }
    }
    println!();
    Ok(())
}

pub fn cmd_compare(args: &RunArgs, folds: usize) -> anyhow::Result<()> {
    section("Compare");
    let config = args.resolve()?;

    step_run("Training every classifier");
    let start = Instant::now();
    let results = pipeline::compare(&config, folds)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    println!();
    println!(
        "  {:<24} {:>9} {:>9} {:>9} {:>14} {:>9}",
        muted("Model"), muted("Accuracy"), muted("F1"), muted("AUC"), muted("CV AUC"), muted("Time")
    );
    println!("  {}", dim(&"─".repeat(80)));

    for r in &results {
        let cv = match &r.cross_validation {
            Some(cv) => format!("{:.4} ± {:.3}", cv.auc.mean_score, cv.auc.std_score),
            None => "-".to_string(),
        };
        println!(
            "  {:<24} {:>9.4} {:>9.4} {:>9.4} {:>14} {:>8.2}s",
            r.kind.display_name(),
            r.test.accuracy,
            r.test.f1,
            r.test.auc,
            cv,
            r.training_time_secs
        );
    }
    println!("  {}", dim(&"─".repeat(80)));

    let score = |r: &pipeline::ModelComparison| r.cross_validation.as_ref().map_or(r.test.auc, |cv| cv.auc.mean_score);
    if let Some(best) = results.iter().max_by(|a, b| score(a).total_cmp(&score(b))) {
        println!();
        println!(
            "  {} {} {} {:.4}",
            ok("best"),
            best.kind.display_name().white().bold(),
            muted("AUC:"),
            score(best)
        );
    }
    println!();
    Ok(())
}

pub fn cmd_predict(
    model: &Path,
    factors: &[PathBuf],
    output: &Path,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    section("Predict");

    let config = PredictionConfig { n_workers: workers };
    step_run("Scoring factor grid");
    let start = Instant::now();
    let paths = pipeline::predict_with_saved(model, factors, output, config)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    kv("Raster", &paths.raster.display().to_string());
    kv("Table", &paths.table.display().to_string());
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::ClassifierKind;
    use clap::CommandFactory;
    use tempfile::tempdir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "landslide", "run", "slope.tif", "rain.tif",
            "-p", "pos.csv", "-n", "neg.csv",
            "--model", "svm", "--kernel", "linear", "--hidden-layers", "16,8",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.factors, vec![PathBuf::from("slope.tif"), PathBuf::from("rain.tif")]);
        assert_eq!(config.classifier_kind().unwrap(), ClassifierKind::Svm);
        assert_eq!(config.hyperparameters.kernel.as_deref(), Some("linear"));
        assert_eq!(config.hyperparameters.hidden_layer_sizes, Some(vec![16, 8]));
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        PipelineConfig::new(vec!["a.tif".into()], "p.csv", "n.csv")
            .with_model("gbt")
            .with_seed(1)
            .save(&path)
            .unwrap();

        let args = RunArgs {
            config: Some(path),
            seed: Some(9),
            strict: true,
            ..Default::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.classifier_kind().unwrap(), ClassifierKind::GradientBoosting);
        assert_eq!(config.seed, 9);
        assert!(config.strict_alignment);
        assert_eq!(config.factors, vec![PathBuf::from("a.tif")]);
    }

    #[test]
    fn test_missing_points_rejected() {
        let args = RunArgs {
            factors: vec!["a.tif".into()],
            ..Default::default()
        };
        assert!(args.resolve().is_err());
    }
}
