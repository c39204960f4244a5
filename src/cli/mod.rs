//! Vintner CLI Module
//!
//! Command-line interface for training, serving and one-off predictions.

use clap::{Parser, Subcommand};
use colored::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::export::ArtifactStore;
use crate::inference::Predictor;
use crate::pipeline::TrainingPipeline;
use crate::server::{run_server, ServerConfig};
use crate::training::TrainingConfig;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn bad(s: &str) -> ColoredString    { s.truecolor(230, 110, 110) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    println!("  {} {}...", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("  {} {}", ok("✓"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "vintner")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Wine quality model selection, tuning and serving")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Select, tune and save the best classifier
    Train {
        /// JSON configuration file; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory holding the red and white wine tables
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Directory the artifact bundle is written to
        #[arg(short, long)]
        models_dir: Option<PathBuf>,

        /// Cross-validation folds
        #[arg(long)]
        cv_folds: Option<usize>,

        /// Parameter combinations drawn by the search
        #[arg(long)]
        n_iter: Option<usize>,

        /// Random seed
        #[arg(long)]
        random_state: Option<u64>,

        /// Worker threads
        #[arg(long)]
        n_jobs: Option<usize>,

        /// Keep the selected candidate's parameters
        #[arg(long)]
        skip_tuning: bool,
    },

    /// Start the prediction server
    Serve {
        /// Server host
        #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Server port
        #[arg(short, long, env = "API_PORT", default_value = "5000")]
        port: u16,

        /// Directory holding the artifact bundle
        #[arg(short, long, env = "MODELS_DIR", default_value = "./models")]
        models_dir: PathBuf,
    },

    /// Predict from a JSON file or inline JSON
    Predict {
        /// A sample object, a list of samples, or `{"samples": [...]}`
        input: String,

        /// Directory holding the artifact bundle
        #[arg(short, long, env = "MODELS_DIR", default_value = "./models")]
        models_dir: PathBuf,

        /// Write the JSON response here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the saved model's metadata
    Info {
        /// Directory holding the artifact bundle
        #[arg(short, long, env = "MODELS_DIR", default_value = "./models")]
        models_dir: PathBuf,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Overrides applied on top of the file or environment configuration
#[derive(Debug, Default)]
pub struct TrainOverrides {
    pub data_dir: Option<PathBuf>,
    pub models_dir: Option<PathBuf>,
    pub cv_folds: Option<usize>,
    pub n_iter: Option<usize>,
    pub random_state: Option<u64>,
    pub n_jobs: Option<usize>,
    pub skip_tuning: bool,
}

/// Resolve the training configuration: file or environment, then flags
pub fn resolve_training_config(file: Option<&Path>, overrides: TrainOverrides) -> anyhow::Result<TrainingConfig> {
    let mut config = match file {
        Some(path) => TrainingConfig::from_json_file(path)?,
        None => TrainingConfig::from_env(),
    };
    if let Some(dir) = overrides.data_dir {
        config = config.with_data_dir(dir);
    }
    if let Some(dir) = overrides.models_dir {
        config = config.with_models_dir(dir);
    }
    if let Some(folds) = overrides.cv_folds {
        config = config.with_cv(folds);
    }
    if let Some(n) = overrides.n_iter {
        config = config.with_n_iter(n);
    }
    if let Some(seed) = overrides.random_state {
        config = config.with_random_state(seed);
    }
    if let Some(n) = overrides.n_jobs {
        config = config.with_n_jobs(n);
    }
    if overrides.skip_tuning {
        config = config.with_skip_tuning(true);
    }
    config.validate()?;
    Ok(config)
}

pub fn cmd_train(config: TrainingConfig) -> anyhow::Result<()> {
    section("Train");
    println!("  {:<16} {}", muted("Data"), config.data_dir.display().to_string().white());
    println!("  {:<16} {}", muted("Models"), config.models_dir.display().to_string().white());
    println!();

    step_run("Selecting, tuning and evaluating");
    let start = Instant::now();
    let (summary, paths) = TrainingPipeline::new(config).run()?;
    step_done(&format!("{:.1?}", start.elapsed()));

    section("Candidates");
    println!(
        "  {:<20} {:>10} {:>10} {:>14}",
        muted("model"),
        muted("train"),
        muted("val"),
        muted("cv")
    );
    for c in &summary.candidates {
        let name = if c.algorithm == summary.model_type {
            c.algorithm.as_str().green().bold()
        } else {
            c.algorithm.as_str().white()
        };
        println!(
            "  {:<20} {:>10.4} {:>10.4} {:>8.4}±{:.3}",
            name, c.metrics.train_accuracy, c.metrics.validation_accuracy, c.metrics.cv_mean, c.metrics.cv_std
        );
    }
    for failure in &summary.failures {
        println!("  {} {}", bad("✗"), failure);
    }
    for skipped in &summary.skipped {
        println!("  {} {} {}", dim("-"), skipped, dim("(unavailable)"));
    }

    section("Result");
    println!("  {:<16} {}", muted("Model"), summary.model_type.white().bold());
    println!("  {:<16} {}", muted("Params"), summary.params.to_string().white());
    if let Some(cv) = summary.cv_score {
        println!("  {:<16} {}", muted("Tuned CV"), format!("{:.4}", cv).white());
    }
    println!("  {:<16} {}", muted("Test accuracy"), format!("{:.4}", summary.evaluation.accuracy).white().bold());
    println!("  {:<16} {}", muted("ROC-AUC"), format!("{:.4}", summary.evaluation.roc_auc).white());
    println!("  {:<16} {}", muted("Artifacts"), paths.model.parent().unwrap_or(&paths.model).display().to_string().white());
    println!();
    Ok(())
}

/// Parse the predict argument as a path to a JSON file or as inline JSON
pub fn read_input(input: &str) -> anyhow::Result<Value> {
    let path = Path::new(input);
    let text = if path.is_file() {
        std::fs::read_to_string(path)?
    } else {
        input.to_string()
    };
    Ok(serde_json::from_str(&text)?)
}

pub fn cmd_predict(input: &str, models_dir: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let predictor = Predictor::load(&ArtifactStore::new(models_dir))?;
    let request = read_input(input)?;

    let response = match &request {
        Value::Object(obj) => match obj.get("samples") {
            Some(Value::Array(samples)) => serde_json::to_value(predictor.predict_batch(samples))?,
            Some(_) => anyhow::bail!("samples must be a list"),
            None => serde_json::to_value(predictor.predict_one(obj)?)?,
        },
        Value::Array(samples) => serde_json::to_value(predictor.predict_batch(samples))?,
        _ => anyhow::bail!("input must be a JSON object or a list of objects"),
    };

    let rendered = serde_json::to_string_pretty(&response)?;
    match output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            step_done(&format!("wrote {}", path.display()));
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

pub fn cmd_info(models_dir: &Path) -> anyhow::Result<()> {
    let meta = ArtifactStore::new(models_dir).load_metadata()?;

    section("Model");
    println!("  {:<20} {}", muted("Type"), meta.model_type.white().bold());
    println!("  {:<20} {}", muted("Trained"), meta.training_date.white());
    println!("  {:<20} {}", muted("Version"), meta.version.as_deref().unwrap_or("unversioned").white());
    println!("  {:<20} {}", muted("Classes"), format!("{:?}", meta.classes).white());
    println!("  {:<20} {}", muted("Training rows"), meta.training_size.to_string().white());
    println!("  {:<20} {}", muted("Data shape"), format!("{:?}", meta.data_shape).white());
    println!("  {:<20} {}", muted("Validation accuracy"), format!("{:.4}", meta.validation_accuracy).white());
    println!("  {:<20} {}", muted("Test accuracy"), format!("{:.4}", meta.test_accuracy).white());
    let auc = meta.roc_auc.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v));
    println!("  {:<20} {}", muted("ROC-AUC"), auc.white());

    if let Some(importance) = &meta.feature_importance {
        section("Feature importance");
        let mut ranked: Vec<(&String, &f64)> = importance.iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(a.1));
        for (name, value) in ranked {
            let bar = "█".repeat((value * 40.0).round().clamp(0.0, 40.0) as usize);
            println!("  {:<22} {:>6.3} {}", muted(name), value, accent(&bar));
        }
    }
    println!();
    Ok(())
}

pub async fn cmd_serve(config: ServerConfig) -> anyhow::Result<()> {
    let host = config.host.clone();
    let port = config.port;

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Vintner".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("API    ", &format!("http://{}:{}/api", host, port)));
    line_box(&kv("Health ", &format!("http://{}:{}/api/health", host, port)));
    line_box(&kv("Models ", &config.models_dir.display().to_string()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    run_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_train_flags() {
        let cli = Cli::try_parse_from(["vintner", "train", "--n-iter", "5", "--skip-tuning"]).unwrap();
        match cli.command {
            Commands::Train { n_iter, skip_tuning, .. } => {
                assert_eq!(n_iter, Some(5));
                assert!(skip_tuning);
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.json");
        std::fs::write(&path, r#"{"n_iter": 7, "cv_folds": 4}"#).unwrap();

        let config = resolve_training_config(
            Some(&path),
            TrainOverrides {
                n_iter: Some(2),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(config.n_iter, 2);
        assert_eq!(config.cv_folds, 4);
    }

    #[test]
    fn test_read_inline_input() {
        let value = read_input(r#"{"alcohol": 9.5}"#).unwrap();
        assert_eq!(value["alcohol"], 9.5);
        assert!(read_input("not json").is_err());
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1mbold\x1b[0m"), "bold");
    }
}
