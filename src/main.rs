//! CLI: stdin JSON -> stdout JSON over one in-process model slot.
//!
//! Usage:
//!   echo '{"couponValue": 5, "acctAgeHours": 100}' | coupon-anomaly score
//!   echo '{"legit": [{"acctAgeHours": 90, "value": 4}]}' | coupon-anomaly train
//!   coupon-anomaly stdio    # one {"op": "score" | "train" | "health" | "version", ...} per line
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coupon_anomaly::{AnomalyService, Operation, ScoreRequest, Settings, TrainRequest};
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "coupon-anomaly")]
#[command(version)]
#[command(about = "Score coupon redemptions for abuse with an isolation forest", long_about = None)]
struct Args {
    /// JSON settings file; missing keys keep their defaults
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Model artifact path (overrides config and COUPON_ML_MODEL_PATH)
    #[arg(long, value_name = "FILE")]
    model_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score one request read from stdin
    Score,
    /// Retrain from a {"legit": [...], "abuse": [...]} request read from stdin
    Train,
    /// Load the persisted model or initialize a new one
    Init,
    /// Print the health probe
    Health,
    /// Print the fixed configuration
    Version,
    /// Serve newline-delimited operations from stdin until EOF
    Stdio,
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries responses only.
    // Set RUST_LOG to override (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let settings = load_settings(&args)?;
    let service = AnomalyService::new(settings).context("invalid settings")?;

    match args.command {
        Command::Score => {
            let input = read_stdin()?;
            let value = serde_json::from_str::<Value>(&input).unwrap_or_else(|err| {
                warn!(error = %err, "unparsable score request, scoring defaults");
                Value::Null
            });
            let resp = service.score(&ScoreRequest::from_value(value))?;
            print_json(&serde_json::to_value(resp)?)?;
        }
        Command::Train => {
            let input = read_stdin()?;
            let req: TrainRequest =
                serde_json::from_str(&input).context("failed to parse train request")?;
            print_json(&serde_json::to_value(service.train(&req)?)?)?;
        }
        Command::Init => {
            service.manager().load_or_init()?;
            print_json(&json!({ "ok": true }))?;
        }
        Command::Health => print_json(&serde_json::to_value(service.health())?)?,
        Command::Version => print_json(&serde_json::to_value(service.version())?)?,
        Command::Stdio => serve_stdio(&service)?,
    }
    Ok(())
}

fn load_settings(args: &Args) -> Result<Settings> {
    let settings = match &args.config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Settings::default(),
    };
    let mut settings = settings.with_env()?;
    if let Some(path) = &args.model_path {
        settings.model_path.clone_from(path);
    }
    Ok(settings)
}

fn serve_stdio(service: &AnomalyService) -> Result<()> {
    info!(model_path = %service.settings().model_path.display(), "serving stdio");
    serve_lines(service, io::stdin().lock(), io::stdout().lock())
}

/// Answers each non-blank input line with one JSON line. A line that fails
/// to parse or to run yields `{"ok": false, "error": ...}` and serving continues.
fn serve_lines(service: &AnomalyService, input: impl BufRead, mut output: impl Write) -> Result<()> {
    for line in input.lines() {
        let line = line.context("failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        let response = serde_json::from_str::<Operation>(&line)
            .map_err(|e| format!("invalid request: {e}"))
            .and_then(|op| service.dispatch(&op).map_err(|e| e.to_string()))
            .unwrap_or_else(|error| {
                warn!(%error, "request failed");
                json!({ "ok": false, "error": error })
            });
        writeln!(output, "{response}")?;
        output.flush()?;
    }
    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("failed to read stdin")?;
    Ok(input)
}

fn print_json(value: &Value) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdio_answers_every_line_and_keeps_going() {
        let dir = tempfile::tempdir().unwrap();
        let service = AnomalyService::new(Settings {
            model_path: dir.path().join("model.bin"),
            if_trees: 20,
            ..Settings::default()
        })
        .unwrap();

        let input = concat!(
            "{\"op\":\"health\"}\n",
            "not json\n",
            "\n",
            "{\"op\":\"score\",\"X\":[5,100,1,0]}\n",
            "{\"op\":\"train\",\"legit\":[1]}\n",
        );
        let mut output = Vec::new();
        serve_lines(&service, input.as_bytes(), &mut output).unwrap();

        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 4);

        assert_eq!(responses[0], json!({"ok": true}));

        assert_eq!(responses[1]["ok"], json!(false));
        assert!(responses[1]["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid request"));

        let score = responses[2]["score"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&score));
        assert_eq!(responses[2]["top"][0], json!("acctAgeHours"));

        assert_eq!(responses[3]["ok"], json!(false));
        assert!(responses[3]["error"].as_str().is_some());
        assert!(!dir.path().join("model.bin.tmp").exists());
    }
}
