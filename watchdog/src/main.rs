//! Watchdog CLI
//!
//! Usage:
//!   watchdog decode    --archive pass1.jsonl --archive pass2.jsonl --output records.csv
//!   watchdog train     --input records.csv --models models/
//!   watchdog score     --archive live.jsonl --models models/ --output reports.jsonl
//!   watchdog benchmark --input held_out.csv --models models/ --faults faults.json

use anomaly_scorer::{select_features, ArtifactStore, Detector, ModelArtifact};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use fault_injector::{evaluate, BenchmarkReport, FaultInjector, FaultSpec, DEFAULT_SEED};
use golden_features::rows::{read_records, RowWriter};
use golden_features::CanonicalRecord;
use link_layer::Identity;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use watchdog::{build_pipeline, load_archive, run_streams, serve_status, Outcome, StatusState, WatchdogConfig};

#[derive(Parser, Debug)]
#[command(name = "watchdog", version, about = "Satellite telemetry anomaly watchdog")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode frame archives into canonical CSV rows
    Decode(DecodeArgs),
    /// Train one model per satellite from canonical rows
    Train(TrainArgs),
    /// Score frame archives against trained models
    Score(ScoreArgs),
    /// Measure detector recall against injected faults
    Benchmark(BenchmarkArgs),
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Frame archive (JSON lines); repeatable
    #[arg(short, long, required = true)]
    archive: Vec<PathBuf>,

    /// Output CSV
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Canonical rows CSV
    #[arg(short, long)]
    input: PathBuf,

    /// Artifact directory
    #[arg(short, long, default_value = "models")]
    models: PathBuf,
}

#[derive(Args, Debug)]
struct ScoreArgs {
    /// Frame archive, one stream each; repeatable
    #[arg(short, long, required = true)]
    archive: Vec<PathBuf>,

    /// Artifact directory
    #[arg(short, long, default_value = "models")]
    models: PathBuf,

    /// Report output (JSON lines); stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep the status API up after all streams finish, until Ctrl-C
    #[arg(long)]
    linger: bool,
}

#[derive(Args, Debug)]
struct BenchmarkArgs {
    /// Clean held-out rows CSV
    #[arg(short, long)]
    input: PathBuf,

    /// Artifact directory
    #[arg(short, long, default_value = "models")]
    models: PathBuf,

    /// JSON array of fault specifications
    #[arg(short, long)]
    faults: PathBuf,

    /// Score thresholds to evaluate; the model default when omitted
    #[arg(short, long)]
    threshold: Vec<f64>,

    /// Noise seed
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Also write the full results as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "watchdog=debug,debug" } else { "watchdog=info,info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => WatchdogConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => WatchdogConfig::default(),
    }
    .with_env()?;

    match cli.command {
        Command::Decode(args) => decode(&config, args),
        Command::Train(args) => train_models(&config, args),
        Command::Score(args) => score(&config, args).await,
        Command::Benchmark(args) => benchmark(&config, args),
    }
}

fn decode(config: &WatchdogConfig, args: DecodeArgs) -> Result<()> {
    let pipeline = build_pipeline(config, Default::default())?;
    let mut writer = RowWriter::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let mut written = 0;
    for path in &args.archive {
        let archive = load_archive(path).with_context(|| format!("reading {}", path.display()))?;
        for frame in &archive.frames {
            if let Outcome::Processed { record, .. } = pipeline.process(frame) {
                writer.write(&record)?;
                written += 1;
            }
        }
    }
    writer.flush()?;

    let snapshot = pipeline.counters().snapshot();
    info!(
        records = written,
        dropped = snapshot.total_dropped(),
        output = %args.output.display(),
        "decode complete"
    );
    for (reason, count) in snapshot.dropped.iter().filter(|(_, c)| **c > 0) {
        info!("  {:?}: {}", reason, count);
    }
    Ok(())
}

fn group_by_identity(records: Vec<CanonicalRecord>) -> BTreeMap<Identity, Vec<CanonicalRecord>> {
    let mut groups: BTreeMap<Identity, Vec<CanonicalRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.identity).or_default().push(record);
    }
    groups
}

fn train_models(config: &WatchdogConfig, args: TrainArgs) -> Result<()> {
    let registry = telemetry_decoders::default_registry(&config.calibration)?;
    let records = read_records(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let store = ArtifactStore::new(&args.models);

    for (identity, records) in group_by_identity(records) {
        let Some(entry) = registry.resolve(&identity) else {
            warn!(%identity, records = records.len(), "no decoder registered, skipping");
            continue;
        };

        let features = select_features(entry.features(), &records, config.trainer.min_std);
        let mut detector = Detector::new(identity);
        detector
            .train(&features, &records, &config.trainer)
            .with_context(|| format!("training model for {}", identity))?;
        let Some(artifact) = detector.artifact() else {
            continue;
        };
        let path = store.save(artifact)?;
        info!(
            %identity,
            features = artifact.features.len(),
            records = artifact.training_records,
            threshold = artifact.baseline.threshold,
            path = %path.display(),
            "model saved"
        );
    }
    Ok(())
}

async fn score(config: &WatchdogConfig, args: ScoreArgs) -> Result<()> {
    let bank = ArtifactStore::new(&args.models)
        .load_all()
        .with_context(|| format!("loading models from {}", args.models.display()))?;
    if bank.is_empty() {
        warn!(dir = %args.models.display(), "no models loaded, nothing will be scored");
    }
    let pipeline = Arc::new(build_pipeline(config, bank)?);

    let status = config.status_port.map(|port| {
        let state = StatusState::from_pipeline(&pipeline);
        tokio::spawn(async move {
            if let Err(e) = serve_status(port, state).await {
                warn!(port, error = %e, "status API stopped");
            }
        })
    });

    let mut streams = Vec::with_capacity(args.archive.len());
    for path in &args.archive {
        let archive = load_archive(path).with_context(|| format!("reading {}", path.display()))?;
        streams.push(archive.frames);
    }

    let sink: Box<dyn Write + Send> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout()),
    };

    let summary = run_streams(Arc::clone(&pipeline), streams, sink).await?;
    let snapshot = pipeline.counters().snapshot();
    info!(
        streams = summary.streams,
        frames = summary.frames,
        reports = summary.reports,
        anomalies = summary.anomalies,
        dropped = snapshot.total_dropped(),
        "scoring complete"
    );

    if let Some(handle) = status {
        if args.linger {
            info!("status API still serving, Ctrl-C to exit");
            tokio::signal::ctrl_c().await?;
        }
        handle.abort();
    }
    Ok(())
}

fn benchmark(config: &WatchdogConfig, args: BenchmarkArgs) -> Result<()> {
    let registry = telemetry_decoders::default_registry(&config.calibration)?;
    let store = ArtifactStore::new(&args.models);
    let records = read_records(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let faults: Vec<FaultSpec> = serde_json::from_reader(BufReader::new(
        File::open(&args.faults).with_context(|| format!("opening {}", args.faults.display()))?,
    ))
    .with_context(|| format!("parsing {}", args.faults.display()))?;
    if faults.is_empty() {
        bail!("{} contains no fault specifications", args.faults.display());
    }

    let mut results: Vec<(Identity, BenchmarkReport)> = Vec::new();
    for (identity, batch) in group_by_identity(records) {
        let Some(entry) = registry.resolve(&identity) else {
            warn!(%identity, "no decoder registered, skipping");
            continue;
        };
        let artifact: ModelArtifact = store
            .load(&identity)
            .with_context(|| format!("loading model for {}", identity))?;

        let injector = FaultInjector::new(entry.features()).with_seed(args.seed);
        for fault in &faults {
            let labeled = injector
                .inject(&batch, fault)
                .with_context(|| format!("injecting {} into {}", fault, identity))?;
            let report = evaluate(&artifact, &fault.to_string(), &labeled, &args.threshold)?;
            results.push((identity, report));
        }
    }

    print_table(&results);

    if let Some(path) = &args.output {
        let rows: Vec<serde_json::Value> = results
            .iter()
            .map(|(identity, report)| serde_json::json!({"identity": identity, "report": report}))
            .collect();
        let writer = BufWriter::new(File::create(path).with_context(|| format!("creating {}", path.display()))?);
        serde_json::to_writer_pretty(writer, &rows)?;
        info!(path = %path.display(), "benchmark results written");
    }
    Ok(())
}

fn fmt_ratio(r: Option<f64>) -> String {
    r.map(|v| format!("{:.3}", v)).unwrap_or_else(|| "-".to_string())
}

fn print_table(results: &[(Identity, BenchmarkReport)]) {
    println!(
        "{:<10} {:<36} {:>12} {:>5} {:>5} {:>5} {:>5} {:>7} {:>7}",
        "identity", "fault", "threshold", "tp", "fp", "tn", "fn", "recall", "fpr"
    );
    for (identity, report) in results {
        for r in &report.results {
            println!(
                "{:<10} {:<36} {:>12.6} {:>5} {:>5} {:>5} {:>5} {:>7} {:>7}",
                identity.to_string(),
                report.fault,
                r.threshold,
                r.true_positives,
                r.false_positives,
                r.true_negatives,
                r.false_negatives,
                fmt_ratio(r.recall),
                fmt_ratio(r.false_positive_rate),
            );
        }
    }
}
