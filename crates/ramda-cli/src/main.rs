// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::path::PathBuf;
use std::sync::Arc;

use agent::{DispatchFailure, DispatchOutcome, Dispatcher, ResultSink};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use config::RamdaConfig;
use model_runtime::BackendRegistry;
use protocol::BackendFamily;
use serde::Serialize;
use telemetry::{FixedTelemetry, SystemTelemetry, TelemetrySource};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ramda", version, about = "resource-aware model dispatch for edge classification")]
struct Cli {
    /// optional path to a config file (applies to all subcommands)
    #[arg(long, global = true)]
    config: Option<String>,

    /// log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// classify one image with the model tier the current load allows
    Run(RunOpts),

    /// show which model tier would be chosen, without running it
    Select(SelectOpts),

    /// print one telemetry snapshot
    Telemetry,

    /// print the most recently persisted dispatch record
    Last,

    /// load every artifact of a backend family and run a blank input through it
    Probe(ProbeOpts),
}

#[derive(Parser, Debug)]
struct RunOpts {
    /// image to classify
    #[arg(long)]
    image: PathBuf,

    /// runtime family: onnx or openvino
    #[arg(long, default_value = "onnx")]
    backend: BackendFamily,

    /// retry once on the other family if this one is unavailable
    #[arg(long)]
    fallback: bool,

    /// print the record without writing the outputs directory
    #[arg(long)]
    no_persist: bool,
}

#[derive(Parser, Debug)]
struct SelectOpts {
    #[arg(long, default_value = "onnx")]
    backend: BackendFamily,

    /// pretend cpu utilisation (percent) instead of sampling the host
    #[arg(long, requires = "ram")]
    cpu: Option<f64>,

    /// pretend available memory (MB) instead of sampling the host
    #[arg(long, requires = "cpu")]
    ram: Option<f64>,
}

#[derive(Parser, Debug)]
struct ProbeOpts {
    #[arg(long, default_value = "onnx")]
    backend: BackendFamily,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        util::logging::init_tracing_with("debug");
    } else {
        util::logging::init_tracing();
    }

    let config = config::load_or_default(cli.config.as_deref())?;
    info!("starting ramda: {:?}", cli.command);

    match cli.command {
        Commands::Run(opts) => run(config, opts).await?,
        Commands::Select(opts) => select(config, opts).await?,
        Commands::Telemetry => {
            let source = agent::system_telemetry(&config);
            let snapshot = tokio::task::spawn_blocking(move || source.snapshot())
                .await
                .context("telemetry worker panicked")?;
            print_json(&snapshot)?;
        }
        Commands::Last => match ResultSink::from_config(&config.output)?.latest()? {
            Some(record) => print_json(&record)?,
            None => bail!("no dispatch result saved in {} yet", config.output.dir.display()),
        },
        Commands::Probe(opts) => probe(config, opts)?,
    }

    Ok(())
}

async fn run(config: RamdaConfig, opts: RunOpts) -> Result<()> {
    let labels = Arc::new(
        agent::load_labels(&config)
            .await
            .context("failed to load class labels")?,
    );
    let dispatcher = Arc::new(agent::build_dispatcher(&config, labels));

    let outcome = match dispatch(dispatcher.clone(), opts.image.clone(), opts.backend).await? {
        Ok(outcome) => outcome,
        Err(failure) if opts.fallback && failure.is_backend_unavailable() => {
            let other = opts.backend.other();
            warn!("{}; falling back to {}", failure, other);
            dispatch(dispatcher, opts.image, other).await??
        }
        Err(failure) => return Err(failure.into()),
    };

    let record = outcome.record();
    if !opts.no_persist {
        ResultSink::from_config(&config.output)?.persist(&record)?;
    }
    print_json(&record)
}

/// one dispatch on a blocking worker; the outer error is the worker itself.
async fn dispatch(
    dispatcher: Arc<Dispatcher<SystemTelemetry>>,
    image: PathBuf,
    family: BackendFamily,
) -> Result<Result<DispatchOutcome, DispatchFailure>> {
    tokio::task::spawn_blocking(move || dispatcher.dispatch(&image, family))
        .await
        .context("dispatch worker panicked")
}

async fn select(config: RamdaConfig, opts: SelectOpts) -> Result<()> {
    let policy = agent::selection_policy(&config);
    let snapshot = match (opts.cpu, opts.ram) {
        (Some(cpu), Some(ram)) => FixedTelemetry::new(cpu, ram).snapshot(),
        _ => {
            let source = agent::system_telemetry(&config);
            tokio::task::spawn_blocking(move || source.snapshot())
                .await
                .context("telemetry worker panicked")?
        }
    };
    print_json(&policy.select(snapshot, opts.backend))
}

fn probe(config: RamdaConfig, opts: ProbeOpts) -> Result<()> {
    let reports = agent::probe(
        &BackendRegistry::with_defaults(),
        &config.artifact_table(),
        opts.backend,
    );
    print_json(&reports)?;

    let failed = reports.iter().filter(|r| !r.is_ok()).count();
    if failed > 0 {
        bail!("{failed} of {} {} artifacts failed to probe", reports.len(), opts.backend);
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialise output")?;
    println!("{json}");
    Ok(())
}
