use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Args, Commands};
use qexpand::clarity::clarity_score;
use qexpand::config::{QexpandConfig, ResolvedConfig};
use qexpand::engine::{Engine, OverlapMethod, StopReason};
use qexpand::frontier::SelectionStrategy;
use qexpand::recall::evaluate_directories;
use qexpand::similarity::content_kernel;
use qexpand::source::{CandidateSource, CredentialRing, FetchStatus, Paced, ReplaySource};
use qexpand::store::CheckpointStore;

struct ExpandParams {
    seed: String,
    iterations: Option<usize>,
    rate: Option<u32>,
    method: Option<OverlapMethod>,
    factor: Option<f64>,
    threshold: Option<f64>,
    selection: Option<SelectionStrategy>,
    shuffle_seed: Option<u64>,
    source: PathBuf,
    data_dir: Option<PathBuf>,
    fresh: bool,
}

fn handle_expand(config: &ResolvedConfig, params: ExpandParams) -> Result<()> {
    let mut engine_config = config.to_engine_config();
    if let Some(iterations) = params.iterations {
        engine_config.iteration_limit = iterations;
    }
    if let Some(method) = params.method {
        engine_config.method = method;
    }
    if let Some(factor) = params.factor {
        engine_config.selection_factor = factor;
    }
    if let Some(threshold) = params.threshold {
        engine_config.threshold = threshold;
    }
    if let Some(selection) = params.selection {
        engine_config.selection = selection;
    }
    if params.shuffle_seed.is_some() {
        engine_config.shuffle_seed = params.shuffle_seed;
    }
    let rate = params.rate.unwrap_or(config.source.requests_per_hour);
    let data_dir = params
        .data_dir
        .unwrap_or_else(|| config.defaults.data_dir.clone());

    println!("{} {}", "Seed:".bold().green(), params.seed);
    println!("{} {}", "Method:".bold().green(), engine_config.method);
    println!("{} {}", "Data:".bold().green(), data_dir.display());

    let mut advanced_options = Vec::<String>::new();
    if engine_config.method.is_lexical() {
        advanced_options.push(format!("Threshold: {}", engine_config.threshold));
        advanced_options.push(format!("Factor: {}", engine_config.selection_factor));
        advanced_options.push(format!("Selection: {}", engine_config.selection));
    }
    advanced_options.push(format!("Iterations: {}", engine_config.iteration_limit));
    advanced_options.push(format!("Rate: {rate}/h"));
    println!(
        "{} {}",
        "Options:".bold().green(),
        advanced_options.join(", ")
    );

    let store = CheckpointStore::new(&data_dir);
    if params.fresh {
        store
            .clear(&params.seed)
            .context("Failed to remove the existing checkpoint")?;
    }
    let checkpoint = store
        .load(&params.seed)
        .context("Failed to load the checkpoint")?;
    if !checkpoint.is_empty() {
        println!(
            "{} {} approved, {} rejected",
            "Resuming:".bold().yellow(),
            checkpoint.approved.len(),
            checkpoint.rejected.len()
        );
    }

    let replay = ReplaySource::from_path(&params.source)
        .with_context(|| format!("Failed to load source {}", params.source.display()))?
        .with_credentials(CredentialRing::new(config.source.credentials.iter().cloned()));
    let mut source = Paced::new(replay, rate, config.source.jitter);

    let start_time = Instant::now();
    let mut engine = Engine::resume(&params.seed, engine_config, checkpoint)?;
    let summary = engine.run(&mut source, &store)?;
    let duration = start_time.elapsed();

    println!();
    println!(
        "{} {} approved, {} rejected, {} junk, {} queued",
        "Result:".bold().green(),
        summary.approved.to_string().bold(),
        summary.rejected,
        summary.junk,
        summary.frontier
    );
    if let Some(threshold) = summary.threshold {
        println!("{} {:.4}", "Threshold:".bold().green(), threshold);
    }
    println!(
        "Stopped after iteration {} ({}) in {:.2?}",
        summary.iteration, summary.stop_reason, duration
    );

    match summary.stop_reason {
        StopReason::ResourceExhausted => println!(
            "{}",
            "Api keys exhausted due to throttling, try a few minutes later."
                .yellow()
                .bold()
        ),
        StopReason::RetriesExhausted => println!(
            "{}",
            "Source kept failing; progress is saved, rerun to resume."
                .yellow()
                .bold()
        ),
        _ => {}
    }

    let paths = store.paths(&summary.seed);
    println!(
        "{} {}",
        "Approved:".bold().green(),
        paths.approved.display()
    );

    Ok(())
}

fn snippets_for(source: &mut ReplaySource, query: &str) -> Result<Vec<String>> {
    let response = source.fetch_related(query)?;
    match response.status {
        FetchStatus::Ok => Ok(response.snippets),
        other => anyhow::bail!("No snippets for {:?}: {:?}", query, other),
    }
}

fn handle_kernel(source: &Path, query_a: &str, query_b: &str) -> Result<()> {
    let mut replay = ReplaySource::from_path(source)
        .with_context(|| format!("Failed to load source {}", source.display()))?;
    let a = snippets_for(&mut replay, query_a)?;
    let b = snippets_for(&mut replay, query_b)?;

    match content_kernel(&a, &b) {
        Some(score) => println!("{} {:.6}", "Kernel:".bold().green(), score),
        None => println!(
            "{}",
            "Nothing to compare: one of the queries has no snippet text."
                .yellow()
                .bold()
        ),
    }
    Ok(())
}

fn handle_clarity(source: &Path, query: &str) -> Result<()> {
    let mut replay = ReplaySource::from_path(source)
        .with_context(|| format!("Failed to load source {}", source.display()))?;
    let documents = snippets_for(&mut replay, query)?;

    match clarity_score(query, &documents) {
        Some(report) => {
            println!("{} {:.6}", "Clarity:".bold().green(), report.score);
            println!(
                "Documents: {} ({} with query terms), vocabulary: {}",
                report.documents, report.query_documents, report.vocabulary
            );
        }
        None => println!(
            "{}",
            "Nothing to score: the query or its snippets have no usable terms."
                .yellow()
                .bold()
        ),
    }
    Ok(())
}

fn handle_recall(generated: &Path, reference: &Path) -> Result<()> {
    let reports = evaluate_directories(reference, generated)?;
    if reports.is_empty() {
        println!("{}", "No matching seed files found.".yellow().bold());
        return Ok(());
    }

    for report in reports {
        println!();
        println!("{}", report.seed.bold());
        println!("\tmetric\t\tordered\t\tunordered");
        println!(
            "\trecall\t\t{:.3}\t\t{:.3}",
            report.recall.fraction, report.recall_unordered.fraction
        );
        println!(
            "\tprecision\t{:.3}\t\t{:.3}",
            report.precision.fraction, report.precision_unordered.fraction
        );
        println!(
            "\tgenerated: {}  reference: {}",
            report.generated_len, report.reference_len
        );
        println!(
            "\tmatches: recall {}/{}  precision {}/{}",
            report.recall.matched,
            report.recall_unordered.matched,
            report.precision.matched,
            report.precision_unordered.matched
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = QexpandConfig::load()?;

    // RUST_LOG wins over the configured level; --verbose wins over both
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.defaults.log_level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match args.command {
        Commands::Expand {
            seed,
            iterations,
            rate,
            method,
            factor,
            threshold,
            selection,
            shuffle_seed,
            source,
            data_dir,
            fresh,
        } => handle_expand(
            &config,
            ExpandParams {
                seed,
                iterations,
                rate,
                method,
                factor,
                threshold,
                selection,
                shuffle_seed,
                source,
                data_dir,
                fresh,
            },
        )?,
        Commands::Kernel {
            source,
            query_a,
            query_b,
        } => handle_kernel(&source, &query_a, &query_b)?,
        Commands::Clarity { source, query } => handle_clarity(&source, &query)?,
        Commands::Recall {
            generated,
            reference,
        } => handle_recall(&generated, &reference)?,
        Commands::Config => println!("{}", config.to_json_string()?),
    }

    Ok(())
}
