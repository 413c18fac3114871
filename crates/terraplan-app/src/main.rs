use std::{process, sync::Arc};

use tracing_subscriber::{filter::LevelFilter, fmt};

use terraplan_app::cli::{Cli, Commands, RunArgs};
use terraplan_app::config::{self, AppConfig};
use terraplan_app::error::AppError;
use terraplan_app::paths::AppPaths;
use terraplan_app::pdf::PdfiumExtractor;
use terraplan_app::pipeline::Cl100kCounter;
use terraplan_app::pipeline::prompts;
use terraplan_app::server::{self, AppState};
use terraplan_app::services::{
    BigQueryRestClient, CsvLinkDownloader, JobRunner, JobStore, OpenAiClient, Orchestrator,
    Summarizer, SummarizerConfig, WarehouseMerger, WorkerPool,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let log_level = determine_log_level(&cli);
    init_tracing(log_level);

    if let Err(err) = run(cli).await {
        eprintln!("{err}");
        process::exit(1);
    }
}

fn init_tracing(level: LevelFilter) {
    let subscriber = fmt().with_max_level(level).with_target(false).finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("Tracing subscriber already set; skipping re-initialization.");
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Some(Commands::Serve(_)) => {
            let config = config::load()?;
            let paths = AppPaths::new(&config.storage.path)?;
            let orchestrator = build_orchestrator(&config, paths.clone())?;

            let pool = WorkerPool::spawn(
                config.jobs.workers,
                JobStore::new(),
                Arc::new(orchestrator),
            );
            let state = AppState::new(pool, paths);
            server::serve(config, state).await?;
        }
        Some(Commands::Run(args)) => {
            run_once(args).await?;
        }
        None => {
            Cli::print_help();
        }
    }

    Ok(())
}

async fn run_once(args: RunArgs) -> Result<(), AppError> {
    let config = config::load()?;
    let paths = AppPaths::new(&config.storage.path)?;
    let orchestrator = build_orchestrator(&config, paths)?;

    let outcome = orchestrator.run(args.city.trim(), args.task.trim()).await?;
    println!(
        "pipeline finished for {}; archive at {}",
        outcome.city, outcome.download_url
    );
    Ok(())
}

/// Wire the production collaborators behind the five-stage pipeline.
fn build_orchestrator(config: &AppConfig, paths: AppPaths) -> Result<Orchestrator, AppError> {
    let api_key = resolve_api_key(config);
    let completions = Arc::new(OpenAiClient::new(api_key, prompts::SYSTEM_PROMPT));

    let summarizer = Summarizer::new(
        paths.clone(),
        Arc::new(PdfiumExtractor),
        completions,
        Arc::new(Cl100kCounter),
        SummarizerConfig {
            chunk_model: config.openai.chunk_model.clone(),
            summary_model: config.openai.summary_model.clone(),
            chunk_token_limit: config.openai.chunk_token_limit,
        },
    );

    let merger = WarehouseMerger::new(
        paths.clone(),
        Arc::new(BigQueryRestClient::new(config.warehouse.clone())),
        config.warehouse.clone(),
    );

    let source = Arc::new(CsvLinkDownloader::new(paths.clone()));

    Ok(Orchestrator::new(paths, source, summarizer, merger))
}

fn resolve_api_key(config: &AppConfig) -> String {
    if !config.openai.api_key.is_empty() {
        return config.openai.api_key.clone();
    }
    std::env::var("OPENAI_API_KEY").unwrap_or_default()
}

fn determine_log_level(cli: &Cli) -> LevelFilter {
    match cli.command.as_ref() {
        Some(Commands::Serve(_)) => match cli.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        },
        Some(Commands::Run(_)) => match cli.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        },
        None => match cli.verbose {
            0 => LevelFilter::OFF,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        },
    }
}
