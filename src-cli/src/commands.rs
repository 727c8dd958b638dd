//! Command handlers. Each returns `Ok(true)` on full success, `Ok(false)` when
//! some batch items failed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use formschema_core::catalog::{self, FormSource};
use formschema_core::http::build_client;
use formschema_core::transfer::HttpFetcher;
use formschema_core::{
    BatchOrchestrator, Config, ConfigError, DownloadJob, EventEmitter, FormInfo, SchemaJob,
    SchemaPipeline, SchemaSource, Settings,
};

use crate::cli::{Cli, Command, DownloadArgs, GenerateArgs, GenerateBatchArgs, Selection};
use crate::render::{self, TerminalEmitter};

pub async fn dispatch(cli: Cli) -> anyhow::Result<bool> {
    let config = Config::load_or_default();
    let settings = load_settings(&cli, &config)?;

    let cancel = CancellationToken::new();
    watch_ctrl_c(cancel.clone());

    match cli.command {
        Command::List { source } => list(source.as_deref()),
        Command::Download(args) => download(&config, &settings, args, cancel).await,
        Command::Generate(args) => generate(&config, &settings, args, cancel).await,
        Command::GenerateBatch(args) => generate_batch(&config, &settings, args, cancel).await,
    }
}

/// Settings file plus command line overrides.
fn load_settings(cli: &Cli, config: &Config) -> anyhow::Result<Settings> {
    let path = cli
        .settings
        .clone()
        .unwrap_or_else(|| config.settings_file.clone());

    let mut settings = Settings::load(&path)?;
    apply_overrides(&mut settings, cli.poll_interval, cli.max_attempts)?;
    Ok(settings)
}

fn apply_overrides(
    settings: &mut Settings,
    poll_interval: Option<f64>,
    max_attempts: Option<u32>,
) -> Result<(), ConfigError> {
    if let Some(secs) = poll_interval {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(ConfigError::InvalidSetting {
                name: "poll_interval",
                reason: format!("must be a positive number of seconds, got {}", secs),
            });
        }
        settings.poll_interval_ms = ((secs * 1000.0).round() as u64).max(1);
        settings.max_poll_interval_ms = settings.max_poll_interval_ms.max(settings.poll_interval_ms);
    }
    if let Some(attempts) = max_attempts {
        settings.max_poll_attempts = attempts;
    }
    settings.validate()
}

fn watch_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling outstanding work");
            cancel.cancel();
        }
    });
}

fn parse_source(source: Option<&str>) -> Result<Option<FormSource>, ConfigError> {
    source.map(str::parse).transpose()
}

fn select(selection: &Selection) -> Result<Vec<FormInfo>, ConfigError> {
    let source = parse_source(selection.source.as_deref())?;
    catalog::select_forms(&selection.forms, source, selection.all)
}

fn list(source: Option<&str>) -> anyhow::Result<bool> {
    let forms = catalog::forms_for(parse_source(source)?);
    print!("{}", render::catalog_table(&forms));
    Ok(true)
}

async fn download(
    config: &Config,
    settings: &Settings,
    args: DownloadArgs,
    cancel: CancellationToken,
) -> anyhow::Result<bool> {
    let forms = select(&args.selection)?;
    if forms.is_empty() {
        println!("No forms selected. Pass form numbers, --source or --all.");
        return Ok(true);
    }

    let out = output_dir(args.out, config, &config.forms_dir)?;
    let emitter: Arc<dyn EventEmitter> = Arc::new(TerminalEmitter::batch());

    let fetcher = HttpFetcher::new(build_client(settings)?);
    let job = DownloadJob::new(Arc::new(fetcher), settings.sources.clone(), &out)
        .with_instructions(args.instructions)
        .with_emitter(emitter.clone())
        .with_cancellation(cancel.clone());

    println!("Downloading {} forms to {}", forms.len(), out.display());
    let outcome = BatchOrchestrator::new(concurrency(args.concurrency, settings))
        .with_emitter(emitter)
        .with_cancellation(cancel)
        .run(forms, Arc::new(job))
        .await;

    print!("{}", render::batch_summary(&outcome));
    Ok(outcome.is_success())
}

async fn generate(
    config: &Config,
    settings: &Settings,
    args: GenerateArgs,
    cancel: CancellationToken,
) -> anyhow::Result<bool> {
    let source = match (args.pdf, args.form) {
        (Some(pdf), _) => SchemaSource::File(pdf),
        (None, Some(form)) => {
            let info = catalog::find_form(&form).ok_or(ConfigError::UnknownForm(form))?;
            SchemaSource::Form(info.clone())
        }
        (None, None) => anyhow::bail!("either --pdf or --form is required"),
    };

    let pipeline = SchemaPipeline::from_settings(settings, args.api_key.as_deref(), &config.schemas_dir)?
        .with_emitter(Arc::new(TerminalEmitter::single()))
        .with_cancellation(cancel);

    let report = pipeline.run(source, args.output).await.map_err(|e| {
        let stage = e.stage();
        anyhow::Error::new(e).context(format!("schema generation failed at the {} stage", stage))
    })?;

    print!("{}", render::schema_report(&report));
    Ok(true)
}

async fn generate_batch(
    config: &Config,
    settings: &Settings,
    args: GenerateBatchArgs,
    cancel: CancellationToken,
) -> anyhow::Result<bool> {
    let forms = select(&args.selection)?;
    if forms.is_empty() {
        println!("No forms selected. Pass form numbers, --source or --all.");
        return Ok(true);
    }

    let out = output_dir(args.out, config, &config.schemas_dir)?;
    let emitter: Arc<dyn EventEmitter> = Arc::new(TerminalEmitter::batch());

    let pipeline = SchemaPipeline::from_settings(settings, args.api_key.as_deref(), &out)?
        .with_emitter(emitter.clone())
        .with_cancellation(cancel.clone());

    println!("Generating schemas for {} forms into {}", forms.len(), out.display());
    let outcome = BatchOrchestrator::new(concurrency(args.concurrency, settings))
        .with_emitter(emitter)
        .with_cancellation(cancel)
        .run(forms, Arc::new(SchemaJob::new(Arc::new(pipeline))))
        .await;

    print!("{}", render::batch_summary(&outcome));
    Ok(outcome.is_success())
}

/// Explicit directory, or the given default under the data directory.
fn output_dir(explicit: Option<PathBuf>, config: &Config, default: &Path) -> anyhow::Result<PathBuf> {
    let Some(dir) = explicit else {
        config
            .ensure_dirs()
            .with_context(|| format!("failed to create {}", config.data_dir.display()))?;
        return Ok(default.to_path_buf());
    };

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    Ok(dir)
}

fn concurrency(explicit: Option<usize>, settings: &Settings) -> usize {
    explicit
        .filter(|n| *n > 0)
        .unwrap_or(settings.concurrency)
        .max(1)
}
