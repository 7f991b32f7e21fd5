//! # LoreMap
//!
//! Command-line front end for the generation studio. Every command opens the
//! saved session, works on it and saves it again on the way out.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use loremap_canvas::DataUri;
use loremap_core::{GeneratedAsset, LoreFile};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use loremap_studio::cli::{Cli, Command, EditArgs, GenerateArgs, OutputArgs};
use loremap_studio::{
    export_file_name, ApiKeyGate, FileSessionStorage, GeminiGenerator, GenerationController,
    JobOutcome, Studio, StudioConfig, StudioDeps,
};

/// Initialize structured tracing with optional JSON format.
///
/// Set `RUST_LOG` to control log levels (default: info,loremap_studio=debug).
/// Set `RUST_LOG_FORMAT=json` for JSON output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,loremap_studio=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = cli.config()?;
    info!(data_dir = %config.data_dir.display(), "Opening session");
    let studio = open_studio(&config).await?;

    let result = match cli.command {
        Command::Generate(args) => generate(&studio, args).await,
        Command::Vary(args) => vary(&studio, &args).await,
        Command::Edit(args) => edit(&studio, args).await,
        Command::Export { out } => export(&studio, out).await,
        Command::Import { file } => import(&studio, &file).await,
    };

    studio.close().await;
    result
}

async fn open_studio(config: &StudioConfig) -> anyhow::Result<Studio> {
    let deps = StudioDeps {
        generator: Arc::new(GeminiGenerator::new(config)?),
        credentials: Arc::new(ApiKeyGate::new(config.api_key.as_deref())),
        storage: Arc::new(FileSessionStorage::new(&config.data_dir)),
    };
    Ok(Studio::open(config, deps).await?)
}

async fn generate(studio: &Studio, args: GenerateArgs) -> anyhow::Result<()> {
    let mut lore = Vec::with_capacity(args.lore.len());
    for path in &args.lore {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading lore file {}", path.display()))?;
        lore.push(LoreFile::new(file_name(path), content));
    }
    if !lore.is_empty() {
        let offered = lore.len();
        let mut accepted = 0;
        studio.app().patch(|s| accepted = s.add_lore_files(lore));
        if accepted < offered {
            warn!(skipped = offered - accepted, "Only .md and .txt lore files are used");
        }
    }

    if let Some(path) = &args.sketch {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading sketch {}", path.display()))?;
        studio.with_engine(|engine| engine.import_image(&bytes))?;
        studio.flush_sketch().await;
    }

    let request = args.request;
    studio.app().patch(|s| {
        s.location_request = request;
        args.output.settings.apply(s);
    });

    let controller = Arc::clone(studio.controller());
    let outcome = run_cancellable(&controller, controller.generate_full()).await;
    let assets = settle(studio, outcome)?;

    let state = studio.app().get_state();
    write_assets(&args.output.out, &assets).await?;
    write_text(&args.output.out, "description.txt", &state.generated_description).await?;
    write_text(&args.output.out, "narrative.txt", &state.narrative_description).await?;
    Ok(())
}

async fn vary(studio: &Studio, args: &OutputArgs) -> anyhow::Result<()> {
    studio.app().patch(|s| args.settings.apply(s));
    let controller = Arc::clone(studio.controller());
    let outcome = run_cancellable(&controller, controller.generate_variations()).await;
    if outcome == JobOutcome::Skipped {
        bail!("No description in the session yet; run `generate` first");
    }
    let assets = settle(studio, outcome)?;
    write_assets(&args.out, &assets).await
}

async fn edit(studio: &Studio, args: EditArgs) -> anyhow::Result<()> {
    if let Some(path) = &args.image {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading image {}", path.display()))?;
        let mime = mime_for(path);
        let uri = loremap_canvas::codec::to_data_uri(mime, &bytes);
        studio
            .app()
            .patch(|s| s.push_asset(GeneratedAsset::from_url(uri)));
    }
    studio.app().patch(|s| args.output.settings.apply(s));

    let controller = Arc::clone(studio.controller());
    let outcome = run_cancellable(&controller, controller.edit_image(&args.instruction)).await;
    if outcome == JobOutcome::Skipped {
        bail!("No image to edit; pass --image or generate one first");
    }
    let assets = settle(studio, outcome)?;
    write_assets(&args.output.out, &assets).await
}

async fn export(studio: &Studio, out: Option<PathBuf>) -> anyhow::Result<()> {
    let name = export_file_name(Utc::now().date_naive());
    let path = match out {
        Some(path) if path.is_dir() => path.join(name),
        Some(path) => path,
        None => PathBuf::from(name),
    };
    let json = studio.export_project().to_json_pretty()?;
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    println!("{}", path.display());
    Ok(())
}

async fn import(studio: &Studio, file: &Path) -> anyhow::Result<()> {
    let json = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    studio.import_project(&json)?;
    studio.flush_sketch().await;
    let state = studio.app().get_state();
    println!(
        "Imported {} lore file(s) and {} image(s)",
        state.lore_files.len(),
        state.generated_images.len()
    );
    Ok(())
}

/// Await `job`, cancelling it on Ctrl-C.
async fn run_cancellable(
    controller: &GenerationController,
    job: impl std::future::Future<Output = JobOutcome>,
) -> JobOutcome {
    tokio::select! {
        outcome = job => outcome,
        _ = tokio::signal::ctrl_c() => {
            controller.cancel();
            JobOutcome::Cancelled
        }
    }
}

fn settle(studio: &Studio, outcome: JobOutcome) -> anyhow::Result<Vec<GeneratedAsset>> {
    match outcome {
        JobOutcome::Completed { assets } => {
            info!(count = assets.len(), "Job finished");
            Ok(assets)
        }
        JobOutcome::Invalid(message) => bail!(message.text(studio.app().get_state().language)),
        JobOutcome::Failed(message) => bail!(message),
        JobOutcome::Cancelled => bail!("Cancelled"),
        JobOutcome::Skipped => Ok(Vec::new()),
    }
}

async fn write_assets(dir: &Path, assets: &[GeneratedAsset]) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;
    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    for (index, asset) in assets.iter().enumerate() {
        let uri = DataUri::parse(&asset.image_url)?;
        let bytes = uri.decode_bytes()?;
        let path = dir.join(format!(
            "loremap-{stamp}-{}.{}",
            index + 1,
            extension_for(uri.mime_type)
        ));
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        println!("{}", path.display());
    }
    Ok(())
}

async fn write_text(dir: &Path, name: &str, text: &str) -> anyhow::Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    let path = dir.join(name);
    tokio::fs::write(&path, text)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}
