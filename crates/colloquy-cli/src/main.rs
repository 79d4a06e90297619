//! `colloquy` command line tool

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colloquy_core::csv_import::DEFAULT_IMPORT_PROJECT_NAME;
use colloquy_core::{
    add_random_dates, convert_csv, read_script, to_pretty_json, AudioWriter, ColloquyConfig,
    Composer, DateRange, EspeakSynthesizer, Gender, Manifest, Payload,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Compose scripted conversations into audio with a timed segment manifest
#[derive(Parser)]
#[command(name = "colloquy", version)]
#[command(about = "Timed multi-speaker conversation composer")]
struct Cli {
    /// Configuration file (defaults to $COLLOQUY_CONFIG or the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Voice language, overriding the configuration
    #[arg(long, global = true)]
    language: Option<String>,

    /// Log filter, overriding the configuration
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose <BASE_NAME>.csv and <BASE_NAME>_participants.csv into audio and a manifest
    Compose(Compose),
    /// Convert a CSV table into a JSON import payload
    Import(Import),
    /// Append a column of random dates to a CSV table
    AddDates(AddDates),
    /// Show the voice pool for the configured language
    Voices,
}

#[derive(Args)]
struct Compose {
    /// Base name shared by the input tables and the outputs
    base_name: String,

    /// Seed for voice rotation (defaults to the configured seed)
    seed: Option<u64>,
}

#[derive(Args)]
struct Import {
    /// CSV table to convert
    input: PathBuf,

    /// JSON payload to write
    output: PathBuf,

    /// Project name written into the payload
    #[arg(long, default_value = DEFAULT_IMPORT_PROJECT_NAME)]
    project_name: String,
}

#[derive(Args)]
struct AddDates {
    /// CSV table to read
    input: PathBuf,

    /// CSV table to write
    output: PathBuf,

    /// First possible date (YYYY-MM-DD)
    #[arg(long, default_value = "2023-06-01")]
    start: String,

    /// Day after the last possible date (YYYY-MM-DD)
    #[arg(long, default_value = "2023-09-25")]
    end: String,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn init_tracing(config: &ColloquyConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn synthesizer(config: &ColloquyConfig) -> EspeakSynthesizer {
    EspeakSynthesizer::new(config.engine.program.clone())
        .with_max_text_length(config.engine.max_text_length)
}

async fn compose(config: &ColloquyConfig, args: Compose) -> Result<()> {
    let base = args.base_name;
    let seed = args.seed.unwrap_or(config.seed);
    let conversation = PathBuf::from(format!("{base}.csv"));
    let participants = PathBuf::from(format!("{base}_participants.csv"));

    let script = read_script(&conversation, &participants).with_context(|| {
        format!(
            "Failed to read {} and {}",
            conversation.display(),
            participants.display()
        )
    })?;

    let composer = Composer::new(synthesizer(config), config.composer_settings());
    let composition = {
        let script = script.clone();
        tokio::task::spawn_blocking(move || composer.compose(&script, seed))
            .await
            .context("Composition task panicked")??
    };

    let format = config.audio_format()?;
    let audio_path = PathBuf::from(format!("{base}.{}", format.extension()));
    AudioWriter::with_settings(config.encoding_settings())
        .write_file(&composition.track, &audio_path, format)
        .await
        .with_context(|| format!("Failed to write {}", audio_path.display()))?;

    let manifest = Manifest::build(&base, &script, &composition.segments)?;
    let payload = Payload::for_manifest(&manifest, &config.output.project_name)?;
    let json_path = PathBuf::from(format!("{base}.json"));
    tokio::fs::write(&json_path, to_pretty_json(&payload)?)
        .await
        .with_context(|| format!("Failed to write {}", json_path.display()))?;

    info!(
        "Wrote {} ({} ms, {} segments) and {}",
        audio_path.display(),
        manifest.duration,
        manifest.segments.len(),
        json_path.display()
    );
    Ok(())
}

async fn import(args: Import) -> Result<()> {
    let input = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let payload = convert_csv(input.as_slice(), &args.project_name)?;
    write_text(&args.output, to_pretty_json(&payload)?).await?;
    println!(
        "Conversion successful. JSON data saved to {}.",
        args.output.display()
    );
    Ok(())
}

async fn add_dates(args: AddDates) -> Result<()> {
    let range = DateRange::parse(&args.start, &args.end)?;
    let input = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let mut output = Vec::new();
    let rows = add_random_dates(input.as_slice(), &mut output, range, args.seed)?;
    tokio::fs::write(&args.output, output)
        .await
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!(
        "Random dates added to {rows} rows and saved to '{}'.",
        args.output.display()
    );
    Ok(())
}

async fn write_text(path: &Path, text: String) -> Result<()> {
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

async fn voices(config: &ColloquyConfig) -> Result<()> {
    let composer = Composer::new(synthesizer(config), config.composer_settings());
    let pool = tokio::task::spawn_blocking(move || composer.voice_pool())
        .await
        .context("Voice listing task panicked")??;

    println!("Voice pool for '{}':", pool.language());
    for gender in [Gender::Male, Gender::Female, Gender::Other] {
        let bucket = pool.bucket(gender);
        println!("  {gender} ({}):", bucket.len());
        for (index, voice) in bucket.iter().enumerate() {
            println!("    {index:>3}  {:<12} {}", voice.id, voice.name);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, source) = ColloquyConfig::load_with_source(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(language) = cli.language {
        config.voices.language = language;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.validate()?;
    init_tracing(&config);
    info!("Using {}", source);

    match cli.command {
        Commands::Compose(args) => compose(&config, args).await,
        Commands::Import(args) => import(args).await,
        Commands::AddDates(args) => add_dates(args).await,
        Commands::Voices => voices(&config).await,
    }
}
