//! narrate - Convert EPUB and PDF documents into a narrated audio track

use anyhow::{Context, Result};
use audiobook_narrator::audio::export::{FFMPEG_ENV, is_ffmpeg_available};
use audiobook_narrator::audio::{AudioAssembler, OutputFormat, export_track, output_file_name};
use audiobook_narrator::extract;
use audiobook_narrator::pipeline::{self, RunConfig, SynthesisScheduler};
use audiobook_narrator::text::SegmentClassifier;
use audiobook_narrator::{BookData, NarratorConfig, tts};
use clap::{ArgAction, Parser, Subcommand};
use env_logger::{Builder, Env};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "narrate")]
#[command(about = "Convert EPUB and PDF documents into a narrated audio track", long_about = None)]
#[command(version, args_conflicts_with_subcommands = true)]
struct Args {
    /// Path to the EPUB or PDF file
    file: Option<PathBuf>,

    /// Output file path (default: <title>_audiobook.<format>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Voice preset (male, female) or an engine voice id
    #[arg(long)]
    voice: Option<String>,

    /// Use digital silence instead of room tone between segments
    #[arg(long)]
    no_room_tone: bool,

    /// Chapter range to narrate (e.g., "2-5" or "3")
    #[arg(long)]
    chapters: Option<String>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Maximum synthesis calls in flight
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show document metadata and chapters
    Info {
        /// Path to the EPUB or PDF file
        file: PathBuf,
    },
    /// Print the narration segments and their pauses
    Segments {
        /// Path to the EPUB or PDF file
        file: PathBuf,

        /// Chapter range (e.g., "2-5" or "3")
        #[arg(long)]
        chapters: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set default voice
    SetVoice {
        /// Preset name (male, female) or engine voice id
        voice: String,
    },
    /// Enable or disable room tone by default
    SetRoomTone {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.debug);

    match &args.command {
        Some(Commands::Config { action }) => return handle_config_command(action),
        Some(Commands::Info { file }) => return show_info(file),
        Some(Commands::Segments {
            file,
            chapters,
            json,
        }) => return show_segments(file, chapters.as_deref(), *json),
        None => {}
    }

    let path = args
        .file
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Document path is required. Run 'narrate --help' for usage."))?;

    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }

    let mut config = NarratorConfig::load().context("Failed to load configuration")?;
    if let Some(jobs) = args.jobs {
        config.synthesis.max_concurrent = jobs;
    }
    config
        .synthesis
        .validate()
        .context("Invalid synthesis settings")?;

    let format = args.format.unwrap_or(config.format);
    require_encoder(format, is_ffmpeg_available)?;
    let voice = config.resolve_voice(args.voice.as_deref().unwrap_or(&config.voice));
    let run = run_config(voice, config.room_tone && !args.no_room_tone, args.chapters.as_deref())?;

    if args.debug {
        eprintln!("File: {}", path.display());
        eprintln!("Voice: {}", run.voice);
        eprintln!("Room tone: {}", run.room_tone);
        eprintln!("Format: {}", format);
        eprintln!("Concurrency: {}", config.synthesis.max_concurrent);
    }

    let book = load_book(&path)?;

    let classifier = SegmentClassifier::new(&config.rules, config.pauses)
        .context("Invalid segmentation rules")?;
    let synthesizer =
        tts::create_synthesizer(&config.synthesis).context("Failed to create speech synthesizer")?;
    let scheduler = SynthesisScheduler::new(synthesizer, &config.synthesis);
    let assembler = AudioAssembler::new(config.assembly.clone());

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );

    let narration = pipeline::narrate(&book, &run, &classifier, &scheduler, &assembler, |progress| {
        pb.set_length(progress.total as u64);
        pb.set_position(progress.finished() as u64);
        if progress.failed > 0 {
            pb.set_message(format!("{} failed", progress.failed));
        }
    })
    .await
    .context("Narration failed")?;
    pb.finish_and_clear();

    if !narration.skipped.is_empty() {
        eprintln!(
            "Warning: {} of {} segments could not be synthesized and were skipped: {:?}",
            narration.skipped.len(),
            narration.segment_count,
            narration.skipped
        );
    }

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(output_file_name(&book.title, format)));

    eprintln!("Writing {}...", format);
    export_track(&narration.track, &output_path, format)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    let size_mb = std::fs::metadata(&output_path)?.len() as f64 / (1024.0 * 1024.0);
    eprintln!(
        "Output: {} ({:.1} min, {:.1} MB)",
        output_path.display(),
        narration.track.duration_ms() as f64 / 60_000.0,
        size_mb
    );

    Ok(())
}

fn init_logger(debug: bool) {
    let default_filter = if debug {
        "debug"
    } else {
        "warn,audiobook_narrator=info"
    };
    Builder::from_env(Env::default().filter_or("RUST_LOG", default_filter))
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .init();
}

/// Fail before any synthesis when the output format needs a missing encoder.
fn require_encoder(format: OutputFormat, ffmpeg_available: impl FnOnce() -> bool) -> Result<()> {
    if format == OutputFormat::Mp3 && !ffmpeg_available() {
        anyhow::bail!(
            "ffmpeg is required for MP3 output. Install it, point {} at it, or use --format wav.",
            FFMPEG_ENV
        );
    }
    Ok(())
}

fn load_book(path: &Path) -> Result<BookData> {
    eprintln!("Parsing: {}", path.display());
    let book = extract::extract_file(path)
        .with_context(|| format!("Failed to extract {}", path.display()))?;

    eprintln!("Book: \"{}\" by {}", book.title, book.author);
    eprintln!(
        "Chapters: {}, Characters: ~{}",
        book.chapters.len(),
        book.total_chars()
    );
    Ok(book)
}

fn run_config(voice: String, room_tone: bool, chapters: Option<&str>) -> Result<RunConfig> {
    let run = RunConfig::new(voice).with_room_tone(room_tone);
    match chapters {
        Some(range) => {
            let (start, end) = parse_chapter_range(range)?;
            Ok(run.with_chapters(start, end)?)
        }
        None => Ok(run),
    }
}

/// Parse "A-B" or "N" into an inclusive 1-based range.
fn parse_chapter_range(range: &str) -> Result<(usize, usize)> {
    if let Some((start, end)) = range.split_once('-') {
        let start: usize = start.trim().parse().context("Invalid start chapter")?;
        let end: usize = end.trim().parse().context("Invalid end chapter")?;
        Ok((start, end))
    } else {
        let chapter: usize = range.trim().parse().context("Invalid chapter number")?;
        Ok((chapter, chapter))
    }
}

fn show_info(path: &Path) -> Result<()> {
    let book = load_book(path)?;
    println!("Title:  {}", book.title);
    println!("Author: {}", book.author);
    println!("Format: {}", book.format);
    println!();
    for chapter in &book.chapters {
        println!(
            "{:>4}  {:<50} {:>8} chars",
            chapter.index,
            chapter.display_title(),
            chapter.char_count()
        );
    }
    Ok(())
}

fn show_segments(path: &Path, chapters: Option<&str>, json: bool) -> Result<()> {
    let config = NarratorConfig::load().context("Failed to load configuration")?;
    let book = load_book(path)?;
    let run = run_config(config.voice.clone(), config.room_tone, chapters)?;
    let classifier = SegmentClassifier::new(&config.rules, config.pauses)
        .context("Invalid segmentation rules")?;
    let segments = pipeline::plan(&book, &run, &classifier)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&segments)?);
        return Ok(());
    }

    for segment in &segments {
        println!(
            "{:>5}  {:<9} {:>5}ms  {}",
            segment.id, segment.pause, segment.pause_ms, segment.text
        );
    }
    let total_pause_ms: u64 = segments.iter().map(|s| s.pause_ms as u64).sum();
    eprintln!(
        "{} segments, {:.1} min of pauses",
        segments.len(),
        total_pause_ms as f64 / 60_000.0
    );
    Ok(())
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = NarratorConfig::load()?;
            println!("Configuration file: {:?}", NarratorConfig::config_path()?);
            println!();
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::SetVoice { voice } => {
            let mut config = NarratorConfig::load()?;
            config.voice = voice.clone();
            config.save()?;
            println!(
                "Default voice set to: {} ({})",
                voice,
                config.resolve_voice(voice)
            );
        }
        ConfigAction::SetRoomTone { enabled } => {
            let mut config = NarratorConfig::load()?;
            config.room_tone = *enabled;
            config.save()?;
            println!("Room tone {}", if *enabled { "enabled" } else { "disabled" });
        }
    }
    Ok(())
}
