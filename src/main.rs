//! dubsync - automated video dubbing
//!
//! Transcribes a video's speech, translates the subtitles, voices every cue
//! to fit its original time window and remuxes the dubbed track using
//! whisper-cpp, ollama, edge-tts and ffmpeg.

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dubsync::cli::{Args, Commands};
use dubsync::compositor::TimelineCompositor;
use dubsync::config::Config;
use dubsync::matcher::SegmentMatcher;
use dubsync::profile::SpeakerProfileNormalizer;
use dubsync::session::SessionMetadata;
use dubsync::speaker::AcousticSpeakerDetector;
use dubsync::subtitle;
use dubsync::sync::SyncValidator;
use dubsync::synth::{BatchSynthesizer, DurationMatchedSynthesizer, EdgeTtsBackend, SegmentsInfo};
use dubsync::transcribe::{SessionTranscriber, TranscriberFactory};
use dubsync::translate::{check_ollama_availability, SubtitleTranslator, TranslatorFactory};
use dubsync::workflow::DubbingWorkflow;

const DEFAULT_CONFIG_FILE: &str = "dubsync.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;
    info!("Starting dubsync");

    let mut config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::Dub { input, output_dir, target_lang } => {
            apply_target_language(&mut config, target_lang);
            let workflow = DubbingWorkflow::new(config)?;
            workflow.check_translation_backend().await?;
            let result = workflow.dub_file(&input, &output_dir).await?;
            println!("Final video: {}", result.paths.final_video.display());
            println!("Subtitled video: {}", result.paths.subtitled_video.display());
            println!(
                "Segments: {} synthesized, {} failed",
                result.batch.results.len(),
                result.batch.failures.len()
            );
        }
        Commands::Batch { input_dir, output_dir, target_lang } => {
            apply_target_language(&mut config, target_lang);
            let workflow = DubbingWorkflow::new(config)?;
            workflow.check_translation_backend().await?;
            let results = workflow.process_directory(&input_dir, &output_dir).await?;
            println!("Dubbed {} videos", results.len());
        }
        Commands::Transcribe { input, output_dir, language } => {
            if language.is_some() {
                config.transcriber.language = language;
            }
            let transcriber = SessionTranscriber::new(
                &config,
                TranscriberFactory::create_default(config.transcriber.clone()),
                Arc::new(AcousticSpeakerDetector::from_config(&config.profile)),
            );
            let output = transcriber.transcribe_file(&input, &output_dir).await?;
            println!("Metadata: {}", output.metadata_path.display());
            println!("Transcript: {}", output.transcript_path.display());
        }
        Commands::Translate { input, output, target_lang } => {
            apply_target_language(&mut config, target_lang);
            check_ollama_availability(&config.translate.endpoint, &config.translate.model).await?;
            let translator = TranslatorFactory::create_translator(config.translate.clone())?;
            let cues = SubtitleTranslator::new(translator, &config.translate)
                .translate_file(&input, &output)
                .await?;
            println!("Translated {} cues into {}", cues.len(), output.display());
        }
        Commands::Synthesize { subtitles, metadata, output_dir } => {
            let backend = EdgeTtsBackend::new(&config.synthesis, &config.media);
            backend.check_availability()?;

            let metadata = SessionMetadata::from_file(&metadata).await?;
            let cues = subtitle::read_srt(&subtitles).await?;
            let batch = BatchSynthesizer::new(
                Arc::new(DurationMatchedSynthesizer::new(&config, Arc::new(backend))),
                Arc::new(SegmentMatcher::new(SpeakerProfileNormalizer::new(config.profile.clone()))),
            );
            let report = batch.run(&cues, &metadata.segments, &output_dir).await?;
            println!(
                "Synthesized {} segments ({} failed), listed in {}",
                report.results.len(),
                report.failures.len(),
                report.info_path.display()
            );
        }
        Commands::Compose { segments, duration, output } => {
            let info = SegmentsInfo::from_file(&segments).await?;
            SyncValidator::guard(&info.segments, duration, config.ignore_sync_violations)?;
            let report = TimelineCompositor::new(config.synthesis.sample_rate).compose_to_file(
                &info.segments,
                duration,
                &output,
            )?;
            println!(
                "Combined track: {} ({:.3}s, {} placed, {} skipped)",
                report.output_path.display(),
                report.duration,
                report.placed,
                report.skipped.len()
            );
        }
        Commands::Validate { segments, duration } => {
            let info = SegmentsInfo::from_file(&segments).await?;
            match SyncValidator::find_violation(&info.segments, duration) {
                Some(issue) => {
                    println!("Sync violation: {}", issue);
                    std::process::exit(1);
                }
                None => println!("{} segments fit the {:.3}s track", info.segments.len(), duration),
            }
        }
        Commands::InitConfig { output } => {
            config.save_to_file(&output)?;
            println!("Configuration written to {}", output.display());
        }
    }

    info!("dubsync completed successfully");
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(config_path) => Ok(Config::from_file(config_path)?),
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Ok(Config::from_file(&default_path)?)
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn apply_target_language(config: &mut Config, target_lang: Option<String>) {
    if let Some(lang) = target_lang {
        config.synthesis.language = lang.clone();
        config.translate.target_language = lang;
    }
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".dubsync").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "dubsync.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("dubsync.log").display()
    );

    Ok(())
}
