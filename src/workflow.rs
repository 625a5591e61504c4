use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::compositor::{CompositeReport, TimelineCompositor};
use crate::config::Config;
use crate::error::{DubError, Result};
use crate::matcher::SegmentMatcher;
use crate::media::{MediaProcessorFactory, MediaProcessorTrait};
use crate::profile::SpeakerProfileNormalizer;
use crate::session::SessionMetadata;
use crate::speaker::{AcousticSpeakerDetector, SpeakerDetector};
use crate::subtitle;
use crate::sync::SyncValidator;
use crate::synth::{BatchReport, BatchSynthesizer, DurationMatchedSynthesizer, EdgeTtsBackend, SpeechBackend};
use crate::transcribe::{SessionOutput, SessionTranscriber, TranscriberFactory, TranscriptionBackend};
use crate::translate::{check_ollama_availability, SubtitleTranslator, Translator, TranslatorFactory};

/// Transcription backends expect 16 kHz mono input
pub const TRANSCRIPTION_SAMPLE_RATE: u32 = 16_000;

const VIDEO_EXTENSIONS: [&str; 7] = ["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"];

/// Artifact locations of one dub run, all below `session_dir`
#[derive(Debug, Clone, PartialEq)]
pub struct RunPaths {
    pub session_dir: PathBuf,
    pub source_audio: PathBuf,
    pub translated_subtitles: PathBuf,
    /// Translated cues reflowed into short on-screen parts
    pub burn_in_subtitles: PathBuf,
    pub segments_dir: PathBuf,
    pub combined_audio: PathBuf,
    pub subtitled_video: PathBuf,
    pub final_video: PathBuf,
}

impl RunPaths {
    pub fn new(session_dir: &Path) -> Self {
        let output = session_dir.join("output");
        Self {
            session_dir: session_dir.to_path_buf(),
            source_audio: session_dir.join("audio").join("source_audio.wav"),
            translated_subtitles: output.join("translated_subtitles.srt"),
            burn_in_subtitles: output.join("burn_in_subtitles.srt"),
            segments_dir: output.join("audio"),
            combined_audio: output.join("combined_audio.wav"),
            subtitled_video: output.join("subtitled_video.mp4"),
            final_video: output.join("final_dubbed_video.mp4"),
        }
    }

    pub fn transcript(&self) -> PathBuf {
        SessionOutput::transcript_path(&self.session_dir)
    }

    pub fn metadata(&self) -> PathBuf {
        SessionOutput::metadata_path(&self.session_dir)
    }
}

#[derive(Debug)]
pub struct DubResult {
    pub paths: RunPaths,
    pub video_duration: f64,
    pub session: SessionOutput,
    pub batch: BatchReport,
    pub composite: CompositeReport,
}

/// Drives one video through transcription, translation, synthesis,
/// compositing and remux
pub struct DubbingWorkflow {
    config: Config,
    media: Box<dyn MediaProcessorTrait>,
    transcriber: SessionTranscriber,
    subtitles: SubtitleTranslator,
    synthesizer: BatchSynthesizer,
    compositor: TimelineCompositor,
}

impl DubbingWorkflow {
    /// Workflow over the external command line and HTTP backends
    pub fn new(config: Config) -> Result<Self> {
        let media = MediaProcessorFactory::create_processor(config.media.clone());
        media.check_availability()?;

        let transcription = TranscriberFactory::create_default(config.transcriber.clone());
        let detector: Arc<dyn SpeakerDetector> = Arc::new(AcousticSpeakerDetector::from_config(&config.profile));
        let translator = TranslatorFactory::create_translator(config.translate.clone())?;
        let speech = Arc::new(EdgeTtsBackend::new(&config.synthesis, &config.media));
        speech.check_availability()?;

        Ok(Self::with_components(config, media, transcription, detector, translator, speech))
    }

    pub fn with_components(
        config: Config,
        media: Box<dyn MediaProcessorTrait>,
        transcription: Arc<dyn TranscriptionBackend>,
        detector: Arc<dyn SpeakerDetector>,
        translator: Arc<dyn Translator>,
        speech: Arc<dyn SpeechBackend>,
    ) -> Self {
        let transcriber = SessionTranscriber::new(&config, transcription, detector);
        let subtitles = SubtitleTranslator::new(translator, &config.translate);
        let synthesizer = BatchSynthesizer::new(
            Arc::new(DurationMatchedSynthesizer::new(&config, speech)),
            Arc::new(SegmentMatcher::new(SpeakerProfileNormalizer::new(config.profile.clone()))),
        );
        let compositor = TimelineCompositor::new(config.synthesis.sample_rate);

        Self {
            config,
            media,
            transcriber,
            subtitles,
            synthesizer,
            compositor,
        }
    }

    /// Fails early when the translation model is not reachable
    pub async fn check_translation_backend(&self) -> Result<()> {
        check_ollama_availability(&self.config.translate.endpoint, &self.config.translate.model).await
    }

    /// Run the full pipeline for one video into `output_root/session_<id>/`
    pub async fn dub_file(&self, video_path: &Path, output_root: &Path) -> Result<DubResult> {
        if !video_path.exists() {
            return Err(DubError::FileNotFound(video_path.display().to_string()));
        }
        let session_dir = output_root.join(format!("session_{}", SessionMetadata::generate_session_id()));
        fs::create_dir_all(&session_dir).await?;
        let paths = RunPaths::new(&session_dir);
        info!("Dubbing {} into {}", video_path.display(), session_dir.display());

        let video_duration = self.media.probe_duration(video_path).await?;
        info!("Video duration: {:.3}s", video_duration);

        self.media
            .extract_audio(video_path, &paths.source_audio, TRANSCRIPTION_SAMPLE_RATE)
            .await?;

        let session = self.transcriber.transcribe_file(&paths.source_audio, &session_dir).await?;

        let translated = self
            .subtitles
            .translate_file(&session.transcript_path, &paths.translated_subtitles)
            .await?;

        let batch = self
            .synthesize(&paths.translated_subtitles, &session.metadata, &paths.segments_dir)
            .await?;

        SyncValidator::guard(&batch.results, video_duration, self.config.ignore_sync_violations)?;

        let composite = self
            .compositor
            .compose_to_file(&batch.results, video_duration, &paths.combined_audio)?;

        let layout = &self.config.media;
        let burn_in = subtitle::reflow_for_burn_in(
            &translated,
            layout.max_chars_per_line,
            layout.min_cue_duration,
            layout.max_cue_duration,
        );
        subtitle::write_srt(&burn_in, &paths.burn_in_subtitles).await?;
        self.media
            .burn_subtitles(video_path, &paths.burn_in_subtitles, &paths.subtitled_video)
            .await?;

        self.media
            .mux_audio(video_path, &paths.combined_audio, self.config.media.mix, &paths.final_video)
            .await?;

        info!("Dubbed video written to {}", paths.final_video.display());
        Ok(DubResult {
            paths,
            video_duration,
            session,
            batch,
            composite,
        })
    }

    /// Dub every video below `input_dir`. Each video gets its own directory
    /// named after its file stem; a failed video is logged and skipped.
    pub async fn process_directory(&self, input_dir: &Path, output_root: &Path) -> Result<Vec<DubResult>> {
        if !input_dir.is_dir() {
            return Err(DubError::Config(format!("{} is not a directory", input_dir.display())));
        }

        let videos = find_videos(input_dir);
        info!("Found {} video files to process", videos.len());

        let mut results = Vec::new();
        for video in videos {
            let stem = video
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "video".to_string());
            match self.dub_file(&video, &output_root.join(stem)).await {
                Ok(result) => {
                    info!("Successfully processed: {}", video.display());
                    results.push(result);
                }
                Err(e) => warn!("Failed to process {}: {}", video.display(), e),
            }
        }

        Ok(results)
    }

    /// Voice a subtitle file using the speaker profiles of a session
    pub async fn synthesize(
        &self,
        subtitle_path: &Path,
        metadata: &SessionMetadata,
        output_dir: &Path,
    ) -> Result<BatchReport> {
        let cues = subtitle::read_srt(subtitle_path).await?;
        self.synthesizer.run(&cues, &metadata.segments, output_dir).await
    }
}

pub fn find_videos(input_dir: &Path) -> Vec<PathBuf> {
    let mut videos: Vec<PathBuf> = WalkDir::new(input_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .map(|entry| entry.path().to_path_buf())
        .collect();
    videos.sort();
    videos
}
