use thiserror::Error;

#[derive(Error, Debug)]
pub enum DubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Malformed timecode: {0}")]
    MalformedTimecode(String),

    #[error("Malformed subtitle block {block}: {reason}")]
    MalformedSubtitleBlock { block: usize, reason: String },

    #[error("Cue {index} has an empty or negative window ({start:.3}s -> {end:.3}s)")]
    InvalidCueWindow { index: usize, start: f64, end: f64 },

    #[error("Speech synthesis failed: {0}")]
    SynthesisFailure(String),

    #[error("Backend invocation failed: {0}")]
    BackendInvocation(String),

    #[error("Sync violation: {0}")]
    SyncViolation(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("No usable output: {0}")]
    NoUsableOutput(String),
}

pub type Result<T> = std::result::Result<T, DubError>;
