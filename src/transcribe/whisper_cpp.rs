use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tokio::process::Command;
use tracing::debug;

use crate::config::TranscriberConfig;
use crate::error::{DubError, Result};
use crate::session::WordTimestamp;
use super::{ChunkTranscription, TranscriptionBackend};

// whisper.cpp `-ojf` output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppOutput {
    pub result: WhisperCppResult,
    pub transcription: Vec<WhisperCppSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppResult {
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppSegment {
    pub offsets: WhisperCppOffsets,
    pub text: String,
    #[serde(default)]
    pub tokens: Vec<WhisperCppToken>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppToken {
    pub text: String,
    #[serde(default)]
    pub p: Option<f64>,
    pub offsets: WhisperCppOffsets,
}

/// Milliseconds from the start of the input
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WhisperCppOffsets {
    pub from: i64,
    pub to: i64,
}

impl WhisperCppToken {
    /// Control tokens such as `[_BEG_]` or `[_TT_150]`
    fn is_special(&self) -> bool {
        self.text.trim_start().starts_with("[_")
    }
}

impl From<WhisperCppOutput> for ChunkTranscription {
    fn from(output: WhisperCppOutput) -> Self {
        let text = output
            .transcription
            .iter()
            .map(|seg| seg.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let tokens: Vec<&WhisperCppToken> = output
            .transcription
            .iter()
            .flat_map(|seg| seg.tokens.iter())
            .filter(|t| !t.is_special())
            .collect();

        let probabilities: Vec<f64> = tokens.iter().filter_map(|t| t.p).collect();
        let confidence = if probabilities.is_empty() {
            None
        } else {
            Some(probabilities.iter().sum::<f64>() / probabilities.len() as f64)
        };

        // A token starting with a space opens a new word
        let mut words: Vec<WordTimestamp> = Vec::new();
        for token in tokens {
            let start = token.offsets.from as f64 / 1000.0;
            let end = token.offsets.to as f64 / 1000.0;
            match words.last_mut() {
                Some(word) if !token.text.starts_with(' ') => {
                    word.word.push_str(&token.text);
                    word.end = end;
                }
                _ if token.text.trim().is_empty() => {}
                _ => words.push(WordTimestamp {
                    word: token.text.trim_start().to_string(),
                    start,
                    end,
                }),
            }
        }

        ChunkTranscription {
            text,
            confidence,
            word_timestamps: if words.is_empty() { None } else { Some(words) },
            language: Some(output.result.language),
        }
    }
}

/// Runs the whisper.cpp command line tool on one audio file
pub struct WhisperCppTranscriber {
    config: TranscriberConfig,
}

impl WhisperCppTranscriber {
    pub fn new(config: TranscriberConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TranscriptionBackend for WhisperCppTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<ChunkTranscription> {
        let temp_dir = tempfile::tempdir()
            .map_err(|e| DubError::Transcription(format!("Failed to create temp dir: {}", e)))?;
        let output_base = temp_dir.path().join("transcript");
        let output_path = temp_dir.path().join("transcript.json");

        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg("-ojf")
            .arg("-np")
            .arg("-of").arg(&output_base)
            .arg("-m").arg(&self.config.model)
            .arg("-f").arg(audio_path);

        if let Some(lang) = &self.config.language {
            cmd.arg("-l").arg(lang);
        }

        debug!("Executing whisper command: {:?}", cmd);
        let output = cmd
            .output()
            .await
            .map_err(|e| DubError::Transcription(format!("Failed to execute whisper: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DubError::Transcription(format!("Whisper failed: {}", stderr.trim())));
        }

        let json_content = fs::read_to_string(&output_path)
            .await
            .map_err(|e| DubError::Transcription(format!("Failed to read transcription: {}", e)))?;
        let whisper_output: WhisperCppOutput = serde_json::from_str(&json_content)
            .map_err(|e| DubError::Transcription(format!("Failed to parse transcription JSON: {}", e)))?;

        Ok(whisper_output.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    const OUTPUT: &str = r#"{
        "result": {"language": "en"},
        "transcription": [
            {
                "timestamps": {"from": "00:00:00,000", "to": "00:00:01,200"},
                "offsets": {"from": 0, "to": 1200},
                "text": " Hello there",
                "tokens": [
                    {"text": "[_BEG_]", "p": 0.99, "offsets": {"from": 0, "to": 0}},
                    {"text": " Hel", "p": 0.9, "offsets": {"from": 0, "to": 300}},
                    {"text": "lo", "p": 0.8, "offsets": {"from": 300, "to": 500}},
                    {"text": " there", "p": 0.7, "offsets": {"from": 600, "to": 1200}}
                ]
            },
            {
                "offsets": {"from": 1200, "to": 2000},
                "text": " friend."
            }
        ]
    }"#;

    #[test]
    fn test_parse_full_json() {
        let output: WhisperCppOutput = serde_json::from_str(OUTPUT).unwrap();
        let chunk = ChunkTranscription::from(output);

        assert_eq!(chunk.text, "Hello there friend.");
        assert_eq!(chunk.language.as_deref(), Some("en"));
        assert!((chunk.confidence.unwrap() - 0.8).abs() < 1e-9);

        let words = chunk.word_timestamps.unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].word, "Hello");
        assert_eq!(words[0].start, 0.0);
        assert_eq!(words[0].end, 0.5);
        assert_eq!(words[1].word, "there");
    }

    #[test]
    fn test_plain_json_has_no_confidence() {
        let output: WhisperCppOutput = serde_json::from_str(
            r#"{"result": {"language": "az"}, "transcription": [{"offsets": {"from": 0, "to": 10}, "text": " Salam"}]}"#,
        )
        .unwrap();
        let chunk = ChunkTranscription::from(output);
        assert_eq!(chunk.text, "Salam");
        assert_eq!(chunk.confidence, None);
        assert_eq!(chunk.word_timestamps, None);
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let mut config = Config::default().transcriber;
        config.binary_path = "/nonexistent/whisper-cli".to_string();
        let result = WhisperCppTranscriber::new(config)
            .transcribe(Path::new("a.wav"))
            .await;
        assert!(matches!(result, Err(DubError::Transcription(_))));
    }
}
