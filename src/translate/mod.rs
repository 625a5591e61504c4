// Translation stage
//
// - Translator: one string in, one translated string out
// - ollama: local LLM backend over the Ollama HTTP API
// - subtitle_translator: per-cue translation with markup protection and
//   retries, keeping the original line when every attempt fails

pub mod ollama;
pub mod subtitle_translator;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::TranslateConfig;
use crate::error::Result;

pub use ollama::{check_ollama_availability, OllamaTranslator};
pub use subtitle_translator::{protect_tags, restore_tags, SubtitleTranslator};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String>;
}

pub struct TranslatorFactory;

impl TranslatorFactory {
    pub fn create_translator(config: TranslateConfig) -> Result<Arc<dyn Translator>> {
        Ok(Arc::new(OllamaTranslator::new(config)?))
    }
}
