use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::TranslateConfig;
use crate::error::{DubError, Result};
use super::Translator;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub response: String,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    pub text: String,
}

/// Translates single strings through an Ollama `/api/generate` endpoint
pub struct OllamaTranslator {
    config: TranslateConfig,
    client: Client,
}

impl OllamaTranslator {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| DubError::Translation(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn build_prompt(&self, text: &str) -> String {
        let source = language_code_to_name(&self.config.source_language);
        let target = language_code_to_name(&self.config.target_language);
        format!(
            "You are a professional subtitle translator.\n\
             \n\
             Translate the subtitle line from {} to {} ONLY.\n\
             Keep placeholders such as __TAG0__ exactly as they are.\n\
             \n\
             Return ONLY the translation in JSON format as {{\"text\":\"your {} translation here\"}}.\n\
             Do not include any explanations, alternatives, or text in other languages.\n\
             \n\
             Text to translate: \"{}\"\n",
            source, target, target, text
        )
    }
}

#[async_trait]
impl Translator for OllamaTranslator {
    async fn translate(&self, text: &str) -> Result<String> {
        let request = TranslationRequest {
            model: self.config.model.clone(),
            prompt: self.build_prompt(text),
            stream: false,
            format: "json".to_string(),
        };

        let url = format!("{}/api/generate", self.config.endpoint);
        debug!("Sending translation request to {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| DubError::Translation(format!("Failed to send request to Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DubError::Translation(format!(
                "Ollama request failed with status {}: {}",
                status, body
            )));
        }

        let generated: TranslationResponse = response
            .json()
            .await
            .map_err(|e| DubError::Translation(format!("Failed to parse Ollama response: {}", e)))?;

        let translated = extract_translation(&generated.response);
        if translated.is_empty() {
            return Err(DubError::Translation("Ollama returned an empty translation".to_string()));
        }
        Ok(translated)
    }
}

/// Pull the translated text out of a model reply, preferring the requested
/// `{"text": ...}` object and falling back to the first plausible line
pub fn extract_translation(response: &str) -> String {
    match serde_json::from_str::<TranslationResult>(response.trim()) {
        Ok(result) => result.text.trim().to_string(),
        Err(_) => clean_translation_response(response),
    }
}

fn clean_translation_response(response: &str) -> String {
    let lines: Vec<&str> = response.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let chatter = |line: &str| {
        line.starts_with("Here are")
            || line.starts_with("Here is")
            || line.starts_with("Option")
            || line.starts_with("**Option")
            || line.starts_with("Translation:")
            || line.starts_with("- ")
            || line.starts_with("* ")
            || (line.starts_with("**") && line.ends_with("**"))
    };

    lines
        .iter()
        .find(|line| !chatter(line) && line.chars().count() > 3)
        .or_else(|| lines.first())
        .map(|line| line.trim_matches('"').to_string())
        .unwrap_or_default()
}

pub fn language_code_to_name(code: &str) -> String {
    match code.to_lowercase().as_str() {
        "az" => "Azerbaijani".to_string(),
        "en" => "English".to_string(),
        "tr" => "Turkish".to_string(),
        "ru" => "Russian".to_string(),
        "de" => "German".to_string(),
        "fr" => "French".to_string(),
        "es" => "Spanish".to_string(),
        "it" => "Italian".to_string(),
        "pt" => "Portuguese".to_string(),
        "ja" => "Japanese".to_string(),
        "ko" => "Korean".to_string(),
        "zh" => "Chinese".to_string(),
        "ar" => "Arabic".to_string(),
        other => other.to_string(),
    }
}

/// Check if Ollama is reachable and the model is pulled
pub async fn check_ollama_availability(endpoint: &str, model: &str) -> Result<()> {
    let client = Client::new();
    let url = format!("{}/api/show", endpoint);

    let response = client
        .post(&url)
        .json(&json!({ "name": model }))
        .send()
        .await
        .map_err(|e| DubError::Translation(format!("Failed to connect to Ollama: {}", e)))?;

    if response.status().is_success() {
        info!("Ollama model '{}' is available", model);
        Ok(())
    } else {
        Err(DubError::Translation(format!(
            "Ollama model '{}' not found. Please pull the model first: ollama pull {}",
            model, model
        )))
    }
}
