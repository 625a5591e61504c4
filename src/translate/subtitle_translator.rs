use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::TranslateConfig;
use crate::error::Result;
use crate::subtitle::{self, SubtitleCue};
use super::Translator;

/// Replace every `<...>` markup tag with a `__TAG{n}__` placeholder
pub fn protect_tags(text: &str) -> (String, Vec<(String, String)>) {
    let mut protected = String::with_capacity(text.len());
    let mut placeholders = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find('<') {
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        let tag = &rest[open..open + close + 1];
        let placeholder = format!("__TAG{}__", placeholders.len());
        protected.push_str(&rest[..open]);
        protected.push_str(&placeholder);
        placeholders.push((placeholder, tag.to_string()));
        rest = &rest[open + close + 1..];
    }
    protected.push_str(rest);

    (protected, placeholders)
}

pub fn restore_tags(text: &str, placeholders: &[(String, String)]) -> String {
    placeholders
        .iter()
        .fold(text.to_string(), |acc, (placeholder, tag)| acc.replace(placeholder, tag))
}

/// Translates subtitle cues one by one, never dropping a cue
pub struct SubtitleTranslator {
    translator: Arc<dyn Translator>,
    max_retries: u32,
    retry_delay: Duration,
}

impl SubtitleTranslator {
    pub fn new(translator: Arc<dyn Translator>, config: &TranslateConfig) -> Self {
        Self {
            translator,
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Translate one cue text. After the last failed attempt the original
    /// text comes back unchanged.
    pub async fn translate_cue(&self, cue: &SubtitleCue) -> String {
        if cue.text.trim().is_empty() {
            return cue.text.clone();
        }

        let (protected, placeholders) = protect_tags(&cue.text);
        for attempt in 1..=self.max_retries {
            match self.translator.translate(&protected).await {
                Ok(translated) => {
                    return subtitle::collapse_blank_lines(&restore_tags(&translated, &placeholders));
                }
                Err(e) if attempt == self.max_retries => {
                    error!(
                        "Cue {} [{:.3}s-{:.3}s] kept untranslated after {} attempts: {}",
                        cue.index, cue.start_time, cue.end_time, attempt, e
                    );
                }
                Err(e) => {
                    debug!("Cue {} translation attempt {} failed: {}", cue.index, attempt, e);
                    if !self.retry_delay.is_zero() {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        cue.text.clone()
    }

    pub async fn translate_cues(&self, cues: &[SubtitleCue]) -> Vec<SubtitleCue> {
        let pb = ProgressBar::new(cues.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} cues ({eta})")
                .map(|style| style.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut translated = Vec::with_capacity(cues.len());
        for cue in cues {
            let text = self.translate_cue(cue).await;
            translated.push(SubtitleCue { text, ..cue.clone() });
            pb.inc(1);
        }
        pb.finish_and_clear();

        translated
    }

    /// Read an SRT file, translate every cue and write the result
    pub async fn translate_file(&self, input: &Path, output: &Path) -> Result<Vec<SubtitleCue>> {
        let cues = subtitle::read_srt(input).await?;
        info!("Translating {} subtitle cues from {}", cues.len(), input.display());

        let translated = self.translate_cues(&cues).await;
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        subtitle::write_srt(&translated, output).await?;

        info!("Translated subtitles written to {}", output.display());
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::DubError;
    use crate::translate::MockTranslator;

    fn config(max_retries: u32) -> TranslateConfig {
        TranslateConfig {
            max_retries,
            retry_delay_ms: 0,
            ..Config::default().translate
        }
    }

    #[test]
    fn test_tags_round_trip() {
        let (protected, placeholders) = protect_tags("<i>Hello</i> <font color=\"red\">you</font>");
        assert_eq!(protected, "__TAG0__Hello__TAG1__ __TAG2__you__TAG3__");
        assert_eq!(placeholders[2].1, "<font color=\"red\">");

        let restored = restore_tags("__TAG0__Salam__TAG1__ __TAG2__sən__TAG3__", &placeholders);
        assert_eq!(restored, "<i>Salam</i> <font color=\"red\">sən</font>");
    }

    #[test]
    fn test_unclosed_bracket_is_plain_text() {
        let (protected, placeholders) = protect_tags("a < b");
        assert_eq!(protected, "a < b");
        assert!(placeholders.is_empty());
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let mut translator = MockTranslator::new();
        let mut seq = mockall::Sequence::new();
        translator
            .expect_translate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(DubError::Translation("busy".to_string())));
        translator
            .expect_translate()
            .withf(|text| text == "__TAG0__Hi__TAG1__")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("__TAG0__Salam__TAG1__".to_string()));

        let subs = SubtitleTranslator::new(Arc::new(translator), &config(3));
        let cue = SubtitleCue::new(1, 0.0, 1.0, "<b>Hi</b>");
        assert_eq!(subs.translate_cue(&cue).await, "<b>Salam</b>");
    }

    #[tokio::test]
    async fn test_final_failure_keeps_original() {
        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .times(2)
            .returning(|_| Err(DubError::Translation("down".to_string())));

        let subs = SubtitleTranslator::new(Arc::new(translator), &config(2));
        let cues = vec![SubtitleCue::new(4, 2.0, 3.5, "Keep me")];
        let translated = subs.translate_cues(&cues).await;
        assert_eq!(translated, cues);
    }

    #[tokio::test]
    async fn test_empty_cue_is_not_sent() {
        let mut translator = MockTranslator::new();
        translator.expect_translate().never();

        let subs = SubtitleTranslator::new(Arc::new(translator), &config(3));
        assert_eq!(subs.translate_cue(&SubtitleCue::new(1, 0.0, 1.0, "")).await, "");
    }

    #[tokio::test]
    async fn test_blank_lines_in_translation_are_collapsed() {
        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .returning(|_| Ok("Salam\n\ndunya\n".to_string()));

        let subs = SubtitleTranslator::new(Arc::new(translator), &config(1));
        let cue = SubtitleCue::new(1, 0.0, 1.0, "Hello world");
        assert_eq!(subs.translate_cue(&cue).await, "Salam\ndunya");
    }

    #[tokio::test]
    async fn test_translate_file() {
        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .returning(|text| Ok(text.to_uppercase()));

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.srt");
        let output = dir.path().join("output").join("translated_subtitles.srt");
        tokio::fs::write(
            &input,
            "1\n00:00:01,000 --> 00:00:02,000\nhello\n\n2\n00:00:03,000 --> 00:00:04,500\nworld\n",
        )
        .await
        .unwrap();

        let subs = SubtitleTranslator::new(Arc::new(translator), &config(1));
        subs.translate_file(&input, &output).await.unwrap();

        let cues = subtitle::read_srt(&output).await.unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "HELLO");
        assert!((cues[1].end_time - 4.5).abs() < 1e-9);
    }
}
