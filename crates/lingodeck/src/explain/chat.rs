//! Chat-completions annotation client.
//!
//! Sends one JSON request per batch and expects a strict JSON object back,
//! one annotation per sentence in request order.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{Annotation, ExplanationService};
use crate::config::ExplanationConfig;
use crate::error::ExplanationError;

const MAX_ERROR_BODY_LENGTH: usize = 300;

pub struct ChatExplainer {
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    native_language: String,
    study_language: String,
    client: reqwest::Client,
}

impl ChatExplainer {
    pub fn new(config: &ExplanationConfig) -> Result<Self, ExplanationError> {
        let api_key = config
            .resolve_api_key()
            .ok_or(ExplanationError::MissingApiKey)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            native_language: config.native_language.clone(),
            study_language: config.study_language.clone(),
            client,
        })
    }

    /// Builds the teaching prompt for one batch of sentences.
    fn build_prompt(&self, sentences: &[String]) -> String {
        let sentences_json =
            serde_json::to_string_pretty(sentences).unwrap_or_else(|_| "[]".to_string());
        let study = &self.study_language;
        let native = &self.native_language;

        format!(
            r#"You are an expert {study} language teacher helping students learn {study}.

For each of the following {study} sentences, provide:
1. A complete and accurate {native} translation of the sentence
2. A simple explanation in {study} (1-2 sentences about context and grammar)
3. An explanation in {native} (1-2 sentences about usage, context, or grammar notes - NOT a translation)
4. Extract 2-4 key vocabulary words with their meanings in both {study} and {native}

IMPORTANT:
- The translation should be a direct, accurate translation of the {study} sentence
- The explanation in {native} should provide context, usage notes, or grammar tips - NOT repeat the translation
- Keep explanations simple and helpful for language learners
- For keywords, include the base/dictionary form of verbs and nouns

Respond ONLY with a valid JSON object in this exact format:
{{
  "sentences": [
    {{
      "translation": "{native} translation here",
      "explanation_foreign": "{study} explanation here",
      "explanation_native": "{native} usage/context explanation here (not a translation)",
      "keywords": [
        {{"word": "{study} word", "meaning_foreign": "{study} meaning", "meaning_native": "{native} meaning"}}
      ]
    }}
  ]
}}

{study} sentences to explain:
{sentences_json}"#
        )
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnnotationSet {
    #[serde(default)]
    sentences: Vec<Annotation>,
}

/// Parses the model's JSON content into annotations and checks the count
/// against the request batch. A mismatch fails the whole batch so the
/// resume checkpoint never drifts from persisted content.
pub(crate) fn parse_annotations(
    content: &str,
    expected: usize,
) -> Result<Vec<Annotation>, ExplanationError> {
    let set: AnnotationSet = serde_json::from_str(content)?;

    if set.sentences.len() != expected {
        return Err(ExplanationError::CountMismatch {
            expected,
            got: set.sentences.len(),
        });
    }
    Ok(set.sentences)
}

fn truncate_body(body: String) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let cut: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated)", cut)
    } else {
        body
    }
}

#[async_trait]
impl ExplanationService for ChatExplainer {
    async fn explain(&self, sentences: &[String]) -> Result<Vec<Annotation>, ExplanationError> {
        if sentences.is_empty() {
            return Ok(Vec::new());
        }

        debug!("requesting annotations for {} sentences", sentences.len());

        let body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": format!(
                        "You are a {} language teacher. Always respond with valid JSON only.",
                        self.study_language
                    ),
                },
                {
                    "role": "user",
                    "content": self.build_prompt(sentences),
                },
            ],
            "temperature": 0.3,
            "max_tokens": self.max_tokens,
            "response_format": {"type": "json_object"},
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(ExplanationError::Auth);
        }
        if status.as_u16() == 429 {
            return Err(ExplanationError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExplanationError::Service {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&response.text().await?)?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .filter(|c| !c.trim().is_empty())
            .ok_or(ExplanationError::EmptyResponse)?;

        parse_annotations(content, sentences.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn explainer() -> ChatExplainer {
        let config = ExplanationConfig {
            api_key: Some("sk-test".to_string()),
            ..ExplanationConfig::default()
        };
        ChatExplainer::new(&config).unwrap()
    }

    #[test]
    fn test_prompt_names_both_languages_and_sentences() {
        let explainer = explainer();
        let prompt = explainer.build_prompt(&["Hallo, hoe gaat het?".to_string()]);

        assert!(prompt.contains("Dutch language teacher"));
        assert!(prompt.contains("English translation"));
        assert!(prompt.contains("Hallo, hoe gaat het?"));
        assert!(prompt.contains("\"sentences\""));
        assert!(prompt.contains("explanation_foreign"));
        assert!(prompt.contains("meaning_native"));
    }

    #[test]
    fn test_parse_annotations_round_trip() {
        let content = r#"{
            "sentences": [
                {
                    "translation": "Hello, how are you?",
                    "explanation_foreign": "Een gebruikelijke begroeting.",
                    "explanation_native": "A common informal greeting.",
                    "keywords": [
                        {"word": "gaan", "meaning_foreign": "zich bewegen", "meaning_native": "to go"}
                    ]
                }
            ]
        }"#;

        let annotations = parse_annotations(content, 1).unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].translation, "Hello, how are you?");
        assert_eq!(annotations[0].keywords.len(), 1);
        assert_eq!(annotations[0].keywords[0].word, "gaan");
    }

    #[test]
    fn test_parse_annotations_count_mismatch_fails_batch() {
        let content = r#"{ "sentences": [ { "translation": "only one" } ] }"#;
        let result = parse_annotations(content, 2);
        assert!(matches!(
            result,
            Err(ExplanationError::CountMismatch {
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn test_parse_annotations_missing_fields_default_empty() {
        let content = r#"{ "sentences": [ {} ] }"#;
        let annotations = parse_annotations(content, 1).unwrap();
        assert!(annotations[0].translation.is_empty());
        assert!(annotations[0].keywords.is_empty());
    }

    #[test]
    fn test_parse_annotations_invalid_json_is_an_error() {
        let result = parse_annotations("sorry, I cannot do that", 1);
        assert!(matches!(result, Err(ExplanationError::Parse(_))));
    }

    #[test]
    fn test_client_requires_api_key() {
        let config = ExplanationConfig {
            api_key: None,
            api_key_env: "LINGODECK_CHAT_TEST_KEY_UNSET".to_string(),
            ..ExplanationConfig::default()
        };
        let result = ChatExplainer::new(&config);
        assert!(matches!(result, Err(ExplanationError::MissingApiKey)));
    }
}
