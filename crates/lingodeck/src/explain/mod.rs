//! Annotation service integration.
//!
//! An [`ExplanationService`] takes an ordered batch of sentence texts and
//! returns one [`Annotation`] per sentence: a translation into the
//! learner's native language, a short explanation in each language, and
//! extracted vocabulary. Batches either fully succeed or fully fail; the
//! orchestrator never applies a partial batch.

pub mod chat;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ExplanationError;

pub use chat::ChatExplainer;

/// One vocabulary entry extracted from a sentence.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Keyword {
    #[serde(default)]
    pub word: String,
    #[serde(default)]
    pub meaning_native: String,
    #[serde(default)]
    pub meaning_foreign: String,
}

/// The annotation produced for one sentence.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub explanation_native: String,
    #[serde(default)]
    pub explanation_foreign: String,
    #[serde(default)]
    pub keywords: Vec<Keyword>,
}

#[async_trait]
pub trait ExplanationService: Send + Sync {
    /// Annotates one batch of sentences. The result has exactly one entry
    /// per input sentence, in the same order.
    async fn explain(&self, sentences: &[String]) -> Result<Vec<Annotation>, ExplanationError>;
}
