//! Speech-to-text input merged into the sentence
//!
//! The recognizer itself is a collaborator. This module only bounds how long
//! a chunk may take and cleans what comes back; a chunk that fails, times out
//! or is empty is simply dropped.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::warn;

use crate::error::{Error, Result};

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Mono f32 samples in, text out
    async fn transcribe(&self, chunk: &[f32]) -> Result<String>;
}

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("static pattern"));

/// Strip recognizer markers such as `[BLANK_AUDIO]` and collapse whitespace
pub fn clean_transcript(text: &str) -> String {
    let stripped = MARKER.replace_all(text, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Transcribe one chunk within `budget`. `None` means discard it.
pub async fn transcribe_chunk(
    transcriber: &dyn Transcriber,
    chunk: &[f32],
    budget: Duration,
) -> Option<String> {
    let result = match tokio::time::timeout(budget, transcriber.transcribe(chunk)).await {
        Ok(result) => result,
        Err(_) => Err(Error::ProviderTimeout(budget)),
    };

    match result {
        Ok(text) => {
            let text = clean_transcript(&text);
            (!text.is_empty()).then_some(text)
        }
        Err(e) => {
            warn!(error = %e, samples = chunk.len(), "dropping transcript chunk");
            None
        }
    }
}
