//! Next-word suggestions from a language model
//!
//! Providers are async and may take arbitrarily long. `SuggestionRequester`
//! puts a time budget on each call, aborts the previous call when a new one
//! starts, and hands results back over a channel tagged with the layout
//! generation they were requested for. The tick loop drains the channel and
//! never waits on it.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::{Error, Result};

pub const SYSTEM_PROMPT: &str = "You help a person who types with an on-screen AAC keyboard. \
Given the sentence so far, predict the words most likely to come next. \
Reply with a JSON array of single words or short phrases, most likely first, and nothing else.";

#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    /// Ordered next-word candidates for `sentence`
    async fn suggest(&self, sentence: &str) -> Result<Vec<String>>;
}

pub fn user_prompt(sentence: &str, max: usize) -> String {
    format!(
        "Sentence so far: \"{}\"\nGive up to {} next words.",
        sentence.trim(),
        max
    )
}

static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+\s*[.):]|[-*•])\s*").expect("static pattern"));

/// Pull a clean word list out of free-form model output.
///
/// A JSON array of strings anywhere in the text wins. Otherwise the text is
/// split on newlines and commas with list markers and quotes stripped.
pub fn parse_suggestions(text: &str, max: usize) -> Vec<String> {
    let from_json = match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<Vec<String>>(&text[start..=end]).ok()
        }
        _ => None,
    };

    let candidates: Vec<String> = match from_json {
        Some(list) => list,
        None => text
            .split(['\n', ','])
            .map(|part| LIST_MARKER.replace(part.trim(), "").into_owned())
            .collect(),
    };

    let mut seen = HashSet::new();
    candidates
        .iter()
        .map(|s| {
            s.trim()
                .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
                .trim()
        })
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_lowercase()))
        .take(max)
        .map(str::to_string)
        .collect()
}

/// Result of one budgeted provider call
#[derive(Debug)]
pub struct SuggestionResponse {
    pub generation: u64,
    pub sentence: String,
    pub result: Result<Vec<String>>,
}

pub struct SuggestionRequester {
    provider: Arc<dyn SuggestionProvider>,
    budget: Duration,
    max: usize,
    tx: flume::Sender<SuggestionResponse>,
    rx: flume::Receiver<SuggestionResponse>,
    in_flight: Option<JoinHandle<()>>,
}

impl SuggestionRequester {
    pub fn new(provider: Arc<dyn SuggestionProvider>, budget: Duration, max: usize) -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            provider,
            budget,
            max,
            tx,
            rx,
            in_flight: None,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Start a call for `sentence`, superseding any call still running
    pub fn request(&mut self, generation: u64, sentence: &str) {
        self.cancel();

        let sentence = sentence.to_string();
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                let _ = self.tx.send(SuggestionResponse {
                    generation,
                    sentence,
                    result: Err(Error::Provider("no async runtime".into())),
                });
                return;
            }
        };

        let provider = Arc::clone(&self.provider);
        let tx = self.tx.clone();
        let budget = self.budget;
        let max = self.max;
        debug!(generation, %sentence, "requesting suggestions");

        self.in_flight = Some(handle.spawn(async move {
            let result = match tokio::time::timeout(budget, provider.suggest(&sentence)).await {
                Ok(Ok(words)) => Ok(words.into_iter().take(max).collect()),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(Error::ProviderTimeout(budget)),
            };
            let _ = tx.send(SuggestionResponse {
                generation,
                sentence,
                result,
            });
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Everything that has come back since the last drain
    pub fn drain(&self) -> Vec<SuggestionResponse> {
        self.rx.try_iter().collect()
    }

    /// For hosts that want to wake up when a response lands
    pub fn receiver(&self) -> flume::Receiver<SuggestionResponse> {
        self.rx.clone()
    }
}

impl Drop for SuggestionRequester {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Build the configured provider
pub fn build_provider(config: &ProviderConfig, max: usize) -> Result<Arc<dyn SuggestionProvider>> {
    match config {
        #[cfg(feature = "openai-compat")]
        ProviderConfig::OpenAiCompat {
            base_url,
            model,
            api_key,
            temperature,
            max_tokens,
            ..
        } => Ok(Arc::new(openai_compat::OpenAiCompatProvider::new(
            base_url,
            model,
            api_key.clone(),
            *temperature,
            *max_tokens,
            max,
        ))),
        #[cfg(not(feature = "openai-compat"))]
        ProviderConfig::OpenAiCompat { .. } => Err(Error::Config(
            "openai-compat provider configured but built without the openai-compat feature".into(),
        )),
        #[cfg(feature = "ollama")]
        ProviderConfig::Ollama { model } => Ok(Arc::new(ollama::OllamaProvider::new(model, max))),
        #[cfg(not(feature = "ollama"))]
        ProviderConfig::Ollama { .. } => Err(Error::Config(
            "ollama provider configured but built without the ollama feature".into(),
        )),
    }
}

// ============================================================================
// OpenAI-compatible HTTP backend (LM Studio, OpenAI, Ollama's /v1)
// ============================================================================

#[cfg(feature = "openai-compat")]
pub mod openai_compat {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize)]
    struct ChatMessage<'a> {
        role: &'a str,
        content: &'a str,
    }

    #[derive(Serialize)]
    struct ChatRequest<'a> {
        model: &'a str,
        messages: Vec<ChatMessage<'a>>,
        stream: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        temperature: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_tokens: Option<u32>,
    }

    #[derive(Deserialize)]
    struct ChatResponse {
        #[serde(default)]
        choices: Vec<Choice>,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: ResponseMessage,
    }

    #[derive(Deserialize)]
    struct ResponseMessage {
        #[serde(default)]
        content: String,
    }

    pub struct OpenAiCompatProvider {
        client: reqwest::Client,
        base_url: String,
        model: String,
        api_key: Option<String>,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
        max: usize,
    }

    impl OpenAiCompatProvider {
        pub fn new(
            base_url: &str,
            model: &str,
            api_key: Option<String>,
            temperature: Option<f32>,
            max_tokens: Option<u32>,
            max: usize,
        ) -> Self {
            Self {
                client: reqwest::Client::new(),
                base_url: base_url.trim_end_matches('/').to_string(),
                model: model.to_string(),
                api_key: api_key.filter(|k| !k.is_empty()),
                temperature,
                max_tokens,
                max,
            }
        }

        fn chat_url(&self) -> String {
            format!("{}/chat/completions", self.base_url)
        }
    }

    #[async_trait]
    impl SuggestionProvider for OpenAiCompatProvider {
        async fn suggest(&self, sentence: &str) -> Result<Vec<String>> {
            let prompt = user_prompt(sentence, self.max);
            let request = ChatRequest {
                model: &self.model,
                messages: vec![
                    ChatMessage {
                        role: "system",
                        content: SYSTEM_PROMPT,
                    },
                    ChatMessage {
                        role: "user",
                        content: &prompt,
                    },
                ],
                stream: false,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            };

            let mut builder = self.client.post(self.chat_url()).json(&request);
            if let Some(key) = &self.api_key {
                builder = builder.bearer_auth(key);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| Error::Provider(format!("request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                warn!(%status, "suggestion provider returned an error");
                return Err(Error::Provider(format!("HTTP {}: {}", status, body)));
            }

            let body: ChatResponse = response
                .json()
                .await
                .map_err(|e| Error::Provider(format!("bad response body: {}", e)))?;

            let content = body
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content)
                .unwrap_or_default();
            Ok(parse_suggestions(&content, self.max))
        }
    }
}

// ============================================================================
// Ollama backend
// ============================================================================

#[cfg(feature = "ollama")]
pub mod ollama {
    use super::*;
    use ollama_rs::Ollama;
    use ollama_rs::generation::chat::ChatMessage;
    use ollama_rs::generation::chat::request::ChatMessageRequest;

    pub struct OllamaProvider {
        client: Ollama,
        model: String,
        max: usize,
    }

    impl OllamaProvider {
        pub fn new(model: &str, max: usize) -> Self {
            Self {
                client: Ollama::default(),
                model: model.to_string(),
                max,
            }
        }
    }

    #[async_trait]
    impl SuggestionProvider for OllamaProvider {
        async fn suggest(&self, sentence: &str) -> Result<Vec<String>> {
            let messages = vec![
                ChatMessage::system(SYSTEM_PROMPT.to_string()),
                ChatMessage::user(user_prompt(sentence, self.max)),
            ];
            let request = ChatMessageRequest::new(self.model.clone(), messages);
            let response = self
                .client
                .send_chat_messages(request)
                .await
                .map_err(|e| Error::Provider(e.to_string()))?;
            Ok(parse_suggestions(&response.message.content, self.max))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<&'static str>);

    #[async_trait]
    impl SuggestionProvider for Fixed {
        async fn suggest(&self, _sentence: &str) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    struct Slow;

    #[async_trait]
    impl SuggestionProvider for Slow {
        async fn suggest(&self, _sentence: &str) -> Result<Vec<String>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec!["late".into()])
        }
    }

    #[test]
    fn test_parse_json_array() {
        let text = "Sure! Here you go: [\"pizza\", \"ice cream\", \"Pizza\", \" \"]";
        assert_eq!(parse_suggestions(text, 18), vec!["pizza", "ice cream"]);
    }

    #[test]
    fn test_parse_numbered_list() {
        let text = "1. apples\n2) \"bananas\"\n- cherries, dates\n\n* apples";
        assert_eq!(
            parse_suggestions(text, 18),
            vec!["apples", "bananas", "cherries", "dates"]
        );
    }

    #[test]
    fn test_parse_caps() {
        let text = "[\"a\", \"b\", \"c\"]";
        assert_eq!(parse_suggestions(text, 2), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_response_tagged_with_generation() {
        let mut requester =
            SuggestionRequester::new(Arc::new(Fixed(vec!["x", "y", "z"])), Duration::from_secs(1), 2);
        let rx = requester.receiver();
        requester.request(7, "i want");
        let response = rx.recv_async().await.unwrap();
        assert_eq!(response.generation, 7);
        assert_eq!(response.sentence, "i want");
        assert_eq!(response.result.unwrap(), vec!["x", "y"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_error() {
        let mut requester =
            SuggestionRequester::new(Arc::new(Slow), Duration::from_millis(500), 18);
        let rx = requester.receiver();
        requester.request(1, "hello");
        let response = rx.recv_async().await.unwrap();
        assert!(matches!(response.result, Err(Error::ProviderTimeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_request_aborts_previous() {
        let mut requester = SuggestionRequester::new(Arc::new(Slow), Duration::from_secs(5), 18);
        let rx = requester.receiver();
        requester.request(1, "first");
        tokio::task::yield_now().await;
        requester.request(2, "second");
        let response = rx.recv_async().await.unwrap();
        assert_eq!(response.generation, 2);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_without_runtime_reports_error() {
        let mut requester =
            SuggestionRequester::new(Arc::new(Fixed(vec!["x"])), Duration::from_secs(1), 18);
        requester.request(3, "hi");
        let drained = requester.drain();
        assert_eq!(drained.len(), 1);
        assert!(drained[0].result.is_err());
    }
}
