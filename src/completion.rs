//! The remote text-completion call.
//!
//! The rest of the crate only sees the [`Completer`] trait, so a connection
//! can be handled against a scripted stand-in as easily as against the real
//! API.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::runtime::{self, Runtime};
use tracing::debug;

use crate::{config::Config, error::CompletionError};

pub const MODEL: &str = "claude-sonnet-4-5-20250929";
pub const MAX_TOKENS: u32 = 4096;
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Something that can turn a prompt into completion text.
pub trait Completer {
    fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError>;
}

impl<T: Completer + ?Sized> Completer for &T {
    fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError> {
        (**self).complete(system, user)
    }
}

impl<T: Completer + ?Sized> Completer for Box<T> {
    fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError> {
        (**self).complete(system, user)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Blocking client for the Anthropic Messages API.
///
/// The server is single-threaded and synchronous, so the async HTTP client is
/// driven on a current-thread runtime owned by this struct and every call
/// blocks until the API answers. No timeout is configured.
pub struct AnthropicClient {
    http: Client,
    runtime: Runtime,
    api_key: String,
    endpoint: String,
}

impl AnthropicClient {
    pub fn new(config: &Config) -> Result<Self, CompletionError> {
        let runtime = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(CompletionError::Runtime)?;

        let http = Client::builder().build()?;

        Ok(AnthropicClient {
            http,
            runtime,
            api_key: config.api_key.clone(),
            endpoint: format!(
                "{}/v1/messages",
                config.api_base_url.trim_end_matches('/')
            ),
        })
    }

    async fn send(&self, system: &str, user: &str) -> Result<String, CompletionError> {
        let body = MessagesRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: [Message {
                role: "user",
                content: user,
            }],
        };

        debug!("Requesting completion from {}", self.endpoint);

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);

            return Err(CompletionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let reply: MessagesResponse = response.json().await?;

        reply
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .ok_or(CompletionError::EmptyCompletion)
    }
}

impl Completer for AnthropicClient {
    fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError> {
        self.runtime.block_on(self.send(system, user))
    }
}
