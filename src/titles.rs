// ABOUTME: Conversation title generation through an OpenAI-compatible model
// ABOUTME: Builds bounded prompts, cleans the reply, and falls back to default titles on failure
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{error, info};

use crate::config::TitleGeneratorConfig;
use crate::constants::titles::{
    DEFAULT_SUMMARY_TITLE, DEFAULT_TIMEOUT_SECS, DEFAULT_TITLE, MAX_TITLE_CHARS, MAX_TITLE_MESSAGES,
    SUMMARY_ELIDE_THRESHOLD, SUMMARY_HEAD_CHARS, SUMMARY_TAIL_CHARS, TITLE_MESSAGE_CHARS,
};
use crate::errors::{AppError, AppResult};
use crate::llm::openai_compatible::parse_response;
use crate::llm::{ChatMessage, MessageRole, UpstreamRequest, UpstreamTransport};

const TITLE_PROVIDER: &str = "titles";
const TITLE_MAX_TOKENS: u32 = 100;
const TITLE_TEMPERATURE: f32 = 0.7;
const TITLE_TOP_P: f32 = 1.0;

/// Generates short conversation titles
#[derive(Clone)]
pub struct TitleGenerator {
    config: TitleGeneratorConfig,
    transport: Arc<dyn UpstreamTransport>,
}

impl TitleGenerator {
    /// Create a generator
    #[must_use]
    pub fn new(config: TitleGeneratorConfig, transport: Arc<dyn UpstreamTransport>) -> Self {
        Self { config, transport }
    }

    /// Title from the opening of a conversation; never fails
    pub async fn generate(&self, messages: &[ChatMessage], custom_prompt: Option<&str>) -> String {
        let prompt = build_title_prompt(messages, custom_prompt);
        match self.complete(prompt).await {
            Ok(title) => {
                info!(%title, "Generated conversation title");
                clean_title(&title).unwrap_or_else(|| DEFAULT_TITLE.to_owned())
            }
            Err(e) => {
                error!("Title generation failed: {e}");
                DEFAULT_TITLE.to_owned()
            }
        }
    }

    /// Title summarizing a whole conversation; never fails
    pub async fn generate_summary(&self, messages: &[ChatMessage]) -> String {
        let prompt = build_summary_prompt(messages);
        match self.complete(prompt).await {
            Ok(title) => {
                info!(%title, "Generated summary title");
                clean_title(&title).unwrap_or_else(|| DEFAULT_SUMMARY_TITLE.to_owned())
            }
            Err(e) => {
                error!("Summary title generation failed: {e}");
                DEFAULT_SUMMARY_TITLE.to_owned()
            }
        }
    }

    async fn complete(&self, prompt: String) -> AppResult<String> {
        let api_key = self
            .config
            .api_key
            .clone()
            .ok_or_else(|| AppError::config("TITLE_API_KEY is not configured"))?;

        let body = json!({
            "model": self.config.model,
            "max_tokens": TITLE_MAX_TOKENS,
            "temperature": TITLE_TEMPERATURE,
            "top_p": TITLE_TOP_P,
            "messages": [{"role": "user", "content": prompt}],
        });
        let request = UpstreamRequest {
            provider: TITLE_PROVIDER.to_owned(),
            endpoint: format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')),
            credential: api_key,
            body,
        };

        let response = tokio::time::timeout(
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            self.transport.send_json(request),
        )
        .await
        .map_err(|_| {
            AppError::upstream_timeout(
                TITLE_PROVIDER,
                format!("no title after {DEFAULT_TIMEOUT_SECS}s"),
            )
        })??;
        Ok(parse_response(&response)?.content)
    }
}

fn speaker(role: MessageRole) -> &'static str {
    if role == MessageRole::User {
        "User"
    } else {
        "Assistant"
    }
}

fn build_title_prompt(messages: &[ChatMessage], custom_prompt: Option<&str>) -> String {
    let mut prompt = String::new();
    match custom_prompt.map(str::trim).filter(|p| !p.is_empty()) {
        Some(custom) => {
            prompt.push_str(custom);
            prompt.push_str("\n\n");
        }
        None => prompt.push_str(
            "Write a short, accurate title for the following conversation \
             (at most 20 characters, no quotes):\n\n",
        ),
    }

    for message in messages.iter().take(MAX_TITLE_MESSAGES) {
        let content = if message.content.chars().count() > TITLE_MESSAGE_CHARS {
            let head: String = message.content.chars().take(TITLE_MESSAGE_CHARS).collect();
            format!("{head}...")
        } else {
            message.content.clone()
        };
        let _ = writeln!(prompt, "{}: {content}", speaker(message.role));
    }

    prompt.push_str("\nTitle:");
    prompt
}

fn build_summary_prompt(messages: &[ChatMessage]) -> String {
    let mut prompt = String::from(
        "Based on the complete conversation below, write a title that captures its overall \
         topic (at most 25 characters, no quotes).\n\n\
         This title summarizes the whole conversation, so reflect its core subject and main \
         points.\n\n",
    );

    for message in messages {
        let chars: Vec<char> = message.content.chars().collect();
        let content = if chars.len() > SUMMARY_ELIDE_THRESHOLD {
            let head: String = chars[..SUMMARY_HEAD_CHARS].iter().collect();
            let tail: String = chars[chars.len() - SUMMARY_TAIL_CHARS..].iter().collect();
            format!("{head}...{tail}")
        } else {
            message.content.clone()
        };
        let _ = writeln!(prompt, "{}: {content}", speaker(message.role));
    }

    prompt.push_str("\nSummary title:");
    prompt
}

/// Clean a raw model reply into a title, `None` when nothing usable remains
fn clean_title(raw: &str) -> Option<String> {
    let quotes: &[char] = &['"', '\'', '\u{201c}', '\u{201d}'];
    let mut title = raw.trim().trim_matches(quotes).replace(['\r', '\n'], " ");
    for label in ["Summary title:", "Title:", "title:", "Title\u{ff1a}"] {
        title = title.replace(label, "");
    }
    let title = title.trim().trim_matches(quotes).trim().to_owned();

    if title.is_empty() {
        return None;
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        let head: String = title.chars().take(MAX_TITLE_CHARS - 3).collect();
        return Some(format!("{head}..."));
    }
    Some(title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("\"Rust lifetimes\"").as_deref(), Some("Rust lifetimes"));
        assert_eq!(clean_title("Title: Async\nRust").as_deref(), Some("Async Rust"));
        assert_eq!(clean_title("  ''  "), None);

        let long = "a".repeat(80);
        let cleaned = clean_title(&long).unwrap_or_default();
        assert_eq!(cleaned.chars().count(), MAX_TITLE_CHARS);
        assert!(cleaned.ends_with("..."));
    }

    #[test]
    fn test_title_prompt_bounds_messages() {
        let messages: Vec<ChatMessage> = (0..15)
            .map(|i| ChatMessage::user(format!("message {i} {}", "x".repeat(300))))
            .collect();
        let prompt = build_title_prompt(&messages, None);
        assert!(prompt.contains("message 9 "));
        assert!(!prompt.contains("message 10 "));
        assert!(!prompt.contains(&"x".repeat(250)));
    }

    #[test]
    fn test_summary_prompt_elides_long_messages() {
        let long = format!("{}{}{}", "h".repeat(150), "m".repeat(100), "t".repeat(100));
        let prompt = build_summary_prompt(&[ChatMessage::assistant(long)]);
        assert!(prompt.contains(&format!("Assistant: {}...{}", "h".repeat(150), "t".repeat(100))));
        assert!(!prompt.contains('m'.to_string().repeat(10).as_str()));
    }
}
